//! Derived, read-only views over a conceptual model.
//!
//! [`RuleAnalysis`] layers the model over its "last" and "reference"
//! overlays: a class defined in the current model shadows the same class in
//! "last", which shadows "reference". Only same-space parents take part in
//! inheritance; cross-space parents are reported separately.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use thiserror::Error;

use crate::conceptual::{ConceptualClass, ConceptualModel, ConceptualProperty};
use crate::entity::ClassEntity;

/// Structural failures that abort analysis.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    /// The parent graph contains a cycle; the path starts and ends on the
    /// same class.
    #[error("cyclic inheritance: {}", render_cycle(.cycle))]
    CyclicInheritance {
        /// Classes on the cycle, first class repeated at the end.
        cycle: Vec<ClassEntity>,
    },
}

fn render_cycle(cycle: &[ClassEntity]) -> String {
    cycle
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// A class-to-class reference derived from one property.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Linkage {
    /// Class declaring the property.
    pub source_class: ClassEntity,
    /// The connecting property.
    pub connecting_property: String,
    /// Referenced class.
    pub target_class: ClassEntity,
    /// Maximum occurrence; `None` is unbounded.
    pub max_occurrence: Option<u32>,
}

impl Linkage {
    // Bounded beats unbounded, then the smaller bound, then lexical order.
    fn preference(&self) -> (bool, u32, &ClassEntity, &str) {
        (
            self.max_occurrence.is_none(),
            self.max_occurrence.unwrap_or(0),
            &self.source_class,
            &self.connecting_property,
        )
    }
}

/// Two linkages pointing at each other's classes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymmetricPair {
    /// The direction retained for ordering.
    pub kept: Linkage,
    /// The direction discarded.
    pub dropped: Linkage,
}

/// Analysis over a conceptual model and its overlays.
#[derive(Debug)]
pub struct RuleAnalysis<'a> {
    model: &'a ConceptualModel,
    classes: BTreeMap<ClassEntity, &'a ConceptualClass>,
    properties: BTreeMap<ClassEntity, Vec<&'a ConceptualProperty>>,
    local: BTreeSet<ClassEntity>,
}

impl<'a> RuleAnalysis<'a> {
    /// Builds the layered class catalog and checks the parent graph.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::CyclicInheritance`] naming the first cycle
    /// found (classes visited in lexical order).
    pub fn new(model: &'a ConceptualModel) -> Result<Self, AnalysisError> {
        let mut classes: BTreeMap<ClassEntity, &'a ConceptualClass> = BTreeMap::new();
        let mut properties: BTreeMap<ClassEntity, Vec<&'a ConceptualProperty>> = BTreeMap::new();

        let layers = std::iter::once(model)
            .chain(model.last.as_deref())
            .chain(model.reference.as_deref());
        for (depth, layer) in layers.enumerate() {
            let mut owned: BTreeSet<ClassEntity> = BTreeSet::new();
            for class in &layer.classes {
                if !classes.contains_key(&class.id) {
                    classes.insert(class.id.clone(), class);
                    owned.insert(class.id.clone());
                }
            }
            for property in &layer.properties {
                // Undefined owners are tracked from the current model only.
                if owned.contains(&property.class) || (depth == 0 && !classes.contains_key(&property.class)) {
                    properties.entry(property.class.clone()).or_default().push(property);
                }
            }
        }

        let analysis = Self {
            model,
            local: model.classes.iter().map(|c| c.id.clone()).collect(),
            classes,
            properties,
        };
        analysis.check_cycles()?;
        Ok(analysis)
    }

    /// The analysed model.
    pub fn model(&self) -> &'a ConceptualModel {
        self.model
    }

    /// Classes defined in the current model, in identifier order.
    pub fn local_classes(&self) -> impl Iterator<Item = &ClassEntity> {
        self.local.iter()
    }

    /// True if the class is defined in the model or an overlay.
    pub fn is_defined(&self, class: &ClassEntity) -> bool {
        self.classes.contains_key(class)
    }

    /// The class definition, searching overlays.
    pub fn class(&self, class: &ClassEntity) -> Option<&'a ConceptualClass> {
        self.classes.get(class).copied()
    }

    /// Properties declared directly on `class` in the layer that defines it.
    pub fn own_properties(&self, class: &ClassEntity) -> &[&'a ConceptualProperty] {
        self.properties.get(class).map_or(&[], Vec::as_slice)
    }

    /// Same-space parents of `class`.
    pub fn parents(&self, class: &ClassEntity) -> Vec<&'a ClassEntity> {
        self.classes
            .get(class)
            .copied()
            .map(|c: &'a ConceptualClass| {
                c.parents.iter().filter(|p| p.space == class.space).collect()
            })
            .unwrap_or_default()
    }

    /// `(child, parent)` pairs whose parent lives in another space.
    pub fn cross_space_parents(&self) -> Vec<(&ClassEntity, &'a ClassEntity)> {
        self.local
            .iter()
            .filter_map(|id| self.classes.get(id).map(|c| (id, *c)))
            .flat_map(|(id, c)| {
                c.parents
                    .iter()
                    .filter(move |p| p.space != id.space)
                    .map(move |p| (id, p))
            })
            .collect()
    }

    /// Transitive same-space ancestors, nearest first.
    pub fn ancestors(&self, class: &ClassEntity) -> Vec<ClassEntity> {
        let mut seen: BTreeSet<&ClassEntity> = BTreeSet::new();
        let mut order = Vec::new();
        let mut queue: VecDeque<&ClassEntity> = self.parents(class).into_iter().collect();
        while let Some(next) = queue.pop_front() {
            if next == class || !seen.insert(next) {
                continue;
            }
            queue.extend(self.parents(next));
            order.push(next.clone());
        }
        order
    }

    fn check_cycles(&self) -> Result<(), AnalysisError> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Active,
            Done,
        }

        fn visit<'b>(
            analysis: &RuleAnalysis<'b>,
            class: &ClassEntity,
            marks: &mut BTreeMap<ClassEntity, Mark>,
            path: &mut Vec<ClassEntity>,
        ) -> Result<(), AnalysisError> {
            match marks.get(class) {
                Some(Mark::Done) => return Ok(()),
                Some(Mark::Active) => {
                    let start = path.iter().position(|c| c == class).unwrap_or(0);
                    let mut cycle = path[start..].to_vec();
                    cycle.push(class.clone());
                    return Err(AnalysisError::CyclicInheritance { cycle });
                }
                None => {}
            }
            marks.insert(class.clone(), Mark::Active);
            path.push(class.clone());
            let mut parents = analysis.parents(class);
            parents.sort();
            for parent in parents {
                visit(analysis, parent, marks, path)?;
            }
            path.pop();
            marks.insert(class.clone(), Mark::Done);
            Ok(())
        }

        let mut marks = BTreeMap::new();
        for class in self.classes.keys() {
            visit(self, class, &mut marks, &mut Vec::new())?;
        }
        Ok(())
    }

    /// Properties of every local class, optionally with inherited ones.
    ///
    /// With `include_ancestors`, each ancestor (nearest first) contributes
    /// the properties whose names the class and nearer ancestors have not
    /// already declared.
    pub fn properties_by_class(
        &self,
        include_ancestors: bool,
    ) -> BTreeMap<ClassEntity, Vec<&'a ConceptualProperty>> {
        let mut by_class = BTreeMap::new();
        for class in &self.local {
            let mut collected: Vec<&'a ConceptualProperty> = self.own_properties(class).to_vec();
            if include_ancestors {
                let mut names: BTreeSet<&str> =
                    collected.iter().map(|p| p.property.as_str()).collect();
                for ancestor in self.ancestors(class) {
                    for property in self.own_properties(&ancestor) {
                        if names.insert(property.property.as_str()) {
                            collected.push(*property);
                        }
                    }
                }
            }
            by_class.insert(class.clone(), collected);
        }
        by_class
    }

    /// One linkage per class referenced by a property of the current model.
    ///
    /// Union members each yield their own linkage; primitive members are
    /// skipped.
    pub fn class_linkage(&self) -> Vec<Linkage> {
        self.model
            .properties
            .iter()
            .flat_map(|p| {
                p.value_type.class_references().into_iter().map(move |target| Linkage {
                    source_class: p.class.clone(),
                    connecting_property: p.property.clone(),
                    target_class: target.clone(),
                    max_occurrence: p.max_count,
                })
            })
            .collect()
    }

    /// Linkage pairs `(A→B, B→A)` with the retained direction chosen
    /// deterministically.
    pub fn symmetric_pairs(&self) -> Vec<SymmetricPair> {
        let linkages = self.class_linkage();
        let mut pairs = Vec::new();
        for (i, first) in linkages.iter().enumerate() {
            for second in &linkages[i + 1..] {
                if first.source_class != first.target_class
                    && first.source_class == second.target_class
                    && first.target_class == second.source_class
                {
                    let (kept, dropped) = if first.preference() <= second.preference() {
                        (first, second)
                    } else {
                        (second, first)
                    };
                    pairs.push(SymmetricPair {
                        kept: kept.clone(),
                        dropped: dropped.clone(),
                    });
                }
            }
        }
        pairs
    }

    /// The ordering graph: referenced class → referencing classes.
    ///
    /// Self references and the dropped side of every symmetric pair are
    /// excluded. Every local class is a node.
    pub fn generation_graph(&self) -> BTreeMap<ClassEntity, BTreeSet<ClassEntity>> {
        let dropped: BTreeSet<Linkage> = self
            .symmetric_pairs()
            .into_iter()
            .map(|pair| pair.dropped)
            .collect();
        let mut graph: BTreeMap<ClassEntity, BTreeSet<ClassEntity>> = self
            .local
            .iter()
            .map(|c| (c.clone(), BTreeSet::new()))
            .collect();
        for linkage in self.class_linkage() {
            if linkage.source_class == linkage.target_class || dropped.contains(&linkage) {
                continue;
            }
            graph.entry(linkage.source_class.clone()).or_default();
            graph
                .entry(linkage.target_class.clone())
                .or_default()
                .insert(linkage.source_class);
        }
        graph
    }

    /// Classes with their depth in the ordering graph, sorted by
    /// `(depth, class)`.
    ///
    /// Roots (no incoming edge) have depth 0. Nodes only reachable through
    /// a cycle are unfolded from their lexically smallest member.
    pub fn generation_order(&self) -> Vec<(usize, ClassEntity)> {
        let graph = self.generation_graph();
        let mut incoming: BTreeSet<&ClassEntity> = BTreeSet::new();
        for children in graph.values() {
            incoming.extend(children.iter());
        }

        fn unfold<'g>(
            graph: &'g BTreeMap<ClassEntity, BTreeSet<ClassEntity>>,
            roots: Vec<&'g ClassEntity>,
            depth: &mut BTreeMap<&'g ClassEntity, usize>,
        ) {
            let mut queue: VecDeque<(&'g ClassEntity, usize)> =
                roots.into_iter().map(|r| (r, 0)).collect();
            while let Some((node, level)) = queue.pop_front() {
                if depth.contains_key(node) {
                    continue;
                }
                depth.insert(node, level);
                if let Some(children) = graph.get(node) {
                    queue.extend(children.iter().map(|c| (c, level + 1)));
                }
            }
        }

        let mut depth: BTreeMap<&ClassEntity, usize> = BTreeMap::new();
        let roots: Vec<&ClassEntity> = graph.keys().filter(|c| !incoming.contains(c)).collect();
        unfold(&graph, roots, &mut depth);
        while let Some(next) = graph.keys().find(|c| !depth.contains_key(c)) {
            unfold(&graph, vec![next], &mut depth);
        }

        let mut order: Vec<(usize, ClassEntity)> =
            depth.into_iter().map(|(c, d)| (d, c.clone())).collect();
        order.sort();
        order
    }

    /// Referenced classes that no layer defines, with the rows that refer
    /// to them.
    ///
    /// Owning classes, class-valued types and same-space parents count as
    /// references; cross-space parents are reported by
    /// [`cross_space_parents`](Self::cross_space_parents) instead.
    pub fn undefined_classes(&self) -> BTreeMap<ClassEntity, Vec<usize>> {
        let mut undefined: BTreeMap<ClassEntity, Vec<usize>> = BTreeMap::new();
        let mut note = |class: &ClassEntity, row: usize| {
            if !self.classes.contains_key(class) {
                undefined.entry(class.clone()).or_default().push(row);
            }
        };
        for class in &self.model.classes {
            for parent in class.parents.iter().filter(|p| p.space == class.id.space) {
                note(parent, class.row);
            }
        }
        for property in &self.model.properties {
            note(&property.class, property.row);
            for target in property.value_type.class_references() {
                note(target, property.row);
            }
        }
        for rows in undefined.values_mut() {
            rows.sort_unstable();
            rows.dedup();
        }
        undefined
    }

    /// Local classes with no properties of their own or inherited.
    pub fn dangling_classes(&self) -> Vec<&ClassEntity> {
        self.local
            .iter()
            .filter(|class| {
                self.own_properties(class).is_empty()
                    && self
                        .ancestors(class)
                        .iter()
                        .all(|a| self.own_properties(a).is_empty())
            })
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::conceptual::{ClassDraft, ModelDraft, PropertyDraft};

    fn class(name: &str) -> ClassEntity {
        ClassEntity::new("power", name).unwrap()
    }

    fn pair_model(ab_max: Option<u32>, ba_max: Option<u32>) -> ConceptualModel {
        ModelDraft::new("power", "1")
            .with_class(ClassDraft::new("A"))
            .with_class(ClassDraft::new("B"))
            .with_property(PropertyDraft::new("A", "b", "B").with_count(0, ab_max))
            .with_property(PropertyDraft::new("B", "a", "A").with_count(0, ba_max))
            .finalize()
            .unwrap()
    }

    #[test]
    fn cycle_is_reported_with_its_path() {
        let model = ModelDraft::new("power", "1")
            .with_class(ClassDraft::new("A").with_parents("B"))
            .with_class(ClassDraft::new("B").with_parents("A"))
            .finalize()
            .unwrap();
        let err = RuleAnalysis::new(&model).unwrap_err();
        assert_eq!(
            err,
            AnalysisError::CyclicInheritance {
                cycle: vec![class("A"), class("B"), class("A")]
            }
        );
        assert_eq!(err.to_string(), "cyclic inheritance: power:A -> power:B -> power:A");
    }

    #[test]
    fn inherited_properties_respect_shadowing() {
        let model = ModelDraft::new("power", "1")
            .with_class(ClassDraft::new("Base"))
            .with_class(ClassDraft::new("Mid").with_parents("Base"))
            .with_class(ClassDraft::new("Leaf").with_parents("Mid"))
            .with_property(PropertyDraft::new("Base", "name", "text"))
            .with_property(PropertyDraft::new("Base", "code", "text"))
            .with_property(PropertyDraft::new("Mid", "code", "int32"))
            .with_property(PropertyDraft::new("Leaf", "size", "float64"))
            .finalize()
            .unwrap();
        let analysis = RuleAnalysis::new(&model).unwrap();
        assert_eq!(analysis.ancestors(&class("Leaf")), vec![class("Mid"), class("Base")]);

        let flat = analysis.properties_by_class(true);
        let leaf: Vec<(&str, &str)> = flat[&class("Leaf")]
            .iter()
            .map(|p| (p.class.name.as_str(), p.property.as_str()))
            .collect();
        assert_eq!(leaf, vec![("Leaf", "size"), ("Mid", "code"), ("Base", "name")]);
        assert_eq!(analysis.properties_by_class(false)[&class("Leaf")].len(), 1);
    }

    #[test]
    fn symmetric_pair_prefers_bounded() {
        let model = pair_model(None, Some(1));
        let analysis = RuleAnalysis::new(&model).unwrap();
        let pairs = analysis.symmetric_pairs();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].kept.source_class, class("B"));
    }

    #[test]
    fn symmetric_pair_tie_breaks_lexically() {
        let model = pair_model(Some(1), Some(1));
        let analysis = RuleAnalysis::new(&model).unwrap();
        assert_eq!(analysis.symmetric_pairs()[0].kept.source_class, class("A"));
    }

    #[test]
    fn generation_graph_keeps_one_direction() {
        let model = pair_model(None, None);
        let analysis = RuleAnalysis::new(&model).unwrap();
        let graph = analysis.generation_graph();
        let edges: usize = graph.values().map(BTreeSet::len).sum();
        assert_eq!(edges, 1);
        // A.b kept: B must exist before A links to it.
        assert!(graph[&class("B")].contains(&class("A")));
        assert_eq!(
            analysis.generation_order(),
            vec![(0, class("B")), (1, class("A"))]
        );
    }

    #[test]
    fn undefined_and_dangling_classes() {
        let model = ModelDraft::new("power", "1")
            .with_class(ClassDraft::new("Asset"))
            .with_class(ClassDraft::new("Empty"))
            .with_property(PropertyDraft::new("Asset", "site", "Site"))
            .with_property(PropertyDraft::new("Ghost", "x", "text"))
            .finalize()
            .unwrap();
        let analysis = RuleAnalysis::new(&model).unwrap();
        let undefined = analysis.undefined_classes();
        assert_eq!(undefined.keys().cloned().collect::<Vec<_>>(), vec![class("Ghost"), class("Site")]);
        assert_eq!(undefined[&class("Site")], vec![1]);
        assert_eq!(analysis.dangling_classes(), vec![&class("Empty")]);
    }

    #[test]
    fn overlays_define_classes() {
        let mut draft = ModelDraft::new("power", "2")
            .with_class(ClassDraft::new("Pump").with_parents("Asset"));
        draft.last = Some(Box::new(
            ModelDraft::new("power", "1")
                .with_class(ClassDraft::new("Asset"))
                .with_property(PropertyDraft::new("Asset", "name", "text")),
        ));
        let model = draft.finalize().unwrap();
        let analysis = RuleAnalysis::new(&model).unwrap();
        assert!(analysis.undefined_classes().is_empty());
        assert!(analysis.dangling_classes().is_empty());
        assert_eq!(analysis.local_classes().count(), 1);
    }

    #[test]
    fn cross_space_parents_are_listed() {
        let model = ModelDraft::new("power", "1")
            .with_class(ClassDraft::new("Asset").with_parents("core:Describable"))
            .with_property(PropertyDraft::new("Asset", "name", "text"))
            .finalize()
            .unwrap();
        let analysis = RuleAnalysis::new(&model).unwrap();
        let cross = analysis.cross_space_parents();
        assert_eq!(cross.len(), 1);
        assert_eq!(cross[0].1.space, "core");
        assert!(analysis.parents(&class("Asset")).is_empty());
    }
}
