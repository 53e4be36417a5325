//! Conceptual model → physical rule set.
//!
//! One view per class, versioned with the model. Each property becomes one
//! view-property row:
//!
//! | Reduced type | Cardinality | Connection | Backing |
//! |--------------|-------------|------------|---------|
//! | primitive | any | none | container slot |
//! | class | scalar | direct | container slot |
//! | class | list | edge | edge records |
//! | untyped | any | direct | container slot |
//!
//! A `connection` hint overrides the default for class-valued properties.
//! Container-backed rows are packed into size-bounded containers; each
//! packed container requires the primary container of every same-space
//! parent class that is emitted or already exists.

use std::collections::BTreeSet;

use dms_conformance::{Diagnostic, IssueKind, ValidationReport};
use dms_model::conceptual::ConceptualProperty;
use dms_model::physical::{
    Connection, PhysicalContainer, PhysicalMetadata, PhysicalProperty, PhysicalValueType,
    PhysicalView,
};
use dms_model::schema::{EdgeDirection, UsedFor};
use dms_model::{
    ClassEntity, ContainerEntity, Limits, ParseError, PhysicalRules, Reference, RuleAnalysis,
    Schema, ViewEntity,
};

use crate::mapping::{container_property_id, edge_type, reduce, Reduced};
use crate::packing::Packer;

const VALIDATOR: &str = "compile/convert";

/// Converts the analysed model into a physical rule set.
#[derive(Debug)]
pub struct Converter<'a> {
    analysis: &'a RuleAnalysis<'a>,
    limits: Limits,
    last: Option<&'a Schema>,
    reference: Option<&'a Schema>,
}

impl<'a> Converter<'a> {
    /// A converter without overlays.
    pub fn new(analysis: &'a RuleAnalysis<'a>, limits: Limits) -> Self {
        Self {
            analysis,
            limits,
            last: None,
            reference: None,
        }
    }

    /// Uses the compiled previous version to seed packing and resolve views.
    #[must_use]
    pub fn with_last(mut self, last: Option<&'a Schema>) -> Self {
        self.last = last;
        self
    }

    /// Uses the compiled base model to resolve cross-space views and
    /// containers.
    #[must_use]
    pub fn with_reference(mut self, reference: Option<&'a Schema>) -> Self {
        self.reference = reference;
        self
    }

    /// Runs the conversion.
    ///
    /// Properties of undefined classes are dropped; references to undefined
    /// classes become direct relations without a target view. A row whose
    /// derived identifier (bumped container, default edge type) breaks the
    /// identifier grammar is left out and reported as an error in the
    /// returned report, next to every other failing row.
    pub fn convert(&self) -> (PhysicalRules, ValidationReport) {
        let model = self.analysis.model();
        let meta = &model.metadata;
        let mut report = ValidationReport::new();

        let mut packer = Packer::new(self.limits.container_properties);
        if let Some(last) = self.last {
            for container in last.containers.values() {
                packer.seed(container);
            }
        }
        for class in &model.classes {
            packer.reserve(&class.id);
        }

        let mut owners: Vec<&ClassEntity> = Vec::new();
        let mut properties = Vec::with_capacity(model.properties.len());
        for property in &model.properties {
            if !self.analysis.is_defined(&property.class) {
                log::debug!(
                    "dropping property {}.{} (row {}): class is not defined",
                    property.class,
                    property.property,
                    property.row
                );
                continue;
            }
            if !owners.contains(&&property.class) {
                owners.push(&property.class);
            }
            match self.derive_property(property, &mut packer) {
                Ok(row) => properties.push(row),
                Err(e) => report.push(Diagnostic::error(
                    VALIDATOR,
                    IssueKind::Invalid,
                    format!(
                        "property {}.{} (row {}): {e}",
                        property.class, property.property, property.row
                    ),
                )),
            }
        }

        let views = self.derive_views(&owners);
        let containers = self.derive_containers(&packer);
        log::debug!(
            "converted {}: {} views, {} containers, {} properties",
            meta.space,
            views.len(),
            containers.len(),
            properties.len()
        );

        let rules = PhysicalRules {
            metadata: PhysicalMetadata {
                space: meta.space.clone(),
                version: meta.version.clone(),
                name: meta.name.clone(),
                description: meta.description.clone(),
                kind: meta.kind,
                completeness: meta.completeness,
                extension: meta.extension,
            },
            properties,
            views,
            containers,
            last: None,
            reference: None,
        };
        (rules, report)
    }

    /// The view a class resolves to: this model's version for local
    /// classes, otherwise the view compiled for it in "last" or "reference".
    fn view_of(&self, class: &ClassEntity) -> Option<ViewEntity> {
        let model = self.analysis.model();
        if model.class(class).is_some() {
            return Some(class.as_view(&model.metadata.version));
        }
        [self.last, self.reference]
            .into_iter()
            .flatten()
            .find_map(|schema| schema.views.keys().filter(|v| &v.as_class() == class).last().cloned())
    }

    fn derive_views(&self, owners: &[&ClassEntity]) -> Vec<PhysicalView> {
        let model = self.analysis.model();
        let version = &model.metadata.version;

        let mut seen: BTreeSet<&ClassEntity> = BTreeSet::new();
        let classes = model.classes.iter().map(|c| &c.id).chain(owners.iter().copied());

        let mut views = Vec::new();
        for id in classes {
            if !seen.insert(id) {
                continue;
            }
            let class = self.analysis.class(id);
            let implements = class
                .map(|c| {
                    c.parents
                        .iter()
                        .filter_map(|p| self.view_of(p))
                        .collect()
                })
                .unwrap_or_default();
            views.push(PhysicalView {
                id: id.as_view(version),
                name: class.and_then(|c| c.name.clone()),
                description: class.and_then(|c| c.description.clone()),
                implements,
                filter: class.and_then(|c| c.filter.clone()),
                reference: class.and_then(|c| c.reference.clone()),
                in_model: true,
                class: Some(id.clone()),
            });
        }
        views
    }

    fn derive_property(
        &self,
        property: &ConceptualProperty,
        packer: &mut Packer,
    ) -> Result<PhysicalProperty, ParseError> {
        let view = property.class.as_view(&self.analysis.model().metadata.version);
        let hints = &property.hints;

        let (value_type, connection) = match reduce(&property.value_type) {
            Reduced::Primitive(data_type) => (PhysicalValueType::Primitive(data_type), None),
            Reduced::Class(class) => match self.view_of(&class) {
                Some(target) => {
                    let default = if property.is_list() {
                        Connection::Edge {
                            edge_type: None,
                            direction: EdgeDirection::Outwards,
                        }
                    } else {
                        Connection::Direct
                    };
                    let connection = hints.connection.clone().unwrap_or(default);
                    (PhysicalValueType::View(target), Some(connection))
                }
                None => (PhysicalValueType::Unknown, Some(Connection::Direct)),
            },
            Reduced::Untyped => (
                PhysicalValueType::Unknown,
                Some(hints.connection.clone().unwrap_or(Connection::Direct)),
            ),
        };

        let connection = match connection {
            Some(Connection::Edge {
                edge_type: None,
                direction,
            }) => Some(Connection::Edge {
                edge_type: Some(edge_type(&view, &property.property)?),
                direction,
            }),
            other => other,
        };

        let mut row = PhysicalProperty {
            view,
            view_property: property.property.clone(),
            name: property.name.clone(),
            description: property.description.clone(),
            value_type,
            connection,
            nullable: None,
            immutable: None,
            is_list: Some(property.is_list()),
            default: None,
            container: None,
            container_property: None,
            index: Vec::new(),
            constraint: Vec::new(),
            unit: None,
            enum_values: None,
            reference: property.reference.clone(),
            class: Some(property.class.clone()),
            row: property.row,
        };

        let container_backed = row.connection.as_ref().map_or(true, Connection::is_direct);
        if container_backed {
            let (container, slot) = self.place(property, packer)?;
            row.nullable = Some(match row.connection {
                Some(Connection::Direct) => hints.nullable.unwrap_or(true),
                _ => hints.nullable.unwrap_or(!property.is_mandatory()),
            });
            row.immutable = Some(hints.immutable.unwrap_or(false));
            row.default = property.default.clone();
            row.container = Some(container);
            row.container_property = Some(slot);
            row.index = hints.index.clone();
            row.constraint = hints.constraint.clone();
            row.unit = hints.unit.clone();
            row.enum_values = hints.enum_values.clone();
        }
        Ok(row)
    }

    /// Picks the container slot: a referenced container property first,
    /// then an explicit container hint, then the class's container chain.
    fn place(
        &self,
        property: &ConceptualProperty,
        packer: &mut Packer,
    ) -> Result<(ContainerEntity, String), ParseError> {
        let hints = &property.hints;
        let slot = hints
            .container_property
            .clone()
            .unwrap_or_else(|| container_property_id(&property.property));

        if let Some(Reference::ContainerProperty {
            container,
            property: referenced,
        }) = &property.reference
        {
            packer.place(&property.class, container, referenced);
            return Ok((container.clone(), referenced.clone()));
        }
        if let Some(container) = &hints.container {
            packer.place(&property.class, container, &slot);
            return Ok((container.clone(), slot));
        }
        let container = packer.assign(&property.class, &slot)?;
        Ok((container, slot))
    }

    fn derive_containers(&self, packer: &Packer) -> Vec<PhysicalContainer> {
        let in_reference =
            |id: &ContainerEntity| self.reference.is_some_and(|r| r.containers.contains_key(id));
        let in_last = |id: &ContainerEntity| self.last.is_some_and(|l| l.containers.contains_key(id));

        let mut containers = Vec::new();
        for id in packer.used().filter(|&c| !in_reference(c)) {
            let owner = packer.owner(id);
            let mut requires: Vec<ContainerEntity> = owner
                .map(|class| {
                    self.analysis
                        .parents(class)
                        .into_iter()
                        .map(ClassEntity::as_container)
                        .filter(|parent| parent != id && (packer.is_used(parent) || in_last(parent)))
                        .collect()
                })
                .unwrap_or_default();
            requires.sort();
            requires.dedup();

            let primary = owner
                .filter(|class| &class.as_container() == id)
                .and_then(|class| self.analysis.class(class));
            containers.push(PhysicalContainer {
                id: id.clone(),
                name: primary.and_then(|c| c.name.clone()),
                description: primary.and_then(|c| c.description.clone()),
                requires,
                used_for: UsedFor::Node,
            });
        }
        containers
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use dms_model::conceptual::{ClassDraft, ModelDraft, PropertyDraft};
    use dms_model::ConceptualModel;

    fn convert(model: &ConceptualModel, limit: usize) -> PhysicalRules {
        let analysis = RuleAnalysis::new(model).unwrap();
        let (rules, report) =
            Converter::new(&analysis, Limits::default().with_container_properties(limit)).convert();
        assert!(report.diagnostics.is_empty(), "{:?}", report.diagnostics);
        rules
    }

    fn row<'r>(rules: &'r PhysicalRules, view: &str, property: &str) -> &'r PhysicalProperty {
        rules
            .properties
            .iter()
            .find(|p| p.view.name == view && p.view_property == property)
            .unwrap()
    }

    #[test]
    fn cardinality_picks_the_connection() {
        let model = ModelDraft::new("power", "1")
            .with_class(ClassDraft::new("Asset"))
            .with_class(ClassDraft::new("Part"))
            .with_property(PropertyDraft::new("Asset", "parts", "Part").with_count(0, None))
            .with_property(PropertyDraft::new("Asset", "main", "Part").with_count(1, Some(1)))
            .with_property(PropertyDraft::new("Part", "serial", "text").with_count(1, Some(1)))
            .finalize()
            .unwrap();
        let rules = convert(&model, 100);

        let parts = row(&rules, "Asset", "parts");
        assert_eq!(
            parts.connection.as_ref().map(ToString::to_string).as_deref(),
            Some("edge(type=power:Asset.parts, direction=outwards)")
        );
        assert_eq!(parts.nullable, None);
        assert_eq!(parts.is_list, Some(true));
        assert!(parts.container.is_none());

        let main = row(&rules, "Asset", "main");
        assert!(main.is_direct());
        assert_eq!(main.nullable, Some(true));
        assert_eq!(main.container_slot().map(|(c, p)| (c.name.as_str(), p)), Some(("Asset", "main")));

        assert_eq!(row(&rules, "Part", "serial").nullable, Some(false));
    }

    #[test]
    fn requires_follow_emitted_parents() {
        let model = ModelDraft::new("power", "1")
            .with_class(ClassDraft::new("Describable"))
            .with_class(ClassDraft::new("Marker"))
            .with_class(ClassDraft::new("Pump").with_parents("Describable, Marker"))
            .with_property(PropertyDraft::new("Describable", "name", "text"))
            .with_property(PropertyDraft::new("Pump", "flow", "float64"))
            .finalize()
            .unwrap();
        let rules = convert(&model, 100);

        let pump = rules
            .containers
            .iter()
            .find(|c| c.id.name == "Pump")
            .unwrap();
        assert_eq!(pump.requires, vec![ContainerEntity::new("power", "Describable").unwrap()]);
        let view = rules.views.iter().find(|v| v.id.name == "Pump").unwrap();
        assert_eq!(view.implements.len(), 2);
    }

    #[test]
    fn undefined_classes_are_dropped_in_partial_models() {
        let mut draft = ModelDraft::new("power", "1")
            .with_class(ClassDraft::new("Asset"))
            .with_property(PropertyDraft::new("Asset", "site", "Site").with_count(0, Some(1)))
            .with_property(PropertyDraft::new("Ghost", "name", "text"));
        draft.metadata.completeness = dms_model::Completeness::Partial;
        let rules = convert(&draft.finalize().unwrap(), 100);

        assert_eq!(rules.properties.len(), 1);
        let site = &rules.properties[0];
        assert!(site.is_direct());
        assert_eq!(site.value_type, PhysicalValueType::Unknown);
        assert_eq!(rules.views.len(), 1);
    }

    #[test]
    fn reserved_and_explicit_slots() {
        let model = ModelDraft::new("power", "1")
            .with_class(ClassDraft::new("Asset"))
            .with_property(PropertyDraft::new("Asset", "space", "text"))
            .with_property(PropertyDraft::new("Asset", "tag", "text").with_container("Tags"))
            .finalize()
            .unwrap();
        let rules = convert(&model, 100);
        assert_eq!(row(&rules, "Asset", "space").container_property.as_deref(), Some("space_"));
        assert_eq!(
            row(&rules, "Asset", "tag").container.as_ref().map(|c| c.name.as_str()),
            Some("Tags")
        );
        let names: Vec<&str> = rules.containers.iter().map(|c| c.id.name.as_str()).collect();
        assert_eq!(names, ["Asset", "Tags"]);
    }

    #[test]
    fn every_row_with_a_bad_identifier_is_reported() {
        let long = "A".repeat(252);
        let model = ModelDraft::new("power", "1")
            .with_class(ClassDraft::new(&long))
            .with_class(ClassDraft::new("Part"))
            .with_property(PropertyDraft::new(&long, "name", "text"))
            .with_property(PropertyDraft::new(&long, "spares", "Part").with_count(0, None))
            .with_property(PropertyDraft::new(&long, "wear", "Part").with_count(0, None))
            .finalize()
            .unwrap();
        let analysis = RuleAnalysis::new(&model).unwrap();
        let (rules, report) = Converter::new(&analysis, Limits::default()).convert();

        assert_eq!(report.error_count(), 2);
        assert!(report.errors().all(|d| d.validator == VALIDATOR));
        assert!(report.diagnostics[0].message.contains(".spares (row"));
        assert!(report.diagnostics[1].message.contains(".wear (row"));
        let kept: Vec<&str> = rules.properties.iter().map(|p| p.view_property.as_str()).collect();
        assert_eq!(kept, ["name"]);
    }

    #[test]
    fn overflow_skips_other_classes_containers() {
        let model = ModelDraft::new("power", "1")
            .with_class(ClassDraft::new("Asset"))
            .with_class(ClassDraft::new("Asset2"))
            .with_property(PropertyDraft::new("Asset", "a", "text"))
            .with_property(PropertyDraft::new("Asset", "name", "text"))
            .with_property(PropertyDraft::new("Asset2", "name", "int32").with_count(1, Some(1)))
            .finalize()
            .unwrap();
        let rules = convert(&model, 1);

        let placed = |view: &str| row(&rules, view, "name").container.as_ref().map(|c| c.name.clone());
        assert_eq!(placed("Asset").as_deref(), Some("Asset3"));
        assert_eq!(placed("Asset2").as_deref(), Some("Asset2"));
        let names: Vec<&str> = rules.containers.iter().map(|c| c.id.name.as_str()).collect();
        assert_eq!(names, ["Asset", "Asset2", "Asset3"]);
    }
}
