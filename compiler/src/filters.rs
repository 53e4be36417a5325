//! Filter derivation.
//!
//! Filters are chosen per view in priority order:
//! 1. An explicit, non-empty filter
//! 2. Solution models: the filter of an implemented reference view, when
//!    the view adds no properties of its own
//! 3. Solution models: `NodeType` over the reference nodes of the view and
//!    its properties
//! 4. Views without containers: `NodeType` over the view's own marker
//! 5. `HasData` over every container the view maps to, inherited
//!    properties included

use std::collections::BTreeSet;

use dms_conformance::{Diagnostic, IssueKind, ValidationReport};
use dms_model::physical::{PhysicalProperty, PhysicalView};
use dms_model::schema::Filter;
use dms_model::{ModelKind, NodeTypeRef, Schema};

const VALIDATOR: &str = "compile/filters";

/// A derived filter.
#[derive(Debug, Clone, PartialEq)]
pub struct Derived {
    /// The filter.
    pub filter: Filter,
    /// Synthetic node type the filter introduces, to be emitted with the
    /// schema.
    pub marker: Option<NodeTypeRef>,
}

impl Derived {
    fn plain(filter: Filter) -> Self {
        Self {
            filter,
            marker: None,
        }
    }
}

/// Derives the filter of `view`.
///
/// `schema` holds every view and container of the model with its overlays
/// attached; `rows` are the view's own property rows.
pub fn derive(
    view: &PhysicalView,
    rows: &[&PhysicalProperty],
    schema: &Schema,
    kind: ModelKind,
    report: &mut ValidationReport,
) -> Derived {
    let containers = schema.referenced_containers(&view.id);

    match &view.filter {
        Some(filter) if !filter.is_empty() => {
            if matches!(filter, Filter::HasData(_)) && containers.is_empty() {
                report.push(Diagnostic::warn(
                    VALIDATOR,
                    IssueKind::Suspicious,
                    format!("view {} filters with {filter} but maps to no container", view.id),
                ));
            }
            return Derived::plain(filter.clone());
        }
        _ => {}
    }

    if kind == ModelKind::Solution {
        if let Some(filter) = inherited_reference_filter(view, rows, schema) {
            return Derived::plain(filter);
        }
        let nodes: BTreeSet<NodeTypeRef> = view
            .reference
            .iter()
            .cloned()
            .chain(rows.iter().filter_map(|r| r.reference.as_ref()?.as_node().cloned()))
            .collect();
        if !nodes.is_empty() {
            return Derived::plain(Filter::NodeType(nodes.into_iter().collect()));
        }
    }

    if containers.is_empty() {
        if matches!(&view.filter, Some(Filter::HasData(_))) {
            report.push(Diagnostic::warn(
                VALIDATOR,
                IssueKind::Suspicious,
                format!(
                    "view {} asks for hasData() but maps to no container; filtering on its node type instead",
                    view.id
                ),
            ));
        }
        let marker = view.id.as_node_type();
        return Derived {
            filter: Filter::NodeType(vec![marker.clone()]),
            marker: Some(marker),
        };
    }

    Derived::plain(Filter::HasData(containers.into_iter().collect()))
}

/// The filter of the first implemented reference view, for views that only
/// re-expose a reference view.
fn inherited_reference_filter(
    view: &PhysicalView,
    rows: &[&PhysicalProperty],
    schema: &Schema,
) -> Option<Filter> {
    if !rows.is_empty() {
        return None;
    }
    let reference = schema.reference.as_deref()?;
    view.implements
        .iter()
        .filter_map(|parent| reference.views.get(parent))
        .find_map(|parent| parent.filter.clone())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use dms_model::schema::{MappedProperty, View, ViewProperty};
    use dms_model::{ContainerEntity, ViewEntity};

    fn physical(name: &str) -> PhysicalView {
        PhysicalView {
            id: ViewEntity::new("power", name, "1").unwrap(),
            name: None,
            description: None,
            implements: Vec::new(),
            filter: None,
            reference: None,
            in_model: true,
            class: None,
        }
    }

    fn schema() -> Schema {
        let mut schema = Schema::new();
        let mut asset = View::new(ViewEntity::new("power", "Asset", "1").unwrap());
        asset.properties.insert(
            "name".into(),
            ViewProperty::Mapped(MappedProperty {
                container: ContainerEntity::new("power", "Asset").unwrap(),
                container_property: "name".into(),
                source: None,
                name: None,
                description: None,
            }),
        );
        schema.views.insert(asset.id.clone(), asset);
        let marker = View::new(ViewEntity::new("power", "Marker", "1").unwrap());
        schema.views.insert(marker.id.clone(), marker);
        schema
    }

    #[test]
    fn has_data_over_mapped_containers() {
        let mut report = ValidationReport::new();
        let derived = derive(&physical("Asset"), &[], &schema(), ModelKind::Enterprise, &mut report);
        assert_eq!(derived.filter.to_string(), "hasData(power:Asset)");
        assert!(derived.marker.is_none());
    }

    #[test]
    fn containerless_views_filter_on_their_marker() {
        let mut report = ValidationReport::new();
        let mut view = physical("Marker");
        view.filter = Some(Filter::HasData(Vec::new()));
        let derived = derive(&view, &[], &schema(), ModelKind::Enterprise, &mut report);
        assert_eq!(derived.filter.to_string(), "nodeType(power:Marker)");
        assert_eq!(derived.marker.map(|m| m.to_string()).as_deref(), Some("power:Marker"));
        assert_eq!(report.warnings().count(), 1);
    }

    #[test]
    fn explicit_filters_win() {
        let mut report = ValidationReport::new();
        let mut view = physical("Marker");
        view.filter = Some(Filter::HasData(vec![ContainerEntity::new("power", "Asset").unwrap()]));
        let derived = derive(&view, &[], &schema(), ModelKind::Enterprise, &mut report);
        assert_eq!(derived.filter, view.filter.clone().unwrap());
        assert_eq!(report.warnings().count(), 1);
    }

    #[test]
    fn solution_models_reuse_reference_filters() {
        let mut reference = Schema::new();
        let mut base = View::new(ViewEntity::new("core", "Asset", "v1").unwrap());
        base.filter = Some(Filter::NodeType(vec!["core:Asset".parse().unwrap()]));
        reference.views.insert(base.id.clone(), base.clone());
        let schema = schema().with_reference(reference);

        let mut view = physical("Pump");
        view.implements.push(base.id.clone());
        let mut report = ValidationReport::new();
        let derived = derive(&view, &[], &schema, ModelKind::Solution, &mut report);
        assert_eq!(derived.filter, base.filter.unwrap());

        let mut tagged = physical("Valve");
        tagged.reference = Some("core:Valve".parse().unwrap());
        let derived = derive(&tagged, &[], &schema, ModelKind::Solution, &mut report);
        assert_eq!(derived.filter.to_string(), "nodeType(core:Valve)");
    }
}
