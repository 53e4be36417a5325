//! Filter and namespace observations.

use dms_model::schema::Filter;
use dms_model::Schema;

use crate::report::{Diagnostic, IssueKind, ValidationReport};

const VALIDATOR: &str = "schema/filters";

/// Validates view filters and the data model's view membership.
///
/// - A `NodeType` filter on a view other views implement is suspicious,
///   since a parent view usually backs several concrete types
/// - Data-model views in another space or at another version are noted
pub fn validate(schema: &Schema) -> ValidationReport {
    let mut report = ValidationReport::new();

    let parents = schema.implemented_views();
    for (id, view) in &schema.views {
        if let Some(Filter::NodeType(nodes)) = &view.filter {
            if parents.contains(id) {
                let nodes: Vec<String> = nodes.iter().map(ToString::to_string).collect();
                report.push(Diagnostic::warn(
                    VALIDATOR,
                    IssueKind::Suspicious,
                    format!(
                        "view {id} is implemented by other views but filters on node types [{}]",
                        nodes.join(", ")
                    ),
                ));
            }
        }
    }

    if let Some(model) = &schema.data_model {
        for view in &model.views {
            if view.space != model.space || view.version != model.version {
                report.push(Diagnostic::warn(
                    VALIDATOR,
                    IssueKind::Mismatch,
                    format!(
                        "view {view} differs from data model {}:{} (version {}) in space or version",
                        model.space, model.external_id, model.version
                    ),
                ));
            }
        }
    }

    report
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::validators::schema::fixtures::*;
    use dms_model::ViewEntity;

    #[test]
    fn node_type_filter_on_a_parent_view() {
        let mut schema = asset_schema();
        if let Some(asset) = schema.views.get_mut(&view_id("Asset")) {
            asset.filter = Some(Filter::NodeType(vec![view_id("Asset").as_node_type()]));
        }
        assert!(validate(&schema).diagnostics.is_empty());

        let pump = view("Pump", vec![]);
        schema.views.insert(pump.id.clone(), pump);
        if let Some(pump) = schema.views.get_mut(&view_id("Pump")) {
            pump.implements.push(view_id("Asset"));
        }
        let report = validate(&schema);
        assert_eq!(report.warnings().count(), 1);
        assert!(report.diagnostics[0].message.contains("[power:Asset]"));
    }

    #[test]
    fn foreign_views_in_the_data_model() {
        let mut schema = asset_schema();
        if let Some(model) = schema.data_model.as_mut() {
            model.views.push(ViewEntity::new("core", "Describable", "v1").unwrap());
            model.views.push(ViewEntity::new("power", "Site", "2").unwrap());
        }
        let report = validate(&schema);
        assert!(!report.has_errors());
        assert_eq!(report.by_validator("schema/filters").count(), 2);
    }
}
