//! Capacity observations. Nothing here blocks a compile.

use dms_model::schema::Filter;
use dms_model::{Limits, Schema};

use crate::report::{Diagnostic, IssueKind, ValidationReport};

const VALIDATOR: &str = "schema/capacity";

/// Validates `schema` against the platform limits.
///
/// - Container property count
/// - View property count, inherited properties included
/// - Distinct containers behind one view
/// - Containers in one `HasData` filter
pub fn validate(schema: &Schema, limits: &Limits) -> ValidationReport {
    let mut report = ValidationReport::new();

    for (id, container) in &schema.containers {
        let count = container.properties.len();
        if count > limits.container_properties {
            report.push(over_limit(format!(
                "container {id} has {count} properties (limit {})",
                limits.container_properties
            )));
        }
    }

    for (id, view) in &schema.views {
        let properties = schema.resolved_properties(id).len();
        if properties > limits.view_properties {
            report.push(over_limit(format!(
                "view {id} has {properties} properties (limit {})",
                limits.view_properties
            )));
        }

        let containers = schema.referenced_containers(id).len();
        if containers > limits.view_containers {
            report.push(over_limit(format!(
                "view {id} maps to {containers} containers (limit {})",
                limits.view_containers
            )));
        }

        if let Some(Filter::HasData(members)) = &view.filter {
            if members.len() > limits.filter_containers {
                report.push(over_limit(format!(
                    "hasData filter of view {id} spans {} containers (limit {})",
                    members.len(),
                    limits.filter_containers
                )));
            }
        }
    }

    report
}

fn over_limit(message: String) -> Diagnostic {
    Diagnostic::warn(VALIDATOR, IssueKind::Capacity, message)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::validators::schema::fixtures::*;

    #[test]
    fn default_limits_accept_small_schemas() {
        assert!(validate(&asset_schema(), &Limits::default()).diagnostics.is_empty());
    }

    #[test]
    fn tight_limits_only_warn() {
        let mut schema = asset_schema();
        if let Some(asset) = schema.views.get_mut(&view_id("Asset")) {
            asset.filter = Some(Filter::HasData(vec![container_id("Asset"), container_id("GeoPoint")]));
        }
        let limits = Limits {
            container_properties: 1,
            view_properties: 1,
            view_containers: 1,
            filter_containers: 1,
        };
        let report = validate(&schema, &limits);
        assert!(!report.has_errors());
        // Two containers, two views over their property limit, one filter.
        assert_eq!(report.warnings().count(), 5);
        assert!(report.diagnostics.iter().all(|d| d.kind == IssueKind::Capacity));
    }
}
