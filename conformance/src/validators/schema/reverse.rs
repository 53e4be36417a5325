//! Reverse-connection feasibility.

use dms_model::schema::{ReverseConnection, ViewProperty};
use dms_model::{Schema, ViewEntity};

use crate::report::{Diagnostic, IssueKind, ValidationReport};

const VALIDATOR: &str = "schema/reverse";

/// Validates that every reverse connection can be computed.
///
/// The `through` property must exist on the target view (inherited
/// properties count), must itself be a direct or edge connection, and must
/// point back at the declaring view or one of its ancestors. A direct
/// relation without a target view cannot be checked and is only flagged.
/// Target views missing from every layer are left to the reference checks.
pub fn validate(schema: &Schema) -> ValidationReport {
    let mut report = ValidationReport::new();

    for (id, view) in &schema.views {
        for (name, property) in &view.properties {
            if let ViewProperty::Reverse(reverse) = property {
                check_reverse(schema, id, name, reverse, &mut report);
            }
        }
    }

    report
}

fn check_reverse(
    schema: &Schema,
    view: &ViewEntity,
    name: &str,
    reverse: &ReverseConnection,
    report: &mut ValidationReport,
) {
    if !schema.has_view(&reverse.through.view) {
        return;
    }
    let at = format!("reverse connection {view}.{name}");
    let infeasible = |reason: String| {
        Diagnostic::error(VALIDATOR, IssueKind::Infeasible, format!("{at} is infeasible: {reason}"))
    };

    let resolved = schema.resolved_properties(&reverse.through.view);
    let Some((_, through)) = resolved.get(&reverse.through.property) else {
        report.push(infeasible(format!("{} has no property '{}'", reverse.through.view, reverse.through.property)));
        return;
    };

    let target = match through {
        ViewProperty::Reverse(_) => {
            report.push(infeasible(format!("{} is itself a reverse connection", reverse.through)));
            return;
        }
        ViewProperty::Mapped(mapped) if mapped.source.is_none() => {
            let container = schema.find_container(&mapped.container);
            let is_direct = container
                .and_then(|c| c.properties.get(&mapped.container_property))
                .is_some_and(|p| p.value_type.is_direct());
            if is_direct {
                report.push(Diagnostic::warn(
                    VALIDATOR,
                    IssueKind::Suspicious,
                    format!("{at} runs through {} which has no target view", reverse.through),
                ));
            } else {
                report.push(infeasible(format!("{} is not a connection", reverse.through)));
            }
            return;
        }
        other => other.target_view(),
    };

    let Some(target) = target else {
        return;
    };
    if target != view && !schema.ancestors(view).contains(target) {
        report.push(infeasible(format!(
            "{} points at {target}, not at {view}",
            reverse.through
        )));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::validators::schema::fixtures::*;
    use dms_model::schema::PropertyType;

    fn with_reverse(through: &str) -> Schema {
        let mut schema = asset_schema();
        if let Some(point) = schema.views.get_mut(&view_id("GeoPoint")) {
            point.properties.insert("assets".into(), reverse("Asset", through));
        }
        schema
    }

    #[test]
    fn reverse_of_a_direct_relation_is_feasible() {
        assert!(validate(&with_reverse("location")).diagnostics.is_empty());
    }

    #[test]
    fn missing_and_primitive_through_properties_are_infeasible() {
        let missing = validate(&with_reverse("site"));
        assert_eq!(missing.error_count(), 1);
        assert!(missing.diagnostics[0].message.contains("has no property 'site'"));

        let primitive = validate(&with_reverse("name"));
        assert_eq!(primitive.error_count(), 1);
        assert!(primitive.diagnostics[0].message.contains("is not a connection"));
    }

    #[test]
    fn pointing_elsewhere_is_infeasible() {
        let mut schema = with_reverse("location");
        let other = view("Other", vec![]);
        schema.views.insert(other.id.clone(), other);
        if let Some(other) = schema.views.get_mut(&view_id("Other")) {
            other.properties.insert("assets".into(), reverse("Asset", "location"));
        }
        let report = validate(&schema);
        assert_eq!(report.error_count(), 1);
        assert!(report.diagnostics[0].message.starts_with("reverse connection power:Other"));
    }

    #[test]
    fn untyped_direct_is_only_flagged() {
        let mut schema = with_reverse("holder");
        if let Some(asset) = schema.views.get_mut(&view_id("Asset")) {
            asset.properties.insert("holder".into(), mapped("Asset", "holder", None));
        }
        if let Some(container) = schema.containers.get_mut(&container_id("Asset")) {
            let mut direct = text();
            direct.value_type = PropertyType::Direct { container: None };
            container.properties.insert("holder".into(), direct);
        }
        let report = validate(&schema);
        assert!(!report.has_errors());
        assert_eq!(report.warnings().count(), 1);
    }
}
