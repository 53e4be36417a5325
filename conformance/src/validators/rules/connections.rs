//! Connection flags on view-property rows.

use dms_model::physical::{Connection, PhysicalRules, PhysicalValueType};

use crate::report::{Diagnostic, IssueKind, ValidationReport};

const VALIDATOR: &str = "rules/connections";

/// Validates connection kinds against the other attributes of each row.
///
/// - A direct relation cannot be declared non-nullable
/// - Edge and reverse connections point at a view
/// - A reverse connection names the property it runs through
pub fn validate(rules: &PhysicalRules) -> ValidationReport {
    let mut report = ValidationReport::new();

    for property in &rules.properties {
        let at = format!("{}.{} (row {})", property.view, property.view_property, property.row);
        match &property.connection {
            Some(Connection::Direct) if property.nullable == Some(false) => {
                report.push(Diagnostic::error(
                    VALIDATOR,
                    IssueKind::Invalid,
                    format!("direct relation {at} is declared non-nullable; direct relations are always nullable"),
                ));
            }
            Some(connection @ (Connection::Edge { .. } | Connection::Reverse { .. })) => {
                if !matches!(property.value_type, PhysicalValueType::View(_)) {
                    report.push(Diagnostic::error(
                        VALIDATOR,
                        IssueKind::Invalid,
                        format!(
                            "{connection} connection {at} needs a view as value type, found '{}'",
                            property.value_type
                        ),
                    ));
                }
                if let Connection::Reverse { through } = connection {
                    if through.trim().is_empty() {
                        report.push(Diagnostic::error(
                            VALIDATOR,
                            IssueKind::Invalid,
                            format!("reverse connection {at} does not name the property it runs through"),
                        ));
                    }
                }
            }
            _ => {}
        }
    }

    report
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use dms_model::conceptual::{Completeness, ExtensionCategory, ModelKind};
    use dms_model::physical::{PhysicalMetadata, PhysicalProperty};
    use dms_model::{DataType, ViewEntity};

    fn row(connection: Connection, value_type: PhysicalValueType, nullable: Option<bool>) -> PhysicalProperty {
        PhysicalProperty {
            view: ViewEntity::new("power", "Asset", "1").unwrap(),
            view_property: "site".to_string(),
            name: None,
            description: None,
            value_type,
            connection: Some(connection),
            nullable,
            immutable: None,
            is_list: None,
            default: None,
            container: None,
            container_property: None,
            index: Vec::new(),
            constraint: Vec::new(),
            unit: None,
            enum_values: None,
            reference: None,
            class: None,
            row: 7,
        }
    }

    fn rules(properties: Vec<PhysicalProperty>) -> PhysicalRules {
        PhysicalRules {
            metadata: PhysicalMetadata {
                space: "power".into(),
                version: "1".into(),
                name: None,
                description: None,
                kind: ModelKind::Enterprise,
                completeness: Completeness::Complete,
                extension: ExtensionCategory::Addition,
            },
            properties,
            views: Vec::new(),
            containers: Vec::new(),
            last: None,
            reference: None,
        }
    }

    fn site() -> PhysicalValueType {
        PhysicalValueType::View(ViewEntity::new("power", "Site", "1").unwrap())
    }

    #[test]
    fn non_nullable_direct_is_reported() {
        let report = validate(&rules(vec![
            row(Connection::Direct, site(), Some(false)),
            row(Connection::Direct, site(), Some(true)),
        ]));
        assert_eq!(report.error_count(), 1);
        assert!(report.diagnostics[0].message.contains("row 7"));
    }

    #[test]
    fn edges_need_a_view_and_reverses_a_property() {
        let edge = Connection::Edge {
            edge_type: None,
            direction: Default::default(),
        };
        let reverse = Connection::Reverse {
            through: " ".to_string(),
        };
        let report = validate(&rules(vec![
            row(edge, PhysicalValueType::Primitive(DataType::String), None),
            row(reverse, site(), None),
        ]));
        assert_eq!(report.error_count(), 2);
        assert!(report.diagnostics[0].message.starts_with("edge(direction=outwards) connection"));
        assert!(report.diagnostics[1].message.contains("does not name"));
    }
}
