//! Property-level checks on a conceptual model.

use std::collections::BTreeMap;

use dms_model::physical::Connection;
use dms_model::{ClassEntity, ConceptualModel, ValueType};

use crate::report::{Diagnostic, IssueKind, ValidationReport};
use crate::validators::rows;
use crate::CheckSettings;

const VALIDATOR: &str = "conceptual/properties";

/// Validates the properties of `model`.
///
/// - A property is declared once per class
/// - `unknown` value types need `ignore_unknown`
/// - Connection hints only apply to class-valued properties
pub fn validate(model: &ConceptualModel, settings: &CheckSettings) -> ValidationReport {
    let mut report = ValidationReport::new();

    let mut seen: BTreeMap<(&ClassEntity, &str), Vec<usize>> = BTreeMap::new();
    for property in &model.properties {
        seen.entry((&property.class, property.property.as_str()))
            .or_default()
            .push(property.row);
    }
    for ((class, name), found) in seen.into_iter().filter(|(_, r)| r.len() > 1) {
        report.push(Diagnostic::error(
            VALIDATOR,
            IssueKind::ResourceDuplicated,
            format!("property {class}.{name} is declared more than once (rows {})", rows(found)),
        ));
    }

    for property in &model.properties {
        let members = property.value_type.members();
        let has_unknown = members.iter().any(|m| matches!(m, ValueType::Unknown));
        let has_class = members
            .iter()
            .any(|m| matches!(m, ValueType::Class(_) | ValueType::Unknown));

        if has_unknown && !settings.ignore_unknown {
            report.push(Diagnostic::error(
                VALIDATOR,
                IssueKind::Invalid,
                format!(
                    "property {}.{} (row {}) has no resolvable value type",
                    property.class, property.property, property.row
                ),
            ));
        }

        match &property.hints.connection {
            Some(connection) if !has_class => report.push(Diagnostic::error(
                VALIDATOR,
                IssueKind::Invalid,
                format!(
                    "property {}.{} (row {}) declares a {connection} connection but its value type \
                     '{}' is primitive",
                    property.class, property.property, property.row, property.value_type
                ),
            )),
            Some(Connection::Edge { .. } | Connection::Reverse { .. })
                if property.hints.container.is_some() =>
            {
                report.push(Diagnostic::warn(
                    VALIDATOR,
                    IssueKind::Suspicious,
                    format!(
                        "property {}.{} (row {}) is not container-backed; its container hint is ignored",
                        property.class, property.property, property.row
                    ),
                ));
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
    use dms_model::conceptual::{ClassDraft, ModelDraft, PropertyDraft};

    fn model() -> ConceptualModel {
        ModelDraft::new("power", "1")
            .with_class(ClassDraft::new("Asset"))
            .with_property(PropertyDraft::new("Asset", "name", "text"))
            .with_property(PropertyDraft::new("Asset", "name", "text"))
            .with_property(PropertyDraft::new("Asset", "blob", "unknown"))
            .with_property(PropertyDraft::new("Asset", "size", "int32").with_connection("edge"))
            .finalize()
            .unwrap()
    }

    #[test]
    fn reports_each_fault() {
        let report = validate(&model(), &CheckSettings::default());
        let messages: Vec<&str> = report.diagnostics.iter().map(|d| d.message.as_str()).collect();
        assert_eq!(report.error_count(), 3, "{messages:?}");
        assert!(messages[0].contains("rows 1, 2"));
        assert!(messages.iter().any(|m| m.contains("no resolvable value type")));
        assert!(messages.iter().any(|m| m.contains("edge(direction=outwards) connection")));
    }

    #[test]
    fn ignore_unknown_accepts_untyped_properties() {
        let settings = CheckSettings {
            ignore_unknown: true,
            ..CheckSettings::default()
        };
        let report = validate(&model(), &settings);
        assert_eq!(report.error_count(), 2);
    }
}
