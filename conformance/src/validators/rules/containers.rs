//! Container-definition consistency.
//!
//! Several rows may back the same `(container, container property)` slot,
//! for example when two views share a container. All non-null attributes of
//! those rows must agree. Direct relations may disagree on their target view,
//! since a direct relation can point at nodes of any type.

use std::collections::BTreeMap;

use dms_model::physical::{PhysicalProperty, PhysicalRules};
use dms_model::ContainerEntity;

use crate::report::{Diagnostic, IssueKind, ValidationReport};
use crate::validators::rows;

const VALIDATOR: &str = "rules/containers";

/// Validates that every shared container slot is defined consistently.
pub fn validate(rules: &PhysicalRules) -> ValidationReport {
    let mut report = ValidationReport::new();

    let mut slots: BTreeMap<(&ContainerEntity, &str), Vec<&PhysicalProperty>> = BTreeMap::new();
    for property in &rules.properties {
        if let Some(slot) = property.container_slot() {
            slots.entry(slot).or_default().push(property);
        }
    }

    for ((container, slot), definitions) in slots.iter().filter(|(_, d)| d.len() > 1) {
        let conflicts = conflicts(definitions);
        if conflicts.is_empty() {
            continue;
        }
        let attributes: Vec<&str> = conflicts.iter().map(|(attribute, _)| *attribute).collect();
        report.push(
            Diagnostic::error(
                VALIDATOR,
                IssueKind::Inconsistent,
                format!(
                    "container property {container}.{slot} is defined inconsistently ({}) by rows {}",
                    attributes.join(", "),
                    rows(definitions.iter().map(|d| d.row))
                ),
            )
            .with_details(conflicts.into_iter().map(|(_, detail)| detail).collect()),
        );
    }

    report
}

/// One `(attribute, rendered values)` entry per disagreeing attribute.
fn conflicts(definitions: &[&PhysicalProperty]) -> Vec<(&'static str, String)> {
    let all_direct = definitions.iter().all(|d| d.is_direct());
    let mut found = Vec::new();

    let mut check = |attribute: &'static str, render: &dyn Fn(&PhysicalProperty) -> Option<String>| {
        let mut values: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for definition in definitions {
            if let Some(value) = render(*definition) {
                values.entry(value).or_default().push(definition.row);
            }
        }
        if values.len() > 1 {
            let rendered = values
                .into_iter()
                .map(|(value, at)| format!("{value} (rows {})", rows(at)))
                .collect::<Vec<_>>()
                .join(" vs ");
            found.push((attribute, format!("{attribute}: {rendered}")));
        }
    };

    if !all_direct {
        check("value type", &|d: &PhysicalProperty| Some(d.value_type.to_string()));
    }
    check("list", &|d: &PhysicalProperty| d.is_list.map(|v| v.to_string()));
    check("nullable", &|d: &PhysicalProperty| d.nullable.map(|v| v.to_string()));
    check("default", &|d: &PhysicalProperty| d.default.as_ref().map(ToString::to_string));
    check("index", &|d: &PhysicalProperty| non_empty_set(&d.index));
    check("uniqueness", &|d: &PhysicalProperty| non_empty_set(&d.constraint));

    found
}

fn non_empty_set(groups: &[String]) -> Option<String> {
    if groups.is_empty() {
        return None;
    }
    let mut sorted = groups.to_vec();
    sorted.sort();
    sorted.dedup();
    Some(format!("[{}]", sorted.join(", ")))
}
