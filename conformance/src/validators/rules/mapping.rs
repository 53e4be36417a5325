//! Duplicate declarations in a physical rule set.

use std::collections::BTreeMap;

use dms_model::physical::{PhysicalProperty, PhysicalRules};
use dms_model::{ContainerEntity, ViewEntity};

use crate::report::{Diagnostic, IssueKind, ValidationReport};
use crate::validators::rows;

const VALIDATOR: &str = "rules/mapping";

/// Validates that views, containers and view properties are declared once.
///
/// A view property declared twice is a mapping duplicate when both rows
/// land on the same container slot, and a plain duplicate otherwise.
pub fn validate(rules: &PhysicalRules) -> ValidationReport {
    let mut report = ValidationReport::new();

    check_views(rules, &mut report);
    check_containers(rules, &mut report);
    check_view_properties(rules, &mut report);

    report
}

fn check_views(rules: &PhysicalRules, report: &mut ValidationReport) {
    let mut seen: BTreeMap<&ViewEntity, usize> = BTreeMap::new();
    for view in &rules.views {
        *seen.entry(&view.id).or_default() += 1;
    }
    for (view, count) in seen.into_iter().filter(|(_, n)| *n > 1) {
        report.push(Diagnostic::error(
            VALIDATOR,
            IssueKind::ResourceDuplicated,
            format!("view {view} is declared {count} times"),
        ));
    }
}

fn check_containers(rules: &PhysicalRules, report: &mut ValidationReport) {
    let mut seen: BTreeMap<&ContainerEntity, usize> = BTreeMap::new();
    for container in &rules.containers {
        *seen.entry(&container.id).or_default() += 1;
    }
    for (container, count) in seen.into_iter().filter(|(_, n)| *n > 1) {
        report.push(Diagnostic::error(
            VALIDATOR,
            IssueKind::ResourceDuplicated,
            format!("container {container} is declared {count} times"),
        ));
    }
}

fn check_view_properties(rules: &PhysicalRules, report: &mut ValidationReport) {
    let mut seen: BTreeMap<(&ViewEntity, &str), Vec<&PhysicalProperty>> = BTreeMap::new();
    for property in &rules.properties {
        seen.entry((&property.view, property.view_property.as_str()))
            .or_default()
            .push(property);
    }

    for ((view, name), found) in seen.into_iter().filter(|(_, p)| p.len() > 1) {
        let at = rows(found.iter().map(|p| p.row));
        let mut slots: BTreeMap<(&ContainerEntity, &str), usize> = BTreeMap::new();
        for slot in found.iter().filter_map(|p| p.container_slot()) {
            *slots.entry(slot).or_default() += 1;
        }

        match slots.into_iter().find(|(_, n)| *n > 1) {
            Some(((container, slot), _)) => report.push(Diagnostic::error(
                VALIDATOR,
                IssueKind::MappingDuplicated,
                format!(
                    "view property {view}.{name} maps to {container}.{slot} more than once (rows {at})"
                ),
            )),
            None => report.push(Diagnostic::error(
                VALIDATOR,
                IssueKind::ResourceDuplicated,
                format!("view property {view}.{name} is declared more than once (rows {at})"),
            )),
        }
    }
}
