//! Resources declared more than once.
//!
//! Views are keyed by space and name, so one view at two versions counts as
//! two declarations. A view or container that the schema declares and the
//! "reference" layer also holds must match the reference definition.
//! Differences against "last" are judged by `schema/extension`, since
//! the extension category decides which of them are allowed.

use std::collections::BTreeMap;

use dms_model::schema::View;
use dms_model::{Schema, ViewEntity};

use crate::report::{Diagnostic, IssueKind, ValidationReport};

const VALIDATOR: &str = "schema/duplicates";

/// Validates that every view and container is declared once.
pub fn validate(schema: &Schema) -> ValidationReport {
    let mut report = ValidationReport::new();

    let mut versions: BTreeMap<(&str, &str), Vec<&str>> = BTreeMap::new();
    for id in schema.views.keys() {
        versions
            .entry((id.space.as_str(), id.name.as_str()))
            .or_default()
            .push(id.version.as_str());
    }
    for ((space, name), declared) in versions.into_iter().filter(|(_, v)| v.len() > 1) {
        report.push(duplicated(format!(
            "view {space}:{name} is declared at versions {}",
            declared.join(", ")
        )));
    }

    if let Some(reference) = schema.reference.as_deref() {
        for (id, container) in &schema.containers {
            if reference.containers.get(id).is_some_and(|base| base != container) {
                report.push(duplicated(format!(
                    "container {id} is also declared by the reference model, differently"
                )));
            }
        }
        for (id, view) in &schema.views {
            let Some(base) = namesake(reference, id) else {
                continue;
            };
            if !same_definition(base, view) {
                report.push(duplicated(format!(
                    "view {id} is also declared by the reference model as {}, differently",
                    base.id
                )));
            }
        }
    }

    report
}

fn namesake<'a>(schema: &'a Schema, id: &ViewEntity) -> Option<&'a View> {
    schema
        .views
        .values()
        .find(|view| view.id.space == id.space && view.id.name == id.name)
}

fn same_definition(base: &View, view: &View) -> bool {
    let mut relabelled = view.clone();
    relabelled.id = base.id.clone();
    &relabelled == base
}

fn duplicated(message: String) -> Diagnostic {
    Diagnostic::error(VALIDATOR, IssueKind::ResourceDuplicated, message)
}
