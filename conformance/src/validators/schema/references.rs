//! Referential existence.
//!
//! Every identifier a schema mentions must resolve in the schema itself, its
//! "last" overlay or its "reference" overlay:
//!
//! - implemented views
//! - containers and container properties behind mapped view properties
//! - target views of direct, edge and reverse connections
//! - containers named in `HasData` filters and `requires` constraints
//! - views listed by the data model

use dms_model::schema::{Filter, ViewProperty};
use dms_model::{ContainerEntity, Schema, ViewEntity};

use crate::report::{Diagnostic, IssueKind, ValidationReport};

const VALIDATOR: &str = "schema/references";

/// Validates that every reference in `schema` resolves.
pub fn validate(schema: &Schema) -> ValidationReport {
    let mut report = ValidationReport::new();

    for (id, view) in &schema.views {
        for parent in &view.implements {
            check_view(schema, parent, &format!("implemented by view {id}"), &mut report);
        }
        for (name, property) in &view.properties {
            check_property(schema, id, name, property, &mut report);
        }
        if let Some(Filter::HasData(containers)) = &view.filter {
            for container in containers {
                check_container(schema, container, &format!("filter of view {id}"), &mut report);
            }
        }
    }

    for (id, container) in &schema.containers {
        for required in container.requires() {
            check_container(schema, required, &format!("required by container {id}"), &mut report);
        }
    }

    if let Some(model) = &schema.data_model {
        for view in &model.views {
            check_view(
                schema,
                view,
                &format!("listed by data model {}:{}", model.space, model.external_id),
                &mut report,
            );
        }
    }

    report
}

fn check_property(
    schema: &Schema,
    view: &ViewEntity,
    name: &str,
    property: &ViewProperty,
    report: &mut ValidationReport,
) {
    let at = format!("property {view}.{name}");
    match property {
        ViewProperty::Mapped(mapped) => {
            match schema.find_container(&mapped.container) {
                Some(container) if !container.properties.contains_key(&mapped.container_property) => {
                    report.push(Diagnostic::error(
                        VALIDATOR,
                        IssueKind::ResourceNotFound,
                        format!(
                            "container property {}.{} (mapped by {at}) does not exist",
                            mapped.container, mapped.container_property
                        ),
                    ));
                }
                Some(_) => {}
                None => check_container(schema, &mapped.container, &format!("mapped by {at}"), report),
            }
            if let Some(source) = &mapped.source {
                check_view(schema, source, &format!("target of {at}"), report);
            }
        }
        ViewProperty::Edge(edge) => {
            check_view(schema, &edge.source, &format!("target of edge {at}"), report);
        }
        ViewProperty::Reverse(reverse) => {
            check_view(schema, &reverse.source, &format!("target of reverse {at}"), report);
        }
    }
}

fn check_view(schema: &Schema, id: &ViewEntity, context: &str, report: &mut ValidationReport) {
    if !schema.has_view(id) {
        report.push(Diagnostic::error(
            VALIDATOR,
            IssueKind::ResourceNotFound,
            format!("view {id} ({context}) does not exist"),
        ));
    }
}

fn check_container(schema: &Schema, id: &ContainerEntity, context: &str, report: &mut ValidationReport) {
    if !schema.has_container(id) {
        report.push(Diagnostic::error(
            VALIDATOR,
            IssueKind::ResourceNotFound,
            format!("container {id} ({context}) does not exist"),
        ));
    }
}
