//! Extension compatibility against the previous schema version.
//!
//! | Category | Containers from "last" | Views from "last" |
//! |----------|------------------------|-------------------|
//! | addition | unchanged, none removed | unchanged, none removed |
//! | reshape | unchanged; removal only when no view maps to it | free |
//! | rebuild | free | free |
//!
//! Views are paired by space and name: a newer version of a view must still
//! carry everything its previous version declared. References to other views
//! are compared without their versions.

use std::collections::BTreeSet;

use dms_model::schema::{Container, View, ViewProperty};
use dms_model::{ContainerEntity, ExtensionCategory, Schema, ViewEntity};

use crate::report::{Diagnostic, IssueKind, ValidationReport};

const VALIDATOR: &str = "schema/extension";

/// Validates `schema` as an extension of `last`.
pub fn validate(schema: &Schema, last: &Schema, category: ExtensionCategory) -> ValidationReport {
    let mut report = ValidationReport::new();
    if category == ExtensionCategory::Rebuild {
        return report;
    }

    let in_use: BTreeSet<ContainerEntity> = schema
        .views
        .keys()
        .flat_map(|id| schema.referenced_containers(id))
        .collect();

    for (id, previous) in &last.containers {
        match schema.containers.get(id) {
            Some(current) => check_container(previous, current, category, &mut report),
            None if category == ExtensionCategory::Addition || in_use.contains(id) => {
                report.push(violation(
                    category,
                    format!("container {id} from the previous version was removed"),
                ));
            }
            None => {}
        }
    }

    if category == ExtensionCategory::Addition {
        for (id, previous) in &last.views {
            match successor(schema, id) {
                Some(current) => check_view(previous, current, &mut report),
                None => report.push(violation(
                    category,
                    format!("view {id} from the previous version was removed"),
                )),
            }
        }
    }

    report
}

fn check_container(
    previous: &Container,
    current: &Container,
    category: ExtensionCategory,
    report: &mut ValidationReport,
) {
    let id = &previous.id;
    let mut changes = Vec::new();

    if previous.used_for != current.used_for {
        changes.push(format!("usedFor {:?} -> {:?}", previous.used_for, current.used_for));
    }
    for (name, property) in &previous.properties {
        match current.properties.get(name) {
            None => changes.push(format!("property {name} removed")),
            Some(now) if now != property => changes.push(format!("property {name} changed")),
            Some(_) => {}
        }
    }
    for (name, constraint) in &previous.constraints {
        match current.constraints.get(name) {
            None => changes.push(format!("constraint {name} removed")),
            Some(now) if now != constraint => changes.push(format!("constraint {name} changed")),
            Some(_) => {}
        }
    }
    for (name, index) in &previous.indexes {
        match current.indexes.get(name) {
            None => changes.push(format!("index {name} removed")),
            Some(now) if now != index => changes.push(format!("index {name} changed")),
            Some(_) => {}
        }
    }

    if !changes.is_empty() {
        report.push(
            violation(category, format!("container {id} changed since the previous version"))
                .with_details(changes),
        );
    }
}

/// The view of `schema` with the space and name of `id`, preferring the same
/// version.
fn successor<'a>(schema: &'a Schema, id: &ViewEntity) -> Option<&'a View> {
    schema.views.get(id).or_else(|| {
        schema
            .views
            .values()
            .find(|view| view.id.space == id.space && view.id.name == id.name)
    })
}

fn check_view(previous: &View, current: &View, report: &mut ValidationReport) {
    let mut changes = Vec::new();

    let implements = |view: &View| view.implements.iter().map(unversioned).collect::<Vec<_>>();
    if implements(previous) != implements(current) {
        changes.push("implements changed".to_string());
    }
    for (name, property) in &previous.properties {
        match current.properties.get(name) {
            None => changes.push(format!("property {name} removed")),
            Some(now) if shape(now) != shape(property) => {
                changes.push(format!("property {name} changed"))
            }
            Some(_) => {}
        }
    }

    if !changes.is_empty() {
        report.push(
            violation(
                ExtensionCategory::Addition,
                format!("view {} changed since the previous version", previous.id),
            )
            .with_details(changes),
        );
    }
}

fn unversioned(id: &ViewEntity) -> ViewEntity {
    ViewEntity {
        version: String::new(),
        ..id.clone()
    }
}

/// `property` with the versions of the views it points at erased.
fn shape(property: &ViewProperty) -> ViewProperty {
    let mut property = property.clone();
    match &mut property {
        ViewProperty::Mapped(mapped) => {
            if let Some(source) = mapped.source.as_mut() {
                *source = unversioned(source);
            }
        }
        ViewProperty::Edge(edge) => edge.source = unversioned(&edge.source),
        ViewProperty::Reverse(reverse) => {
            reverse.source = unversioned(&reverse.source);
            reverse.through.view = unversioned(&reverse.through.view);
        }
    }
    property
}

fn violation(category: ExtensionCategory, message: String) -> Diagnostic {
    Diagnostic::error(
        VALIDATOR,
        IssueKind::Extension,
        format!("{message}, which {category:?} extensions do not allow"),
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::validators::schema::fixtures::*;
    use dms_model::schema::PropertyType;
    use dms_model::DataType;

    fn last() -> Schema {
        asset_schema()
    }

    #[test]
    fn additions_are_allowed() {
        let mut schema = asset_schema();
        let site = container("Site", &["name"]);
        schema.containers.insert(site.id.clone(), site);
        if let Some(asset) = schema.containers.get_mut(&container_id("Asset")) {
            asset.properties.insert("serial".into(), text());
        }
        let report = validate(&schema, &last(), ExtensionCategory::Addition);
        assert!(report.diagnostics.is_empty());
    }

    #[test]
    fn changed_property_breaks_addition_and_reshape() {
        let mut schema = asset_schema();
        if let Some(point) = schema.containers.get_mut(&container_id("GeoPoint")) {
            if let Some(lat) = point.properties.get_mut("lat") {
                lat.value_type = PropertyType::Primitive(DataType::Double);
            }
        }
        for category in [ExtensionCategory::Addition, ExtensionCategory::Reshape] {
            let report = validate(&schema, &last(), category);
            assert_eq!(report.error_count(), 1);
            assert_eq!(report.diagnostics[0].details, vec!["property lat changed".to_string()]);
        }
        assert!(validate(&schema, &last(), ExtensionCategory::Rebuild).diagnostics.is_empty());
    }

    #[test]
    fn reshape_may_drop_unused_containers_and_change_views() {
        let mut schema = asset_schema();
        schema.containers.remove(&container_id("GeoPoint"));
        schema.views.remove(&view_id("GeoPoint"));
        if let Some(asset) = schema.views.get_mut(&view_id("Asset")) {
            asset.properties.remove("location");
        }

        assert!(!validate(&schema, &last(), ExtensionCategory::Reshape).has_errors());
        let addition = validate(&schema, &last(), ExtensionCategory::Addition);
        // Removed container, removed view, changed view.
        assert_eq!(addition.error_count(), 3);
    }

    fn bump(view: &View) -> View {
        let mut next = view.clone();
        next.id.version = "2".into();
        for property in next.properties.values_mut() {
            if let ViewProperty::Mapped(mapped) = property {
                if let Some(source) = mapped.source.as_mut() {
                    source.version = "2".into();
                }
            }
        }
        next
    }

    #[test]
    fn newer_versions_are_compared_with_their_predecessor() {
        let mut schema = asset_schema();
        schema.views = schema
            .views
            .values()
            .map(|view| {
                let next = bump(view);
                (next.id.clone(), next)
            })
            .collect();
        assert!(validate(&schema, &last(), ExtensionCategory::Addition).diagnostics.is_empty());

        let asset = ViewEntity::new("power", "Asset", "2").unwrap();
        if let Some(view) = schema.views.get_mut(&asset) {
            view.properties.remove("location");
            view.implements.push(ViewEntity::new("power", "GeoPoint", "2").unwrap());
        }
        let report = validate(&schema, &last(), ExtensionCategory::Addition);
        assert_eq!(report.error_count(), 1);
        assert!(report.diagnostics[0].message.contains("power:Asset(version=1) changed"));
        assert_eq!(
            report.diagnostics[0].details,
            vec!["implements changed".to_string(), "property location removed".to_string()]
        );
    }

    #[test]
    fn reshape_keeps_containers_in_use() {
        let mut schema = asset_schema();
        schema.containers.remove(&container_id("GeoPoint"));
        let report = validate(&schema, &last(), ExtensionCategory::Reshape);
        assert_eq!(report.error_count(), 1);
        assert!(report.diagnostics[0].message.contains("Reshape extensions do not allow"));
    }
}
