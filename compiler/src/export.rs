//! Physical rule set → physical schema.

use std::collections::{BTreeMap, BTreeSet};

use dms_conformance::ValidationReport;
use dms_model::physical::{Connection, PhysicalProperty, PhysicalRules, PhysicalValueType};
use dms_model::schema::{
    Constraint, Container, ContainerProperty, DataModel, EdgeConnection, Index, MappedProperty,
    PropertyRef, PropertyType, ReverseConnection, View, ViewProperty,
};
use dms_model::{ContainerEntity, Schema, ViewEntity};

use crate::filters;

/// Builds the schema described by `rules`.
///
/// The overlays are attached before filters are derived, so inherited
/// properties of views in "last" or "reference" count towards `HasData`.
/// The returned report holds the observations made while deriving filters.
pub fn export(
    rules: &PhysicalRules,
    last: Option<Schema>,
    reference: Option<Schema>,
) -> (Schema, ValidationReport) {
    let mut report = ValidationReport::new();
    let mut schema = Schema::new();

    for row in &rules.containers {
        let mut container = Container::new(row.id.clone());
        container.name = row.name.clone();
        container.description = row.description.clone();
        container.used_for = row.used_for;
        for required in &row.requires {
            container.constraints.insert(
                requires_key(required),
                Constraint::Requires {
                    container: required.clone(),
                },
            );
        }
        schema.containers.insert(row.id.clone(), container);
    }
    fill_containers(&mut schema.containers, &rules.properties);

    for row in &rules.views {
        let mut view = View::new(row.id.clone());
        view.name = row.name.clone();
        view.description = row.description.clone();
        view.implements = row.implements.clone();
        for property in rules.properties.iter().filter(|p| p.view == row.id) {
            if let Some(exported) = view_property(property) {
                view.properties.insert(property.view_property.clone(), exported);
            }
        }
        schema.views.insert(row.id.clone(), view);
    }

    for property in &rules.properties {
        if let Some(Connection::Edge {
            edge_type: Some(edge_type),
            ..
        }) = &property.connection
        {
            schema.node_types.insert(edge_type.clone());
        }
    }

    schema.last = last.map(Box::new);
    schema.reference = reference.map(Box::new);

    for row in &rules.views {
        let own: Vec<&PhysicalProperty> = rules.properties.iter().filter(|p| p.view == row.id).collect();
        let derived = filters::derive(row, &own, &schema, rules.metadata.kind, &mut report);
        if let Some(marker) = derived.marker {
            schema.node_types.insert(marker);
        }
        if let Some(view) = schema.views.get_mut(&row.id) {
            view.filter = Some(derived.filter);
        }
    }

    let meta = &rules.metadata;
    schema.data_model = Some(DataModel {
        space: meta.space.clone(),
        external_id: meta.space.clone(),
        version: meta.version.clone(),
        name: meta.name.clone(),
        description: meta.description.clone(),
        views: rules
            .views
            .iter()
            .filter(|v| v.in_model && v.id.space == meta.space)
            .map(|v| v.id.clone())
            .collect::<BTreeSet<ViewEntity>>()
            .into_iter()
            .collect(),
    });

    (schema, report)
}

/// Identifier of the `requires` constraint on `container`.
pub fn requires_key(container: &ContainerEntity) -> String {
    let sanitize = |s: &str| s.replace(['.', '-'], "_");
    format!("requires_{}_{}", sanitize(&container.space), sanitize(&container.name))
}

/// Writes container properties, uniqueness constraints and indexes.
///
/// The first row defining a slot wins; conflicting definitions are reported
/// by the rule-set validators. Slots of containers this model does not emit
/// live in an overlay and are left alone.
fn fill_containers(containers: &mut BTreeMap<ContainerEntity, Container>, rows: &[PhysicalProperty]) {
    let mut uniqueness: BTreeMap<(ContainerEntity, String), Vec<String>> = BTreeMap::new();
    let mut indexes: BTreeMap<(ContainerEntity, String), Vec<String>> = BTreeMap::new();

    for row in rows {
        let Some((id, slot)) = row.container_slot() else {
            continue;
        };
        let Some(container) = containers.get_mut(id) else {
            continue;
        };
        container
            .properties
            .entry(slot.to_string())
            .or_insert_with(|| container_property(row));
        for group in &row.constraint {
            let members = uniqueness.entry((id.clone(), group.clone())).or_default();
            if !members.iter().any(|m| m == slot) {
                members.push(slot.to_string());
            }
        }
        for group in &row.index {
            let members = indexes.entry((id.clone(), group.clone())).or_default();
            if !members.iter().any(|m| m == slot) {
                members.push(slot.to_string());
            }
        }
    }

    for ((id, group), properties) in uniqueness {
        if let Some(container) = containers.get_mut(&id) {
            container
                .constraints
                .insert(group, Constraint::Uniqueness { properties });
        }
    }
    for ((id, group), properties) in indexes {
        if let Some(container) = containers.get_mut(&id) {
            container.indexes.insert(group, Index { properties });
        }
    }
}

fn container_property(row: &PhysicalProperty) -> ContainerProperty {
    let value_type = match &row.value_type {
        PhysicalValueType::Primitive(data_type) if !row.is_direct() => {
            PropertyType::Primitive(*data_type)
        }
        _ => PropertyType::Direct { container: None },
    };
    ContainerProperty {
        value_type,
        nullable: row.nullable.unwrap_or(true),
        immutable: row.immutable.unwrap_or(false),
        is_list: row.is_list.unwrap_or(false),
        default: row.default.clone(),
        unit: row.unit.clone(),
        enum_values: row.enum_values.clone(),
        name: row.name.clone(),
        description: row.description.clone(),
    }
}

/// The view property of a row; `None` for connections without a target
/// view, which the rule-set validators report.
fn view_property(row: &PhysicalProperty) -> Option<ViewProperty> {
    let target = row.value_type.as_view().cloned();
    match &row.connection {
        None | Some(Connection::Direct) => {
            let (container, slot) = row.container_slot()?;
            Some(ViewProperty::Mapped(MappedProperty {
                container: container.clone(),
                container_property: slot.to_string(),
                source: target,
                name: row.name.clone(),
                description: row.description.clone(),
            }))
        }
        Some(Connection::Edge {
            edge_type,
            direction,
        }) => Some(ViewProperty::Edge(EdgeConnection {
            source: target?,
            edge_type: edge_type.clone()?,
            direction: *direction,
            name: row.name.clone(),
            description: row.description.clone(),
        })),
        Some(Connection::Reverse { through }) => {
            let source = target?;
            Some(ViewProperty::Reverse(ReverseConnection {
                through: PropertyRef {
                    view: source.clone(),
                    property: through.clone(),
                },
                source,
                is_list: row.is_list.unwrap_or(true),
                name: row.name.clone(),
                description: row.description.clone(),
            }))
        }
    }
}
