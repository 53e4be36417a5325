//! Physical rule set → conceptual model.
//!
//! The reverse of [`convert`](crate::convert): one class per view, parents
//! from `implements`, cardinalities from nullability and list-ness. Physical
//! choices (connection, container slot, groups) are kept as hints so a
//! recompile lands on the same layout.

use dms_model::conceptual::{ConceptualClass, ConceptualProperty, ModelMetadata, PhysicalHints};
use dms_model::physical::{PhysicalProperty, PhysicalValueType};
use dms_model::{ConceptualModel, PhysicalRules, ValueType};

/// Rebuilds the conceptual model a rule set describes.
pub fn to_conceptual(rules: &PhysicalRules) -> ConceptualModel {
    let meta = &rules.metadata;
    let classes = rules
        .views
        .iter()
        .enumerate()
        .map(|(index, view)| ConceptualClass {
            id: view.id.as_class(),
            name: view.name.clone(),
            description: view.description.clone(),
            parents: view.implements.iter().map(|p| p.as_class()).collect(),
            reference: view.reference.clone(),
            filter: view.filter.clone(),
            row: index + 1,
        })
        .collect();

    ConceptualModel {
        metadata: ModelMetadata {
            space: meta.space.clone(),
            version: meta.version.clone(),
            name: meta.name.clone(),
            description: meta.description.clone(),
            creator: Vec::new(),
            completeness: meta.completeness,
            kind: meta.kind,
            extension: meta.extension,
        },
        classes,
        properties: rules.properties.iter().map(to_property).collect(),
        last: rules.last.as_deref().map(|l| Box::new(to_conceptual(l))),
        reference: rules.reference.as_deref().map(|r| Box::new(to_conceptual(r))),
    }
}

fn to_property(row: &PhysicalProperty) -> ConceptualProperty {
    let value_type = match &row.value_type {
        PhysicalValueType::Primitive(data_type) => ValueType::Primitive(*data_type),
        PhysicalValueType::View(view) => ValueType::Class(view.as_class()),
        PhysicalValueType::Unknown => ValueType::Unknown,
    };
    // Direct relations are nullable by construction and say nothing about
    // the conceptual minimum.
    let mandatory = row.nullable == Some(false) && !row.is_direct();

    ConceptualProperty {
        class: row.class.clone().unwrap_or_else(|| row.view.as_class()),
        property: row.view_property.clone(),
        name: row.name.clone(),
        description: row.description.clone(),
        value_type,
        min_count: Some(u32::from(mandatory)),
        max_count: if row.is_list == Some(true) { None } else { Some(1) },
        default: row.default.clone(),
        reference: row.reference.clone(),
        hints: PhysicalHints {
            connection: row.connection.clone(),
            container: row.container.clone(),
            container_property: row.container_property.clone(),
            nullable: None,
            immutable: row.immutable,
            index: row.index.clone(),
            constraint: row.constraint.clone(),
            unit: row.unit.clone(),
            enum_values: row.enum_values.clone(),
        },
        row: row.row,
    }
}
