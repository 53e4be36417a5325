//! Conceptual → physical mapping tables.
//!
//! Deterministic mappings from conceptual constructs to physical identifiers
//! and types: union reduction, reserved container-property identifiers,
//! container renaming and default edge types.

use dms_model::types::{DataType, ValueType};
use dms_model::{ClassEntity, NodeTypeRef, ParseError, ViewEntity};

/// Container-property identifiers the platform reserves.
pub const RESERVED_PROPERTY_IDS: &[&str] = &[
    "space",
    "externalId",
    "createdTime",
    "lastUpdatedTime",
    "deletedTime",
    "edge_id",
    "node_id",
    "project_id",
    "property_group",
    "seq",
    "tg_table_name",
    "extensions",
];

/// A value type after union reduction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reduced {
    /// Container-backed primitive.
    Primitive(DataType),
    /// Reference to a single class.
    Class(ClassEntity),
    /// Direct relation without a target type.
    Untyped,
}

/// Reduces a conceptual value type to a single physical shape.
///
/// - A union of one distinct class is that class; of several, untyped
/// - A union touching `unknown` is untyped
/// - A union of primitives folds to the narrowest common primitive
/// - A union mixing classes and primitives is text
pub fn reduce(value_type: &ValueType) -> Reduced {
    match value_type {
        ValueType::Primitive(data_type) => Reduced::Primitive(*data_type),
        ValueType::Class(class) => Reduced::Class(class.clone()),
        ValueType::Unknown => Reduced::Untyped,
        ValueType::Union(_) => {
            let members = value_type.members();
            if members.iter().any(|m| matches!(m, ValueType::Unknown)) {
                return Reduced::Untyped;
            }
            let mut classes: Vec<&ClassEntity> = value_type.class_references();
            classes.sort();
            classes.dedup();
            let primitives: Vec<DataType> = members
                .iter()
                .filter_map(|m| match m {
                    ValueType::Primitive(data_type) => Some(*data_type),
                    _ => None,
                })
                .collect();

            match (classes.as_slice(), primitives.is_empty()) {
                ([], _) => Reduced::Primitive(fold_primitives(&primitives)),
                ([class], true) => Reduced::Class((*class).clone()),
                (_, true) => Reduced::Untyped,
                (_, false) => Reduced::Primitive(DataType::String),
            }
        }
    }
}

/// Narrowest primitive every member widens to.
///
/// Numbers follow Boolean ⊂ Integer ⊂ Long ⊂ Float ⊂ Double; `date` and
/// `timestamp` meet at `timestamp`; anything else (documents included) is
/// text.
pub fn fold_primitives(members: &[DataType]) -> DataType {
    let Some(first) = members.first().copied() else {
        return DataType::String;
    };
    if members.iter().all(|m| *m == first) {
        return first;
    }
    if members.contains(&DataType::Json) {
        return DataType::String;
    }
    if members.iter().all(|m| m.numeric_rank().is_some()) {
        return members
            .iter()
            .copied()
            .max_by_key(|m| m.numeric_rank())
            .unwrap_or(DataType::Double);
    }
    if members.iter().all(|m| m.is_temporal()) {
        return DataType::DateTime;
    }
    DataType::String
}

/// Container-property identifier for a conceptual property identifier.
///
/// Reserved words receive a trailing underscore.
pub fn container_property_id(property: &str) -> String {
    if RESERVED_PROPERTY_IDS.contains(&property) {
        format!("{property}_")
    } else {
        property.to_string()
    }
}

/// The next name in a container chain: `Asset` → `Asset2` → `Asset3`.
pub fn bump_name(name: &str) -> String {
    let stem = name.trim_end_matches(|c: char| c.is_ascii_digit());
    let digits = &name[stem.len()..];
    match digits.parse::<u64>().ok().and_then(|n| n.checked_add(1)) {
        Some(next) if !stem.is_empty() => format!("{stem}{next}"),
        _ => format!("{name}2"),
    }
}

/// Default edge type of `view.property`: `space:View.property`.
///
/// # Errors
///
/// Returns an error if the combined name violates the identifier grammar.
pub fn edge_type(view: &ViewEntity, property: &str) -> Result<NodeTypeRef, ParseError> {
    NodeTypeRef::new(&view.space, &format!("{}.{property}", view.name))
}
