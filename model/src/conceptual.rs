//! Conceptual model: classes, properties and inheritance.
//!
//! Models are built in two phases. Raw input (a JSON file, a spreadsheet
//! importer) produces a [`ModelDraft`] of plain strings; [`ModelDraft::finalize`]
//! resolves identifiers against the draft's own space and version, parses
//! value types, coerces defaults and returns an immutable [`ConceptualModel`].
//! Every invalid row is reported, not just the first.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entity::{
    valid_name, valid_space, valid_version, ClassEntity, ContainerEntity, NodeTypeRef,
    ParseError, Reference, ResolutionContext,
};
use crate::error::{ModelError, RowError, RowErrors};
use crate::physical::Connection;
use crate::schema::Filter;
use crate::types::ValueType;

/// How complete the model is known to be.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Completeness {
    /// Every referenced resource must be defined.
    #[default]
    Complete,
    /// The model is incomplete by design; existence checks are skipped.
    Partial,
    /// The model extends a previous version ("last").
    Extended,
}

/// Enterprise (base) or solution (derived) model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    /// A base model.
    #[default]
    Enterprise,
    /// A model built on a reference enterprise model.
    Solution,
}

/// How far an extension may diverge from the previous version.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtensionCategory {
    /// Strictly additive.
    #[default]
    Addition,
    /// Views may be restructured; containers may not shrink.
    Reshape,
    /// Unconstrained.
    Rebuild,
}

/// Validated model metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelMetadata {
    /// Model space.
    pub space: String,
    /// Model version.
    pub version: String,
    /// Display name.
    pub name: Option<String>,
    /// Description.
    pub description: Option<String>,
    /// Authors.
    pub creator: Vec<String>,
    /// Completeness mode.
    pub completeness: Completeness,
    /// Model kind.
    pub kind: ModelKind,
    /// Extension category.
    pub extension: ExtensionCategory,
}

impl ModelMetadata {
    /// The resolution context for identifiers of this model.
    pub fn context(&self) -> ResolutionContext {
        ResolutionContext::new(self.space.clone(), self.version.clone())
    }
}

/// Optional physical hints carried by a conceptual property.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhysicalHints {
    /// Explicit connection kind.
    pub connection: Option<Connection>,
    /// Explicit container.
    pub container: Option<ContainerEntity>,
    /// Explicit container property identifier.
    pub container_property: Option<String>,
    /// Explicit nullability.
    pub nullable: Option<bool>,
    /// Explicit immutability.
    pub immutable: Option<bool>,
    /// Index groups.
    pub index: Vec<String>,
    /// Uniqueness groups.
    pub constraint: Vec<String>,
    /// Unit of measure.
    pub unit: Option<String>,
    /// Enumeration values.
    pub enum_values: Option<Vec<String>>,
}

/// A conceptual class.
#[derive(Debug, Clone, PartialEq)]
pub struct ConceptualClass {
    /// Identifier.
    pub id: ClassEntity,
    /// Display name.
    pub name: Option<String>,
    /// Description.
    pub description: Option<String>,
    /// Direct parents.
    pub parents: Vec<ClassEntity>,
    /// Reference node pointer.
    pub reference: Option<NodeTypeRef>,
    /// Explicit view filter.
    pub filter: Option<Filter>,
    /// 1-based row number.
    pub row: usize,
}

/// A conceptual property.
#[derive(Debug, Clone, PartialEq)]
pub struct ConceptualProperty {
    /// Owning class.
    pub class: ClassEntity,
    /// Property identifier.
    pub property: String,
    /// Display name.
    pub name: Option<String>,
    /// Description.
    pub description: Option<String>,
    /// Value type.
    pub value_type: ValueType,
    /// Minimum cardinality.
    pub min_count: Option<u32>,
    /// Maximum cardinality; `None` is unbounded.
    pub max_count: Option<u32>,
    /// Default value.
    pub default: Option<Value>,
    /// Reference pointer.
    pub reference: Option<Reference>,
    /// Physical hints.
    pub hints: PhysicalHints,
    /// 1-based row number.
    pub row: usize,
}

impl ConceptualProperty {
    /// `min_count ∉ {0, null}`.
    pub fn is_mandatory(&self) -> bool {
        self.min_count.is_some_and(|min| min > 0)
    }

    /// `max_count = ∞ ∨ max_count > 1`.
    pub fn is_list(&self) -> bool {
        self.max_count.map_or(true, |max| max > 1)
    }
}

/// An immutable conceptual model snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct ConceptualModel {
    /// Metadata.
    pub metadata: ModelMetadata,
    /// Classes in row order.
    pub classes: Vec<ConceptualClass>,
    /// Properties in row order.
    pub properties: Vec<ConceptualProperty>,
    /// Previous version.
    pub last: Option<Box<ConceptualModel>>,
    /// Base model.
    pub reference: Option<Box<ConceptualModel>>,
}

impl ConceptualModel {
    /// Looks up a class defined in this model.
    pub fn class(&self, id: &ClassEntity) -> Option<&ConceptualClass> {
        self.classes.iter().find(|c| &c.id == id)
    }

    /// Properties declared directly on `class`, in row order.
    pub fn properties_of<'a>(
        &'a self,
        class: &'a ClassEntity,
    ) -> impl Iterator<Item = &'a ConceptualProperty> + 'a {
        self.properties.iter().filter(move |p| &p.class == class)
    }
}

/// A raw cardinality value: a number or text such as `"inf"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawCount {
    /// A number.
    Number(u32),
    /// Text.
    Text(String),
}

/// Raw metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataDraft {
    /// Model space.
    pub space: String,
    /// Model version.
    pub version: String,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Comma-separated authors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator: Option<String>,
    /// Completeness mode.
    #[serde(default)]
    pub completeness: Completeness,
    /// Model kind.
    #[serde(default)]
    pub kind: ModelKind,
    /// Extension category.
    #[serde(default)]
    pub extension: ExtensionCategory,
}

/// Raw class row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassDraft {
    /// Class identifier.
    pub class: String,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Comma-separated parents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parents: Option<String>,
    /// Reference node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    /// Filter expression.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
}

/// Raw property row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDraft {
    /// Owning class.
    pub class: String,
    /// Property identifier.
    pub property: String,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Value-type expression.
    pub value_type: String,
    /// Minimum cardinality.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_count: Option<u32>,
    /// Maximum cardinality (`"inf"` for unbounded).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_count: Option<RawCount>,
    /// Default value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Reference pointer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    /// Connection expression.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection: Option<String>,
    /// Container identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,
    /// Container property identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_property: Option<String>,
    /// Nullability.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nullable: Option<bool>,
    /// Immutability.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub immutable: Option<bool>,
    /// Comma-separated index groups.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<String>,
    /// Comma-separated uniqueness groups.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraint: Option<String>,
    /// Unit of measure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    /// Comma-separated enumeration values.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<String>,
}

/// Raw model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelDraft {
    /// Metadata.
    pub metadata: MetadataDraft,
    /// Class rows.
    #[serde(default)]
    pub classes: Vec<ClassDraft>,
    /// Property rows.
    #[serde(default)]
    pub properties: Vec<PropertyDraft>,
    /// Previous version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last: Option<Box<ModelDraft>>,
    /// Base model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<Box<ModelDraft>>,
}

fn split_list(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

fn parse_count(raw: &RawCount) -> Result<Option<u32>, ParseError> {
    match raw {
        RawCount::Number(n) => Ok(Some(*n)),
        RawCount::Text(text) => match text.trim() {
            "" | "inf" | "*" | "∞" => Ok(None),
            digits => digits.parse().map(Some).map_err(|_| ParseError::InvalidField {
                field: "max_count",
                value: text.clone(),
                reason: "expected a count or 'inf'".to_string(),
            }),
        },
    }
}

impl MetadataDraft {
    /// Creates metadata for `space` at `version` with default modes.
    pub fn new(space: &str, version: &str) -> Self {
        Self {
            space: space.to_string(),
            version: version.to_string(),
            ..Self::default()
        }
    }

    /// Validates the metadata.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Metadata`] for an invalid space or version.
    pub fn finalize(&self) -> Result<ModelMetadata, ModelError> {
        Ok(ModelMetadata {
            space: valid_space(self.space.trim()).map_err(ModelError::Metadata)?,
            version: valid_version(self.version.trim()).map_err(ModelError::Metadata)?,
            name: self.name.clone(),
            description: self.description.clone(),
            creator: split_list(self.creator.as_deref()),
            completeness: self.completeness,
            kind: self.kind,
            extension: self.extension,
        })
    }
}

impl ClassDraft {
    /// A class row with only an identifier.
    pub fn new(class: &str) -> Self {
        Self {
            class: class.to_string(),
            ..Self::default()
        }
    }

    /// Sets the comma-separated parents.
    #[must_use]
    pub fn with_parents(mut self, parents: &str) -> Self {
        self.parents = Some(parents.to_string());
        self
    }

    /// Sets the filter expression.
    #[must_use]
    pub fn with_filter(mut self, filter: &str) -> Self {
        self.filter = Some(filter.to_string());
        self
    }

    /// Sets the reference node.
    #[must_use]
    pub fn with_reference(mut self, reference: &str) -> Self {
        self.reference = Some(reference.to_string());
        self
    }

    /// Resolves the row.
    ///
    /// # Errors
    ///
    /// Returns the first parse failure of the row.
    pub fn finalize(
        &self,
        ctx: &ResolutionContext,
        row: usize,
    ) -> Result<ConceptualClass, ParseError> {
        Ok(ConceptualClass {
            id: ClassEntity::parse(&self.class, ctx)?,
            name: self.name.clone(),
            description: self.description.clone(),
            parents: split_list(self.parents.as_deref())
                .iter()
                .map(|p| ClassEntity::parse(p, ctx))
                .collect::<Result<_, _>>()?,
            reference: self
                .reference
                .as_deref()
                .map(|r| NodeTypeRef::parse(r, ctx))
                .transpose()?,
            filter: self
                .filter
                .as_deref()
                .map(|f| Filter::parse(f, ctx))
                .transpose()?,
            row,
        })
    }
}

impl PropertyDraft {
    /// A property row with the given class, identifier and value type.
    pub fn new(class: &str, property: &str, value_type: &str) -> Self {
        Self {
            class: class.to_string(),
            property: property.to_string(),
            value_type: value_type.to_string(),
            ..Self::default()
        }
    }

    /// Sets the cardinality bounds; `None` as maximum is unbounded.
    #[must_use]
    pub fn with_count(mut self, min: u32, max: Option<u32>) -> Self {
        self.min_count = Some(min);
        self.max_count = Some(match max {
            Some(max) => RawCount::Number(max),
            None => RawCount::Text("inf".to_string()),
        });
        self
    }

    /// Sets the connection expression.
    #[must_use]
    pub fn with_connection(mut self, connection: &str) -> Self {
        self.connection = Some(connection.to_string());
        self
    }

    /// Sets the explicit container.
    #[must_use]
    pub fn with_container(mut self, container: &str) -> Self {
        self.container = Some(container.to_string());
        self
    }

    /// Sets the reference pointer.
    #[must_use]
    pub fn with_reference(mut self, reference: &str) -> Self {
        self.reference = Some(reference.to_string());
        self
    }

    /// Resolves the row.
    ///
    /// # Errors
    ///
    /// Returns the first parse failure of the row, including cardinality
    /// bounds with `min_count > max_count` and defaults the value type cannot
    /// hold.
    pub fn finalize(
        &self,
        ctx: &ResolutionContext,
        row: usize,
    ) -> Result<ConceptualProperty, ParseError> {
        let value_type = ValueType::parse(&self.value_type, ctx)?;
        let max_count = self.max_count.as_ref().map(parse_count).transpose()?.flatten();
        if let (Some(min), Some(max)) = (self.min_count, max_count) {
            if min > max {
                return Err(ParseError::InvalidField {
                    field: "min_count",
                    value: min.to_string(),
                    reason: format!("exceeds max_count {max}"),
                });
            }
        }
        let is_list = max_count.map_or(true, |max| max > 1);

        Ok(ConceptualProperty {
            class: ClassEntity::parse(&self.class, ctx)?,
            property: valid_name(self.property.trim())?,
            name: self.name.clone(),
            description: self.description.clone(),
            default: self
                .default
                .as_ref()
                .map(|d| coerce_default(&value_type, d, is_list))
                .transpose()?,
            value_type,
            min_count: self.min_count,
            max_count,
            reference: self
                .reference
                .as_deref()
                .map(|r| Reference::parse(r, ctx))
                .transpose()?,
            hints: PhysicalHints {
                connection: self
                    .connection
                    .as_deref()
                    .map(|c| Connection::parse(c, ctx))
                    .transpose()?,
                container: self
                    .container
                    .as_deref()
                    .map(|c| ContainerEntity::parse(c, ctx))
                    .transpose()?,
                container_property: self
                    .container_property
                    .as_deref()
                    .map(|p| valid_name(p.trim()))
                    .transpose()?,
                nullable: self.nullable,
                immutable: self.immutable,
                index: split_list(self.index.as_deref()),
                constraint: split_list(self.constraint.as_deref()),
                unit: self.unit.clone(),
                enum_values: self
                    .enum_values
                    .as_deref()
                    .map(|e| split_list(Some(e))),
            },
            row,
        })
    }
}

/// Types a default against the value type and wraps scalars for list properties.
fn coerce_default(value_type: &ValueType, raw: &Value, is_list: bool) -> Result<Value, ParseError> {
    let typed = match (value_type, raw) {
        (ValueType::Primitive(data_type), Value::String(text)) => data_type.coerce_default(text)?,
        (ValueType::Primitive(data_type), other) if !other.is_array() => {
            if !data_type.accepts(other) {
                return Err(ParseError::InvalidField {
                    field: "default",
                    value: other.to_string(),
                    reason: format!("not a valid {data_type}"),
                });
            }
            other.clone()
        }
        (_, other) => other.clone(),
    };
    Ok(if is_list && !typed.is_array() {
        Value::Array(vec![typed])
    } else {
        typed
    })
}

impl ModelDraft {
    /// An empty draft for `space` at `version`.
    pub fn new(space: &str, version: &str) -> Self {
        Self {
            metadata: MetadataDraft::new(space, version),
            ..Self::default()
        }
    }

    /// Appends a class row.
    #[must_use]
    pub fn with_class(mut self, class: ClassDraft) -> Self {
        self.classes.push(class);
        self
    }

    /// Appends a property row.
    #[must_use]
    pub fn with_property(mut self, property: PropertyDraft) -> Self {
        self.properties.push(property);
        self
    }

    /// Builds the immutable model, overlays included.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Metadata`] for invalid metadata,
    /// [`ModelError::Rows`] listing every invalid row, or
    /// [`ModelError::Overlay`] when an overlay model is invalid.
    pub fn finalize(&self) -> Result<ConceptualModel, ModelError> {
        let metadata = self.metadata.finalize()?;
        let ctx = metadata.context();
        let mut errors: Vec<RowError> = Vec::new();

        let mut classes = Vec::with_capacity(self.classes.len());
        for (index, draft) in self.classes.iter().enumerate() {
            match draft.finalize(&ctx, index + 1) {
                Ok(class) => classes.push(class),
                Err(error) => errors.push(RowError {
                    table: "classes",
                    row: index + 1,
                    error,
                }),
            }
        }

        let mut properties = Vec::with_capacity(self.properties.len());
        for (index, draft) in self.properties.iter().enumerate() {
            match draft.finalize(&ctx, index + 1) {
                Ok(property) => properties.push(property),
                Err(error) => errors.push(RowError {
                    table: "properties",
                    row: index + 1,
                    error,
                }),
            }
        }

        if !errors.is_empty() {
            return Err(ModelError::Rows(RowErrors(errors)));
        }

        let overlay = |which: &'static str, draft: &Option<Box<ModelDraft>>| {
            draft
                .as_ref()
                .map(|d| {
                    d.finalize().map(Box::new).map_err(|e| ModelError::Overlay {
                        which,
                        source: Box::new(e),
                    })
                })
                .transpose()
        };

        Ok(ConceptualModel {
            metadata,
            classes,
            properties,
            last: overlay("last", &self.last)?,
            reference: overlay("reference", &self.reference)?,
        })
    }
}
