//! Physical rule set: the row-oriented form of a physical schema.
//!
//! The converter produces [`PhysicalRules`]; the exporter turns them into a
//! [`Schema`](crate::schema::Schema). Rows keep the row number of the
//! conceptual property they came from so conflicts can be reported by row.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::conceptual::{Completeness, ExtensionCategory, ModelKind};
use crate::entity::{
    ClassEntity, ContainerEntity, NodeTypeRef, ParseError, Reference, ResolutionContext,
    ViewEntity,
};
use crate::schema::{EdgeDirection, Filter, UsedFor};
use crate::types::DataType;

/// How a view property expresses a reference to another view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Connection {
    /// Inline scalar (or list) pointer stored in a container.
    Direct,
    /// A separate edge record.
    Edge {
        /// Edge type; derived from the view and property when absent.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        edge_type: Option<NodeTypeRef>,
        /// Edge direction.
        #[serde(default)]
        direction: EdgeDirection,
    },
    /// Inverse of the named property on the target view.
    Reverse {
        /// View property on the target view that points back.
        through: String,
    },
}

impl Connection {
    /// Parses `direct`, `edge`, `edge(type=space:ext, direction=inwards)` or
    /// `reverse(through=property)`.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown kinds or arguments.
    pub fn parse(raw: &str, ctx: &ResolutionContext) -> Result<Self, ParseError> {
        let s = raw.trim();
        let malformed = || ParseError::Malformed(raw.to_string());
        let (kind, args) = match s.find('(') {
            Some(open) if s.ends_with(')') => (&s[..open], &s[open + 1..s.len() - 1]),
            Some(_) => return Err(malformed()),
            None => (s, ""),
        };
        let mut pairs = Vec::new();
        for arg in args.split(',').map(str::trim).filter(|a| !a.is_empty()) {
            let (key, value) = arg.split_once('=').ok_or_else(malformed)?;
            pairs.push((key.trim(), value.trim()));
        }

        match kind.trim().to_ascii_lowercase().as_str() {
            "direct" if pairs.is_empty() => Ok(Connection::Direct),
            "edge" => {
                let mut edge_type = None;
                let mut direction = EdgeDirection::Outwards;
                for (key, value) in pairs {
                    match key {
                        "type" => edge_type = Some(NodeTypeRef::parse(value, ctx)?),
                        "direction" => direction = value.parse()?,
                        _ => return Err(malformed()),
                    }
                }
                Ok(Connection::Edge {
                    edge_type,
                    direction,
                })
            }
            "reverse" => match pairs.as_slice() {
                [("through", through)] => Ok(Connection::Reverse {
                    through: (*through).to_string(),
                }),
                _ => Err(malformed()),
            },
            _ => Err(malformed()),
        }
    }

    /// True for [`Connection::Direct`].
    pub fn is_direct(&self) -> bool {
        matches!(self, Connection::Direct)
    }
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Connection::Direct => f.write_str("direct"),
            Connection::Edge {
                edge_type,
                direction,
            } => match edge_type {
                Some(edge_type) => write!(f, "edge(type={edge_type}, direction={direction})"),
                None => write!(f, "edge(direction={direction})"),
            },
            Connection::Reverse { through } => write!(f, "reverse(through={through})"),
        }
    }
}

/// Value type of a physical property after union reduction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PhysicalValueType {
    /// A primitive data type.
    Primitive(DataType),
    /// A reference to another view.
    View(ViewEntity),
    /// An unresolved reference target.
    Unknown,
}

impl PhysicalValueType {
    /// The referenced view, if any.
    pub fn as_view(&self) -> Option<&ViewEntity> {
        match self {
            PhysicalValueType::View(view) => Some(view),
            _ => None,
        }
    }
}

impl fmt::Display for PhysicalValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhysicalValueType::Primitive(data_type) => write!(f, "{data_type}"),
            PhysicalValueType::View(view) => write!(f, "{view}"),
            PhysicalValueType::Unknown => f.write_str("unknown"),
        }
    }
}

impl TryFrom<String> for PhysicalValueType {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.eq_ignore_ascii_case("unknown") {
            return Ok(PhysicalValueType::Unknown);
        }
        if let Some(data_type) = DataType::lookup(&value) {
            return Ok(PhysicalValueType::Primitive(data_type));
        }
        value.parse().map(PhysicalValueType::View)
    }
}

impl From<PhysicalValueType> for String {
    fn from(value: PhysicalValueType) -> Self {
        value.to_string()
    }
}

/// One view-property row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhysicalProperty {
    /// Declaring view.
    pub view: ViewEntity,
    /// View property identifier.
    pub view_property: String,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Reduced value type.
    pub value_type: PhysicalValueType,
    /// Connection kind; `None` for primitive properties.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection: Option<Connection>,
    /// Nullability; `None` where not applicable (edge and reverse).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nullable: Option<bool>,
    /// Immutability.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub immutable: Option<bool>,
    /// List-ness.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_list: Option<bool>,
    /// Default value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Backing container.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<ContainerEntity>,
    /// Backing container property identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_property: Option<String>,
    /// Index groups this property belongs to.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub index: Vec<String>,
    /// Uniqueness groups this property belongs to.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constraint: Vec<String>,
    /// Unit of measure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    /// Enumeration values.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
    /// Reference pointer carried over from the conceptual property.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<Reference>,
    /// Conceptual class the row was derived from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<ClassEntity>,
    /// Row number of the source property (1-based).
    pub row: usize,
}

impl PhysicalProperty {
    /// The backing `(container, container property)` slot, if any.
    pub fn container_slot(&self) -> Option<(&ContainerEntity, &str)> {
        match (&self.container, &self.container_property) {
            (Some(container), Some(property)) => Some((container, property.as_str())),
            _ => None,
        }
    }

    /// True for direct connections.
    pub fn is_direct(&self) -> bool {
        self.connection.as_ref().is_some_and(Connection::is_direct)
    }

    /// True for edge connections.
    pub fn is_edge(&self) -> bool {
        matches!(self.connection, Some(Connection::Edge { .. }))
    }

    /// True for reverse connections.
    pub fn is_reverse(&self) -> bool {
        matches!(self.connection, Some(Connection::Reverse { .. }))
    }
}

/// One view row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhysicalView {
    /// Identifier.
    pub id: ViewEntity,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Implemented views.
    #[serde(default)]
    pub implements: Vec<ViewEntity>,
    /// Explicit filter, if declared.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Filter>,
    /// Reference node pointer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<NodeTypeRef>,
    /// Whether the view is listed in the data model.
    #[serde(default = "default_true")]
    pub in_model: bool,
    /// Conceptual class the view was derived from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<ClassEntity>,
}

fn default_true() -> bool {
    true
}

/// One container row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhysicalContainer {
    /// Identifier.
    pub id: ContainerEntity,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Containers this one requires.
    #[serde(default)]
    pub requires: Vec<ContainerEntity>,
    /// Instance kinds served.
    #[serde(default)]
    pub used_for: UsedFor,
}

/// Metadata of a physical rule set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhysicalMetadata {
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
    /// Enterprise or solution model.
    pub kind: ModelKind,
    /// Schema completeness mode.
    pub completeness: Completeness,
    /// Extension category relative to "last".
    pub extension: ExtensionCategory,
}

/// The physical rule set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhysicalRules {
    /// Metadata.
    pub metadata: PhysicalMetadata,
    /// View-property rows.
    pub properties: Vec<PhysicalProperty>,
    /// View rows.
    pub views: Vec<PhysicalView>,
    /// Container rows.
    pub containers: Vec<PhysicalContainer>,
    /// Rules of the previous version.
    #[serde(skip)]
    pub last: Option<Box<PhysicalRules>>,
    /// Rules of the base model.
    #[serde(skip)]
    pub reference: Option<Box<PhysicalRules>>,
}

impl PhysicalRules {
    /// Looks up a view row.
    pub fn view(&self, id: &ViewEntity) -> Option<&PhysicalView> {
        self.views.iter().find(|v| &v.id == id)
    }

    /// Looks up a container row.
    pub fn container(&self, id: &ContainerEntity) -> Option<&PhysicalContainer> {
        self.containers.iter().find(|c| &c.id == id)
    }

    /// Rows declared on a view.
    pub fn properties_of<'a>(
        &'a self,
        view: &'a ViewEntity,
    ) -> impl Iterator<Item = &'a PhysicalProperty> + 'a {
        self.properties.iter().filter(move |p| &p.view == view)
    }
}
