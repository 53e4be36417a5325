//! Physical schema: containers, views, filters and the data-model descriptor.
//!
//! A [`Schema`] is an immutable aggregate. Two optional overlay slots hold the
//! previous version of the schema (`last`) and the base model it builds on
//! (`reference`); lookups that resolve references search all three.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entity::{
    ContainerEntity, NodeTypeRef, ParseError, ResolutionContext, ViewEntity,
};
use crate::types::DataType;

/// Storage type of a container property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PropertyType {
    /// A primitive value.
    Primitive(DataType),
    /// A direct relation to another node.
    Direct {
        /// Container the target node is required to have data in, if any.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        container: Option<ContainerEntity>,
    },
}

impl PropertyType {
    /// True for direct relations.
    pub fn is_direct(&self) -> bool {
        matches!(self, PropertyType::Direct { .. })
    }
}

/// A property slot in a container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerProperty {
    /// Storage type.
    #[serde(rename = "type")]
    pub value_type: PropertyType,
    /// Whether the slot may be empty.
    pub nullable: bool,
    /// Whether the value may change after creation.
    pub immutable: bool,
    /// Whether the slot holds a list.
    pub is_list: bool,
    /// Default value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Unit of measure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    /// Permitted enumeration values.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A container-level constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "constraintType", rename_all = "camelCase")]
pub enum Constraint {
    /// Instances with data in this container must also have data in `container`.
    Requires {
        /// The required container.
        container: ContainerEntity,
    },
    /// The listed properties are unique together.
    Uniqueness {
        /// Container property identifiers.
        properties: Vec<String>,
    },
}

/// An index over container properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Index {
    /// Container property identifiers, in index order.
    pub properties: Vec<String>,
}

/// Which instance kinds a container may hold data for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UsedFor {
    /// Nodes only.
    #[default]
    Node,
    /// Edges only.
    Edge,
    /// Nodes and edges.
    All,
}

/// A named, size-bounded property group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    /// Identifier.
    pub id: ContainerEntity,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Instance kinds served.
    #[serde(default)]
    pub used_for: UsedFor,
    /// Property slots keyed by container property identifier.
    #[serde(default)]
    pub properties: BTreeMap<String, ContainerProperty>,
    /// Constraints keyed by constraint identifier.
    #[serde(default)]
    pub constraints: BTreeMap<String, Constraint>,
    /// Indexes keyed by index identifier.
    #[serde(default)]
    pub indexes: BTreeMap<String, Index>,
}

impl Container {
    /// An empty container.
    pub fn new(id: ContainerEntity) -> Self {
        Self {
            id,
            name: None,
            description: None,
            used_for: UsedFor::Node,
            properties: BTreeMap::new(),
            constraints: BTreeMap::new(),
            indexes: BTreeMap::new(),
        }
    }

    /// Containers this container declares a `requires` constraint on.
    pub fn requires(&self) -> impl Iterator<Item = &ContainerEntity> {
        self.constraints.values().filter_map(|c| match c {
            Constraint::Requires { container } => Some(container),
            Constraint::Uniqueness { .. } => None,
        })
    }
}

/// Direction of an edge connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EdgeDirection {
    /// From the declaring view to the target view.
    #[default]
    Outwards,
    /// From the target view to the declaring view.
    Inwards,
}

impl FromStr for EdgeDirection {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "outwards" => Ok(EdgeDirection::Outwards),
            "inwards" => Ok(EdgeDirection::Inwards),
            _ => Err(ParseError::InvalidField {
                field: "direction",
                value: s.to_string(),
                reason: "expected 'outwards' or 'inwards'".to_string(),
            }),
        }
    }
}

impl fmt::Display for EdgeDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EdgeDirection::Outwards => "outwards",
            EdgeDirection::Inwards => "inwards",
        })
    }
}

/// A property of a specific view.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PropertyRef {
    /// The view declaring the property.
    pub view: ViewEntity,
    /// The view property identifier.
    pub property: String,
}

impl fmt::Display for PropertyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.view, self.property)
    }
}

/// A view property backed by a container slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappedProperty {
    /// Backing container.
    pub container: ContainerEntity,
    /// Backing container property identifier.
    pub container_property: String,
    /// Target view of a direct relation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<ViewEntity>,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A view property expressed as edges of a given type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeConnection {
    /// Target view.
    pub source: ViewEntity,
    /// Edge type marker.
    pub edge_type: NodeTypeRef,
    /// Edge direction.
    #[serde(default)]
    pub direction: EdgeDirection,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A view property computed as the inverse of another view's connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReverseConnection {
    /// Target view.
    pub source: ViewEntity,
    /// The connection on the target view that points back.
    pub through: PropertyRef,
    /// Whether the inverse yields a list.
    pub is_list: bool,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A view property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "connectionType", rename_all = "camelCase")]
pub enum ViewProperty {
    /// Container-backed (primitive or direct relation).
    Mapped(MappedProperty),
    /// Edge connection.
    Edge(EdgeConnection),
    /// Reverse direct or reverse edge connection.
    Reverse(ReverseConnection),
}

impl ViewProperty {
    /// The view this property points at, if any.
    pub fn target_view(&self) -> Option<&ViewEntity> {
        match self {
            ViewProperty::Mapped(mapped) => mapped.source.as_ref(),
            ViewProperty::Edge(edge) => Some(&edge.source),
            ViewProperty::Reverse(reverse) => Some(&reverse.source),
        }
    }

    /// The backing container slot, for mapped properties.
    pub fn container_slot(&self) -> Option<(&ContainerEntity, &str)> {
        match self {
            ViewProperty::Mapped(mapped) => {
                Some((&mapped.container, mapped.container_property.as_str()))
            }
            _ => None,
        }
    }
}

/// A view filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "filterType", content = "data", rename_all = "camelCase")]
pub enum Filter {
    /// Instances must carry one of these node types.
    NodeType(Vec<NodeTypeRef>),
    /// Instances must have data in at least one of these containers.
    HasData(Vec<ContainerEntity>),
    /// Opaque filter passed through unvalidated.
    Raw(Value),
}

impl Filter {
    /// Parses `nodeType(a:b, ...)`, `hasData(a:C, ...)` or `rawFilter(<json>)`.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown filter kinds or unparseable members.
    pub fn parse(raw: &str, ctx: &ResolutionContext) -> Result<Self, ParseError> {
        let s = raw.trim();
        let malformed = || ParseError::Malformed(raw.to_string());
        let open = s.find('(').ok_or_else(malformed)?;
        if !s.ends_with(')') {
            return Err(malformed());
        }
        let kind = s[..open].trim();
        let body = s[open + 1..s.len() - 1].trim();
        let members = || body.split(',').map(str::trim).filter(|m| !m.is_empty());
        match kind.to_ascii_lowercase().as_str() {
            "nodetype" => members()
                .map(|m| NodeTypeRef::parse(m, ctx))
                .collect::<Result<Vec<_>, _>>()
                .map(Filter::NodeType),
            "hasdata" => members()
                .map(|m| ContainerEntity::parse(m, ctx))
                .collect::<Result<Vec<_>, _>>()
                .map(Filter::HasData),
            "rawfilter" => serde_json::from_str(body)
                .map(Filter::Raw)
                .map_err(|_| malformed()),
            _ => Err(malformed()),
        }
    }

    /// True if the filter selects nothing explicit (an empty member list).
    pub fn is_empty(&self) -> bool {
        match self {
            Filter::NodeType(nodes) => nodes.is_empty(),
            Filter::HasData(containers) => containers.is_empty(),
            Filter::Raw(value) => value.is_null(),
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn join<T: fmt::Display>(items: &[T]) -> String {
            items
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        }
        match self {
            Filter::NodeType(nodes) => write!(f, "nodeType({})", join(nodes)),
            Filter::HasData(containers) => write!(f, "hasData({})", join(containers)),
            Filter::Raw(value) => write!(f, "rawFilter({value})"),
        }
    }
}

/// A named, versioned, filterable projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct View {
    /// Identifier.
    pub id: ViewEntity,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Views this view extends, in priority order.
    #[serde(default)]
    pub implements: Vec<ViewEntity>,
    /// Instance filter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Filter>,
    /// Local properties keyed by view property identifier.
    #[serde(default)]
    pub properties: BTreeMap<String, ViewProperty>,
}

impl View {
    /// An empty view.
    pub fn new(id: ViewEntity) -> Self {
        Self {
            id,
            name: None,
            description: None,
            implements: Vec::new(),
            filter: None,
            properties: BTreeMap::new(),
        }
    }
}

/// The top-level data-model descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataModel {
    /// Space of the data model.
    pub space: String,
    /// External identifier.
    pub external_id: String,
    /// Version.
    pub version: String,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Member views.
    #[serde(default)]
    pub views: Vec<ViewEntity>,
}

/// The physical schema aggregate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    /// Data-model descriptor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_model: Option<DataModel>,
    /// Containers keyed by identifier.
    #[serde(default)]
    pub containers: BTreeMap<ContainerEntity, Container>,
    /// Views keyed by identifier.
    #[serde(default)]
    pub views: BTreeMap<ViewEntity, View>,
    /// Node types used as filter markers or edge types.
    #[serde(default)]
    pub node_types: BTreeSet<NodeTypeRef>,
    /// Previous version of this schema.
    #[serde(skip)]
    pub last: Option<Box<Schema>>,
    /// Base schema this schema builds on.
    #[serde(skip)]
    pub reference: Option<Box<Schema>>,
}

impl Schema {
    /// An empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Spaces actually used by the data model, containers, views and node types.
    pub fn spaces(&self) -> BTreeSet<String> {
        let mut spaces: BTreeSet<String> = BTreeSet::new();
        if let Some(model) = &self.data_model {
            spaces.insert(model.space.clone());
        }
        spaces.extend(self.containers.keys().map(|c| c.space.clone()));
        spaces.extend(self.views.keys().map(|v| v.space.clone()));
        spaces.extend(self.node_types.iter().map(|n| n.space.clone()));
        spaces
    }

    fn layers(&self) -> impl Iterator<Item = &Schema> {
        std::iter::once(self)
            .chain(self.last.as_deref())
            .chain(self.reference.as_deref())
    }

    /// Looks up a view in this schema, then "last", then "reference".
    pub fn find_view(&self, id: &ViewEntity) -> Option<&View> {
        self.layers().find_map(|s| s.views.get(id))
    }

    /// Looks up a container in this schema, then "last", then "reference".
    pub fn find_container(&self, id: &ContainerEntity) -> Option<&Container> {
        self.layers().find_map(|s| s.containers.get(id))
    }

    /// True if the view exists in any layer.
    pub fn has_view(&self, id: &ViewEntity) -> bool {
        self.find_view(id).is_some()
    }

    /// True if the container exists in any layer.
    pub fn has_container(&self, id: &ContainerEntity) -> bool {
        self.find_container(id).is_some()
    }

    /// Views that at least one view of this schema implements.
    pub fn implemented_views(&self) -> BTreeSet<&ViewEntity> {
        self.views.values().flat_map(|v| v.implements.iter()).collect()
    }

    /// Properties of a view including inherited ones.
    ///
    /// Implemented views contribute their (resolved) properties in
    /// `implements` order, a later view replacing an earlier one on the same
    /// name; local properties replace everything inherited. Each entry records
    /// the view that declared the winning definition. Views missing from every
    /// layer contribute nothing.
    pub fn resolved_properties(&self, id: &ViewEntity) -> BTreeMap<String, (ViewEntity, ViewProperty)> {
        let mut visiting = BTreeSet::new();
        self.resolve_into(id, &mut visiting)
    }

    fn resolve_into(
        &self,
        id: &ViewEntity,
        visiting: &mut BTreeSet<ViewEntity>,
    ) -> BTreeMap<String, (ViewEntity, ViewProperty)> {
        let mut resolved = BTreeMap::new();
        let Some(view) = self.find_view(id) else {
            return resolved;
        };
        if !visiting.insert(id.clone()) {
            return resolved;
        }
        for parent in &view.implements {
            resolved.extend(self.resolve_into(parent, visiting));
        }
        for (name, property) in &view.properties {
            resolved.insert(name.clone(), (id.clone(), property.clone()));
        }
        visiting.remove(id);
        resolved
    }

    /// Every view reachable through `implements` from `id`, nearest first.
    pub fn ancestors(&self, id: &ViewEntity) -> Vec<ViewEntity> {
        let mut seen: BTreeSet<ViewEntity> = BTreeSet::new();
        let mut order = Vec::new();
        let mut queue: std::collections::VecDeque<ViewEntity> = self
            .find_view(id)
            .map(|v| v.implements.iter().cloned().collect())
            .unwrap_or_default();
        while let Some(next) = queue.pop_front() {
            if &next == id || !seen.insert(next.clone()) {
                continue;
            }
            if let Some(view) = self.find_view(&next) {
                queue.extend(view.implements.iter().cloned());
            }
            order.push(next);
        }
        order
    }

    /// Containers a view maps to, including through inherited properties.
    pub fn referenced_containers(&self, id: &ViewEntity) -> BTreeSet<ContainerEntity> {
        self.resolved_properties(id)
            .values()
            .filter_map(|(_, p)| p.container_slot().map(|(c, _)| c.clone()))
            .collect()
    }

    /// Attaches the previous version of this schema.
    #[must_use]
    pub fn with_last(mut self, last: Schema) -> Self {
        self.last = Some(Box::new(last));
        self
    }

    /// Attaches the base schema.
    #[must_use]
    pub fn with_reference(mut self, reference: Schema) -> Self {
        self.reference = Some(Box::new(reference));
        self
    }
}
