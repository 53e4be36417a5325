//! Typed identifiers for classes, views, containers and node types.
//!
//! Every identifier is a space plus a local name; views additionally carry a
//! version. Equality and ordering follow the component tuple, so two
//! identifiers are equal iff every component matches. The canonical string
//! forms are `space:name` and `space:name(version=v)`.
//!
//! Unqualified strings (`"Asset"`) are resolved against an explicit
//! [`ResolutionContext`]; there is no ambient default space.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum length of a space identifier.
pub const MAX_SPACE_LEN: usize = 43;
/// Maximum length of a local name.
pub const MAX_NAME_LEN: usize = 255;
/// Maximum length of a version string.
pub const MAX_VERSION_LEN: usize = 43;

/// Parse/format errors for identifiers and value-type expressions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The space component violates the identifier grammar.
    #[error("invalid space '{0}': expected a letter followed by letters, digits, '-', '_' or '.', not ending with a separator")]
    InvalidSpace(String),
    /// The name component violates the identifier grammar.
    #[error("invalid name '{0}': expected a letter followed by letters, digits, '-', '_' or '.', not ending with a separator")]
    InvalidName(String),
    /// The version component violates the version grammar.
    #[error("invalid version '{0}'")]
    InvalidVersion(String),
    /// No space was given and the context has no default space.
    #[error("'{0}' has no space and no default space is set")]
    MissingSpace(String),
    /// No version was given and the context has no default version.
    #[error("'{0}' has no version and no default version is set")]
    MissingVersion(String),
    /// The string is not an identifier at all.
    #[error("malformed identifier '{0}'")]
    Malformed(String),
    /// The string does not name a primitive data type.
    #[error("unknown data type '{0}'")]
    UnknownDataType(String),
    /// A value-type expression could not be parsed.
    #[error("invalid value type '{0}'")]
    InvalidValueType(String),
    /// A field carries a value outside its domain.
    #[error("invalid {field} '{value}': {reason}")]
    InvalidField {
        /// Name of the offending field.
        field: &'static str,
        /// The raw value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },
}

/// Defaults used to resolve unqualified identifiers.
///
/// Passed explicitly to every parsing call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionContext {
    /// Space substituted when an identifier has none.
    pub default_space: Option<String>,
    /// Version substituted when a view identifier has none.
    pub default_version: Option<String>,
}

impl ResolutionContext {
    /// Creates a context with both a default space and a default version.
    pub fn new(space: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            default_space: Some(space.into()),
            default_version: Some(version.into()),
        }
    }

    /// A context without defaults: every identifier must be fully qualified.
    pub fn strict() -> Self {
        Self::default()
    }

    fn space_for(&self, raw: &str, given: Option<&str>) -> Result<String, ParseError> {
        match given {
            Some(space) => valid_space(space),
            None => self
                .default_space
                .clone()
                .ok_or_else(|| ParseError::MissingSpace(raw.to_string())),
        }
    }

    fn version_for(&self, raw: &str, given: Option<&str>) -> Result<String, ParseError> {
        match given {
            Some(version) => valid_version(version),
            None => self
                .default_version
                .clone()
                .ok_or_else(|| ParseError::MissingVersion(raw.to_string())),
        }
    }
}

// The patterns are string literals; compiling them cannot fail at runtime.
#[allow(clippy::expect_used)]
fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z](?:[A-Za-z0-9_.-]*[A-Za-z0-9])?$").expect("identifier pattern")
    })
}

#[allow(clippy::expect_used)]
fn version_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9](?:[A-Za-z0-9_.-]*[A-Za-z0-9])?$").expect("version pattern")
    })
}

/// Checks a space against the identifier grammar.
///
/// # Errors
///
/// Returns [`ParseError::InvalidSpace`] when the grammar or length is violated.
pub fn valid_space(space: &str) -> Result<String, ParseError> {
    if space.len() <= MAX_SPACE_LEN && identifier_pattern().is_match(space) {
        Ok(space.to_string())
    } else {
        Err(ParseError::InvalidSpace(space.to_string()))
    }
}

/// Checks a local name against the identifier grammar.
///
/// # Errors
///
/// Returns [`ParseError::InvalidName`] when the grammar or length is violated.
pub fn valid_name(name: &str) -> Result<String, ParseError> {
    if name.len() <= MAX_NAME_LEN && identifier_pattern().is_match(name) {
        Ok(name.to_string())
    } else {
        Err(ParseError::InvalidName(name.to_string()))
    }
}

/// Checks a version string against the version grammar.
///
/// # Errors
///
/// Returns [`ParseError::InvalidVersion`] when the grammar or length is violated.
pub fn valid_version(version: &str) -> Result<String, ParseError> {
    if version.len() <= MAX_VERSION_LEN && version_pattern().is_match(version) {
        Ok(version.to_string())
    } else {
        Err(ParseError::InvalidVersion(version.to_string()))
    }
}

/// Raw components of `space:name(key=value, ...)`.
struct Parts<'a> {
    space: Option<&'a str>,
    name: &'a str,
    version: Option<&'a str>,
    property: Option<&'a str>,
}

fn split(raw: &str) -> Result<Parts<'_>, ParseError> {
    let s = raw.trim();
    let malformed = || ParseError::Malformed(raw.to_string());
    if s.is_empty() {
        return Err(malformed());
    }

    let (head, args) = match s.find('(') {
        Some(open) => {
            if !s.ends_with(')') {
                return Err(malformed());
            }
            (&s[..open], Some(&s[open + 1..s.len() - 1]))
        }
        None => (s, None),
    };

    let (space, name) = match head.split_once(':') {
        Some((space, name)) => (Some(space.trim()), name.trim()),
        None => (None, head.trim()),
    };
    if name.contains(':') {
        return Err(malformed());
    }

    let mut parts = Parts {
        space,
        name,
        version: None,
        property: None,
    };
    if let Some(args) = args {
        for arg in args.split(',').map(str::trim).filter(|a| !a.is_empty()) {
            match arg.split_once('=').map(|(k, v)| (k.trim(), v.trim())) {
                Some(("version", v)) => parts.version = Some(v),
                Some(("property", v)) => parts.property = Some(v),
                _ => return Err(malformed()),
            }
        }
    }
    Ok(parts)
}

macro_rules! space_name_entity {
    ($(#[$meta:meta])* $ty:ident, $what:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $ty {
            /// Owning space (namespace prefix).
            pub space: String,
            /// Local name within the space.
            pub name: String,
        }

        impl $ty {
            #[doc = concat!("Creates a validated ", $what, " identifier.")]
            ///
            /// # Errors
            ///
            /// Returns an error if either component violates the grammar.
            pub fn new(space: &str, name: &str) -> Result<Self, ParseError> {
                Ok(Self {
                    space: valid_space(space)?,
                    name: valid_name(name)?,
                })
            }

            #[doc = concat!("Parses `space:name` (or a bare `name`) into a ", $what, " identifier.")]
            ///
            /// # Errors
            ///
            /// Returns an error for malformed strings, grammar violations, a
            /// missing space without a default, or a stray version argument.
            pub fn parse(raw: &str, ctx: &ResolutionContext) -> Result<Self, ParseError> {
                let parts = split(raw)?;
                if parts.version.is_some() || parts.property.is_some() {
                    return Err(ParseError::Malformed(raw.to_string()));
                }
                Ok(Self {
                    space: ctx.space_for(raw, parts.space)?,
                    name: valid_name(parts.name)?,
                })
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}:{}", self.space, self.name)
            }
        }

        impl FromStr for $ty {
            type Err = ParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s, &ResolutionContext::strict())
            }
        }

        impl TryFrom<String> for $ty {
            type Error = ParseError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl From<$ty> for String {
            fn from(value: $ty) -> Self {
                value.to_string()
            }
        }
    };
}

space_name_entity!(
    /// A conceptual class.
    ClassEntity,
    "class"
);

space_name_entity!(
    /// A physical container.
    ContainerEntity,
    "container"
);

space_name_entity!(
    /// A node-type marker (used by `NodeType` filters and edge types).
    NodeTypeRef,
    "node type"
);

impl ClassEntity {
    /// The view derived from this class at `version`.
    pub fn as_view(&self, version: &str) -> ViewEntity {
        ViewEntity {
            space: self.space.clone(),
            name: self.name.clone(),
            version: version.to_string(),
        }
    }

    /// The container keyed by this class.
    pub fn as_container(&self) -> ContainerEntity {
        ContainerEntity {
            space: self.space.clone(),
            name: self.name.clone(),
        }
    }
}

/// A physical view: space, name and version.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ViewEntity {
    /// Owning space.
    pub space: String,
    /// Local name within the space.
    pub name: String,
    /// Version string.
    pub version: String,
}

impl ViewEntity {
    /// Creates a validated view identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if any component violates the grammar.
    pub fn new(space: &str, name: &str, version: &str) -> Result<Self, ParseError> {
        Ok(Self {
            space: valid_space(space)?,
            name: valid_name(name)?,
            version: valid_version(version)?,
        })
    }

    /// Parses `space:name(version=v)`, substituting context defaults for
    /// missing components.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed strings, grammar violations or missing
    /// components without defaults.
    pub fn parse(raw: &str, ctx: &ResolutionContext) -> Result<Self, ParseError> {
        let parts = split(raw)?;
        if parts.property.is_some() {
            return Err(ParseError::Malformed(raw.to_string()));
        }
        Ok(Self {
            space: ctx.space_for(raw, parts.space)?,
            name: valid_name(parts.name)?,
            version: ctx.version_for(raw, parts.version)?,
        })
    }

    /// The class this view was derived from.
    pub fn as_class(&self) -> ClassEntity {
        ClassEntity {
            space: self.space.clone(),
            name: self.name.clone(),
        }
    }

    /// The node-type marker carrying this view's identity.
    pub fn as_node_type(&self) -> NodeTypeRef {
        NodeTypeRef {
            space: self.space.clone(),
            name: self.name.clone(),
        }
    }
}

impl fmt::Display for ViewEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}(version={})", self.space, self.name, self.version)
    }
}

impl FromStr for ViewEntity {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s, &ResolutionContext::strict())
    }
}

impl TryFrom<String> for ViewEntity {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ViewEntity> for String {
    fn from(value: ViewEntity) -> Self {
        value.to_string()
    }
}

/// A pointer into a reference (base) model.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Reference {
    /// A node type of the reference model (`space:externalId`).
    Node(NodeTypeRef),
    /// A container property of the reference model
    /// (`space:Container(property=prop)`).
    ContainerProperty {
        /// The referenced container.
        container: ContainerEntity,
        /// The container property identifier.
        property: String,
    },
}

impl Reference {
    /// Parses a reference pointer.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed strings or grammar violations.
    pub fn parse(raw: &str, ctx: &ResolutionContext) -> Result<Self, ParseError> {
        let parts = split(raw)?;
        if parts.version.is_some() {
            return Err(ParseError::Malformed(raw.to_string()));
        }
        let space = ctx.space_for(raw, parts.space)?;
        let name = valid_name(parts.name)?;
        Ok(match parts.property {
            Some(property) => Reference::ContainerProperty {
                container: ContainerEntity { space, name },
                property: valid_name(property)?,
            },
            None => Reference::Node(NodeTypeRef { space, name }),
        })
    }

    /// The node type, if this is a node pointer.
    pub fn as_node(&self) -> Option<&NodeTypeRef> {
        match self {
            Reference::Node(node) => Some(node),
            Reference::ContainerProperty { .. } => None,
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reference::Node(node) => write!(f, "{node}"),
            Reference::ContainerProperty {
                container,
                property,
            } => write!(f, "{container}(property={property})"),
        }
    }
}

impl TryFrom<String> for Reference {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value, &ResolutionContext::strict())
    }
}

impl From<Reference> for String {
    fn from(value: Reference) -> Self {
        value.to_string()
    }
}
