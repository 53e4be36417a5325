//! Platform capacity limits.

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Capacity limits of the target platform.
///
/// Every field has a default, so a TOML file only needs the limits it
/// overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case", deny_unknown_fields)]
pub struct Limits {
    /// Maximum distinct properties per container.
    pub container_properties: usize,
    /// Maximum properties per view, inherited ones included.
    pub view_properties: usize,
    /// Maximum distinct containers one view maps to.
    pub view_containers: usize,
    /// Maximum containers in one `HasData` filter.
    pub filter_containers: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            container_properties: 100,
            view_properties: 300,
            view_containers: 10,
            filter_containers: 10,
        }
    }
}

impl Limits {
    /// Parses limits from TOML.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Config`] for malformed TOML or unknown keys.
    pub fn from_toml_str(raw: &str) -> Result<Self, ModelError> {
        Ok(toml::from_str(raw)?)
    }

    /// Limits with a different container capacity.
    #[must_use]
    pub fn with_container_properties(mut self, limit: usize) -> Self {
        self.container_properties = limit;
        self
    }
}
