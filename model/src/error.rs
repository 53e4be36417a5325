//! Errors raised while building models from raw input.

use std::fmt;

use thiserror::Error;

use crate::entity::ParseError;

/// A parse failure located at a row of the class or property table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowError {
    /// Table name (`classes` or `properties`).
    pub table: &'static str,
    /// 1-based row number.
    pub row: usize,
    /// The underlying failure.
    pub error: ParseError,
}

impl fmt::Display for RowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} row {}: {}", self.table, self.row, self.error)
    }
}

/// Every row failure found in one pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowErrors(pub Vec<RowError>);

impl fmt::Display for RowErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} invalid row(s)", self.0.len())?;
        for error in &self.0 {
            write!(f, "\n  {error}")?;
        }
        Ok(())
    }
}

/// Failure to build a model or load configuration.
#[derive(Debug, Error)]
pub enum ModelError {
    /// The model metadata is invalid.
    #[error("invalid metadata: {0}")]
    Metadata(ParseError),
    /// One or more class/property rows are invalid.
    #[error("{0}")]
    Rows(RowErrors),
    /// An overlay model ("last" or "reference") is invalid.
    #[error("invalid {which} model: {source}")]
    Overlay {
        /// `last` or `reference`.
        which: &'static str,
        /// The overlay's own error.
        source: Box<ModelError>,
    },
    /// A limits/options file could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),
}
