//! Shared plumbing for the `dms-compile` and `dms-check` binaries.

#![deny(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    missing_docs,
    clippy::missing_errors_doc
)]

pub mod logging;

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use dms_conformance::Diagnostic;
use dms_model::ModelDraft;

/// Reads a model draft from a JSON file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not a model document.
pub fn read_model(path: &Path) -> Result<ModelDraft> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse model {}", path.display()))
}

/// Prints diagnostics, one per line, and returns `(errors, warnings)`.
pub fn print_diagnostics<'a>(diagnostics: impl IntoIterator<Item = &'a Diagnostic>) -> (usize, usize) {
    let mut errors = 0usize;
    let mut warnings = 0usize;
    for diagnostic in diagnostics {
        if diagnostic.is_error() {
            errors += 1;
        } else {
            warnings += 1;
        }
        println!("{diagnostic}");
    }
    (errors, warnings)
}
