//! Logical-to-physical data-model compiler.
//!
//! Compiles a [`ConceptualModel`] (classes, properties, inheritance) into a
//! physical [`Schema`] of containers, views, connections and filters, and
//! validates the result. A compile either returns the schema with its
//! warnings or a [`CompileError`] listing every error found in one pass.
//!
//! # Pipeline
//!
//! 1. Overlays ("last", "reference") are compiled first, without validation
//! 2. [`RuleAnalysis`] checks the inheritance graph (a cycle aborts)
//! 3. Conceptual validators run
//! 4. [`convert`] builds the physical rule set; [`export`] the schema,
//!    filters included; [`extension`] carries "last" forward
//! 5. Rule-set and schema validators run
//!
//! # Entry Point
//!
//! ```
//! use dms_compiler::{compile, CompileOptions};
//! use dms_model::conceptual::{ClassDraft, ModelDraft, PropertyDraft};
//!
//! let model = ModelDraft::new("power", "1")
//!     .with_class(ClassDraft::new("Asset"))
//!     .with_property(PropertyDraft::new("Asset", "name", "text").with_count(1, Some(1)))
//!     .finalize()?;
//! let output = compile(&model, &CompileOptions::default())?;
//! assert_eq!(output.summary().containers, 1);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![deny(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    missing_docs,
    clippy::missing_errors_doc
)]

pub mod convert;
pub mod export;
pub mod extension;
pub mod filters;
pub mod import;
pub mod mapping;
pub mod packing;

use std::fmt;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use dms_conformance::{
    validate_conceptual, validate_rules, validate_schema, CheckSettings, Diagnostic, MultiError,
    ValidationReport,
};
use dms_model::conceptual::ModelMetadata;
use dms_model::{
    AnalysisError, Completeness, ConceptualModel, Limits, PhysicalRules,
    RuleAnalysis, Schema,
};

use convert::Converter;

/// Compiler settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompileOptions {
    /// Platform capacity limits.
    pub limits: Limits,
    /// Compile properties with an `unknown` value type as untyped direct
    /// relations instead of rejecting them.
    pub ignore_unknown: bool,
}

impl CompileOptions {
    /// Parses options from TOML.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed TOML or unknown keys.
    pub fn from_toml_str(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    /// Loads options from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_toml_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Validator settings for a model.
    pub fn settings(&self, metadata: &ModelMetadata) -> CheckSettings {
        CheckSettings {
            limits: self.limits,
            completeness: metadata.completeness,
            extension: metadata.extension,
            ignore_unknown: self.ignore_unknown,
        }
    }
}

/// Why a compile failed.
#[derive(Debug, Error)]
pub enum CompileError {
    /// Extended completeness without a "last" model.
    #[error("extended completeness requires a \"last\" model to extend")]
    MissingOverlay,
    /// The inheritance graph is cyclic.
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
    /// An overlay model could not be compiled.
    #[error("failed to compile the \"{which}\" model: {source}")]
    Overlay {
        /// `last` or `reference`.
        which: &'static str,
        /// The overlay's error.
        source: Box<CompileError>,
    },
    /// Validation found errors.
    #[error(transparent)]
    Invalid(#[from] MultiError),
}

/// A successful compile.
#[derive(Debug, Clone)]
pub struct CompileOutput {
    /// The physical schema, overlays attached.
    pub schema: Schema,
    /// The row-oriented rule set the schema was exported from.
    pub rules: PhysicalRules,
    /// Non-fatal diagnostics.
    pub warnings: Vec<Diagnostic>,
}

/// Counts of what a compile produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompileSummary {
    /// Views in the schema.
    pub views: usize,
    /// Containers in the schema.
    pub containers: usize,
    /// View-property rows.
    pub properties: usize,
    /// Node types in the schema.
    pub node_types: usize,
    /// Warnings raised.
    pub warnings: usize,
}

impl CompileOutput {
    /// Counts of views, containers, properties, node types and warnings.
    pub fn summary(&self) -> CompileSummary {
        CompileSummary {
            views: self.schema.views.len(),
            containers: self.schema.containers.len(),
            properties: self.rules.properties.len(),
            node_types: self.schema.node_types.len(),
            warnings: self.warnings.len(),
        }
    }
}

impl fmt::Display for CompileSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} views, {} containers, {} properties, {} node types, {} warnings",
            self.views, self.containers, self.properties, self.node_types, self.warnings
        )
    }
}

/// Compiles and validates `model`.
///
/// # Errors
///
/// Returns [`CompileError::MissingOverlay`] for an extended model without
/// "last", [`CompileError::Analysis`] for cyclic inheritance,
/// [`CompileError::Overlay`] when an overlay cannot be compiled, and
/// [`CompileError::Invalid`] listing every validation error otherwise.
pub fn compile(model: &ConceptualModel, options: &CompileOptions) -> Result<CompileOutput, CompileError> {
    let meta = &model.metadata;
    if meta.completeness == Completeness::Extended && model.last.is_none() {
        return Err(CompileError::MissingOverlay);
    }
    log::debug!("compiling {} version {}", meta.space, meta.version);

    let analysis = RuleAnalysis::new(model)?;
    let settings = options.settings(meta);

    let mut report = validate_conceptual(model, &analysis, &settings);
    let assembled = assemble(&analysis, options)?;
    report.extend(assembled.notes);
    report.extend(validate_rules(&assembled.rules));
    report.extend(validate_schema(&assembled.schema, &settings));

    let warnings = report.into_result()?;
    let output = CompileOutput {
        schema: assembled.schema,
        rules: assembled.rules,
        warnings,
    };
    log::info!("compiled {}: {}", meta.space, output.summary());
    Ok(output)
}

/// Rules, schema and converter observations of one model.
struct Assembled {
    rules: PhysicalRules,
    schema: Schema,
    notes: ValidationReport,
}

fn assemble(analysis: &RuleAnalysis<'_>, options: &CompileOptions) -> Result<Assembled, CompileError> {
    let model = analysis.model();
    let last = model
        .last
        .as_deref()
        .map(|m| overlay("last", m, options))
        .transpose()?;
    let reference = model
        .reference
        .as_deref()
        .map(|m| overlay("reference", m, options))
        .transpose()?;

    let (mut rules, mut notes) = Converter::new(analysis, options.limits)
        .with_last(last.as_ref().map(|a| &a.schema))
        .with_reference(reference.as_ref().map(|a| &a.schema))
        .convert();

    let (mut schema, exported) = export::export(
        &rules,
        last.as_ref().map(|a| a.schema.clone()),
        reference.as_ref().map(|a| a.schema.clone()),
    );
    notes.extend(exported);
    extension::merge(&mut schema, model.metadata.extension);

    rules.last = last.map(|a| Box::new(a.rules));
    rules.reference = reference.map(|a| Box::new(a.rules));
    Ok(Assembled { rules, schema, notes })
}

fn overlay(which: &'static str, model: &ConceptualModel, options: &CompileOptions) -> Result<Assembled, CompileError> {
    let wrap = |e: CompileError| CompileError::Overlay {
        which,
        source: Box::new(e),
    };
    let analysis = RuleAnalysis::new(model).map_err(|e| wrap(e.into()))?;
    let Assembled { rules, schema, notes } = assemble(&analysis, options).map_err(wrap)?;
    notes.into_result().map_err(|e| wrap(e.into()))?;
    Ok(Assembled {
        rules,
        schema,
        notes: ValidationReport::new(),
    })
}
