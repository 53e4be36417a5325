//! `dms-check`: validates a physical schema directory.
//!
//! **Usage:**
//! ```text
//! dms-check --schema <dir> [--last <dir>] [--reference <dir>]
//!           [--extension addition|reshape|rebuild] [--partial] [--config <dms.toml>]
//! ```
//!
//! Exits non-zero if any check reports an error.

#![deny(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    missing_docs,
    clippy::missing_errors_doc
)]

use std::path::PathBuf;
use std::process;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use dms_clients::{logging, print_diagnostics};
use dms_compiler::CompileOptions;
use dms_conformance::{validate_schema, CheckSettings};
use dms_model::serializer::directory;
use dms_model::{Completeness, ExtensionCategory};

/// Extension category of the checked schema.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Extension {
    /// Nothing from the previous version may change or disappear.
    Addition,
    /// Containers are kept; views are free.
    Reshape,
    /// Anything goes.
    Rebuild,
}

impl From<Extension> for ExtensionCategory {
    fn from(value: Extension) -> Self {
        match value {
            Extension::Addition => ExtensionCategory::Addition,
            Extension::Reshape => ExtensionCategory::Reshape,
            Extension::Rebuild => ExtensionCategory::Rebuild,
        }
    }
}

/// Validate a physical schema.
#[derive(Parser)]
#[command(name = "dms-check", about = "Validate a physical schema directory")]
struct Args {
    /// Schema directory.
    #[arg(long)]
    schema: PathBuf,

    /// Previous version of the schema.
    #[arg(long)]
    last: Option<PathBuf>,

    /// Base schema the checked one builds on.
    #[arg(long)]
    reference: Option<PathBuf>,

    /// Changes allowed relative to `--last`.
    #[arg(long, value_enum, default_value_t = Extension::Addition)]
    extension: Extension,

    /// Report missing resources as warnings.
    #[arg(long)]
    partial: bool,

    /// Compiler settings (TOML); only the limits are used.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Base log level; `RUST_LOG` overrides it.
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(&args.log_level)?;

    let options = match &args.config {
        Some(path) => CompileOptions::load(path)?,
        None => CompileOptions::default(),
    };
    let mut schema = directory::read_dir(&args.schema)?;
    if let Some(dir) = &args.last {
        schema = schema.with_last(directory::read_dir(dir)?);
    }
    if let Some(dir) = &args.reference {
        schema = schema.with_reference(directory::read_dir(dir)?);
    }
    tracing::debug!(
        views = schema.views.len(),
        containers = schema.containers.len(),
        "schema loaded"
    );

    let settings = CheckSettings {
        limits: options.limits,
        completeness: if args.partial {
            Completeness::Partial
        } else {
            Completeness::Complete
        },
        extension: args.extension.into(),
        ignore_unknown: options.ignore_unknown,
    };
    let report = validate_schema(&schema, &settings);
    let (errors, warnings) = print_diagnostics(&report.diagnostics);
    println!("Summary: {errors} errors, {warnings} warnings");

    if errors > 0 {
        eprintln!("Check FAILED: {errors} error(s).");
        process::exit(1);
    }
    Ok(())
}
