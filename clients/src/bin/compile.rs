//! `dms-compile`: compiles a conceptual model into a physical schema.
//!
//! **Usage:**
//! ```text
//! dms-compile --model <model.json> [--out <dir>] [--config <dms.toml>] [--log-level <level>]
//! ```
//!
//! The schema is written one file per resource under `<out>`. Diagnostics go
//! to stdout; the process exits non-zero when the model has errors.

#![deny(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    missing_docs,
    clippy::missing_errors_doc
)]

use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use dms_clients::{logging, print_diagnostics, read_model};
use dms_compiler::{compile, CompileError, CompileOptions};
use dms_model::serializer::directory;

/// Compile a conceptual data model.
#[derive(Parser)]
#[command(name = "dms-compile", about = "Compile a conceptual data model into a physical schema")]
struct Args {
    /// Model document (JSON), overlays included.
    #[arg(long)]
    model: PathBuf,

    /// Output directory for the schema.
    #[arg(long, default_value = "schema")]
    out: PathBuf,

    /// Compiler settings (TOML).
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
    let model = read_model(&args.model)?
        .finalize()
        .with_context(|| format!("Invalid model {}", args.model.display()))?;

    match compile(&model, &options) {
        Ok(output) => {
            print_diagnostics(&output.warnings);
            directory::write_dir(&output.schema, &args.out)?;
            tracing::info!(out = %args.out.display(), "schema written");
            println!("{}: {}", model.metadata.space, output.summary());
            Ok(())
        }
        Err(CompileError::Invalid(invalid)) => {
            let (errors, _) = print_diagnostics(invalid.errors.iter().chain(&invalid.warnings));
            eprintln!("Compile FAILED: {errors} error(s).");
            process::exit(1);
        }
        Err(other) => Err(other.into()),
    }
}
