//! Validators for the data-model compiler.
//!
//! Checks run at three levels, each producing a [`ValidationReport`]:
//!
//! | Level | Input | Concerns |
//! |-------|-------|----------|
//! | Conceptual | `ConceptualModel` + `RuleAnalysis` | duplicates, undefined and dangling classes, cross-space parents, unknown types |
//! | Rules | `PhysicalRules` | container-definition consistency, duplicate mappings, connection flags |
//! | Schema | `Schema` (with overlays) | referential existence, capacity, reverse feasibility, filters, extension compatibility |
//!
//! # Entry Point
//!
//! ```
//! use dms_conformance::{validate_schema, CheckSettings};
//! use dms_model::Schema;
//!
//! let report = validate_schema(&Schema::new(), &CheckSettings::default());
//! assert!(!report.has_errors());
//! ```

#![deny(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    missing_docs,
    clippy::missing_errors_doc
)]

pub mod report;
pub mod validators;

use dms_model::{
    Completeness, ConceptualModel, ExtensionCategory, Limits, PhysicalRules, RuleAnalysis,
    Schema,
};

pub use report::{Diagnostic, IssueKind, MultiError, Severity, ValidationReport};

/// Settings shared by every validator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckSettings {
    /// Platform capacity limits.
    pub limits: Limits,
    /// Completeness mode; `Partial` skips existence checks.
    pub completeness: Completeness,
    /// Extension category checked against the "last" overlay.
    pub extension: ExtensionCategory,
    /// Accept properties whose value type is `unknown`.
    pub ignore_unknown: bool,
}

impl CheckSettings {
    /// Severity for a missing resource under the current completeness mode.
    pub fn missing_severity(&self) -> Severity {
        match self.completeness {
            Completeness::Partial => Severity::Warning,
            Completeness::Complete | Completeness::Extended => Severity::Error,
        }
    }
}

/// Runs the conceptual-model validators.
pub fn validate_conceptual(
    model: &ConceptualModel,
    analysis: &RuleAnalysis<'_>,
    settings: &CheckSettings,
) -> ValidationReport {
    let mut report = ValidationReport::new();
    report.extend(validators::conceptual::classes::validate(model, analysis, settings));
    report.extend(validators::conceptual::properties::validate(model, settings));
    report
}

/// Runs the physical rule-set validators.
pub fn validate_rules(rules: &PhysicalRules) -> ValidationReport {
    let mut report = ValidationReport::new();
    report.extend(validators::rules::mapping::validate(rules));
    report.extend(validators::rules::containers::validate(rules));
    report.extend(validators::rules::connections::validate(rules));
    report
}

/// Runs the schema validators.
///
/// Validators are run in this order:
/// 1. Duplicate declarations
/// 2. Referential existence (skipped in partial mode)
/// 3. Reverse-connection feasibility
/// 4. Capacity
/// 5. Filters and space/version observations
/// 6. Extension compatibility (only when a "last" overlay is attached)
pub fn validate_schema(schema: &Schema, settings: &CheckSettings) -> ValidationReport {
    let mut report = validators::schema::duplicates::validate(schema);
    if settings.completeness != Completeness::Partial {
        report.extend(validators::schema::references::validate(schema));
    }
    report.extend(validators::schema::reverse::validate(schema));
    report.extend(validators::schema::capacity::validate(schema, &settings.limits));
    report.extend(validators::schema::filters::validate(schema));
    if let Some(last) = schema.last.as_deref() {
        report.extend(validators::schema::extension::validate(schema, last, settings.extension));
    }
    report
}
