//! Validation report types: diagnostics, severity levels, and report aggregation.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Severity level of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Non-blocking observation.
    Warning,
    /// Blocks the compile.
    Error,
}

/// What kind of fault a diagnostic reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum IssueKind {
    /// A value could not be interpreted.
    Invalid,
    /// A referenced class, view, container or property does not exist.
    ResourceNotFound,
    /// The same resource is declared more than once.
    ResourceDuplicated,
    /// Two view properties collide on one container slot.
    MappingDuplicated,
    /// Definitions of one container slot disagree.
    Inconsistent,
    /// A platform capacity limit is exceeded.
    Capacity,
    /// A change the extension category does not allow.
    Extension,
    /// A reverse connection cannot be computed.
    Infeasible,
    /// A space or version differs from the model's.
    Mismatch,
    /// A class has no properties of its own or inherited.
    Dangling,
    /// A construct that works but is probably not intended.
    Suspicious,
}

/// A single validation finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    /// Short identifier of the validator that produced this finding.
    pub validator: String,
    /// Fault category.
    pub kind: IssueKind,
    /// Severity of the finding.
    pub severity: Severity,
    /// Human-readable message.
    pub message: String,
    /// Optional additional detail lines.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
}

impl Diagnostic {
    /// Creates an error.
    pub fn error(validator: impl Into<String>, kind: IssueKind, message: impl Into<String>) -> Self {
        Self {
            validator: validator.into(),
            kind,
            severity: Severity::Error,
            message: message.into(),
            details: Vec::new(),
        }
    }

    /// Creates a warning.
    pub fn warn(validator: impl Into<String>, kind: IssueKind, message: impl Into<String>) -> Self {
        Self {
            validator: validator.into(),
            kind,
            severity: Severity::Warning,
            message: message.into(),
            details: Vec::new(),
        }
    }

    /// Creates an error or a warning.
    pub fn new(
        severity: Severity,
        validator: impl Into<String>,
        kind: IssueKind,
        message: impl Into<String>,
    ) -> Self {
        match severity {
            Severity::Error => Self::error(validator, kind, message),
            Severity::Warning => Self::warn(validator, kind, message),
        }
    }

    /// Attaches detail lines.
    #[must_use]
    pub fn with_details(mut self, details: Vec<String>) -> Self {
        self.details = details;
        self
    }

    /// Returns true if this diagnostic blocks the compile.
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "[{level}] {}: {}", self.validator, self.message)?;
        for detail in &self.details {
            write!(f, "\n    {detail}")?;
        }
        Ok(())
    }
}

/// Every error found in one pass.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{} error(s){}", .errors.len(), render(.errors))]
pub struct MultiError {
    /// The errors, in the order they were found.
    pub errors: Vec<Diagnostic>,
    /// Warnings raised alongside the errors.
    pub warnings: Vec<Diagnostic>,
}

fn render(errors: &[Diagnostic]) -> String {
    errors.iter().map(|e| format!("\n  {e}")).collect()
}

/// Append-only list of diagnostics from all validators.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    /// All diagnostics in the order they were raised.
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationReport {
    /// Creates a new empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a diagnostic to this report.
    pub fn push(&mut self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Warning => log::warn!("{diagnostic}"),
            Severity::Error => log::debug!("{diagnostic}"),
        }
        self.diagnostics.push(diagnostic);
    }

    /// Extends this report with diagnostics from another report.
    pub fn extend(&mut self, other: ValidationReport) {
        self.diagnostics.extend(other.diagnostics);
    }

    /// Errors only.
    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error())
    }

    /// Warnings only.
    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| !d.is_error())
    }

    /// Returns the count of errors.
    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    /// Returns true if any error was raised.
    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    /// Diagnostics produced by validators whose name starts with `prefix`.
    pub fn by_validator<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a Diagnostic> + 'a {
        self.diagnostics
            .iter()
            .filter(move |d| d.validator.starts_with(prefix))
    }

    /// Splits the report: warnings on success, every error (with the
    /// warnings) otherwise.
    ///
    /// # Errors
    ///
    /// Returns a [`MultiError`] if the report contains at least one error.
    pub fn into_result(self) -> Result<Vec<Diagnostic>, MultiError> {
        let (errors, warnings): (Vec<_>, Vec<_>) =
            self.diagnostics.into_iter().partition(Diagnostic::is_error);
        if errors.is_empty() {
            Ok(warnings)
        } else {
            Err(MultiError { errors, warnings })
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn into_result_splits_by_severity() {
        let mut report = ValidationReport::new();
        report.push(Diagnostic::warn("schema/capacity", IssueKind::Capacity, "big view"));
        assert_eq!(report.clone().into_result().map(|w| w.len()), Ok(1));

        report.push(Diagnostic::error("schema/references", IssueKind::ResourceNotFound, "gone"));
        report.push(Diagnostic::error("schema/references", IssueKind::ResourceNotFound, "also gone"));
        let err = report.into_result().unwrap_err();
        assert_eq!(err.errors.len(), 2);
        assert_eq!(err.warnings.len(), 1);
        let rendered = err.to_string();
        assert!(rendered.starts_with("2 error(s)"));
        assert!(rendered.contains("[error] schema/references: also gone"));
    }

    #[test]
    fn details_are_rendered_indented() {
        let d = Diagnostic::error("rules/containers", IssueKind::Inconsistent, "conflict")
            .with_details(vec!["rows 1, 4".to_string()]);
        assert_eq!(d.to_string(), "[error] rules/containers: conflict\n    rows 1, 4");
    }
}
