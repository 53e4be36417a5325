//! Class-level checks on a conceptual model.
//!
//! - No class is declared twice
//! - Every referenced class is defined (error, or warning in partial mode)
//! - No class is dangling (error, or warning in partial mode)
//! - Cross-space parents resolve to the reference model (warning otherwise)
//! - Locally defined classes live in the model's space (warning otherwise)

use std::collections::BTreeMap;

use dms_model::{ClassEntity, Completeness, ConceptualModel, RuleAnalysis};

use crate::report::{Diagnostic, IssueKind, ValidationReport};
use crate::validators::rows;
use crate::CheckSettings;

const VALIDATOR: &str = "conceptual/classes";

/// Validates the classes of `model`.
pub fn validate(
    model: &ConceptualModel,
    analysis: &RuleAnalysis<'_>,
    settings: &CheckSettings,
) -> ValidationReport {
    let mut report = ValidationReport::new();

    check_duplicates(model, &mut report);
    check_undefined(analysis, settings, &mut report);
    check_dangling(analysis, settings, &mut report);
    check_cross_space_parents(analysis, &mut report);
    check_spaces(model, &mut report);

    report
}

fn check_duplicates(model: &ConceptualModel, report: &mut ValidationReport) {
    let mut seen: BTreeMap<&ClassEntity, Vec<usize>> = BTreeMap::new();
    for class in &model.classes {
        seen.entry(&class.id).or_default().push(class.row);
    }
    for (class, found) in seen.into_iter().filter(|(_, r)| r.len() > 1) {
        report.push(Diagnostic::error(
            VALIDATOR,
            IssueKind::ResourceDuplicated,
            format!("class {class} is declared more than once (rows {})", rows(found)),
        ));
    }
}

fn check_undefined(
    analysis: &RuleAnalysis<'_>,
    settings: &CheckSettings,
    report: &mut ValidationReport,
) {
    let severity = settings.missing_severity();
    for (class, referring) in analysis.undefined_classes() {
        let mut message = format!("class {class} is not defined");
        if settings.completeness == Completeness::Partial {
            message.push_str("; its properties are dropped and references to it become untyped");
        }
        report.push(
            Diagnostic::new(severity, VALIDATOR, IssueKind::ResourceNotFound, message)
                .with_details(vec![format!("referenced by rows {}", rows(referring))]),
        );
    }
}

fn check_dangling(
    analysis: &RuleAnalysis<'_>,
    settings: &CheckSettings,
    report: &mut ValidationReport,
) {
    for class in analysis.dangling_classes() {
        report.push(Diagnostic::new(
            settings.missing_severity(),
            VALIDATOR,
            IssueKind::Dangling,
            format!("class {class} has no properties, neither its own nor inherited"),
        ));
    }
}

fn check_cross_space_parents(analysis: &RuleAnalysis<'_>, report: &mut ValidationReport) {
    for (child, parent) in analysis.cross_space_parents() {
        if !analysis.is_defined(parent) {
            report.push(Diagnostic::warn(
                VALIDATOR,
                IssueKind::Mismatch,
                format!(
                    "parent {parent} of {child} is in another space and not in the reference model; \
                     it is excluded from inheritance"
                ),
            ));
        }
    }
}

fn check_spaces(model: &ConceptualModel, report: &mut ValidationReport) {
    for class in &model.classes {
        if class.id.space != model.metadata.space {
            report.push(Diagnostic::warn(
                VALIDATOR,
                IssueKind::Mismatch,
                format!(
                    "class {} (row {}) is outside the model space '{}'",
                    class.id, class.row, model.metadata.space
                ),
            ));
        }
    }
}
