//! Validators, grouped by the artifact they inspect.

pub mod conceptual;
pub mod rules;
pub mod schema;

/// Renders a list of row numbers as `1, 4, 7`.
pub(crate) fn rows(rows: impl IntoIterator<Item = usize>) -> String {
    rows.into_iter()
        .map(|r| r.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
