//! Field resolution against loosely-typed rows.
//!
//! Remote sources disagree with chart declarations about casing and word
//! separators (`Total Revenue` vs `total_revenue`). Resolution tries exact,
//! then case-insensitive, then separator-interchanged matching, and fails
//! loudly with the available keys instead of silently rendering empty data.

use crate::error::PipelineError;
use crate::models::Record;

/// Resolve `requested` to the actual key present in `record`.
///
/// Match order: exact, case-insensitive, then case-insensitive with spaces
/// and underscores treated as interchangeable. Returns the key as spelled in
/// the record so subsequent lookups hit without renormalizing.
pub fn resolve_field<'a>(record: &'a Record, requested: &str) -> Result<&'a str, PipelineError> {
    if let Some(key) = record.keys().find(|k| *k == requested) {
        return Ok(key);
    }
    let lower = requested.to_lowercase();
    if let Some(key) = record.keys().find(|k| k.to_lowercase() == lower) {
        return Ok(key);
    }
    let folded = fold_separators(requested);
    if let Some(key) = record.keys().find(|k| fold_separators(k) == folded) {
        return Ok(key);
    }
    Err(PipelineError::FieldNotFound {
        field: requested.to_string(),
        available: record.keys().map(str::to_string).collect(),
    })
}

/// Lowercase with underscores collapsed to spaces, so `Total_Revenue`,
/// `total revenue`, and `TOTAL_REVENUE` all compare equal.
fn fold_separators(key: &str) -> String {
    key.to_lowercase().replace('_', " ")
}
