use thiserror::Error;

/// Errors produced by the chart data pipeline.
///
/// Network- and schema-level problems (`FetchFailure`, `SchemaError`) are
/// absorbed at the fetch boundary: callers receive fallback data plus a
/// non-blocking notice instead of a hard error. `FieldNotFound` indicates a
/// caller misconfiguration and propagates to the chart boundary, since no
/// fallback can be synthesized for a field mapping that does not match the
/// data.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Transport failure, non-success HTTP status, or an explicit
    /// error-shaped response body.
    #[error("fetch failed: {reason}")]
    FetchFailure { reason: String },

    /// The response body matched none of the recognized tabular shapes.
    #[error("unrecognized response shape: {detail}")]
    SchemaError { detail: String },

    /// A declared x/y/group field could not be resolved against the data.
    #[error("field `{field}` not found; available fields: [{}]", available.join(", "))]
    FieldNotFound {
        field: String,
        available: Vec<String>,
    },

    /// The caller-supplied field mapping is structurally invalid
    /// (e.g. no x-field, or more than one group-by field).
    #[error("invalid field mapping: {0}")]
    InvalidMapping(String),
}

impl PipelineError {
    /// True for conditions that are absorbed with fallback data rather than
    /// surfaced as errors.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PipelineError::FetchFailure { .. } | PipelineError::SchemaError { .. }
        )
    }
}
