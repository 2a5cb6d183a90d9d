//! Typed error kinds for the AQI pipeline.
//!
//! The pipeline distinguishes per-offset failures, which the sequence
//! builder absorbs by skipping the affected day, from run-level failures
//! that must surface to the caller. `is_skippable` marks the former.

use thiserror::Error;

// ---

/// Errors produced by the feature pipeline and model lifecycle.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A single external fetch failed (transport or decode). Recoverable:
    /// the affected day offset is skipped, not the whole run.
    #[error("{provider} data unavailable: {reason}")]
    Unavailable { provider: &'static str, reason: String },

    /// A fetched payload is structurally present but a field fails type
    /// coercion. Fatal for that row only.
    #[error("malformed source field '{field}': {reason}")]
    MalformedSource { field: String, reason: String },

    /// No registered version exists for the requested model name.
    #[error("no registered version for model '{0}'")]
    ModelNotFound(String),

    /// Live covariates disagree with the trained schema. Must never be
    /// silently ignored: a mismatch would score garbage, not error out.
    #[error("covariate schema mismatch: model expects {expected:?}, live rows provide {actual:?}")]
    SchemaMismatch {
        expected: Vec<String>,
        actual: Vec<String>,
    },

    /// Not enough rows to fit or evaluate a model.
    #[error("insufficient training data: need at least {required} rows, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    /// A stored artifact could not be decoded.
    #[error("corrupt model artifact for '{name}' v{version}: {reason}")]
    CorruptArtifact {
        name: String,
        version: i32,
        reason: String,
    },

    /// Feature store or model registry I/O failure.
    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),
}

impl PipelineError {
    /// Whether the sequence builder may record this failure as a skipped
    /// offset and continue with the next one.
    pub fn is_skippable(&self) -> bool {
        matches!(
            self,
            PipelineError::Unavailable { .. } | PipelineError::MalformedSource { .. }
        )
    }

    pub fn unavailable(provider: &'static str, reason: impl Into<String>) -> Self {
        PipelineError::Unavailable {
            provider,
            reason: reason.into(),
        }
    }

    pub fn malformed(field: impl Into<String>, reason: impl Into<String>) -> Self {
        PipelineError::MalformedSource {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;

// ---

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skippable_kinds() {
        // ---
        assert!(PipelineError::unavailable("pollution", "timeout").is_skippable());
        assert!(PipelineError::malformed("aqi", "not a number").is_skippable());
        assert!(!PipelineError::ModelNotFound("random_forest".into()).is_skippable());
        assert!(!PipelineError::SchemaMismatch {
            expected: vec!["co".into()],
            actual: vec!["no2".into()],
        }
        .is_skippable());
    }

    #[test]
    fn display_names_the_offender() {
        // ---
        let err = PipelineError::malformed("precipitation", "expected a number, got true");
        assert_eq!(
            err.to_string(),
            "malformed source field 'precipitation': expected a number, got true"
        );

        let err = PipelineError::ModelNotFound("random_forest".into());
        assert_eq!(
            err.to_string(),
            "no registered version for model 'random_forest'"
        );
    }
}
