//! Error Taxonomy
//!
//! One enum per concern. Only `AttritionError` reaches the caller as a
//! request failure; narrative errors are absorbed in `narrative::narrate`.

use std::path::PathBuf;
use thiserror::Error;

use crate::logic::features::layout::LayoutMismatchError;

// ============================================================================
// INPUT
// ============================================================================

/// Missing or unparseable form field. No prediction is attempted.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InputValidationError {
    #[error("missing required field `{0}`")]
    MissingField(String),

    #[error("field `{field}` must be a finite number, got {value:?}")]
    InvalidNumber { field: String, value: String },

    #[error("field `{field}` has unsupported value {value:?} and no substitute is configured")]
    UnknownCategory { field: String, value: String },

    #[error("substitute {substitute:?} for `{field}` is not a known category")]
    InvalidSubstitute { field: String, substitute: String },
}

// ============================================================================
// PIPELINE (raised by TrainedPipeline implementations)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    #[error("column `{0}` is missing from the record")]
    MissingColumn(String),

    #[error("column `{column}` expected a {expected} value")]
    TypeMismatch { column: String, expected: &'static str },

    #[error("unknown category {value:?} for column `{column}`")]
    UnknownCategory { column: String, value: String },

    #[error("expected {expected} features, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("non-finite value in {0}")]
    NonFinite(String),

    #[error("{0}")]
    Other(String),
}

// ============================================================================
// INFERENCE
// ============================================================================

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("no trained pipeline is loaded")]
    NotLoaded,

    #[error("record does not match the feature schema: {0}")]
    Schema(#[source] PipelineError),

    #[error("preprocessing transform failed: {0}")]
    Transform(#[source] PipelineError),

    #[error("classifier failed: {0}")]
    Classifier(#[source] PipelineError),

    #[error("classifier returned {classes} class probabilities, positive class {index} unavailable")]
    MissingPositiveClass { index: usize, classes: usize },

    #[error("classifier returned invalid probability {0}")]
    InvalidProbability(f64),

    #[error("pipeline panicked during {stage}: {message}")]
    Panicked { stage: &'static str, message: String },
}

// ============================================================================
// ATTRIBUTION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AttributionError {
    #[error("pipeline does not expose an attribution model")]
    Unsupported,

    #[error("attribution produced {actual} values for {expected} transformed features")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("attribution has no output for class {index} ({available} available)")]
    MissingClass { index: usize, available: usize },

    #[error("attribution produced a non-finite contribution")]
    NonFinite,
}

// ============================================================================
// NARRATIVE (absorbed, never a request failure)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Error)]
pub enum NarrativeError {
    #[error("narrative generator is not configured")]
    NotConfigured,

    #[error("narrative service timed out")]
    Timeout,

    #[error("narrative service unreachable: {0}")]
    Network(String),

    #[error("narrative service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unreadable narrative response: {0}")]
    Parse(String),

    #[error("narrative service returned no text")]
    Empty,
}

impl NarrativeError {
    /// Transport failures, throttling and server errors are worth one more try
    pub fn is_transient(&self) -> bool {
        match self {
            NarrativeError::Timeout | NarrativeError::Network(_) => true,
            NarrativeError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

// ============================================================================
// ARTIFACT + CONFIG
// ============================================================================

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("cannot read artifact {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed artifact: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("artifact checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error(transparent)]
    Layout(#[from] LayoutMismatchError),

    #[error("invalid artifact: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

// ============================================================================
// REQUEST FAILURE
// ============================================================================

/// Local request failure; the process keeps serving.
#[derive(Debug, Error)]
pub enum AttritionError {
    #[error("invalid input: {0}")]
    Input(#[from] InputValidationError),

    #[error("inference could not complete: {0}")]
    Inference(#[from] InferenceError),

    #[error("attribution could not complete: {0}")]
    Attribution(#[from] AttributionError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(NarrativeError::Timeout.is_transient());
        assert!(NarrativeError::Network("reset".into()).is_transient());
        assert!(NarrativeError::Status { status: 429, body: String::new() }.is_transient());
        assert!(NarrativeError::Status { status: 503, body: String::new() }.is_transient());
        assert!(!NarrativeError::Status { status: 401, body: String::new() }.is_transient());
        assert!(!NarrativeError::NotConfigured.is_transient());
        assert!(!NarrativeError::Empty.is_transient());
    }

    #[test]
    fn test_request_error_messages() {
        let err: AttritionError = InputValidationError::MissingField("Age".into()).into();
        assert_eq!(err.to_string(), "invalid input: missing required field `Age`");

        let err: AttritionError = InferenceError::NotLoaded.into();
        assert!(err.to_string().starts_with("inference could not complete"));
    }
}
