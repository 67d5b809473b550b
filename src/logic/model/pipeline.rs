//! Trained Pipeline Capability
//!
//! The core never looks inside the artifact. It needs a transform stage,
//! a classifier stage, output-name introspection and (for explanations)
//! an attribution model over the transformed space.

use ndarray::{Array1, ArrayView1};

use crate::logic::error::{AttributionError, PipelineError};
use crate::logic::explain::types::ShapOutput;
use crate::logic::features::EmployeeRecord;

/// Trait for loaded two-stage pipelines (preprocessing + classifier).
///
/// Implementations are immutable after load and shared across requests.
pub trait TrainedPipeline: Send + Sync {
    /// Human-readable identifier for logs/status
    fn name(&self) -> &str;

    /// Record (schema order) → flat numeric vector
    fn transform(&self, record: &EmployeeRecord) -> Result<Array1<f64>, PipelineError>;

    /// Transformed vector → per-class probabilities
    fn predict_proba(&self, transformed: &Array1<f64>) -> Result<Vec<f64>, PipelineError>;

    /// Transformed feature names, same order as `transform` output
    fn feature_names_out(&self) -> &[String];

    /// Categories the encoder was fitted on, if it exposes them
    fn known_categories(&self, _attribute: &str) -> Option<Vec<String>> {
        None
    }

    fn attribution_model(&self) -> Option<&dyn AttributionModel> {
        None
    }
}

/// Additive per-feature attribution over the transformed space
pub trait AttributionModel: Send + Sync {
    fn shap_values(&self, transformed: ArrayView1<f64>) -> Result<ShapOutput, AttributionError>;
}
