//! Inference Engine
//!
//! Holds the process-wide trained pipeline and turns one employee record
//! into a calibrated attrition probability plus the transformed vector the
//! attribution engine works on.

use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ndarray::Array1;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::artifact::ArtifactPipeline;
use super::pipeline::TrainedPipeline;
use crate::logic::error::{ArtifactError, InferenceError};
use crate::logic::features::EmployeeRecord;

/// Index of the "will leave" class in classifier output
pub const POSITIVE_CLASS: usize = 1;

// ============================================================================
// STATE
// ============================================================================

/// Latency stats
static LATENCY_SUM: AtomicU64 = AtomicU64::new(0);
static INFERENCE_COUNT: AtomicU64 = AtomicU64::new(0);

/// Loaded pipeline. Replaced only by load/unload, never mutated in place.
static PIPELINE: RwLock<Option<Arc<dyn TrainedPipeline>>> = RwLock::new(None);

static PIPELINE_METADATA: RwLock<Option<PipelineMetadata>> = RwLock::new(None);

// ============================================================================
// DATA STRUCTURES
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineMetadata {
    pub name: String,
    pub source: String,
    pub transformed_features: usize,
    pub loaded_at: chrono::DateTime<chrono::Utc>,
}

/// Engine Status for CLI/health output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineStatus {
    pub pipeline_loaded: bool,
    pub pipeline_name: String,
    pub loaded_at: Option<chrono::DateTime<chrono::Utc>>,
    pub avg_latency_ms: f64,
    pub inference_count: u64,
}

/// Output of one prediction.
///
/// `probability_percent` is rounded for display; `probability` and
/// `transformed` stay unrounded for attribution.
#[derive(Debug, Clone, PartialEq)]
pub struct Inference {
    pub probability_percent: f64,
    pub probability: f64,
    pub transformed: Array1<f64>,
    pub feature_names: Vec<String>,
    pub inference_time_us: u64,
}

// ============================================================================
// PIPELINE SLOT
// ============================================================================

/// Install an already-built pipeline (tests, embedding callers)
pub fn install_pipeline(pipeline: Arc<dyn TrainedPipeline>, source: &str) {
    let metadata = PipelineMetadata {
        name: pipeline.name().to_string(),
        source: source.to_string(),
        transformed_features: pipeline.feature_names_out().len(),
        loaded_at: chrono::Utc::now(),
    };

    log::info!(
        "Pipeline '{}' installed from {} ({} transformed features)",
        metadata.name, metadata.source, metadata.transformed_features
    );

    *PIPELINE.write() = Some(pipeline);
    *PIPELINE_METADATA.write() = Some(metadata);
}

/// Load the JSON artifact at `path` into the process-wide slot
pub fn load_pipeline(path: &Path, expected_sha256: Option<&str>) -> Result<Arc<dyn TrainedPipeline>, ArtifactError> {
    log::info!("Loading pipeline artifact from: {}", path.display());

    let pipeline: Arc<dyn TrainedPipeline> = Arc::new(ArtifactPipeline::load(path, expected_sha256)?);
    install_pipeline(pipeline.clone(), &path.display().to_string());

    Ok(pipeline)
}

pub fn current_pipeline() -> Option<Arc<dyn TrainedPipeline>> {
    PIPELINE.read().clone()
}

pub fn is_pipeline_loaded() -> bool {
    PIPELINE.read().is_some()
}

pub fn get_metadata() -> Option<PipelineMetadata> {
    PIPELINE_METADATA.read().clone()
}

pub fn get_status() -> EngineStatus {
    let metadata = PIPELINE_METADATA.read();
    let (loaded, name, loaded_at) = match metadata.as_ref() {
        Some(meta) => (true, meta.name.clone(), Some(meta.loaded_at)),
        None => (false, "None".to_string(), None),
    };

    let sum = LATENCY_SUM.load(Ordering::Relaxed);
    let count = INFERENCE_COUNT.load(Ordering::Relaxed);
    let avg = if count > 0 { (sum as f64 / count as f64) / 1000.0 } else { 0.0 };

    EngineStatus {
        pipeline_loaded: loaded,
        pipeline_name: name,
        loaded_at,
        avg_latency_ms: avg,
        inference_count: count,
    }
}

// ============================================================================
// PREDICTION
// ============================================================================

/// Predict with the process-wide pipeline
pub fn predict_current(record: &EmployeeRecord) -> Result<Inference, InferenceError> {
    let pipeline = current_pipeline().ok_or(InferenceError::NotLoaded)?;
    predict(record, pipeline.as_ref())
}

pub fn predict(record: &EmployeeRecord, pipeline: &dyn TrainedPipeline) -> Result<Inference, InferenceError> {
    let start_time = std::time::Instant::now();

    let canonical = record.to_canonical().map_err(InferenceError::Schema)?;

    let transformed = guarded("transform", || pipeline.transform(&canonical))?
        .map_err(InferenceError::Transform)?;

    let proba = guarded("predict_proba", || pipeline.predict_proba(&transformed))?
        .map_err(InferenceError::Classifier)?;

    let probability = *proba.get(POSITIVE_CLASS).ok_or(InferenceError::MissingPositiveClass {
        index: POSITIVE_CLASS,
        classes: proba.len(),
    })?;

    if !probability.is_finite() || !(0.0..=1.0).contains(&probability) {
        return Err(InferenceError::InvalidProbability(probability));
    }

    let inference_time_us = start_time.elapsed().as_micros() as u64;
    LATENCY_SUM.fetch_add(inference_time_us, Ordering::Relaxed);
    INFERENCE_COUNT.fetch_add(1, Ordering::Relaxed);

    log::debug!(
        "Inference via '{}': p={:.4} in {}us",
        pipeline.name(), probability, inference_time_us
    );

    Ok(Inference {
        probability_percent: round_percent(probability),
        probability,
        transformed,
        feature_names: pipeline.feature_names_out().to_vec(),
        inference_time_us,
    })
}

/// Probability → percent rounded to two decimals
pub fn round_percent(probability: f64) -> f64 {
    (probability * 100.0 * 100.0).round() / 100.0
}

/// Run a pipeline stage, turning a panic inside it into an error
fn guarded<T>(stage: &'static str, f: impl FnOnce() -> T) -> Result<T, InferenceError> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        log::error!("Pipeline panicked during {}: {}", stage, message);
        InferenceError::Panicked { stage, message }
    })
}

// ============================================================================
// TESTS
// ============================================================================
