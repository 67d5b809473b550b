//! Pipeline Artifact - JSON storage format
//!
//! ```json
//! {
//!   "name": "attrition-xgb",
//!   "layout_hash": 1234567890,
//!   "preprocessing": { "numeric": {...}, "categorical": {...} },
//!   "classifier": { "kind": "gradient_boosting", "base_score": -1.6, "trees": [...] }
//! }
//! ```
//!
//! Integrity is checked with an optional SHA-256 pin before parsing.

use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::path::Path;

use super::pipeline::{AttributionModel, TrainedPipeline};
use super::preprocess::ColumnTransformer;
use super::trees::Classifier;
use crate::logic::error::{ArtifactError, AttributionError, PipelineError};
use crate::logic::explain::types::ShapOutput;
use crate::logic::features::layout::{self, FEATURE_LAYOUT};
use crate::logic::features::EmployeeRecord;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineArtifact {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub layout_hash: Option<u32>,
    #[serde(default)]
    pub trained_at: Option<chrono::DateTime<chrono::Utc>>,
    pub preprocessing: ColumnTransformer,
    pub classifier: Classifier,
}

fn default_name() -> String {
    "unnamed-pipeline".to_string()
}

/// Loaded, validated pipeline. Immutable after construction.
#[derive(Debug, Clone)]
pub struct ArtifactPipeline {
    artifact: PipelineArtifact,
    feature_names: Vec<String>,
}

impl ArtifactPipeline {
    pub fn from_artifact(artifact: PipelineArtifact) -> Result<Self, ArtifactError> {
        if let Some(hash) = artifact.layout_hash {
            layout::validate_layout(hash)?;
        }

        artifact.preprocessing.validate()?;
        check_schema_coverage(&artifact.preprocessing)?;

        let feature_names = artifact.preprocessing.feature_names_out();
        artifact.classifier.validate(feature_names.len())?;

        log::debug!(
            "Pipeline '{}': {} transformed features, {} trees",
            artifact.name,
            feature_names.len(),
            artifact.classifier.trees().len()
        );

        Ok(Self { artifact, feature_names })
    }

    pub fn from_json(content: &str) -> Result<Self, ArtifactError> {
        let artifact: PipelineArtifact = serde_json::from_str(content)?;
        Self::from_artifact(artifact)
    }

    /// Load from disk, verifying the SHA-256 pin when given (or when a
    /// `<artifact>.sha256` sidecar exists)
    pub fn load(path: &Path, expected_sha256: Option<&str>) -> Result<Self, ArtifactError> {
        let bytes = std::fs::read(path).map_err(|source| ArtifactError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let sidecar = sidecar_checksum(path);
        if let Some(expected) = expected_sha256.map(str::to_string).or(sidecar) {
            verify_checksum(&bytes, &expected)?;
            log::info!("Artifact checksum verified ({})", path.display());
        }

        let artifact: PipelineArtifact = serde_json::from_slice(&bytes)?;
        Self::from_artifact(artifact)
    }

    pub fn artifact(&self) -> &PipelineArtifact {
        &self.artifact
    }

    pub fn classifier(&self) -> &Classifier {
        &self.artifact.classifier
    }
}

impl TrainedPipeline for ArtifactPipeline {
    fn name(&self) -> &str {
        &self.artifact.name
    }

    fn transform(&self, record: &EmployeeRecord) -> Result<Array1<f64>, PipelineError> {
        self.artifact.preprocessing.transform(record)
    }

    fn predict_proba(&self, transformed: &Array1<f64>) -> Result<Vec<f64>, PipelineError> {
        self.artifact
            .classifier
            .predict_proba(transformed.view(), self.feature_names.len())
    }

    fn feature_names_out(&self) -> &[String] {
        &self.feature_names
    }

    fn known_categories(&self, attribute: &str) -> Option<Vec<String>> {
        self.artifact.preprocessing.categories_for(attribute).map(<[String]>::to_vec)
    }

    fn attribution_model(&self) -> Option<&dyn AttributionModel> {
        Some(self)
    }
}

impl AttributionModel for ArtifactPipeline {
    fn shap_values(&self, transformed: ArrayView1<f64>) -> Result<ShapOutput, AttributionError> {
        if transformed.len() != self.feature_names.len() {
            return Err(AttributionError::LengthMismatch {
                expected: self.feature_names.len(),
                actual: transformed.len(),
            });
        }
        self.artifact.classifier.shap_values(transformed)
    }
}

// ============================================================================
// CHECKS
// ============================================================================

/// Transformer inputs must be exactly the schema attributes, with matching kinds
fn check_schema_coverage(transformer: &ColumnTransformer) -> Result<(), ArtifactError> {
    let numeric: BTreeSet<&str> = transformer.numeric.columns.iter().map(String::as_str).collect();
    let categorical: BTreeSet<&str> = transformer.categorical.columns.iter().map(String::as_str).collect();

    if transformer.input_columns().count() != numeric.len() + categorical.len() {
        return Err(ArtifactError::Invalid("duplicate transformer columns".into()));
    }

    for spec in FEATURE_LAYOUT {
        let covered = match spec.kind {
            layout::AttributeKind::Numeric => numeric.contains(spec.name),
            layout::AttributeKind::Categorical => categorical.contains(spec.name),
        };
        if !covered {
            return Err(ArtifactError::Invalid(format!(
                "attribute `{}` is not handled as {:?}",
                spec.name, spec.kind
            )));
        }
    }

    if let Some(extra) = transformer.input_columns().find(|c| layout::attribute(c).is_none()) {
        return Err(ArtifactError::Invalid(format!("column `{}` is not in the schema", extra)));
    }

    Ok(())
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

pub fn verify_checksum(bytes: &[u8], expected: &str) -> Result<(), ArtifactError> {
    let actual = sha256_hex(bytes);
    let expected = expected.trim().to_lowercase();

    if actual != expected {
        return Err(ArtifactError::ChecksumMismatch { expected, actual });
    }
    Ok(())
}

/// First token of `<artifact>.sha256` (the `sha256sum` output format)
fn sidecar_checksum(path: &Path) -> Option<String> {
    let mut sidecar = path.as_os_str().to_owned();
    sidecar.push(".sha256");

    std::fs::read_to_string(&sidecar)
        .ok()
        .and_then(|s| s.split_whitespace().next().map(str::to_string))
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub const DEMO_ARTIFACT: &str = include_str!("../../../models/demo_pipeline.json");

    pub fn demo_pipeline() -> ArtifactPipeline {
        ArtifactPipeline::from_json(DEMO_ARTIFACT).expect("demo artifact is valid")
    }
}
