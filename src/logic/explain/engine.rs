use ndarray::ArrayView1;

use super::names::NameMapper;
use super::types::AttributionItem;
use crate::logic::error::AttributionError;
use crate::logic::model::{AttributionModel, Inference, TrainedPipeline, POSITIVE_CLASS};

/// Every contribution for one prediction, in transformed-feature order
#[derive(Debug, Clone, PartialEq)]
pub struct Attribution {
    pub items: Vec<AttributionItem>,
    pub expected_value: f64,
}

impl Attribution {
    pub fn top_factors(&self, k: usize) -> Vec<AttributionItem> {
        top_factors(&self.items, k)
    }

    /// `expected_value + Σ values`, the model output being explained
    pub fn reconstructed_output(&self) -> f64 {
        self.expected_value + self.items.iter().map(|item| item.value).sum::<f64>()
    }
}

pub fn explain(
    transformed: ArrayView1<f64>,
    feature_names: &[String],
    model: &dyn AttributionModel,
    names: &NameMapper,
) -> Result<Attribution, AttributionError> {
    if transformed.len() != feature_names.len() {
        return Err(AttributionError::LengthMismatch {
            expected: feature_names.len(),
            actual: transformed.len(),
        });
    }

    // Positive class only; per-class sets are never mixed
    let contributions = model.shap_values(transformed)?.for_class(POSITIVE_CLASS)?;

    if contributions.values.len() != feature_names.len() {
        return Err(AttributionError::LengthMismatch {
            expected: feature_names.len(),
            actual: contributions.values.len(),
        });
    }
    if !contributions.expected_value.is_finite() || contributions.values.iter().any(|v| !v.is_finite()) {
        return Err(AttributionError::NonFinite);
    }

    let items = feature_names
        .iter()
        .zip(contributions.values.iter())
        .map(|(raw, &value)| AttributionItem::new(raw, names.display_name(raw), value))
        .collect();

    Ok(Attribution {
        items,
        expected_value: contributions.expected_value,
    })
}

/// Explain an inference with the attribution model its pipeline exposes
pub fn explain_inference(
    inference: &Inference,
    pipeline: &dyn TrainedPipeline,
    names: &NameMapper,
) -> Result<Attribution, AttributionError> {
    let model = pipeline.attribution_model().ok_or(AttributionError::Unsupported)?;
    explain(inference.transformed.view(), &inference.feature_names, model, names)
}

/// Largest `k` by magnitude. Stable, so ties keep transformed order.
pub fn top_factors(items: &[AttributionItem], k: usize) -> Vec<AttributionItem> {
    let mut sorted = items.to_vec();
    sorted.sort_by(|a, b| b.magnitude.total_cmp(&a.magnitude));
    sorted.truncate(k);
    sorted
}
