//! Attrition Analysis - end-to-end request handling
//!
//! normalize → predict → explain → narrate. Each request is independent;
//! the pipeline is shared read-only.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::constants::{DEFAULT_MAX_OUTPUT_TOKENS, TOP_FACTORS};
use crate::logic::error::AttritionError;
use crate::logic::explain::{explain_inference, Attribution, NameMapper, PredictionResult};
use crate::logic::features::layout::{AttributeKind, FEATURE_LAYOUT};
use crate::logic::features::{NormalizedRecord, Normalizer, RawInput, Substitution, SubstitutionTable};
use crate::logic::model::{inference, Inference, TrainedPipeline};
use crate::logic::narrative::{build_prompt, narrate, NarrativeGenerator};

/// Numeric outcome of one request, before narration
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub normalized: NormalizedRecord,
    pub inference: Inference,
    pub attribution: Attribution,
    pub result: PredictionResult,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InputField {
    pub name: String,
    pub value: String,
}

/// Everything the presentation layer needs for one request
#[derive(Debug, Clone, Serialize)]
pub struct PredictionReport {
    pub request_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub result: PredictionResult,
    pub narrative: String,
    pub narrative_generated: bool,
    pub substitutions: Vec<Substitution>,
    /// Normalized input echoed back, schema order
    pub input: Vec<InputField>,
}

pub struct AttritionAnalyzer {
    pipeline: Arc<dyn TrainedPipeline>,
    normalizer: Normalizer,
    names: NameMapper,
    narrator: Box<dyn NarrativeGenerator>,
    max_output_tokens: u32,
}

impl AttritionAnalyzer {
    /// Validation vocabularies follow the pipeline's encoder when it exposes them
    pub fn new(
        pipeline: Arc<dyn TrainedPipeline>,
        table: SubstitutionTable,
        narrator: Box<dyn NarrativeGenerator>,
    ) -> Self {
        let mut normalizer = Normalizer::new(table);
        for spec in FEATURE_LAYOUT.iter().filter(|s| s.kind == AttributeKind::Categorical) {
            if let Some(categories) = pipeline.known_categories(spec.name) {
                normalizer = normalizer.with_vocabulary(spec.name, categories);
            }
        }

        Self {
            pipeline,
            normalizer,
            names: NameMapper::default(),
            narrator,
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
        }
    }

    pub fn with_names(mut self, names: NameMapper) -> Self {
        self.names = names;
        self
    }

    pub fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = max_output_tokens;
        self
    }

    pub fn pipeline(&self) -> &Arc<dyn TrainedPipeline> {
        &self.pipeline
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    /// Probability and attribution without narration
    pub fn evaluate(&self, raw: &RawInput) -> Result<Evaluation, AttritionError> {
        let normalized = self.normalizer.normalize(raw)?;
        let inference = inference::predict(&normalized.record, self.pipeline.as_ref())?;
        let attribution = explain_inference(&inference, self.pipeline.as_ref(), &self.names)?;

        let top_factors = attribution.top_factors(TOP_FACTORS);
        log::debug!(
            "p={:.2}% top factors: {}",
            inference.probability_percent,
            top_factors
                .iter()
                .map(|f| format!("{} ({:+.3})", f.display_name, f.value))
                .collect::<Vec<_>>()
                .join(", ")
        );

        let result = PredictionResult {
            probability_percent: inference.probability_percent,
            top_factors,
        };

        Ok(Evaluation { normalized, inference, attribution, result })
    }

    pub fn analyze(&self, raw: &RawInput) -> Result<PredictionReport, AttritionError> {
        let Evaluation { normalized, result, .. } = self.evaluate(raw)?;

        let request = build_prompt(
            result.probability_percent,
            &result.top_factors,
            &normalized.record,
            self.max_output_tokens,
        );
        let narrative = narrate(self.narrator.as_ref(), &request);

        let input = normalized
            .record
            .to_display_pairs()
            .into_iter()
            .map(|(name, value)| InputField { name, value })
            .collect();

        Ok(PredictionReport {
            request_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            result,
            narrative: narrative.text,
            narrative_generated: narrative.generated,
            substitutions: normalized.substitutions,
            input,
        })
    }
}
