//! Narrative Request Builder
//!
//! Turns a prediction into a bounded plain-text prompt asking for
//! retention recommendations.

use serde::Serialize;

use crate::logic::explain::AttributionItem;
use crate::logic::features::EmployeeRecord;

/// Longest raw value copied into the prompt (characters)
pub const CONTEXT_VALUE_LIMIT: usize = 64;

/// Attributes echoed for context, with their prompt labels
const CONTEXT_FIELDS: &[(&str, &str)] = &[
    ("Age", "Age"),
    ("JobRole", "Job Role"),
    ("MaritalStatus", "Marital Status"),
    ("OverTime", "OverTime"),
    ("YearsAtCompany", "Years at Company"),
    ("JobSatisfaction", "Job Satisfaction (1–4)"),
    ("EnvironmentSatisfaction", "Environment Satisfaction (1–4)"),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NarrativeRequest {
    pub prompt: String,
    pub max_output_tokens: u32,
}

pub fn build_prompt(
    probability_percent: f64,
    top_factors: &[AttributionItem],
    record: &EmployeeRecord,
    max_output_tokens: u32,
) -> NarrativeRequest {
    let context = CONTEXT_FIELDS
        .iter()
        .map(|(name, label)| {
            let value = record
                .get(name)
                .map(|v| clip(&v.to_string(), CONTEXT_VALUE_LIMIT))
                .unwrap_or_else(|| "n/a".to_string());
            format!("{}: {}", label, value)
        })
        .collect::<Vec<_>>()
        .join("\n");

    let drivers = if top_factors.is_empty() {
        "- (no dominant factors)".to_string()
    } else {
        top_factors
            .iter()
            .map(|item| {
                format!(
                    "- {} ({} attrition risk, contribution = {:+.3})",
                    clip(&item.display_name, CONTEXT_VALUE_LIMIT),
                    item.direction.as_str(),
                    item.value
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    let prompt = format!(
        "You are an HR analytics assistant. You help HR managers interpret an attrition \
prediction and decide practical next steps.

Prediction:
- Probability that the employee will leave: {probability:.2}%

Employee context:
{context}

Top factors driving the prediction:
{drivers}

Task:
Write 4–6 concrete and ethical recommendations for HR on how to reduce attrition risk for THIS employee.

Guidelines:
- Be specific and practical (e.g., \"schedule a 1:1 conversation about workload within 2 weeks\").
- Tie each recommendation back to a driving factor where relevant (e.g., frequent overtime → rebalance workload).
- Keep it HR-friendly: no technical jargon, no mention of statistical methods, models or machine learning.
- Use short bullet points.",
        probability = probability_percent,
        context = context,
        drivers = drivers,
    );

    NarrativeRequest { prompt, max_output_tokens }
}

fn clip(value: &str, limit: usize) -> String {
    value.chars().take(limit).collect()
}
