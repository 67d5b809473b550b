use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::logic::error::AttributionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Increases,
    Decreases,
}

impl Direction {
    /// Strictly positive contributions increase risk; zero counts as decreasing
    pub fn of(value: f64) -> Self {
        if value > 0.0 {
            Direction::Increases
        } else {
            Direction::Decreases
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Increases => "increases",
            Direction::Decreases => "decreases",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributionItem {
    pub raw_name: String,
    pub display_name: String,
    pub value: f64,
    pub magnitude: f64, // |value|
    pub direction: Direction,
}

impl AttributionItem {
    pub fn new(raw_name: &str, display_name: String, value: f64) -> Self {
        Self {
            raw_name: raw_name.to_string(),
            display_name,
            value,
            magnitude: value.abs(),
            direction: Direction::of(value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub probability_percent: f64,
    pub top_factors: Vec<AttributionItem>,
}

/// Contributions for one model output plus its baseline, so that
/// `values.sum() + expected_value` reproduces the output.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassContributions {
    pub values: Array1<f64>,
    pub expected_value: f64,
}

/// Attribution methods return either one combined set (binary margin
/// models) or one set per class (probability-averaging models).
#[derive(Debug, Clone, PartialEq)]
pub enum ShapOutput {
    Single(ClassContributions),
    PerClass(Vec<ClassContributions>),
}

impl ShapOutput {
    /// Normalize to the contribution set of `class`. A single set already
    /// describes the positive class and is returned as is.
    pub fn for_class(self, class: usize) -> Result<ClassContributions, AttributionError> {
        match self {
            ShapOutput::Single(contributions) => Ok(contributions),
            ShapOutput::PerClass(mut per_class) => {
                let available = per_class.len();
                if class >= available {
                    return Err(AttributionError::MissingClass { index: class, available });
                }
                Ok(per_class.swap_remove(class))
            }
        }
    }
}
