//! Preprocessing Transform
//!
//! Column transformer with two families:
//! - numeric: standard scaling `(x - mean) / scale`, names `<prefix>__<column>`
//! - categorical: one-hot encoding, names `<prefix>__<column>_<category>`
//!
//! Numeric block comes first, then the categorical block.

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::logic::error::{ArtifactError, PipelineError};
use crate::logic::features::EmployeeRecord;

pub const FEATURE_NAME_DELIMITER: &str = "__";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NumericBlock {
    #[serde(default = "default_numeric_prefix")]
    pub prefix: String,
    pub columns: Vec<String>,
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandleUnknown {
    #[default]
    Error,
    /// All-zero encoding for unseen categories
    Ignore,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoricalBlock {
    #[serde(default = "default_categorical_prefix")]
    pub prefix: String,
    pub columns: Vec<String>,
    pub categories: Vec<Vec<String>>,
    #[serde(default)]
    pub handle_unknown: HandleUnknown,
}

fn default_numeric_prefix() -> String {
    "num".to_string()
}

fn default_categorical_prefix() -> String {
    "cat".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnTransformer {
    pub numeric: NumericBlock,
    pub categorical: CategoricalBlock,
}

impl ColumnTransformer {
    /// Structural checks run once at load
    pub fn validate(&self) -> Result<(), ArtifactError> {
        let n = &self.numeric;
        if n.mean.len() != n.columns.len() || n.scale.len() != n.columns.len() {
            return Err(ArtifactError::Invalid(format!(
                "numeric block has {} columns, {} means, {} scales",
                n.columns.len(),
                n.mean.len(),
                n.scale.len()
            )));
        }
        if n.scale.iter().any(|s| !s.is_finite() || *s == 0.0) || n.mean.iter().any(|m| !m.is_finite()) {
            return Err(ArtifactError::Invalid("numeric block has zero or non-finite scaling".into()));
        }

        let c = &self.categorical;
        if c.categories.len() != c.columns.len() {
            return Err(ArtifactError::Invalid(format!(
                "categorical block has {} columns but {} category lists",
                c.columns.len(),
                c.categories.len()
            )));
        }
        if c.categories.iter().any(|cats| cats.is_empty()) {
            return Err(ArtifactError::Invalid("categorical column without categories".into()));
        }

        Ok(())
    }

    pub fn input_columns(&self) -> impl Iterator<Item = &str> {
        self.numeric
            .columns
            .iter()
            .chain(self.categorical.columns.iter())
            .map(String::as_str)
    }

    pub fn output_width(&self) -> usize {
        self.numeric.columns.len() + self.categorical.categories.iter().map(Vec::len).sum::<usize>()
    }

    pub fn feature_names_out(&self) -> Vec<String> {
        let numeric = self
            .numeric
            .columns
            .iter()
            .map(|col| format!("{}{}{}", self.numeric.prefix, FEATURE_NAME_DELIMITER, col));

        let categorical = self
            .categorical
            .columns
            .iter()
            .zip(&self.categorical.categories)
            .flat_map(|(col, cats)| {
                cats.iter().map(move |cat| {
                    format!("{}{}{}_{}", self.categorical.prefix, FEATURE_NAME_DELIMITER, col, cat)
                })
            });

        numeric.chain(categorical).collect()
    }

    pub fn categories_for(&self, column: &str) -> Option<&[String]> {
        self.categorical
            .columns
            .iter()
            .position(|c| c == column)
            .map(|i| self.categorical.categories[i].as_slice())
    }

    pub fn transform(&self, record: &EmployeeRecord) -> Result<Array1<f64>, PipelineError> {
        let mut out = Vec::with_capacity(self.output_width());

        let n = &self.numeric;
        for ((column, mean), scale) in n.columns.iter().zip(&n.mean).zip(&n.scale) {
            let value = record
                .get(column)
                .ok_or_else(|| PipelineError::MissingColumn(column.clone()))?
                .as_f64()
                .ok_or_else(|| PipelineError::TypeMismatch {
                    column: column.clone(),
                    expected: "numeric",
                })?;
            if !value.is_finite() {
                return Err(PipelineError::NonFinite(column.clone()));
            }
            out.push((value - mean) / scale);
        }

        let c = &self.categorical;
        for (column, categories) in c.columns.iter().zip(&c.categories) {
            let value = record
                .get(column)
                .ok_or_else(|| PipelineError::MissingColumn(column.clone()))?
                .as_category()
                .ok_or_else(|| PipelineError::TypeMismatch {
                    column: column.clone(),
                    expected: "categorical",
                })?;

            let hot = categories.iter().position(|cat| cat == value);
            if hot.is_none() && c.handle_unknown == HandleUnknown::Error {
                return Err(PipelineError::UnknownCategory {
                    column: column.clone(),
                    value: value.to_string(),
                });
            }

            out.extend((0..categories.len()).map(|i| if Some(i) == hot { 1.0 } else { 0.0 }));
        }

        Ok(Array1::from_vec(out))
    }
}
