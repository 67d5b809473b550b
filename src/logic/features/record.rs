use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::layout::{AttributeKind, FEATURE_LAYOUT};
use crate::logic::error::PipelineError;

/// Raw form input: field name → submitted text
pub type RawInput = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Numeric(f64),
    Category(String),
}

impl AttributeValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Numeric(v) => Some(*v),
            AttributeValue::Category(_) => None,
        }
    }

    pub fn as_category(&self) -> Option<&str> {
        match self {
            AttributeValue::Category(s) => Some(s),
            AttributeValue::Numeric(_) => None,
        }
    }

    pub fn kind(&self) -> AttributeKind {
        match self {
            AttributeValue::Numeric(_) => AttributeKind::Numeric,
            AttributeValue::Category(_) => AttributeKind::Categorical,
        }
    }
}

impl std::fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttributeValue::Numeric(v) => write!(f, "{:?}", v),
            AttributeValue::Category(s) => f.write_str(s),
        }
    }
}

/// Ordered attribute → value mapping for one employee.
///
/// Entries keep insertion order; `canonical()` projects them onto the
/// schema order the preprocessing transform expects.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmployeeRecord {
    entries: Vec<(String, AttributeValue)>,
}

impl EmployeeRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a value
    pub fn set(&mut self, name: &str, value: AttributeValue) {
        match self.entries.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name.to_string(), value)),
        }
    }

    pub fn with(mut self, name: &str, value: AttributeValue) -> Self {
        self.set(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Values in schema order; every schema attribute must be present with
    /// the schema's kind.
    pub fn canonical(&self) -> Result<Vec<&AttributeValue>, PipelineError> {
        FEATURE_LAYOUT
            .iter()
            .map(|spec| {
                let value = self
                    .get(spec.name)
                    .ok_or_else(|| PipelineError::MissingColumn(spec.name.to_string()))?;
                if value.kind() != spec.kind {
                    return Err(PipelineError::TypeMismatch {
                        column: spec.name.to_string(),
                        expected: match spec.kind {
                            AttributeKind::Numeric => "numeric",
                            AttributeKind::Categorical => "categorical",
                        },
                    });
                }
                Ok(value)
            })
            .collect()
    }

    /// Record re-ordered into schema order (extra entries dropped)
    pub fn to_canonical(&self) -> Result<EmployeeRecord, PipelineError> {
        let values = self.canonical()?;
        Ok(EmployeeRecord {
            entries: FEATURE_LAYOUT
                .iter()
                .zip(values)
                .map(|(spec, v)| (spec.name.to_string(), v.clone()))
                .collect(),
        })
    }

    /// String echo of the record for display, in entry order
    pub fn to_display_pairs(&self) -> Vec<(String, String)> {
        self.entries
            .iter()
            .map(|(n, v)| (n.clone(), v.to_string()))
            .collect()
    }
}
