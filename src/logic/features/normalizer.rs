//! Attribute Normalizer
//!
//! Raw form strings → schema-typed `EmployeeRecord` with known-vocabulary
//! categories. Numeric fields must parse as finite floats; categorical
//! fields go through the substitution table before vocabulary validation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::layout::{AttributeKind, AttributeSpec, FEATURE_LAYOUT};
use super::record::{AttributeValue, EmployeeRecord, RawInput};
use super::substitution::{SubstitutionRule, SubstitutionTable};
use crate::logic::error::InputValidationError;

const AUDIT_TARGET: &str = "attrition::audit";

/// One applied category substitution (kept for audit)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Substitution {
    pub attribute: String,
    pub original: String,
    pub substitute: String,
    pub rule: SubstitutionRule,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRecord {
    pub record: EmployeeRecord,
    pub substitutions: Vec<Substitution>,
}

#[derive(Debug, Clone)]
pub struct Normalizer {
    table: SubstitutionTable,
    vocabulary: BTreeMap<String, Vec<String>>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(SubstitutionTable::builtin())
    }
}

impl Normalizer {
    /// Normalizer validating against the schema's default vocabularies
    pub fn new(table: SubstitutionTable) -> Self {
        let vocabulary = FEATURE_LAYOUT
            .iter()
            .filter(|spec| spec.kind == AttributeKind::Categorical)
            .map(|spec| {
                (
                    spec.name.to_string(),
                    spec.vocabulary.iter().map(|s| s.to_string()).collect(),
                )
            })
            .collect();

        Self { table, vocabulary }
    }

    /// Replace the known categories of one attribute (e.g. with the
    /// categories the loaded encoder was fitted on)
    pub fn with_vocabulary(mut self, attribute: &str, categories: Vec<String>) -> Self {
        self.vocabulary.insert(attribute.to_string(), categories);
        self
    }

    pub fn table(&self) -> &SubstitutionTable {
        &self.table
    }

    pub fn is_known(&self, attribute: &str, value: &str) -> bool {
        self.vocabulary
            .get(attribute)
            .map(|vocab| vocab.iter().any(|v| v == value))
            .unwrap_or(false)
    }

    pub fn normalize(&self, raw: &RawInput) -> Result<NormalizedRecord, InputValidationError> {
        let mut record = EmployeeRecord::new();
        let mut substitutions = Vec::new();

        for spec in FEATURE_LAYOUT {
            let text = raw
                .get(spec.name)
                .map(|s| s.trim())
                .ok_or_else(|| InputValidationError::MissingField(spec.name.to_string()))?;

            let value = match spec.kind {
                AttributeKind::Numeric => AttributeValue::Numeric(parse_numeric(spec, text)?),
                AttributeKind::Categorical => {
                    let (category, substitution) = self.resolve_category(spec.name, text)?;
                    if let Some(sub) = substitution {
                        substitutions.push(sub);
                    }
                    AttributeValue::Category(category)
                }
            };

            record.set(spec.name, value);
        }

        for key in raw.keys().filter(|k| super::layout::attribute(k).is_none()) {
            log::debug!("Ignoring unknown input field `{}`", key);
        }

        Ok(NormalizedRecord { record, substitutions })
    }

    /// Explicit substitute first, then vocabulary check, then fallback.
    fn resolve_category(
        &self,
        attribute: &str,
        value: &str,
    ) -> Result<(String, Option<Substitution>), InputValidationError> {
        let (candidate, rule) = match self.table.substitute(attribute, value) {
            Some(sub) => (sub, Some(SubstitutionRule::Explicit)),
            None => (value, None),
        };

        if self.is_known(attribute, candidate) {
            return Ok((candidate.to_string(), rule.map(|r| self.audit(attribute, value, candidate, r))));
        }

        if rule.is_some() {
            return Err(InputValidationError::InvalidSubstitute {
                field: attribute.to_string(),
                substitute: candidate.to_string(),
            });
        }

        match self.table.fallback(attribute) {
            Some(fallback) if self.is_known(attribute, fallback) => Ok((
                fallback.to_string(),
                Some(self.audit(attribute, value, fallback, SubstitutionRule::Fallback)),
            )),
            Some(fallback) => Err(InputValidationError::InvalidSubstitute {
                field: attribute.to_string(),
                substitute: fallback.to_string(),
            }),
            None => Err(InputValidationError::UnknownCategory {
                field: attribute.to_string(),
                value: value.to_string(),
            }),
        }
    }

    fn audit(&self, attribute: &str, original: &str, substitute: &str, rule: SubstitutionRule) -> Substitution {
        log::info!(
            target: AUDIT_TARGET,
            "Substituted {} {:?} -> {:?} ({:?} rule)",
            attribute, original, substitute, rule
        );

        Substitution {
            attribute: attribute.to_string(),
            original: original.to_string(),
            substitute: substitute.to_string(),
            rule,
        }
    }
}

fn parse_numeric(spec: &AttributeSpec, text: &str) -> Result<f64, InputValidationError> {
    let value = text
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| InputValidationError::InvalidNumber {
            field: spec.name.to_string(),
            value: text.to_string(),
        })?;

    if let Some((min, max)) = spec.typical_range {
        if value < min || value > max {
            log::debug!(
                "{} = {} is outside the training range [{}, {}]",
                spec.name, value, min, max
            );
        }
    }

    Ok(value)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_raw() -> RawInput {
        [
            ("Age", "34"),
            ("DistanceFromHome", "7"),
            ("EnvironmentSatisfaction", "3"),
            ("JobLevel", "2"),
            ("JobSatisfaction", "4"),
            ("MonthlyIncome", "5400.50"),
            ("NumCompaniesWorked", "2"),
            ("TotalWorkingYears", "10"),
            ("YearsAtCompany", "5"),
            ("YearsInCurrentRole", "3"),
            ("YearsWithCurrManager", "2"),
            ("JobRole", "Sales Executive"),
            ("MaritalStatus", "Married"),
            ("OverTime", "No"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    #[test]
    fn test_normalize_valid_input() {
        let normalized = Normalizer::default().normalize(&sample_raw()).unwrap();
        let record = &normalized.record;

        assert_eq!(record.len(), 14);
        assert_eq!(record.get("MonthlyIncome").and_then(|v| v.as_f64()), Some(5400.5));
        assert_eq!(record.get("JobRole").and_then(|v| v.as_category()), Some("Sales Executive"));
        assert!(normalized.substitutions.is_empty());
        assert!(record.canonical().is_ok());
    }

    #[test]
    fn test_whitespace_is_trimmed() {
        let mut raw = sample_raw();
        raw.insert("Age".into(), "  29 ".into());
        raw.insert("OverTime".into(), " Yes".into());

        let record = Normalizer::default().normalize(&raw).unwrap().record;
        assert_eq!(record.get("Age").and_then(|v| v.as_f64()), Some(29.0));
        assert_eq!(record.get("OverTime").and_then(|v| v.as_category()), Some("Yes"));
    }

    #[test]
    fn test_missing_field() {
        let mut raw = sample_raw();
        raw.remove("YearsInCurrentRole");

        let err = Normalizer::default().normalize(&raw).unwrap_err();
        assert_eq!(err, InputValidationError::MissingField("YearsInCurrentRole".into()));
    }

    #[test]
    fn test_unparseable_number() {
        for bad in ["abc", "", "NaN", "inf"] {
            let mut raw = sample_raw();
            raw.insert("MonthlyIncome".into(), bad.into());

            let err = Normalizer::default().normalize(&raw).unwrap_err();
            assert!(
                matches!(err, InputValidationError::InvalidNumber { ref field, .. } if field == "MonthlyIncome"),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_developer_is_substituted() {
        let mut raw = sample_raw();
        raw.insert("JobRole".into(), "Developer".into());

        let normalized = Normalizer::default().normalize(&raw).unwrap();
        assert_eq!(
            normalized.record.get("JobRole").and_then(|v| v.as_category()),
            Some("Research Scientist")
        );
        assert_eq!(
            normalized.substitutions,
            vec![Substitution {
                attribute: "JobRole".into(),
                original: "Developer".into(),
                substitute: "Research Scientist".into(),
                rule: SubstitutionRule::Explicit,
            }]
        );
    }

    #[test]
    fn test_unknown_category_without_fallback() {
        let mut raw = sample_raw();
        raw.insert("MaritalStatus".into(), "Widowed".into());

        let err = Normalizer::default().normalize(&raw).unwrap_err();
        assert_eq!(
            err,
            InputValidationError::UnknownCategory {
                field: "MaritalStatus".into(),
                value: "Widowed".into()
            }
        );
    }

    #[test]
    fn test_fallback_applies_to_unlisted_values() {
        let table = SubstitutionTable::builtin().with_fallback("JobRole", "Laboratory Technician");
        let mut raw = sample_raw();
        raw.insert("JobRole".into(), "Astronaut".into());

        let normalized = Normalizer::new(table).normalize(&raw).unwrap();
        assert_eq!(normalized.substitutions[0].rule, SubstitutionRule::Fallback);
        assert_eq!(normalized.substitutions[0].substitute, "Laboratory Technician");
    }

    #[test]
    fn test_substitute_outside_vocabulary_is_rejected() {
        let table = SubstitutionTable::empty().with_substitute("JobRole", "Developer", "Engineer");
        let mut raw = sample_raw();
        raw.insert("JobRole".into(), "Developer".into());

        let err = Normalizer::new(table).normalize(&raw).unwrap_err();
        assert!(matches!(err, InputValidationError::InvalidSubstitute { .. }));
    }

    #[test]
    fn test_vocabulary_override() {
        let normalizer = Normalizer::default()
            .with_vocabulary("JobRole", vec!["Research Scientist".into(), "Engineer".into()]);
        let mut raw = sample_raw();
        raw.insert("JobRole".into(), "Engineer".into());

        assert!(normalizer.normalize(&raw).is_ok());
        raw.insert("JobRole".into(), "Sales Executive".into());
        assert!(normalizer.normalize(&raw).is_err());
    }

    #[test]
    fn test_out_of_range_values_are_accepted() {
        let mut raw = sample_raw();
        for spec in FEATURE_LAYOUT.iter().filter(|s| s.kind == AttributeKind::Numeric) {
            raw.insert(spec.name.to_string(), "0".into());
        }
        raw.insert("extra".into(), "ignored".into());

        let record = Normalizer::default().normalize(&raw).unwrap().record;
        assert_eq!(record.get("Age").and_then(|v| v.as_f64()), Some(0.0));
        assert!(record.get("extra").is_none());
    }
}
