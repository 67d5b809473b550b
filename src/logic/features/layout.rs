//! Feature Layout - Centralized Attribute Schema
//!
//! **CRITICAL: This file controls the input schema of the trained pipeline**
//!
//! ## Rules (NEVER break these):
//! 1. Add attribute → increment SCHEMA_VERSION
//! 2. Change order → increment SCHEMA_VERSION
//! 3. Remove attribute → increment SCHEMA_VERSION
//!
//! Artifacts record the layout hash they were trained against; a mismatch
//! is rejected at load time.

use crc32fast::Hasher;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// SCHEMA VERSION
// ============================================================================

/// Current schema version
/// MUST be incremented when the layout changes
pub const SCHEMA_VERSION: u8 = 1;

// ============================================================================
// ATTRIBUTE SPEC
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeKind {
    Numeric,
    Categorical,
}

#[derive(Debug, Clone, Copy)]
pub struct AttributeSpec {
    pub name: &'static str,
    pub label: &'static str,
    pub kind: AttributeKind,
    /// Categories the shipped encoder knows (categorical only)
    pub vocabulary: &'static [&'static str],
    /// Range observed in training data (numeric only, informational)
    pub typical_range: Option<(f64, f64)>,
}

const fn numeric(name: &'static str, label: &'static str, min: f64, max: f64) -> AttributeSpec {
    AttributeSpec {
        name,
        label,
        kind: AttributeKind::Numeric,
        vocabulary: &[],
        typical_range: Some((min, max)),
    }
}

const fn categorical(
    name: &'static str,
    label: &'static str,
    vocabulary: &'static [&'static str],
) -> AttributeSpec {
    AttributeSpec {
        name,
        label,
        kind: AttributeKind::Categorical,
        vocabulary,
        typical_range: None,
    }
}

pub const JOB_ROLES: &[&str] = &[
    "Healthcare Representative",
    "Human Resources",
    "Laboratory Technician",
    "Manager",
    "Manufacturing Director",
    "Research Director",
    "Research Scientist",
    "Sales Executive",
    "Sales Representative",
];

pub const MARITAL_STATUSES: &[&str] = &["Divorced", "Married", "Single"];

pub const OVERTIME_FLAGS: &[&str] = &["No", "Yes"];

// ============================================================================
// FEATURE LAYOUT (Authoritative source)
// ============================================================================

/// Attributes in the exact order the preprocessing transform expects them.
/// This is the SINGLE SOURCE OF TRUTH for the input schema.
pub const FEATURE_LAYOUT: &[AttributeSpec] = &[
    // === Numeric (0-10) ===
    numeric("Age", "Age", 18.0, 60.0),
    numeric("DistanceFromHome", "Distance From Home", 1.0, 29.0),
    numeric("EnvironmentSatisfaction", "Environment Satisfaction", 1.0, 4.0),
    numeric("JobLevel", "Job Level", 1.0, 5.0),
    numeric("JobSatisfaction", "Job Satisfaction", 1.0, 4.0),
    numeric("MonthlyIncome", "Monthly Income", 1009.0, 19999.0),
    numeric("NumCompaniesWorked", "Number of Companies Worked", 0.0, 9.0),
    numeric("TotalWorkingYears", "Total Working Years", 0.0, 40.0),
    numeric("YearsAtCompany", "Years at Company", 0.0, 40.0),
    numeric("YearsInCurrentRole", "Years in Current Role", 0.0, 18.0),
    numeric("YearsWithCurrManager", "Years with Current Manager", 0.0, 17.0),
    // === Categorical (11-13) ===
    categorical("JobRole", "Job Role", JOB_ROLES),
    categorical("MaritalStatus", "Marital Status", MARITAL_STATUSES),
    categorical("OverTime", "OverTime", OVERTIME_FLAGS),
];

/// Total number of attributes
/// IMPORTANT: Must match FEATURE_LAYOUT.len()!
pub const ATTRIBUTE_COUNT: usize = 14;

// ============================================================================
// LAYOUT HASH
// ============================================================================

/// Compute CRC32 hash of the attribute layout
/// Used to detect artifact/schema mismatches at load time
pub fn compute_layout_hash() -> u32 {
    let mut hasher = Hasher::new();

    hasher.update(&[SCHEMA_VERSION]);

    for spec in FEATURE_LAYOUT {
        hasher.update(spec.name.as_bytes());
        hasher.update(&[0]); // Separator
    }

    hasher.finalize()
}

static LAYOUT_HASH: Lazy<u32> = Lazy::new(compute_layout_hash);

/// Cached layout hash
pub fn layout_hash() -> u32 {
    *LAYOUT_HASH
}

// ============================================================================
// LAYOUT INFO
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeInfo {
    pub name: String,
    pub label: String,
    pub kind: AttributeKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vocabulary: Vec<String>,
}

/// Complete layout information for serialization/logging
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutInfo {
    pub version: u8,
    pub hash: u32,
    pub attribute_count: usize,
    pub attributes: Vec<AttributeInfo>,
}

impl LayoutInfo {
    pub fn current() -> Self {
        Self {
            version: SCHEMA_VERSION,
            hash: layout_hash(),
            attribute_count: ATTRIBUTE_COUNT,
            attributes: FEATURE_LAYOUT
                .iter()
                .map(|spec| AttributeInfo {
                    name: spec.name.to_string(),
                    label: spec.label.to_string(),
                    kind: spec.kind,
                    vocabulary: spec.vocabulary.iter().map(|s| s.to_string()).collect(),
                })
                .collect(),
        }
    }
}

impl Default for LayoutInfo {
    fn default() -> Self {
        Self::current()
    }
}

// ============================================================================
// LAYOUT VALIDATION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("feature layout mismatch: expected hash {expected_hash:08x}, artifact has {actual_hash:08x}")]
pub struct LayoutMismatchError {
    pub expected_hash: u32,
    pub actual_hash: u32,
}

/// Validate that an artifact was trained against the current layout
pub fn validate_layout(incoming_hash: u32) -> Result<(), LayoutMismatchError> {
    let current_hash = layout_hash();

    if incoming_hash != current_hash {
        return Err(LayoutMismatchError {
            expected_hash: current_hash,
            actual_hash: incoming_hash,
        });
    }

    Ok(())
}

// ============================================================================
// LOOKUP
// ============================================================================

/// Get attribute index by name (O(n) but attributes are few)
pub fn attribute_index(name: &str) -> Option<usize> {
    FEATURE_LAYOUT.iter().position(|spec| spec.name == name)
}

pub fn attribute(name: &str) -> Option<&'static AttributeSpec> {
    FEATURE_LAYOUT.iter().find(|spec| spec.name == name)
}

/// Human-readable label for a schema attribute
pub fn pretty_label(name: &str) -> Option<&'static str> {
    attribute(name).map(|spec| spec.label)
}

/// Pretty label, or the name itself when none is registered
pub fn label_or_name(name: &str) -> &str {
    pretty_label(name).unwrap_or(name)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_count() {
        assert_eq!(ATTRIBUTE_COUNT, 14);
        assert_eq!(FEATURE_LAYOUT.len(), ATTRIBUTE_COUNT);
    }

    #[test]
    fn test_numeric_before_categorical() {
        let first_categorical = FEATURE_LAYOUT
            .iter()
            .position(|s| s.kind == AttributeKind::Categorical)
            .unwrap();
        assert_eq!(first_categorical, 11);
        assert!(FEATURE_LAYOUT[first_categorical..]
            .iter()
            .all(|s| s.kind == AttributeKind::Categorical && !s.vocabulary.is_empty()));
    }

    #[test]
    fn test_layout_hash_consistency() {
        assert_eq!(compute_layout_hash(), compute_layout_hash());
        assert_ne!(layout_hash(), 0);
    }

    #[test]
    fn test_validate_layout() {
        assert!(validate_layout(layout_hash()).is_ok());

        let err = validate_layout(layout_hash().wrapping_add(1)).unwrap_err();
        assert_eq!(err.expected_hash, layout_hash());
    }

    #[test]
    fn test_attribute_index() {
        assert_eq!(attribute_index("Age"), Some(0));
        assert_eq!(attribute_index("YearsWithCurrManager"), Some(10));
        assert_eq!(attribute_index("OverTime"), Some(13));
        assert_eq!(attribute_index("Salary"), None);
    }

    #[test]
    fn test_pretty_labels() {
        assert_eq!(pretty_label("NumCompaniesWorked"), Some("Number of Companies Worked"));
        assert_eq!(pretty_label("OverTime"), Some("OverTime"));
        assert_eq!(label_or_name("JobSatisfaction"), "Job Satisfaction");
        assert_eq!(label_or_name("Bonus"), "Bonus");
    }

    #[test]
    fn test_layout_info() {
        let info = LayoutInfo::current();
        assert_eq!(info.version, SCHEMA_VERSION);
        assert_eq!(info.attributes.len(), ATTRIBUTE_COUNT);
        assert_eq!(info.attributes[12].vocabulary, vec!["Divorced", "Married", "Single"]);
        assert!(info.attributes[0].vocabulary.is_empty());
    }
}
