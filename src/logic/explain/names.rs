//! Transformed feature name → display name
//!
//! `num__Age` → "Age", `cat__JobRole_Research_Scientist` →
//! "Job Role = Research Scientist".

use crate::logic::features::layout::label_or_name;
use crate::logic::model::preprocess::FEATURE_NAME_DELIMITER;

/// Separator between attribute and category inside a one-hot name
const CATEGORY_SEPARATOR: char = '_';

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameMapper {
    pub numeric_prefixes: Vec<String>,
    pub categorical_prefixes: Vec<String>,
}

impl Default for NameMapper {
    fn default() -> Self {
        Self {
            numeric_prefixes: vec!["num".into(), "numeric".into()],
            categorical_prefixes: vec!["cat".into(), "categorical".into()],
        }
    }
}

impl NameMapper {
    pub fn display_name(&self, raw: &str) -> String {
        let (prefix, rest) = raw.split_once(FEATURE_NAME_DELIMITER).unwrap_or(("", raw));

        if self.numeric_prefixes.iter().any(|p| p == prefix) {
            return label_or_name(rest).to_string();
        }

        if self.categorical_prefixes.iter().any(|p| p == prefix) {
            let (base, category) = rest.split_once(CATEGORY_SEPARATOR).unwrap_or((rest, ""));
            let label = label_or_name(base);
            if category.is_empty() {
                return label.to_string();
            }
            return format!("{} = {}", label, category.replace(CATEGORY_SEPARATOR, " "));
        }

        label_or_name(rest).to_string()
    }
}
