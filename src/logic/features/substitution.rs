//! Category Substitution Table
//!
//! Maps categories the trained encoder has never seen onto a supported
//! category of the same family. Built-in table covers the single known case;
//! operators extend it with a JSON file, no code change needed.
//!
//! ```json
//! { "JobRole": { "substitutes": { "Developer": "Research Scientist" }, "fallback": null } }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::logic::error::ConfigError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttributeRules {
    /// Exact value → substitute
    #[serde(default)]
    pub substitutes: BTreeMap<String, String>,
    /// Used for any other unknown value
    #[serde(default)]
    pub fallback: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubstitutionRule {
    Explicit,
    Fallback,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubstitutionTable {
    rules: BTreeMap<String, AttributeRules>,
}

impl SubstitutionTable {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Built-in table shipped with the engine
    pub fn builtin() -> Self {
        Self::empty().with_substitute("JobRole", "Developer", "Research Scientist")
    }

    pub fn with_substitute(mut self, attribute: &str, from: &str, to: &str) -> Self {
        self.rules
            .entry(attribute.to_string())
            .or_default()
            .substitutes
            .insert(from.to_string(), to.to_string());
        self
    }

    pub fn with_fallback(mut self, attribute: &str, to: &str) -> Self {
        self.rules.entry(attribute.to_string()).or_default().fallback = Some(to.to_string());
        self
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Overlay `other` on top of self; other's rules win per key
    pub fn merge(mut self, other: SubstitutionTable) -> Self {
        for (attribute, incoming) in other.rules {
            let rules = self.rules.entry(attribute).or_default();
            rules.substitutes.extend(incoming.substitutes);
            if incoming.fallback.is_some() {
                rules.fallback = incoming.fallback;
            }
        }
        self
    }

    pub fn substitute(&self, attribute: &str, value: &str) -> Option<&str> {
        self.rules
            .get(attribute)
            .and_then(|r| r.substitutes.get(value))
            .map(String::as_str)
    }

    pub fn fallback(&self, attribute: &str) -> Option<&str> {
        self.rules.get(attribute).and_then(|r| r.fallback.as_deref())
    }

    pub fn rules(&self, attribute: &str) -> Option<&AttributeRules> {
        self.rules.get(attribute)
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
