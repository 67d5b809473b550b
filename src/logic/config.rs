//! Configuration module
//!
//! Runtime settings come from environment variables (see `constants`);
//! the substitution table may additionally be loaded from a JSON file.

use std::path::PathBuf;

use crate::constants;
use crate::logic::error::ConfigError;
use crate::logic::features::SubstitutionTable;
use crate::logic::narrative::{DisabledGenerator, NarrativeGenerator, ResponsesClient};

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Pipeline artifact path
    pub model_path: PathBuf,

    /// Expected artifact SHA-256 (hex)
    pub model_sha256: Option<String>,

    /// Substitution table override file
    pub substitutions_path: Option<PathBuf>,

    pub narrative: NarrativeConfig,
}

/// Narrative generator settings
#[derive(Debug, Clone)]
pub struct NarrativeConfig {
    pub enabled: bool,
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub max_output_tokens: u32,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for NarrativeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: None,
            base_url: constants::DEFAULT_NARRATIVE_URL.to_string(),
            model: constants::DEFAULT_NARRATIVE_MODEL.to_string(),
            max_output_tokens: constants::DEFAULT_MAX_OUTPUT_TOKENS,
            timeout_secs: constants::DEFAULT_NARRATIVE_TIMEOUT_SECS,
            max_retries: constants::DEFAULT_NARRATIVE_RETRIES,
            retry_backoff_ms: constants::DEFAULT_NARRATIVE_BACKOFF_MS,
        }
    }
}

impl NarrativeConfig {
    pub fn from_env() -> Self {
        Self {
            enabled: constants::is_narrative_enabled(),
            api_key: constants::get_narrative_api_key(),
            base_url: constants::get_narrative_url(),
            model: constants::get_narrative_model(),
            max_output_tokens: constants::get_max_output_tokens(),
            timeout_secs: constants::get_narrative_timeout(),
            max_retries: constants::get_narrative_retries(),
            retry_backoff_ms: constants::get_narrative_backoff(),
        }
    }

    /// Generator for these settings. Falls back to `DisabledGenerator`
    /// when narration is off or no API key is set.
    pub fn generator(&self) -> Box<dyn NarrativeGenerator> {
        if !self.enabled {
            log::info!("Narrative generation disabled");
            return Box::new(DisabledGenerator);
        }

        match ResponsesClient::from_config(self) {
            Ok(client) => {
                log::info!("Narrative generation via {} ({})", self.base_url, self.model);
                Box::new(client)
            }
            Err(e) => {
                log::warn!("Narrative generation unavailable: {}", e);
                Box::new(DisabledGenerator)
            }
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from(constants::DEFAULT_MODEL_PATH),
            model_sha256: None,
            substitutions_path: None,
            narrative: NarrativeConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            model_path: PathBuf::from(constants::get_model_path()),
            model_sha256: constants::get_model_sha256(),
            substitutions_path: constants::get_substitutions_path().map(PathBuf::from),
            narrative: NarrativeConfig::from_env(),
        }
    }

    /// Explicit override file, else `<config_dir>/attrition-core/substitutions.json` if present
    pub fn substitutions_file(&self) -> Option<PathBuf> {
        if let Some(path) = &self.substitutions_path {
            return Some(path.clone());
        }

        dirs::config_dir()
            .map(|dir| dir.join(constants::CONFIG_DIR_NAME).join(constants::SUBSTITUTIONS_FILE))
            .filter(|path| path.exists())
    }

    /// Built-in table with the configured file merged over it
    pub fn load_substitutions(&self) -> Result<SubstitutionTable, ConfigError> {
        let builtin = SubstitutionTable::builtin();

        match self.substitutions_file() {
            Some(path) => {
                let overrides = SubstitutionTable::from_file(&path)?;
                log::info!("Substitution rules loaded from {}", path.display());
                Ok(builtin.merge(overrides))
            }
            None => Ok(builtin),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.model_path, PathBuf::from("models/demo_pipeline.json"));
        assert_eq!(config.narrative.max_output_tokens, 350);
        assert_eq!(config.narrative.timeout_secs, 20);
        assert_eq!(config.narrative.max_retries, 1);
        assert_eq!(config.narrative.retry_backoff_ms, 500);
        assert!(config.narrative.enabled);
    }

    #[test]
    fn test_load_substitutions_merges_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("substitutions.json");
        std::fs::write(
            &path,
            r#"{ "JobRole": { "substitutes": { "Data Engineer": "Research Scientist" }, "fallback": "Manager" } }"#,
        )
        .unwrap();

        let config = EngineConfig { substitutions_path: Some(path), ..EngineConfig::default() };
        let table = config.load_substitutions().unwrap();

        assert_eq!(table.substitute("JobRole", "Data Engineer"), Some("Research Scientist"));
        assert_eq!(table.fallback("JobRole"), Some("Manager"));
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let config = EngineConfig {
            substitutions_path: Some(PathBuf::from("/nonexistent/substitutions.json")),
            ..EngineConfig::default()
        };
        assert!(matches!(config.load_substitutions(), Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_generator_selection() {
        let disabled = NarrativeConfig { enabled: false, api_key: Some("sk".into()), ..NarrativeConfig::default() };
        assert_eq!(disabled.generator().name(), "disabled");

        let keyless = NarrativeConfig::default();
        assert_eq!(keyless.generator().name(), "disabled");

        let configured = NarrativeConfig { api_key: Some("sk".into()), ..NarrativeConfig::default() };
        assert_eq!(configured.generator().name(), "gpt-4.1-mini");
    }
}
