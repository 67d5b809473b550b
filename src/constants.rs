//! Central Configuration Constants
//!
//! Single source of truth for all configuration defaults.
//! Environment variables override every value here.

/// Default pipeline artifact location (relative to the working directory)
pub const DEFAULT_MODEL_PATH: &str = "models/demo_pipeline.json";

/// Default narrative service base URL
pub const DEFAULT_NARRATIVE_URL: &str = "https://api.openai.com/v1";

/// Default narrative model
pub const DEFAULT_NARRATIVE_MODEL: &str = "gpt-4.1-mini";

/// Upper bound on generated narrative length (tokens)
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 350;

/// Narrative request timeout (seconds)
pub const DEFAULT_NARRATIVE_TIMEOUT_SECS: u64 = 20;

/// Retries on transient narrative failures
pub const DEFAULT_NARRATIVE_RETRIES: u32 = 1;

/// Backoff before the first retry (milliseconds), doubled per attempt
pub const DEFAULT_NARRATIVE_BACKOFF_MS: u64 = 500;

/// Ceiling for `NARRATIVE_MAX_RETRIES`
pub const MAX_NARRATIVE_RETRIES: u32 = 5;

/// Longest single wait between narrative retries (milliseconds)
pub const MAX_NARRATIVE_BACKOFF_MS: u64 = 10_000;

/// Number of attribution factors reported per prediction
pub const TOP_FACTORS: usize = 5;

/// Directory name under the platform config dir
pub const CONFIG_DIR_NAME: &str = "attrition-core";

/// Substitution table file name inside the config dir
pub const SUBSTITUTIONS_FILE: &str = "substitutions.json";

/// App version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// App name
pub const APP_NAME: &str = "Attrition Core";

// ============================================
// Helper functions to read from env with fallback
// ============================================

/// Get pipeline artifact path from environment or use default
pub fn get_model_path() -> String {
    std::env::var("ATTRITION_MODEL_PATH")
        .unwrap_or_else(|_| DEFAULT_MODEL_PATH.to_string())
}

/// Expected SHA-256 of the artifact, if pinned
pub fn get_model_sha256() -> Option<String> {
    non_empty_var("ATTRITION_MODEL_SHA256")
}

/// Substitution table override file, if any
pub fn get_substitutions_path() -> Option<String> {
    non_empty_var("ATTRITION_SUBSTITUTIONS")
}

/// Narrative API key
pub fn get_narrative_api_key() -> Option<String> {
    non_empty_var("OPENAI_API_KEY")
}

/// Get narrative base URL from environment or use default
pub fn get_narrative_url() -> String {
    std::env::var("NARRATIVE_BASE_URL")
        .unwrap_or_else(|_| DEFAULT_NARRATIVE_URL.to_string())
}

/// Get narrative model from environment or use default
pub fn get_narrative_model() -> String {
    std::env::var("NARRATIVE_MODEL")
        .unwrap_or_else(|_| DEFAULT_NARRATIVE_MODEL.to_string())
}

pub fn get_max_output_tokens() -> u32 {
    parsed_var("NARRATIVE_MAX_OUTPUT_TOKENS").unwrap_or(DEFAULT_MAX_OUTPUT_TOKENS)
}

pub fn get_narrative_timeout() -> u64 {
    parsed_var("NARRATIVE_TIMEOUT_SECS").unwrap_or(DEFAULT_NARRATIVE_TIMEOUT_SECS)
}

pub fn get_narrative_retries() -> u32 {
    parsed_var("NARRATIVE_MAX_RETRIES")
        .unwrap_or(DEFAULT_NARRATIVE_RETRIES)
        .min(MAX_NARRATIVE_RETRIES)
}

pub fn get_narrative_backoff() -> u64 {
    parsed_var("NARRATIVE_RETRY_BACKOFF_MS").unwrap_or(DEFAULT_NARRATIVE_BACKOFF_MS)
}

/// Check if narrative generation is enabled (unrecognised values keep it on)
pub fn is_narrative_enabled() -> bool {
    std::env::var("NARRATIVE_ENABLED")
        .ok()
        .and_then(|s| parse_flag(&s))
        .unwrap_or(true)
}

/// `true`/`false` from the usual env spellings
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn parsed_var<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}
