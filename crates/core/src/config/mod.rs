//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (DOCKET_*)
//! 2. TOML config file (if DOCKET_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (DOCKET_*)
/// 2. TOML config file (if DOCKET_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the JSON cache document.
    ///
    /// Set via DOCKET_CACHE_PATH environment variable.
    #[serde(default = "default_cache_path")]
    pub cache_path: PathBuf,

    /// Directory downloaded artifacts are written to.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Directory for raw generator output kept for audit. None disables it.
    #[serde(default = "default_audit_dir")]
    pub audit_dir: Option<PathBuf>,

    /// Per-request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum response body size in bytes.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Attempts per resource before giving up.
    #[serde(default = "default_retry_budget")]
    pub retry_budget: u32,

    /// Backoff unit; attempt n waits `base_delay_ms * n` before attempt n+1.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Items processed concurrently.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Minimum spacing between remote calls. 0 disables the gate.
    #[serde(default = "default_politeness_delay_ms")]
    pub politeness_delay_ms: u64,

    /// Top-level field a structured generator response must contain.
    #[serde(default = "default_required_field_name")]
    pub required_field_name: String,

    /// Content types accepted for document downloads (substring match).
    #[serde(default = "default_document_content_types")]
    pub document_content_types: Vec<String>,

    /// Regex matched against anchor hrefs on listing pages.
    #[serde(default = "default_export_link_pattern")]
    pub export_link_pattern: String,

    /// API key for the text generation endpoint.
    ///
    /// Set via DOCKET_LLM_API_KEY environment variable.
    /// Required only when analysis is enabled.
    #[serde(default)]
    pub llm_api_key: Option<String>,

    #[serde(default = "default_llm_base_url")]
    pub llm_base_url: String,

    #[serde(default = "default_llm_model")]
    pub llm_model: String,

    /// Per-request timeout for the text generation endpoint, in milliseconds.
    #[serde(default = "default_llm_timeout_ms")]
    pub llm_timeout_ms: u64,

    /// Characters of downloaded document text placed in an analysis prompt.
    #[serde(default = "default_document_text_budget")]
    pub document_text_budget: usize,
}

fn default_cache_path() -> PathBuf {
    PathBuf::from("./cache/downloaded_cases.json")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./data/raw")
}

fn default_audit_dir() -> Option<PathBuf> {
    Some(PathBuf::from("./results"))
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_max_bytes() -> usize {
    20 * 1024 * 1024
}

fn default_retry_budget() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    2_000
}

fn default_max_concurrency() -> usize {
    4
}

fn default_politeness_delay_ms() -> u64 {
    1_000
}

fn default_required_field_name() -> String {
    "cases".into()
}

fn default_document_content_types() -> Vec<String> {
    vec!["application/pdf".into(), "application/octet-stream".into()]
}

fn default_export_link_pattern() -> String {
    "export.*pdf".into()
}

fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".into()
}

fn default_llm_model() -> String {
    "gpt-4o".into()
}

fn default_llm_timeout_ms() -> u64 {
    60_000
}

fn default_document_text_budget() -> usize {
    8_000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            cache_path: default_cache_path(),
            output_dir: default_output_dir(),
            audit_dir: default_audit_dir(),
            timeout_ms: default_timeout_ms(),
            max_bytes: default_max_bytes(),
            retry_budget: default_retry_budget(),
            base_delay_ms: default_base_delay_ms(),
            max_concurrency: default_max_concurrency(),
            politeness_delay_ms: default_politeness_delay_ms(),
            required_field_name: default_required_field_name(),
            document_content_types: default_document_content_types(),
            export_link_pattern: default_export_link_pattern(),
            llm_api_key: None,
            llm_base_url: default_llm_base_url(),
            llm_model: default_llm_model(),
            llm_timeout_ms: default_llm_timeout_ms(),
            document_text_budget: default_document_text_budget(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn llm_timeout(&self) -> Duration {
        Duration::from_millis(self.llm_timeout_ms)
    }

    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    /// Politeness interval, or None when disabled.
    pub fn politeness_delay(&self) -> Option<Duration> {
        (self.politeness_delay_ms > 0).then(|| Duration::from_millis(self.politeness_delay_ms))
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `DOCKET_`
    /// 2. TOML file from `DOCKET_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("DOCKET_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("DOCKET_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        Self::from_figment(figment)
    }

    /// Extract and validate from a prepared figment.
    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the text generation key is available (deferred validation).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if the key is unset or blank.
    pub fn require_llm_api_key(&self) -> Result<&str, ConfigError> {
        self.llm_api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ConfigError::Missing {
                field: "llm_api_key".into(),
                hint: "Set DOCKET_LLM_API_KEY environment variable".into(),
            })
    }
}
