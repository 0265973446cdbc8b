//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `max_bytes` is 0 or exceeds 200MB
    /// - `retry_budget` is 0 or exceeds 10
    /// - `max_concurrency` is 0 or exceeds 32
    /// - `required_field_name` is blank
    /// - `document_content_types` is empty
    /// - `export_link_pattern` is blank
    /// - `llm_timeout_ms` is less than 100ms or exceeds 10 minutes
    /// - `document_text_budget` is 0
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_ms < 100 {
            return Err(invalid("timeout_ms", "must be at least 100ms"));
        }
        if self.timeout_ms > 300_000 {
            return Err(invalid("timeout_ms", "must not exceed 5 minutes (300000ms)"));
        }

        if self.max_bytes == 0 {
            return Err(invalid("max_bytes", "must be greater than 0"));
        }
        if self.max_bytes > 200 * 1024 * 1024 {
            return Err(invalid("max_bytes", "must not exceed 200MB"));
        }

        if self.retry_budget == 0 || self.retry_budget > 10 {
            return Err(invalid("retry_budget", "must be between 1 and 10"));
        }

        if self.max_concurrency == 0 || self.max_concurrency > 32 {
            return Err(invalid("max_concurrency", "must be between 1 and 32"));
        }

        if self.required_field_name.trim().is_empty() {
            return Err(invalid("required_field_name", "must not be empty"));
        }

        if self.document_content_types.is_empty() {
            return Err(invalid("document_content_types", "must list at least one content type"));
        }

        if self.export_link_pattern.trim().is_empty() {
            return Err(invalid("export_link_pattern", "must not be empty"));
        }

        if self.llm_timeout_ms < 100 || self.llm_timeout_ms > 600_000 {
            return Err(invalid("llm_timeout_ms", "must be between 100ms and 10 minutes (600000ms)"));
        }

        if self.document_text_budget == 0 {
            return Err(invalid("document_text_budget", "must be greater than 0"));
        }

        if self.politeness_delay_ms > 0 && self.max_concurrency > 1 {
            tracing::debug!(
                politeness_delay_ms = self.politeness_delay_ms,
                max_concurrency = self.max_concurrency,
                "politeness delay spaces remote calls across all concurrent items"
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_config() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_timeout_too_small() {
        let config = AppConfig { timeout_ms: 50, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "timeout_ms"));
    }

    #[test]
    fn test_validate_timeout_exceeds_limit() {
        let config = AppConfig { timeout_ms: 301_000, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "timeout_ms"));
    }

    #[test]
    fn test_validate_max_bytes_zero() {
        let config = AppConfig { max_bytes: 0, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "max_bytes"));
    }

    #[test]
    fn test_validate_retry_budget_bounds() {
        for budget in [0, 11] {
            let config = AppConfig { retry_budget: budget, ..Default::default() };
            let result = config.validate();
            assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "retry_budget"));
        }
    }

    #[test]
    fn test_validate_concurrency_zero() {
        let config = AppConfig { max_concurrency: 0, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "max_concurrency"));
    }

    #[test]
    fn test_validate_blank_required_field() {
        let config = AppConfig { required_field_name: " ".into(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "required_field_name"));
    }

    #[test]
    fn test_validate_empty_content_types() {
        let config = AppConfig { document_content_types: Vec::new(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "document_content_types"));
    }

    #[test]
    fn test_validate_llm_timeout_and_text_budget() {
        let config = AppConfig { llm_timeout_ms: 0, ..Default::default() };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { field, .. }) if field == "llm_timeout_ms"));

        let config = AppConfig { document_text_budget: 0, ..Default::default() };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { field, .. }) if field == "document_text_budget"));
    }

    #[test]
    fn test_validate_edge_case_values() {
        let config = AppConfig { timeout_ms: 100, retry_budget: 1, max_concurrency: 1, max_bytes: 1, ..Default::default() };
        assert!(config.validate().is_ok());
    }
}
