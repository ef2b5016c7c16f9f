//! Configuration for Tabletalk.
//!
//! Handles loading configuration from TOML files, with serde-supplied
//! defaults for every field. The constants the core leaves implementation
//! defined (row cap, sample size, LLM timeout) live here.

use crate::error::{Result, TabletalkError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure for Tabletalk.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Core pipeline settings.
    #[serde(default)]
    pub core: CoreConfig,

    /// LLM provider configuration.
    #[serde(default)]
    pub llm: LlmConfig,
}

impl Config {
    /// Loads configuration from a TOML file.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            TabletalkError::config(format!(
                "Could not read config file {}: {e}",
                path.as_ref().display()
            ))
        })?;
        let config: Config = toml::from_str(&contents)
            .map_err(|e| TabletalkError::config(format!("Invalid config file: {e}")))?;
        config.core.validate()?;
        Ok(config)
    }
}

/// Core pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Maximum rows returned from a query before truncation.
    #[serde(default = "default_max_result_rows")]
    pub max_result_rows: usize,

    /// Number of dataset rows included in the SQL generation prompt.
    #[serde(default = "default_sample_rows")]
    pub sample_rows: usize,

    /// Name of the single table the dataset is projected as.
    #[serde(default = "default_table_name")]
    pub table_name: String,

    /// Maximum conversation exchanges kept for contextual answers.
    #[serde(default = "default_max_exchanges")]
    pub max_exchanges: usize,
}

fn default_max_result_rows() -> usize {
    2000
}

fn default_sample_rows() -> usize {
    5
}

fn default_table_name() -> String {
    "data".to_string()
}

fn default_max_exchanges() -> usize {
    10
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            max_result_rows: default_max_result_rows(),
            sample_rows: default_sample_rows(),
            table_name: default_table_name(),
            max_exchanges: default_max_exchanges(),
        }
    }
}

impl CoreConfig {
    /// Validates the configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.max_result_rows == 0 {
            return Err(TabletalkError::config("max_result_rows must be positive"));
        }
        if self.table_name.is_empty() {
            return Err(TabletalkError::config("table_name must not be empty"));
        }
        Ok(())
    }
}

/// LLM provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Model name (e.g., "gpt-5-mini").
    #[serde(default = "default_model")]
    pub model: String,

    /// Request timeout in seconds. On expiry the call is reported as a
    /// generation or interpretation failure, never as a hang.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_model() -> String {
    "gpt-5-mini".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_defaults() {
        let config = CoreConfig::default();
        assert_eq!(config.max_result_rows, 2000);
        assert_eq!(config.sample_rows, 5);
        assert_eq!(config.table_name, "data");
        assert_eq!(config.max_exchanges, 10);
    }

    #[test]
    fn test_llm_defaults() {
        let config = LlmConfig::default();
        assert_eq!(config.timeout_secs, 30);
        assert!(!config.model.is_empty());
    }

    #[test]
    fn test_parse_partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [core]
            max_result_rows = 50
            "#,
        )
        .unwrap();

        assert_eq!(config.core.max_result_rows, 50);
        assert_eq!(config.core.sample_rows, 5);
        assert_eq!(config.core.table_name, "data");
        assert_eq!(config.llm.timeout_secs, 30);
    }

    #[test]
    fn test_parse_empty_toml() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.core.max_result_rows, 2000);
    }

    #[test]
    fn test_validate_rejects_zero_row_cap() {
        let config = CoreConfig {
            max_result_rows: 0,
            ..CoreConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_table_name() {
        let config = CoreConfig {
            table_name: String::new(),
            ..CoreConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
