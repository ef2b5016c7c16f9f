//! Error types for Tabletalk.
//!
//! Defines the main error enum used throughout the crate.

use thiserror::Error;

/// Main error type for Tabletalk operations.
#[derive(Error, Debug)]
pub enum TabletalkError {
    /// SQL generation failures (service unreachable, empty or malformed candidate).
    #[error("Generation error: {0}")]
    Generation(String),

    /// Safety validation rejections (unsafe verb, multi-statement, unknown identifier).
    #[error("Validation error: {0}")]
    Validation(String),

    /// Execution failures against the relational store (runtime SQL errors, empty results).
    #[error("Execution error: {0}")]
    Execution(String),

    /// LLM API errors (rate limits, auth, timeouts, etc.)
    #[error("LLM error: {0}")]
    Llm(String),

    /// Configuration errors (invalid config file, missing required fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal errors (unexpected states, bugs, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl TabletalkError {
    /// Creates a generation error with the given message.
    pub fn generation(msg: impl Into<String>) -> Self {
        Self::Generation(msg.into())
    }

    /// Creates a validation error with the given message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Creates an execution error with the given message.
    pub fn execution(msg: impl Into<String>) -> Self {
        Self::Execution(msg.into())
    }

    /// Creates an LLM error with the given message.
    pub fn llm(msg: impl Into<String>) -> Self {
        Self::Llm(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Generation(_) => "Generation Error",
            Self::Validation(_) => "Validation Error",
            Self::Execution(_) => "Execution Error",
            Self::Llm(_) => "LLM Error",
            Self::Config(_) => "Configuration Error",
            Self::Internal(_) => "Internal Error",
        }
    }
}

/// Result type alias using TabletalkError.
pub type Result<T> = std::result::Result<T, TabletalkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_generation() {
        let err = TabletalkError::generation("model returned an empty candidate");
        assert_eq!(
            err.to_string(),
            "Generation error: model returned an empty candidate"
        );
        assert_eq!(err.category(), "Generation Error");
    }

    #[test]
    fn test_error_display_validation() {
        let err = TabletalkError::validation("unsafe_verb: statement is not a SELECT");
        assert_eq!(
            err.to_string(),
            "Validation error: unsafe_verb: statement is not a SELECT"
        );
        assert_eq!(err.category(), "Validation Error");
    }

    #[test]
    fn test_error_display_execution() {
        let err = TabletalkError::execution("no such column: emal");
        assert_eq!(err.to_string(), "Execution error: no such column: emal");
        assert_eq!(err.category(), "Execution Error");
    }

    #[test]
    fn test_error_display_llm() {
        let err = TabletalkError::llm("Rate limited. Please wait.");
        assert_eq!(err.to_string(), "LLM error: Rate limited. Please wait.");
        assert_eq!(err.category(), "LLM Error");
    }

    #[test]
    fn test_error_display_config() {
        let err = TabletalkError::config("max_result_rows must be positive");
        assert_eq!(
            err.to_string(),
            "Configuration error: max_result_rows must be positive"
        );
        assert_eq!(err.category(), "Configuration Error");
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<TabletalkError>();
    }
}
