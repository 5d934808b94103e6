//! Error types for the compliance engine.
//!
//! Analysis itself never fails: parsing is total and every rule either fires
//! or does not. Errors only arise while building configuration; file and
//! YAML errors belong to callers.

use thiserror::Error;

/// Errors raised while constructing or loading rule configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("custom pattern '{name}' is not a valid regular expression: {message}")]
    InvalidPattern { name: String, message: String },
    #[error("custom pattern has an empty name")]
    UnnamedPattern,
    #[error("pass threshold must be between 0 and 100, got {0}")]
    InvalidThreshold(u8),
    #[error("failed to load configuration: {0}")]
    Load(String),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        ConfigError::Load(err.to_string())
    }
}
