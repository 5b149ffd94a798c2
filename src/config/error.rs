//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Credit allocation for '{0}' must not be negative")]
    NegativeAllocation(String),

    #[error("No credit allocation configured for any package or product")]
    NoCreditAllocation,

    #[error("{0} must be greater than zero")]
    MustBePositive(&'static str),

    #[error("Invalid log filter directive: {0}")]
    InvalidLogFilter(String),
}
