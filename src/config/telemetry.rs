//! Logging configuration

use serde::Deserialize;
use tracing_subscriber::EnvFilter;

use super::error::ValidationError;

/// Tracing subscriber configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Filter directive used when `RUST_LOG` is not set
    pub log_filter: String,

    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_filter: "info".to_string(),
            json: false,
        }
    }
}

impl TelemetryConfig {
    fn env_filter(&self) -> Result<EnvFilter, ValidationError> {
        match EnvFilter::try_from_default_env() {
            Ok(filter) => Ok(filter),
            Err(_) => EnvFilter::try_new(&self.log_filter)
                .map_err(|_| ValidationError::InvalidLogFilter(self.log_filter.clone())),
        }
    }

    /// Install the global tracing subscriber.
    ///
    /// Returns `Ok(false)` when a subscriber was already installed.
    pub fn init_tracing(&self) -> Result<bool, ValidationError> {
        let filter = self.env_filter()?;
        let installed = if self.json {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .try_init()
                .is_ok()
        } else {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .try_init()
                .is_ok()
        };
        Ok(installed)
    }

    /// Validate telemetry configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        EnvFilter::try_new(&self.log_filter)
            .map(|_| ())
            .map_err(|_| ValidationError::InvalidLogFilter(self.log_filter.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_is_valid() {
        assert!(TelemetryConfig::default().validate().is_ok());
    }

    #[test]
    fn malformed_filter_is_rejected() {
        let config = TelemetryConfig {
            log_filter: "credit_sync=notalevel".to_string(),
            json: false,
        };
        assert!(config.validate().is_err());
    }
}
