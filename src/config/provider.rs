//! Billing provider configuration

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Billing provider configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Provider SDK API key
    pub api_key: Option<SecretString>,

    /// Entitlement that marks a user as premium
    pub entitlement_id: String,

    /// Poll attempts while another caller is configuring
    pub configure_poll_attempts: u32,

    /// Delay between configuration polls
    pub configure_poll_interval_ms: u64,

    /// Minimum time between identity switches
    pub switch_min_interval_ms: u64,

    /// Wall-clock budget for the whole initialization entry point
    pub init_timeout_ms: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            entitlement_id: "premium".to_string(),
            configure_poll_attempts: 5,
            configure_poll_interval_ms: 200,
            switch_min_interval_ms: 1000,
            init_timeout_ms: 10_000,
        }
    }
}

impl ProviderConfig {
    /// Returns the API key if configured and non-blank.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_ref()
            .map(|key| key.expose_secret().as_str())
            .filter(|key| !key.trim().is_empty())
    }

    pub fn configure_poll_interval(&self) -> Duration {
        Duration::from_millis(self.configure_poll_interval_ms)
    }

    pub fn switch_min_interval(&self) -> Duration {
        Duration::from_millis(self.switch_min_interval_ms)
    }

    pub fn init_timeout(&self) -> Duration {
        Duration::from_millis(self.init_timeout_ms)
    }

    /// Validate provider configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.api_key().is_none() {
            return Err(ValidationError::MissingRequired("PROVIDER__API_KEY"));
        }
        if self.entitlement_id.trim().is_empty() {
            return Err(ValidationError::MissingRequired("PROVIDER__ENTITLEMENT_ID"));
        }
        if self.configure_poll_attempts == 0 {
            return Err(ValidationError::MustBePositive(
                "PROVIDER__CONFIGURE_POLL_ATTEMPTS",
            ));
        }
        if self.init_timeout_ms == 0 {
            return Err(ValidationError::MustBePositive("PROVIDER__INIT_TIMEOUT_MS"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_key(key: &str) -> ProviderConfig {
        ProviderConfig {
            api_key: Some(SecretString::new(key.to_string())),
            ..Default::default()
        }
    }

    #[test]
    fn missing_api_key_is_rejected() {
        let config = ProviderConfig::default();
        assert_eq!(
            config.validate(),
            Err(ValidationError::MissingRequired("PROVIDER__API_KEY"))
        );
    }

    #[test]
    fn blank_api_key_counts_as_missing() {
        assert!(with_key("  ").api_key().is_none());
        assert!(with_key("  ").validate().is_err());
    }

    #[test]
    fn valid_config_passes() {
        assert!(with_key("appl_abc123").validate().is_ok());
    }

    #[test]
    fn debug_output_redacts_api_key() {
        let rendered = format!("{:?}", with_key("appl_super_secret"));
        assert!(!rendered.contains("appl_super_secret"));
    }

    #[test]
    fn durations_follow_millis() {
        let config = ProviderConfig::default();
        assert_eq!(config.switch_min_interval(), Duration::from_millis(1000));
        assert_eq!(config.configure_poll_interval(), Duration::from_millis(200));
    }
}
