//! Application configuration module
//!
//! This module provides type-safe configuration loading from environment variables
//! using the `config` and `dotenvy` crates. Configuration is loaded with the
//! `CREDIT_SYNC` prefix and nested values use double underscores as separators.
//!
//! # Example
//!
//! ```no_run
//! use credit_sync::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Premium entitlement: {}", config.provider.entitlement_id);
//! ```

mod credits;
mod error;
mod ledger;
mod provider;
mod telemetry;

pub use credits::{CreditConfig, PackageAllocations};
pub use error::{ConfigError, ValidationError};
pub use ledger::LedgerConfig;
pub use provider::ProviderConfig;
pub use telemetry::TelemetryConfig;

use serde::Deserialize;

/// Root application configuration
///
/// Load using [`AppConfig::load()`] which reads from environment variables.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Billing provider configuration (API key, entitlement, coordinator timings)
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Credit allocation tables
    #[serde(default)]
    pub credits: CreditConfig,

    /// Ledger transaction tunables
    #[serde(default)]
    pub ledger: LedgerConfig,

    /// Logging output
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `CREDIT_SYNC` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    /// 4. Deserializes into typed configuration structs
    ///
    /// # Environment Variable Format
    ///
    /// - `CREDIT_SYNC__PROVIDER__API_KEY=appl_xxx` -> `provider.api_key = appl_xxx`
    /// - `CREDIT_SYNC__LEDGER__MAX_ATTEMPTS=5` -> `ledger.max_attempts = 5`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if values cannot be parsed into expected types.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (development)
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("CREDIT_SYNC")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.provider.validate()?;
        self.credits.validate()?;
        self.ledger.validate()?;
        self.telemetry.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Mutex to ensure tests don't run in parallel (env vars are global)
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    fn set_minimal_env() {
        env::set_var("CREDIT_SYNC__PROVIDER__API_KEY", "appl_test_key");
    }

    fn clear_env() {
        env::remove_var("CREDIT_SYNC__PROVIDER__API_KEY");
        env::remove_var("CREDIT_SYNC__PROVIDER__SWITCH_MIN_INTERVAL_MS");
        env::remove_var("CREDIT_SYNC__LEDGER__MAX_ATTEMPTS");
        env::remove_var("CREDIT_SYNC__CREDITS__NO_SUBSCRIPTION_PRODUCT_ID");
    }

    #[test]
    fn test_load_from_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        assert!(result.is_ok(), "Failed to load config: {:?}", result.err());
        let config = result.unwrap();
        assert_eq!(config.provider.api_key(), Some("appl_test_key"));
    }

    #[test]
    fn test_validate_full_config() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_defaults_without_overrides() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.provider.entitlement_id, "premium");
        assert_eq!(config.provider.switch_min_interval_ms, 1000);
        assert_eq!(config.ledger.max_attempts, 3);
        assert_eq!(config.ledger.processed_ids_window, 50);
        assert_eq!(config.credits.no_subscription_product_id, "no_subscription");
    }

    #[test]
    fn test_nested_overrides() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::set_var("CREDIT_SYNC__PROVIDER__SWITCH_MIN_INTERVAL_MS", "250");
        env::set_var("CREDIT_SYNC__LEDGER__MAX_ATTEMPTS", "5");
        env::set_var("CREDIT_SYNC__CREDITS__NO_SUBSCRIPTION_PRODUCT_ID", "free_tier");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.provider.switch_min_interval_ms, 250);
        assert_eq!(config.ledger.max_attempts, 5);
        assert_eq!(config.credits.no_subscription_product_id, "free_tier");
    }

    #[test]
    fn test_missing_api_key_fails_validation() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        let result = AppConfig::load();

        let config = result.unwrap();
        assert_eq!(
            config.validate(),
            Err(ValidationError::MissingRequired("PROVIDER__API_KEY"))
        );
    }
}
