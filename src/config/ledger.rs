//! Ledger transaction configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Tunables for the credit ledger transaction.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Total attempts for a transaction hitting transient store errors.
    pub max_attempts: u32,

    /// Linear backoff unit; the wait after attempt `n` is `n` units.
    pub retry_backoff_ms: u64,

    /// Number of processed purchase ids kept for idempotency.
    pub processed_ids_window: usize,

    /// Number of purchase history entries kept for audit.
    pub purchase_history_window: usize,

    /// Hard ceiling for a single deduct or refund amount.
    pub max_credit_amount: i64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_backoff_ms: 100,
            processed_ids_window: 50,
            purchase_history_window: 10,
            max_credit_amount: 10_000,
        }
    }
}

impl LedgerConfig {
    /// Backoff to wait after a failed attempt (1-based).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.retry_backoff_ms.saturating_mul(u64::from(attempt)))
    }

    /// Validate ledger configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_attempts == 0 {
            return Err(ValidationError::MustBePositive("LEDGER__MAX_ATTEMPTS"));
        }
        if self.processed_ids_window == 0 {
            return Err(ValidationError::MustBePositive("LEDGER__PROCESSED_IDS_WINDOW"));
        }
        if self.purchase_history_window == 0 {
            return Err(ValidationError::MustBePositive("LEDGER__PURCHASE_HISTORY_WINDOW"));
        }
        if self.max_credit_amount <= 0 {
            return Err(ValidationError::MustBePositive("LEDGER__MAX_CREDIT_AMOUNT"));
        }
        Ok(())
    }
}
