//! Credit ledger error types.
//!
//! | Error | Code | Retryable |
//! |-------|------|-----------|
//! | Validation | VALIDATION_FAILED | no |
//! | NotFound | NOT_FOUND | no |
//! | InsufficientBalance | INSUFFICIENT_BALANCE | no |
//! | TransientStore | TRANSIENT_STORE_ERROR | yes |
//! | Configuration | CONFIGURATION_ERROR | no |
//! | Unknown | UNKNOWN_ERROR | no |

use crate::domain::foundation::{DomainError, ErrorCode, UserId, ValidationError};

/// Errors returned by ledger operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreditError {
    /// Invalid user id or amount.
    Validation { field: String, message: String },

    /// Deduct or refund against a user without a ledger record.
    NotFound(UserId),

    /// Deduction larger than the available balance.
    InsufficientBalance { requested: i64, available: i64 },

    /// Store contention or availability error, surfaced after retries ran out.
    TransientStore(String),

    /// Missing or unresolvable configuration (e.g. unknown product).
    Configuration(String),

    /// Anything else, wrapping the underlying cause.
    Unknown(String),
}

impl CreditError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        CreditError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn not_found(user_id: UserId) -> Self {
        CreditError::NotFound(user_id)
    }

    pub fn insufficient_balance(requested: i64, available: i64) -> Self {
        CreditError::InsufficientBalance {
            requested,
            available,
        }
    }

    pub fn transient_store(message: impl Into<String>) -> Self {
        CreditError::TransientStore(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        CreditError::Configuration(message.into())
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        CreditError::Unknown(message.into())
    }

    /// Returns the error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            CreditError::Validation { .. } => ErrorCode::ValidationFailed,
            CreditError::NotFound(_) => ErrorCode::LedgerNotFound,
            CreditError::InsufficientBalance { .. } => ErrorCode::InsufficientBalance,
            CreditError::TransientStore(_) => ErrorCode::TransientStoreError,
            CreditError::Configuration(_) => ErrorCode::ConfigurationError,
            CreditError::Unknown(_) => ErrorCode::InternalError,
        }
    }

    /// Returns a user-friendly error message.
    pub fn message(&self) -> String {
        match self {
            CreditError::Validation { field, message } => {
                format!("Validation failed for '{}': {}", field, message)
            }
            CreditError::NotFound(user_id) => {
                format!("No credit ledger found for user: {}", user_id)
            }
            CreditError::InsufficientBalance {
                requested,
                available,
            } => format!(
                "Insufficient credits: requested {}, available {}",
                requested, available
            ),
            CreditError::TransientStore(msg) => format!("Store temporarily unavailable: {}", msg),
            CreditError::Configuration(msg) => format!("Configuration error: {}", msg),
            CreditError::Unknown(msg) => format!("Error: {}", msg),
        }
    }

    /// Returns true if this error should trigger a retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CreditError::TransientStore(_))
    }
}

impl std::fmt::Display for CreditError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for CreditError {}

impl From<ValidationError> for CreditError {
    fn from(err: ValidationError) -> Self {
        CreditError::validation(err.field(), err.to_string())
    }
}

impl From<CreditError> for DomainError {
    fn from(err: CreditError) -> Self {
        let domain = DomainError::new(err.code(), err.message());
        match &err {
            CreditError::Validation { field, .. } => domain.with_detail("field", field.clone()),
            CreditError::InsufficientBalance {
                requested,
                available,
            } => domain
                .with_detail("requested", requested.to_string())
                .with_detail("available", available.to_string()),
            _ => domain,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_balance_reports_both_amounts() {
        let err = CreditError::insufficient_balance(5, 2);
        assert_eq!(err.code(), ErrorCode::InsufficientBalance);
        assert_eq!(err.message(), "Insufficient credits: requested 5, available 2");
    }

    #[test]
    fn only_transient_store_errors_are_retryable() {
        assert!(CreditError::transient_store("contention").is_retryable());
        assert!(!CreditError::configuration("no limit").is_retryable());
        assert!(!CreditError::insufficient_balance(1, 0).is_retryable());
    }

    #[test]
    fn validation_error_converts_with_field() {
        let err: CreditError = ValidationError::empty_field("user_id").into();
        match err {
            CreditError::Validation { field, .. } => assert_eq!(field, "user_id"),
            other => panic!("Expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn converts_into_domain_error_with_details() {
        let domain: DomainError = CreditError::insufficient_balance(10, 3).into();
        assert_eq!(domain.code, ErrorCode::InsufficientBalance);
        assert_eq!(domain.details.get("available"), Some(&"3".to_string()));
    }

    #[test]
    fn unknown_maps_to_unknown_error_code() {
        let err = CreditError::unknown("boom");
        assert_eq!(err.code().to_string(), "UNKNOWN_ERROR");
    }
}
