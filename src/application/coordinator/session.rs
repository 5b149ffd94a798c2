//! Process-wide provider session state.

use std::collections::HashMap;

use futures::future::{BoxFuture, Shared};
use thiserror::Error;
use tokio::time::Instant;

use crate::domain::foundation::{DomainError, ErrorCode};
use crate::ports::{EntitlementSnapshot, ProviderError};

/// Configuration lifecycle of the billing provider.
///
/// `Configured` is terminal until the coordinator is reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConfigurationState {
    #[default]
    Unconfigured,
    Configuring,
    Configured,
}

/// Errors from the initialization coordinator.
///
/// Cloneable so single-flight waiters can share one result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoordinatorError {
    #[error("billing provider API key is missing")]
    MissingApiKey,

    #[error("billing provider is not configured")]
    NotConfigured,

    #[error("billing provider configuration did not finish after {attempts} polls")]
    ConfigureTimedOut { attempts: u32 },

    #[error("invalid identity: {0}")]
    InvalidIdentity(String),

    #[error("request superseded by a session reset")]
    Superseded,

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl From<CoordinatorError> for DomainError {
    fn from(err: CoordinatorError) -> Self {
        match err {
            CoordinatorError::Provider(inner) => inner.into(),
            CoordinatorError::InvalidIdentity(_) => {
                DomainError::new(ErrorCode::ValidationFailed, err.to_string())
            }
            _ => DomainError::new(ErrorCode::ConfigurationError, err.to_string()),
        }
    }
}

pub(crate) type ConfigureFuture = Shared<BoxFuture<'static, Result<(), CoordinatorError>>>;
pub(crate) type SwitchFuture =
    Shared<BoxFuture<'static, Result<EntitlementSnapshot, CoordinatorError>>>;

/// Mutable session owned by the coordinator.
#[derive(Default)]
pub(crate) struct ProviderSession {
    /// Bumped by reset; continuations from older generations are stale.
    pub generation: u64,
    pub state: ConfigurationState,
    pub current_user: Option<String>,
    pub configure: Option<ConfigureFuture>,
    pub switches: HashMap<String, SwitchFuture>,
    pub last_switch_at: Option<Instant>,
}

impl ProviderSession {
    /// Clears everything and starts a new generation.
    pub fn reset(&mut self) {
        *self = ProviderSession {
            generation: self.generation + 1,
            ..Default::default()
        };
    }
}
