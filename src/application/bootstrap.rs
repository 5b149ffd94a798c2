//! Wiring and the top-level "initialize subscription system" entry point.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use super::coordinator::{ConfigurationState, ProviderInitializationCoordinator};
use super::handlers::credits::{
    DeductCreditHandler, GetCreditsHandler, InitializeCreditsHandler, RefundCreditHandler,
    SyncExpiredStatusHandler,
};
use super::ledger_transaction::CreditLedgerTransaction;
use super::sync_service::{SyncError, SyncOutcome, SyncService};
use crate::config::AppConfig;
use crate::domain::foundation::UserId;
use crate::ports::{BillingProvider, DocumentStore, EventPublisher};

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Shared state containing all dependencies.
///
/// Cloned freely; every clone shares one ledger transaction, one
/// coordinator session, and one sync service.
#[derive(Clone)]
pub struct CreditSyncState {
    pub ledger: Arc<CreditLedgerTransaction>,
    pub coordinator: ProviderInitializationCoordinator,
    pub sync: Arc<SyncService>,
    pub event_publisher: Arc<dyn EventPublisher>,
    init_timeout: Duration,
}

impl CreditSyncState {
    pub fn new(
        config: &AppConfig,
        store: Arc<dyn DocumentStore>,
        provider: Arc<dyn BillingProvider>,
        event_publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        let ledger = Arc::new(CreditLedgerTransaction::new(
            store,
            config.credits.clone(),
            config.ledger.clone(),
        ));
        let coordinator =
            ProviderInitializationCoordinator::new(provider.clone(), config.provider.clone());
        let sync = Arc::new(SyncService::new(
            ledger.clone(),
            coordinator.clone(),
            provider,
            event_publisher.clone(),
            config.provider.entitlement_id.clone(),
        ));

        Self {
            ledger,
            coordinator,
            sync,
            event_publisher,
            init_timeout: config.provider.init_timeout(),
        }
    }

    /// Create handlers on demand from the shared state.
    pub fn initialize_credits_handler(&self) -> InitializeCreditsHandler {
        InitializeCreditsHandler::new(self.ledger.clone(), self.event_publisher.clone())
    }

    pub fn deduct_credit_handler(&self) -> DeductCreditHandler {
        DeductCreditHandler::new(self.ledger.clone(), self.event_publisher.clone())
    }

    pub fn refund_credit_handler(&self) -> RefundCreditHandler {
        RefundCreditHandler::new(self.ledger.clone(), self.event_publisher.clone())
    }

    pub fn get_credits_handler(&self) -> GetCreditsHandler {
        GetCreditsHandler::new(self.ledger.clone())
    }

    pub fn sync_expired_status_handler(&self) -> SyncExpiredStatusHandler {
        SyncExpiredStatusHandler::new(self.ledger.clone(), self.event_publisher.clone())
    }

    /// Configures the provider, logs in `user_id`, and syncs its current
    /// entitlement into the ledger, all within the init timeout.
    ///
    /// Never fails: a failure or timeout is reported with `success: false`
    /// so the caller can keep running without gating.
    pub async fn initialize_subscription_system(&self, user_id: &UserId) -> InitializationReport {
        let result = tokio::time::timeout(self.init_timeout, self.initialize(user_id)).await;

        let (sync, error, timed_out) = match result {
            Ok(Ok(outcome)) => (Some(outcome), None, false),
            Ok(Err(e)) => {
                tracing::error!(user_id = %user_id, error = %e, "Subscription system failed to initialize");
                (None, Some(e.to_string()), false)
            }
            Err(_) => {
                tracing::error!(
                    user_id = %user_id,
                    timeout_ms = self.init_timeout.as_millis() as u64,
                    "Subscription system initialization timed out"
                );
                (None, Some("initialization timed out".to_string()), true)
            }
        };

        InitializationReport {
            success: error.is_none(),
            user_id: user_id.to_string(),
            configuration_state: self.coordinator.configuration_state(),
            sync,
            error,
            timed_out,
        }
    }

    async fn initialize(&self, user_id: &UserId) -> Result<SyncOutcome, SyncError> {
        self.coordinator.initialize(Some(user_id.as_str())).await?;
        let snapshot = self.coordinator.switch_user(user_id.as_str()).await?;
        let outcome = self.sync.on_customer_info_updated(user_id, &snapshot).await?;
        tracing::info!(user_id = %user_id, "Subscription system initialized");
        Ok(outcome)
    }
}

/// Result of [`CreditSyncState::initialize_subscription_system`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializationReport {
    pub success: bool,
    pub user_id: String,
    #[serde(skip)]
    pub configuration_state: ConfigurationState,
    #[serde(skip)]
    pub sync: Option<SyncOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timed_out: bool,
}
