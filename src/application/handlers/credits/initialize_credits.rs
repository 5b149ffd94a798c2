//! InitializeCreditsHandler - Command handler for applying a billing change
//! to a user's ledger.

use std::sync::Arc;

use crate::application::ledger_transaction::{ApplyOutcome, CreditLedgerTransaction};
use crate::application::notify;
use crate::domain::billing::{
    CreditError, CreditsUpdated, LedgerChange, LedgerRecord, PremiumStatusChanged, PurchaseKind,
    PurchaseSource, SubscriptionSignal,
};
use crate::domain::foundation::{PurchaseId, Timestamp, UserId};
use crate::ports::EventPublisher;

/// Command to initialize or update a user's credits.
///
/// Every field but `user_id` is optional. Without a purchase id the change
/// is not deduplicated; without a product the stored product is reused.
#[derive(Debug, Clone, Default)]
pub struct InitializeCreditsCommand {
    pub user_id: Option<UserId>,
    pub purchase_id: Option<PurchaseId>,
    pub product_id: Option<String>,
    pub source: PurchaseSource,
    pub signal: SubscriptionSignal,
    pub kind: Option<PurchaseKind>,
    pub expiration_date: Option<Timestamp>,
}

impl InitializeCreditsCommand {
    pub fn for_user(user_id: UserId) -> Self {
        Self {
            user_id: Some(user_id),
            ..Default::default()
        }
    }

    pub fn with_product(mut self, product_id: impl Into<String>) -> Self {
        self.product_id = Some(product_id.into());
        self
    }

    pub fn with_purchase_id(mut self, purchase_id: PurchaseId) -> Self {
        self.purchase_id = Some(purchase_id);
        self
    }

    pub fn with_signal(mut self, signal: SubscriptionSignal) -> Self {
        self.signal = signal;
        self
    }

    pub fn with_source(mut self, source: PurchaseSource) -> Self {
        self.source = source;
        self
    }
}

/// Result of a successful initialization.
#[derive(Debug, Clone)]
pub struct InitializeCreditsResult {
    pub record: LedgerRecord,
    pub already_processed: bool,
}

/// Handler for `initializeCredits`.
pub struct InitializeCreditsHandler {
    ledger: Arc<CreditLedgerTransaction>,
    event_publisher: Arc<dyn EventPublisher>,
}

impl InitializeCreditsHandler {
    pub fn new(
        ledger: Arc<CreditLedgerTransaction>,
        event_publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            ledger,
            event_publisher,
        }
    }

    pub async fn handle(
        &self,
        cmd: InitializeCreditsCommand,
    ) -> Result<InitializeCreditsResult, CreditError> {
        // 1. Validate
        let user_id = cmd
            .user_id
            .ok_or_else(|| CreditError::validation("user_id", "user_id cannot be empty"))?;

        // 2. Apply atomically
        let change = LedgerChange {
            purchase_id: cmd.purchase_id,
            product_id: cmd.product_id,
            source: cmd.source,
            signal: cmd.signal,
            kind: cmd.kind,
            expiration_date: cmd.expiration_date,
            is_status_sync_only: cmd.source == PurchaseSource::StatusSync,
        };
        let outcome = self.ledger.apply(&user_id, &change).await?;

        // 3. Notify
        publish_outcome(self.event_publisher.as_ref(), &user_id, &outcome).await;

        Ok(InitializeCreditsResult {
            record: outcome.record,
            already_processed: outcome.already_processed,
        })
    }
}

/// Publishes `credits_updated` and, when the flag flipped,
/// `premium_status_changed` for a committed apply.
pub(crate) async fn publish_outcome(
    publisher: &dyn EventPublisher,
    user_id: &UserId,
    outcome: &ApplyOutcome,
) {
    if !outcome.written {
        return;
    }
    let record = &outcome.record;
    let purchase_id = outcome.purchase_id();
    notify::publish_correlated(
        publisher,
        &CreditsUpdated::new(user_id.clone(), record.credits, record.credit_limit),
        purchase_id,
    )
    .await;
    if outcome.premium_changed {
        notify::publish_correlated(
            publisher,
            &PremiumStatusChanged::new(user_id.clone(), record.is_premium),
            purchase_id,
        )
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{InMemoryDocumentStore, InMemoryEventBus};
    use crate::config::{CreditConfig, LedgerConfig};
    use crate::domain::billing::{PeriodType, SubscriptionStatus};

    fn setup() -> (Arc<InMemoryEventBus>, InitializeCreditsHandler) {
        let bus = Arc::new(InMemoryEventBus::new());
        let ledger = Arc::new(CreditLedgerTransaction::new(
            Arc::new(InMemoryDocumentStore::new()),
            CreditConfig::default(),
            LedgerConfig::default(),
        ));
        (bus.clone(), InitializeCreditsHandler::new(ledger, bus))
    }

    fn user() -> UserId {
        UserId::new("user-1").unwrap()
    }

    fn monthly_purchase() -> InitializeCreditsCommand {
        InitializeCreditsCommand::for_user(user())
            .with_product("app.monthly")
            .with_purchase_id(PurchaseId::new("purchase_txn_1").unwrap())
            .with_source(PurchaseSource::Purchase)
            .with_signal(SubscriptionSignal::premium().with_period_type(PeriodType::Normal))
    }

    #[tokio::test]
    async fn missing_user_is_a_validation_error() {
        let (_, handler) = setup();

        let result = handler.handle(InitializeCreditsCommand::default()).await;

        assert!(matches!(result, Err(CreditError::Validation { .. })));
    }

    #[tokio::test]
    async fn monthly_purchase_grants_monthly_allocation() {
        let (_, handler) = setup();

        let result = handler.handle(monthly_purchase()).await.unwrap();

        assert_eq!(result.record.credits, 100);
        assert_eq!(result.record.status, SubscriptionStatus::Active);
        assert!(result.record.is_premium);
        assert!(!result.already_processed);
    }

    #[tokio::test]
    async fn commit_publishes_credit_and_premium_events() {
        let (bus, handler) = setup();

        handler.handle(monthly_purchase()).await.unwrap();

        assert_eq!(bus.events_of_type("credits.updated").len(), 1);
        assert_eq!(bus.events_of_type("premium_status.changed").len(), 1);
    }

    #[tokio::test]
    async fn events_are_correlated_with_the_purchase() {
        let (bus, handler) = setup();

        handler.handle(monthly_purchase()).await.unwrap();

        for envelope in bus.published_events() {
            assert_eq!(
                envelope.metadata.correlation_id.as_deref(),
                Some("purchase_txn_1")
            );
            assert_eq!(envelope.metadata.user_id.as_deref(), Some("user-1"));
        }
    }

    #[tokio::test]
    async fn duplicate_publishes_nothing() {
        let (bus, handler) = setup();
        handler.handle(monthly_purchase()).await.unwrap();
        bus.clear();

        let result = handler.handle(monthly_purchase()).await.unwrap();

        assert!(result.already_processed);
        assert_eq!(bus.event_count(), 0);
    }

    #[tokio::test]
    async fn free_user_without_product_gets_zero_credits() {
        let (bus, handler) = setup();

        let result = handler
            .handle(InitializeCreditsCommand::for_user(user()))
            .await
            .unwrap();

        assert_eq!(result.record.credits, 0);
        assert_eq!(result.record.status, SubscriptionStatus::None);
        assert_eq!(result.record.product_id, None);
        assert!(!bus.has_event("premium_status.changed"));
    }
}
