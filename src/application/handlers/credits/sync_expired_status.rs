//! SyncExpiredStatusHandler - Command handler that marks lapsed
//! subscriptions as expired.

use std::sync::Arc;

use crate::application::ledger_transaction::CreditLedgerTransaction;
use crate::application::notify;
use crate::domain::billing::{CreditError, PremiumStatusChanged, SubscriptionStatus};
use crate::domain::foundation::{Timestamp, UserId};
use crate::ports::EventPublisher;

/// Command to re-check a user's expiration date.
#[derive(Debug, Clone)]
pub struct SyncExpiredStatusCommand {
    pub user_id: UserId,
}

/// Result of an expiry check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncExpiredStatusResult {
    /// True when the record was marked expired by this call.
    pub expired: bool,
    pub status: Option<SubscriptionStatus>,
}

/// Handler for `syncExpiredStatus`.
///
/// Writes only the status fields. Credits stay as they are; the next
/// subscription purchase resets them.
pub struct SyncExpiredStatusHandler {
    ledger: Arc<CreditLedgerTransaction>,
    event_publisher: Arc<dyn EventPublisher>,
}

impl SyncExpiredStatusHandler {
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
        cmd: SyncExpiredStatusCommand,
    ) -> Result<SyncExpiredStatusResult, CreditError> {
        // 1. Read current record
        let Some(mut record) = self.ledger.read(&cmd.user_id).await? else {
            return Ok(SyncExpiredStatusResult {
                expired: false,
                status: None,
            });
        };

        // 2. Nothing to do unless the expiration passed
        let Some(patch) = record.expiry_patch(Timestamp::now()) else {
            return Ok(SyncExpiredStatusResult {
                expired: false,
                status: Some(record.status),
            });
        };

        // 3. Status-only merge write
        self.ledger.merge_status(&cmd.user_id, &patch).await?;
        record.apply_patch(&patch);

        tracing::info!(user_id = %cmd.user_id, "Subscription marked expired");

        // 4. Notify
        if patch.changes_premium() {
            notify::publish(
                self.event_publisher.as_ref(),
                &PremiumStatusChanged::new(cmd.user_id, false),
            )
            .await;
        }

        Ok(SyncExpiredStatusResult {
            expired: true,
            status: Some(record.status),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{InMemoryDocumentStore, InMemoryEventBus};
    use crate::config::{CreditConfig, LedgerConfig};
    use crate::domain::billing::{LedgerChange, SubscriptionSignal};

    struct Fixture {
        ledger: Arc<CreditLedgerTransaction>,
        bus: Arc<InMemoryEventBus>,
        handler: SyncExpiredStatusHandler,
    }

    fn setup() -> Fixture {
        let bus = Arc::new(InMemoryEventBus::new());
        let ledger = Arc::new(CreditLedgerTransaction::new(
            Arc::new(InMemoryDocumentStore::new()),
            CreditConfig::default(),
            LedgerConfig::default(),
        ));
        Fixture {
            handler: SyncExpiredStatusHandler::new(ledger.clone(), bus.clone()),
            ledger,
            bus,
        }
    }

    fn user() -> UserId {
        UserId::new("user-1").unwrap()
    }

    async fn seed(ledger: &CreditLedgerTransaction, expires_in_days: i64) {
        let change = LedgerChange {
            product_id: Some("app.monthly".to_string()),
            signal: SubscriptionSignal::premium(),
            expiration_date: Some(Timestamp::now().add_days(expires_in_days)),
            ..Default::default()
        };
        ledger.apply(&user(), &change).await.unwrap();
    }

    fn command() -> SyncExpiredStatusCommand {
        SyncExpiredStatusCommand { user_id: user() }
    }

    #[tokio::test]
    async fn lapsed_subscription_is_marked_expired() {
        let f = setup();
        seed(&f.ledger, -1).await;

        let result = f.handler.handle(command()).await.unwrap();

        assert!(result.expired);
        let record = f.ledger.read(&user()).await.unwrap().unwrap();
        assert_eq!(record.status, SubscriptionStatus::Expired);
        assert!(!record.is_premium);
        assert_eq!(record.will_renew, Some(false));
        assert_eq!(record.credits, 100);
        assert!(f.bus.has_event("premium_status.changed"));
    }

    #[tokio::test]
    async fn lapsed_free_record_expires_without_premium_event() {
        let f = setup();
        let change = LedgerChange {
            product_id: Some("app.monthly".to_string()),
            signal: SubscriptionSignal::free(),
            expiration_date: Some(Timestamp::now().minus_days(1)),
            ..Default::default()
        };
        f.ledger.apply(&user(), &change).await.unwrap();

        let result = f.handler.handle(command()).await.unwrap();

        assert!(result.expired);
        assert_eq!(result.status, Some(SubscriptionStatus::Expired));
        assert!(!f.bus.has_event("premium_status.changed"));
    }

    #[tokio::test]
    async fn future_expiration_is_left_alone() {
        let f = setup();
        seed(&f.ledger, 10).await;

        let result = f.handler.handle(command()).await.unwrap();

        assert!(!result.expired);
        assert_eq!(result.status, Some(SubscriptionStatus::Active));
        assert!(!f.bus.has_event("premium_status.changed"));
    }

    #[tokio::test]
    async fn already_expired_is_not_rewritten() {
        let f = setup();
        seed(&f.ledger, -1).await;
        f.handler.handle(command()).await.unwrap();
        f.bus.clear();

        let result = f.handler.handle(command()).await.unwrap();

        assert!(!result.expired);
        assert_eq!(f.bus.event_count(), 0);
    }

    #[tokio::test]
    async fn missing_record_is_a_no_op() {
        let f = setup();

        let result = f.handler.handle(command()).await.unwrap();

        assert_eq!(
            result,
            SyncExpiredStatusResult {
                expired: false,
                status: None
            }
        );
    }
}
