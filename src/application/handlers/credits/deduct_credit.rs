//! DeductCreditHandler - Command handler for spending credits.

use std::sync::Arc;

use crate::application::ledger_transaction::CreditLedgerTransaction;
use crate::application::notify;
use crate::domain::billing::{CreditError, CreditsUpdated};
use crate::domain::foundation::UserId;
use crate::ports::EventPublisher;

/// Command to deduct credits from a user's balance.
#[derive(Debug, Clone)]
pub struct DeductCreditCommand {
    pub user_id: UserId,
    pub cost: i64,
}

/// Result of a successful deduction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeductCreditResult {
    pub balance: i64,
}

/// Handler for `deductCredit`.
///
/// The deduction runs in the same atomic read-modify-write as billing
/// changes and never touches the processed purchase ids.
pub struct DeductCreditHandler {
    ledger: Arc<CreditLedgerTransaction>,
    event_publisher: Arc<dyn EventPublisher>,
}

impl DeductCreditHandler {
    pub fn new(
        ledger: Arc<CreditLedgerTransaction>,
        event_publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            ledger,
            event_publisher,
        }
    }

    pub async fn handle(&self, cmd: DeductCreditCommand) -> Result<DeductCreditResult, CreditError> {
        // 1. Validate amount
        validate_amount("cost", cmd.cost, self.ledger.ledger_config().max_credit_amount)?;

        // 2. Deduct atomically
        let record = self.ledger.deduct(&cmd.user_id, cmd.cost).await?;

        tracing::info!(
            user_id = %cmd.user_id,
            cost = cmd.cost,
            balance = record.credits,
            "Credits deducted"
        );

        // 3. Notify
        notify::publish(
            self.event_publisher.as_ref(),
            &CreditsUpdated::new(cmd.user_id, record.credits, record.credit_limit),
        )
        .await;

        Ok(DeductCreditResult {
            balance: record.credits,
        })
    }
}

/// Amounts must be positive and at most `max`.
pub(crate) fn validate_amount(field: &str, amount: i64, max: i64) -> Result<(), CreditError> {
    if amount <= 0 {
        return Err(CreditError::validation(field, format!("{} must be positive", field)));
    }
    if amount > max {
        return Err(CreditError::validation(
            field,
            format!("{} must not exceed {}", field, max),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{InMemoryDocumentStore, InMemoryEventBus};
    use crate::config::{CreditConfig, LedgerConfig};
    use crate::domain::billing::{LedgerChange, SubscriptionSignal};
    use crate::domain::foundation::PurchaseId;

    struct Fixture {
        ledger: Arc<CreditLedgerTransaction>,
        bus: Arc<InMemoryEventBus>,
        handler: DeductCreditHandler,
    }

    fn setup() -> Fixture {
        let bus = Arc::new(InMemoryEventBus::new());
        let ledger = Arc::new(CreditLedgerTransaction::new(
            Arc::new(InMemoryDocumentStore::new()),
            CreditConfig::default(),
            LedgerConfig::default(),
        ));
        Fixture {
            handler: DeductCreditHandler::new(ledger.clone(), bus.clone()),
            ledger,
            bus,
        }
    }

    fn user() -> UserId {
        UserId::new("user-1").unwrap()
    }

    async fn seed_monthly(ledger: &CreditLedgerTransaction) {
        let change = LedgerChange {
            purchase_id: Some(PurchaseId::new("purchase_txn_1").unwrap()),
            product_id: Some("app.monthly".to_string()),
            signal: SubscriptionSignal::premium(),
            ..Default::default()
        };
        ledger.apply(&user(), &change).await.unwrap();
    }

    fn deduct(cost: i64) -> DeductCreditCommand {
        DeductCreditCommand {
            user_id: user(),
            cost,
        }
    }

    #[tokio::test]
    async fn deduct_decreases_balance_by_cost() {
        let f = setup();
        seed_monthly(&f.ledger).await;

        let result = f.handler.handle(deduct(30)).await.unwrap();

        assert_eq!(result.balance, 70);
        assert!(f.bus.has_event("credits.updated"));
    }

    #[tokio::test]
    async fn deduct_leaves_processed_ids_alone() {
        let f = setup();
        seed_monthly(&f.ledger).await;
        let before = f.ledger.read(&user()).await.unwrap().unwrap();

        f.handler.handle(deduct(10)).await.unwrap();

        let after = f.ledger.read(&user()).await.unwrap().unwrap();
        assert_eq!(after.processed_purchase_ids, before.processed_purchase_ids);
        assert_eq!(after.purchase_history, before.purchase_history);
    }

    #[tokio::test]
    async fn insufficient_balance_leaves_balance_unchanged() {
        let f = setup();
        seed_monthly(&f.ledger).await;

        let result = f.handler.handle(deduct(101)).await;

        assert_eq!(
            result,
            Err(CreditError::InsufficientBalance {
                requested: 101,
                available: 100
            })
        );
        assert_eq!(f.ledger.read(&user()).await.unwrap().unwrap().credits, 100);
        assert!(!f.bus.has_event("credits.updated"));
    }

    #[tokio::test]
    async fn unknown_user_is_not_found() {
        let f = setup();

        let result = f.handler.handle(deduct(1)).await;

        assert_eq!(result, Err(CreditError::not_found(user())));
    }

    #[tokio::test]
    async fn non_positive_cost_is_rejected() {
        let f = setup();
        seed_monthly(&f.ledger).await;

        assert!(matches!(
            f.handler.handle(deduct(0)).await,
            Err(CreditError::Validation { .. })
        ));
        assert!(matches!(
            f.handler.handle(deduct(-5)).await,
            Err(CreditError::Validation { .. })
        ));
    }

    #[tokio::test]
    async fn cost_above_ceiling_is_rejected() {
        let f = setup();

        let result = f.handler.handle(deduct(10_001)).await;

        assert!(matches!(result, Err(CreditError::Validation { .. })));
    }
}
