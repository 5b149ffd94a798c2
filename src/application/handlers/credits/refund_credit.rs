//! RefundCreditHandler - Command handler for returning credits.

use std::sync::Arc;

use super::deduct_credit::validate_amount;
use crate::application::ledger_transaction::CreditLedgerTransaction;
use crate::application::notify;
use crate::domain::billing::{CreditError, CreditsUpdated};
use crate::domain::foundation::UserId;
use crate::ports::EventPublisher;

/// Command to refund credits, e.g. after a failed credit-gated action.
#[derive(Debug, Clone)]
pub struct RefundCreditCommand {
    pub user_id: UserId,
    pub amount: i64,
}

/// Result of a successful refund.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefundCreditResult {
    pub balance: i64,
}

/// Handler for `refundCredit`.
///
/// Refunds are not capped at the credit limit.
pub struct RefundCreditHandler {
    ledger: Arc<CreditLedgerTransaction>,
    event_publisher: Arc<dyn EventPublisher>,
}

impl RefundCreditHandler {
    pub fn new(
        ledger: Arc<CreditLedgerTransaction>,
        event_publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            ledger,
            event_publisher,
        }
    }

    pub async fn handle(&self, cmd: RefundCreditCommand) -> Result<RefundCreditResult, CreditError> {
        validate_amount("amount", cmd.amount, self.ledger.ledger_config().max_credit_amount)?;

        let record = self.ledger.refund(&cmd.user_id, cmd.amount).await?;
        tracing::info!(
            user_id = %cmd.user_id,
            amount = cmd.amount,
            balance = record.credits,
            "Credits refunded"
        );

        notify::publish(
            self.event_publisher.as_ref(),
            &CreditsUpdated::new(cmd.user_id, record.credits, record.credit_limit),
        )
        .await;

        Ok(RefundCreditResult {
            balance: record.credits,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{InMemoryDocumentStore, InMemoryEventBus};
    use crate::config::{CreditConfig, LedgerConfig};
    use crate::domain::billing::{LedgerChange, SubscriptionSignal};

    fn user() -> UserId {
        UserId::new("user-1").unwrap()
    }

    fn setup() -> (Arc<CreditLedgerTransaction>, RefundCreditHandler) {
        let ledger = Arc::new(CreditLedgerTransaction::new(
            Arc::new(InMemoryDocumentStore::new()),
            CreditConfig::default(),
            LedgerConfig::default(),
        ));
        let handler = RefundCreditHandler::new(ledger.clone(), Arc::new(InMemoryEventBus::new()));
        (ledger, handler)
    }

    #[tokio::test]
    async fn refund_adds_to_balance_beyond_limit() {
        let (ledger, handler) = setup();
        let change = LedgerChange {
            product_id: Some("app.weekly".to_string()),
            signal: SubscriptionSignal::premium(),
            ..Default::default()
        };
        ledger.apply(&user(), &change).await.unwrap();

        let result = handler
            .handle(RefundCreditCommand {
                user_id: user(),
                amount: 5,
            })
            .await
            .unwrap();

        assert_eq!(result.balance, 30);
    }

    #[tokio::test]
    async fn refund_without_record_is_not_found() {
        let (_, handler) = setup();

        let result = handler
            .handle(RefundCreditCommand {
                user_id: user(),
                amount: 5,
            })
            .await;

        assert_eq!(result, Err(CreditError::not_found(user())));
    }

    #[tokio::test]
    async fn zero_refund_is_rejected() {
        let (_, handler) = setup();

        let result = handler
            .handle(RefundCreditCommand {
                user_id: user(),
                amount: 0,
            })
            .await;

        assert!(matches!(result, Err(CreditError::Validation { .. })));
    }
}
