//! GetCreditsHandler - Query handler for reading a user's ledger.

use std::sync::Arc;

use crate::application::ledger_transaction::CreditLedgerTransaction;
use crate::domain::billing::{CreditError, LedgerRecord};
use crate::domain::foundation::UserId;

/// Query to get a user's ledger.
#[derive(Debug, Clone)]
pub struct GetCreditsQuery {
    pub user_id: UserId,
}

/// Result of a ledger query; `None` when the user has no record yet.
pub type GetCreditsResult = Option<LedgerRecord>;

/// Handler for `getCredits`.
pub struct GetCreditsHandler {
    ledger: Arc<CreditLedgerTransaction>,
}

impl GetCreditsHandler {
    pub fn new(ledger: Arc<CreditLedgerTransaction>) -> Self {
        Self { ledger }
    }

    pub async fn handle(&self, query: GetCreditsQuery) -> Result<GetCreditsResult, CreditError> {
        self.ledger.read(&query.user_id).await
    }
}
