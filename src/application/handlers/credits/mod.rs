//! Credit handlers.
//!
//! The public operation surface over the credit ledger.
//!
//! ## Commands
//! - Initializing or updating credits from a billing change
//! - Deducting and refunding credits
//! - Marking lapsed subscriptions expired
//!
//! ## Queries
//! - Get the ledger record

mod deduct_credit;
mod get_credits;
mod initialize_credits;
mod refund_credit;
mod sync_expired_status;

pub(crate) use initialize_credits::publish_outcome;

// Commands
pub use deduct_credit::{DeductCreditCommand, DeductCreditHandler, DeductCreditResult};
pub use initialize_credits::{
    InitializeCreditsCommand, InitializeCreditsHandler, InitializeCreditsResult,
};
pub use refund_credit::{RefundCreditCommand, RefundCreditHandler, RefundCreditResult};
pub use sync_expired_status::{
    SyncExpiredStatusCommand, SyncExpiredStatusHandler, SyncExpiredStatusResult,
};

// Queries
pub use get_credits::{GetCreditsHandler, GetCreditsQuery, GetCreditsResult};
