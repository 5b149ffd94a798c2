//! Application handlers.
//!
//! Command and query handlers that orchestrate domain operations.

pub mod credits;

pub use credits::{
    DeductCreditCommand, DeductCreditHandler, DeductCreditResult, GetCreditsHandler,
    GetCreditsQuery, GetCreditsResult, InitializeCreditsCommand, InitializeCreditsHandler,
    InitializeCreditsResult, RefundCreditCommand, RefundCreditHandler, RefundCreditResult,
    SyncExpiredStatusCommand, SyncExpiredStatusHandler, SyncExpiredStatusResult,
};
