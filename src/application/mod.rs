//! Application layer - Commands, Queries, and Handlers.
//!
//! This layer orchestrates domain operations and coordinates between ports.
//! Following CQRS, it separates command handlers (write) from query handlers (read).
//!
//! - `ledger_transaction` - Atomic, idempotent ledger writes with bounded retry
//! - `handlers` - Public credit operations
//! - `coordinator` - Single-flight provider configure and identity switches
//! - `sync_service` - Provider callbacks into ledger changes and events
//! - `bootstrap` - Wiring and subscription system initialization

pub mod bootstrap;
pub mod coordinator;
pub mod handlers;
pub mod ledger_transaction;
mod notify;
pub mod sync_service;

pub use bootstrap::{CreditSyncState, InitializationReport};
pub use coordinator::{
    AppIdentity, ConfigurationState, CoordinatorError, ProviderInitializationCoordinator,
};
pub use handlers::{
    DeductCreditCommand, DeductCreditHandler, DeductCreditResult, GetCreditsHandler,
    GetCreditsQuery, GetCreditsResult, InitializeCreditsCommand, InitializeCreditsHandler,
    InitializeCreditsResult, RefundCreditCommand, RefundCreditHandler, RefundCreditResult,
    SyncExpiredStatusCommand, SyncExpiredStatusHandler, SyncExpiredStatusResult,
};
pub use ledger_transaction::{ApplyOutcome, CreditLedgerTransaction};
pub use sync_service::{SyncError, SyncOutcome, SyncService};
