//! Billing module - credit ledger and subscription status domain.
//!
//! Pure logic only; storage and provider access live behind ports.
//!
//! # Module Organization
//!
//! - `signal` - Raw billing facts consumed by status resolution
//! - `status` - Six-state status decision table
//! - `package_type` - Billing cadence derived from product ids
//! - `allocation` - Credit limits and balance transforms
//! - `purchase_id` - Idempotency keys for billing events
//! - `renewal` - Renewal and plan-change detection
//! - `ledger` - Ledger record and its pure transition
//! - `events` - Outbound ledger events

mod allocation;
mod errors;
mod events;
mod ledger;
mod package_type;
pub mod purchase_id;
mod renewal;
mod signal;
mod status;

pub use allocation::{
    is_consumable, resolve_balance, resolve_credit_limit, top_up_amount, BalanceContext,
    BalanceResolution,
};
pub use errors::CreditError;
pub use events::{CreditsUpdated, PremiumStatusChanged, PurchaseCompleted, RenewalDetected};
pub use ledger::{
    LedgerChange, LedgerDecision, LedgerRecord, PurchaseEvent, PurchaseKind, PurchaseMetadata,
    PurchaseSource, StatusPatch,
};
pub use package_type::PackageType;
pub use renewal::{detect as detect_entitlement_change, EntitlementBaseline, EntitlementChange};
pub use signal::{PeriodType, SubscriptionSignal};
pub use status::SubscriptionStatus;
