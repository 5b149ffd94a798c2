//! Ledger domain events.
//!
//! Published on the outbound event bus after a ledger change commits:
//! - `credits.updated` - balance or limit changed
//! - `purchase.completed` - a purchase was applied
//! - `renewal.detected` - a renewal was applied
//! - `premium_status.changed` - the premium flag flipped
//!
//! Every event uses the user id as aggregate id.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{domain_event, EventId, Timestamp, UserId};

use super::ledger::PurchaseKind;

/// Balance or limit of a ledger changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditsUpdated {
    pub event_id: EventId,
    pub user_id: UserId,
    pub credits: i64,
    pub credit_limit: i64,
    pub occurred_at: Timestamp,
}

impl CreditsUpdated {
    pub fn new(user_id: UserId, credits: i64, credit_limit: i64) -> Self {
        Self {
            event_id: EventId::new(),
            user_id,
            credits,
            credit_limit,
            occurred_at: Timestamp::now(),
        }
    }
}

domain_event!(
    CreditsUpdated,
    event_type = "credits.updated",
    aggregate_id = user_id,
    aggregate_type = "Ledger",
    occurred_at = occurred_at,
    event_id = event_id
);

/// A purchase was applied to the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseCompleted {
    pub event_id: EventId,
    pub user_id: UserId,
    pub product_id: String,
    pub kind: PurchaseKind,
    pub occurred_at: Timestamp,
}

impl PurchaseCompleted {
    pub fn new(user_id: UserId, product_id: impl Into<String>, kind: PurchaseKind) -> Self {
        Self {
            event_id: EventId::new(),
            user_id,
            product_id: product_id.into(),
            kind,
            occurred_at: Timestamp::now(),
        }
    }
}

domain_event!(
    PurchaseCompleted,
    event_type = "purchase.completed",
    aggregate_id = user_id,
    aggregate_type = "Ledger",
    occurred_at = occurred_at,
    event_id = event_id
);

/// A subscription renewal was applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenewalDetected {
    pub event_id: EventId,
    pub user_id: UserId,
    pub product_id: String,
    pub expiration_date: Option<Timestamp>,
    pub occurred_at: Timestamp,
}

impl RenewalDetected {
    pub fn new(
        user_id: UserId,
        product_id: impl Into<String>,
        expiration_date: Option<Timestamp>,
    ) -> Self {
        Self {
            event_id: EventId::new(),
            user_id,
            product_id: product_id.into(),
            expiration_date,
            occurred_at: Timestamp::now(),
        }
    }
}

domain_event!(
    RenewalDetected,
    event_type = "renewal.detected",
    aggregate_id = user_id,
    aggregate_type = "Ledger",
    occurred_at = occurred_at,
    event_id = event_id
);

/// The premium flag of a ledger flipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PremiumStatusChanged {
    pub event_id: EventId,
    pub user_id: UserId,
    pub is_premium: bool,
    pub occurred_at: Timestamp,
}

impl PremiumStatusChanged {
    pub fn new(user_id: UserId, is_premium: bool) -> Self {
        Self {
            event_id: EventId::new(),
            user_id,
            is_premium,
            occurred_at: Timestamp::now(),
        }
    }
}

domain_event!(
    PremiumStatusChanged,
    event_type = "premium_status.changed",
    aggregate_id = user_id,
    aggregate_type = "Ledger",
    occurred_at = occurred_at,
    event_id = event_id
);
