//! Idempotency keys for billing events.
//!
//! - `purchase_{txn}` or `purchase_{product}_{epoch_ms}` when the provider
//!   gave no transaction id
//! - `renewal_{txn}_{expiration}`, stable across duplicate callbacks for the
//!   same renewal
//! - `plan_change_{txn}_{product}_{expiration}`, one per new plan period
//! - `status_sync_{user}_{premium|free}`, coarse so repeated listener
//!   callbacks collapse onto one key

use crate::domain::foundation::{PurchaseId, Timestamp, UserId};

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Key for a completed purchase.
pub fn for_purchase(
    original_transaction_id: Option<&str>,
    product_id: &str,
    now: Timestamp,
) -> PurchaseId {
    let key = match non_blank(original_transaction_id) {
        Some(txn) => format!("purchase_{}", txn),
        None => format!("purchase_{}_{}", product_id, now.as_unix_millis()),
    };
    PurchaseId::from_trusted(key)
}

/// Key for a renewal, deterministic in the transaction id and new expiration.
///
/// Falls back to the product id when the provider gave no transaction id.
pub fn for_renewal(
    original_transaction_id: Option<&str>,
    product_id: &str,
    expiration_date: Timestamp,
) -> PurchaseId {
    let txn = non_blank(original_transaction_id).unwrap_or(product_id);
    PurchaseId::from_trusted(format!(
        "renewal_{}_{}",
        txn,
        expiration_date.to_rfc3339_millis()
    ))
}

/// Key for a switch to `product_id` observed by the listener.
///
/// Plan changes keep the subscription's original transaction id, so the
/// new product and expiration are part of the key.
pub fn for_plan_change(
    original_transaction_id: Option<&str>,
    product_id: &str,
    expiration_date: Timestamp,
) -> PurchaseId {
    let txn = non_blank(original_transaction_id).unwrap_or("none");
    PurchaseId::from_trusted(format!(
        "plan_change_{}_{}_{}",
        txn,
        product_id,
        expiration_date.to_rfc3339_millis()
    ))
}

/// Key for a passive status re-sync.
pub fn for_status_sync(user_id: &UserId, is_premium: bool) -> PurchaseId {
    let tier = if is_premium { "premium" } else { "free" };
    PurchaseId::from_trusted(format!("status_sync_{}_{}", user_id, tier))
}
