//! Renewal detection - diffs the previously seen entitlement against the
//! provider's current snapshot.

use super::allocation::resolve_credit_limit;
use super::errors::CreditError;
use super::ledger::PurchaseKind;
use crate::config::CreditConfig;
use crate::domain::foundation::Timestamp;

/// The part of an entitlement the detector compares.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntitlementBaseline {
    pub product_id: Option<String>,
    pub expiration_date: Option<Timestamp>,
}

impl EntitlementBaseline {
    pub fn new(product_id: Option<String>, expiration_date: Option<Timestamp>) -> Self {
        Self {
            product_id,
            expiration_date,
        }
    }
}

/// Result of comparing two entitlement baselines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntitlementChange {
    /// Same product, strictly later expiration.
    Renewal,
    /// Different product than before; carries `Upgrade` or `Downgrade`.
    PlanChange(PurchaseKind),
    /// First sighting or nothing material; routed to status sync.
    None,
}

/// Classifies the change between `previous` and `current`.
///
/// Plan changes compare resolved credit limits: a greater or equal limit is
/// an upgrade, a lesser one a downgrade. Fails when either product has no
/// resolvable limit.
pub fn detect(
    previous: &EntitlementBaseline,
    current: &EntitlementBaseline,
    config: &CreditConfig,
) -> Result<EntitlementChange, CreditError> {
    let (Some(previous_product), Some(current_product)) =
        (previous.product_id.as_deref(), current.product_id.as_deref())
    else {
        return Ok(EntitlementChange::None);
    };

    if previous_product == current_product {
        let renewed = match (previous.expiration_date, current.expiration_date) {
            (Some(before), Some(after)) => after.is_after(&before),
            _ => false,
        };
        return Ok(if renewed {
            EntitlementChange::Renewal
        } else {
            EntitlementChange::None
        });
    }

    let previous_limit = resolve_credit_limit(previous_product, config)?;
    let current_limit = resolve_credit_limit(current_product, config)?;
    let kind = if current_limit >= previous_limit {
        PurchaseKind::Upgrade
    } else {
        PurchaseKind::Downgrade
    };
    Ok(EntitlementChange::PlanChange(kind))
}
