//! Per-user credit ledger record and the pure transition applied to it.
//!
//! The record is persisted as a camelCase JSON document keyed by user id.
//! It is created lazily by the first transaction and never deleted; expiry
//! is a status transition.

use serde::{Deserialize, Serialize};

use super::allocation::{self, BalanceContext};
use super::errors::CreditError;
use super::package_type::PackageType;
use super::signal::{PeriodType, SubscriptionSignal};
use super::status::SubscriptionStatus;
use crate::config::{CreditConfig, LedgerConfig};
use crate::domain::foundation::{PurchaseId, Timestamp};

/// How a purchase relates to the user's previous tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseKind {
    Initial,
    Renewal,
    Upgrade,
    Downgrade,
}

/// Where a ledger change originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseSource {
    /// Explicit initialization from the application.
    #[default]
    Initialization,
    Purchase,
    Renewal,
    Restore,
    StatusSync,
}

/// Audit entry kept in the bounded purchase history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purchase_id: Option<PurchaseId>,
    pub kind: PurchaseKind,
    pub product_id: String,
    pub source: PurchaseSource,
    /// Balance after the change was applied.
    pub credits: i64,
    pub credit_limit: i64,
    pub status: SubscriptionStatus,
    pub applied_at: Timestamp,
}

/// Billing event as built by the sync service. Ephemeral.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseEvent {
    pub id: PurchaseId,
    pub kind: Option<PurchaseKind>,
    pub product_id: String,
    pub source: PurchaseSource,
    pub signal: SubscriptionSignal,
    pub expiration_date: Option<Timestamp>,
    pub is_status_sync_only: bool,
}

/// Input to one ledger transaction.
///
/// Unlike [`PurchaseEvent`] the idempotency key and product are optional,
/// matching the public `initializeCredits` surface.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerChange {
    pub purchase_id: Option<PurchaseId>,
    pub product_id: Option<String>,
    pub source: PurchaseSource,
    pub signal: SubscriptionSignal,
    pub kind: Option<PurchaseKind>,
    pub expiration_date: Option<Timestamp>,
    pub is_status_sync_only: bool,
}

impl From<PurchaseEvent> for LedgerChange {
    fn from(event: PurchaseEvent) -> Self {
        Self {
            purchase_id: Some(event.id),
            product_id: Some(event.product_id),
            source: event.source,
            signal: event.signal,
            kind: event.kind,
            expiration_date: event.expiration_date,
            is_status_sync_only: event.is_status_sync_only,
        }
    }
}

/// Outcome of planning a change against the current record.
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerDecision {
    /// The purchase id was already applied; nothing to write.
    AlreadyProcessed,
    /// A status-only sync that would rewrite identical values.
    Unchanged,
    /// The record to write.
    Commit(LedgerRecord),
}

/// Persisted per-user credit and subscription state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerRecord {
    #[serde(default)]
    pub is_premium: bool,
    #[serde(default)]
    pub status: SubscriptionStatus,
    #[serde(default)]
    pub credits: i64,
    #[serde(default)]
    pub credit_limit: i64,
    #[serde(default)]
    pub product_id: Option<String>,
    #[serde(default)]
    pub package_type: Option<PackageType>,
    #[serde(default)]
    pub expiration_date: Option<Timestamp>,
    #[serde(default)]
    pub will_renew: Option<bool>,
    #[serde(default)]
    pub period_type: Option<PeriodType>,
    #[serde(default)]
    pub processed_purchase_ids: Vec<PurchaseId>,
    #[serde(default)]
    pub purchase_history: Vec<PurchaseMetadata>,
    #[serde(default)]
    pub last_updated_at: Timestamp,
    #[serde(default)]
    pub last_purchase_at: Option<Timestamp>,
}

impl LedgerRecord {
    /// Zero-value record used when the user has no document yet.
    pub fn empty(now: Timestamp) -> Self {
        Self {
            is_premium: false,
            status: SubscriptionStatus::None,
            credits: 0,
            credit_limit: 0,
            product_id: None,
            package_type: None,
            expiration_date: None,
            will_renew: None,
            period_type: None,
            processed_purchase_ids: Vec::new(),
            purchase_history: Vec::new(),
            last_updated_at: now,
            last_purchase_at: None,
        }
    }

    pub fn has_processed(&self, purchase_id: &PurchaseId) -> bool {
        self.processed_purchase_ids.contains(purchase_id)
    }

    /// Plans `change` against `current` without touching storage.
    ///
    /// Returns the record to commit, or why nothing should be written.
    pub fn plan(
        current: Option<&LedgerRecord>,
        change: &LedgerChange,
        credits: &CreditConfig,
        ledger: &LedgerConfig,
        now: Timestamp,
    ) -> Result<LedgerDecision, CreditError> {
        if let (Some(record), Some(id)) = (current, &change.purchase_id) {
            if record.has_processed(id) {
                return Ok(LedgerDecision::AlreadyProcessed);
            }
        }

        let existing = current.cloned().unwrap_or_else(|| LedgerRecord::empty(now));
        let product_id = change
            .product_id
            .clone()
            .filter(|p| !p.trim().is_empty())
            .or_else(|| existing.product_id.clone())
            .unwrap_or_else(|| credits.no_subscription_product_id.clone());

        let is_top_up = allocation::is_consumable(&product_id, credits);
        let new_credit_limit = if is_top_up {
            existing.credit_limit
        } else {
            allocation::resolve_credit_limit(&product_id, credits)?
        };

        let balance = allocation::resolve_balance(
            &BalanceContext {
                status: SubscriptionStatus::resolve(&change.signal),
                is_status_sync_only: change.is_status_sync_only,
                existing: current,
                new_credit_limit,
                is_subscription_active: change.signal.is_subscription_active(),
                product_id: &product_id,
            },
            credits,
        )?;

        if balance.skip {
            return Ok(LedgerDecision::Unchanged);
        }

        let kind = change.kind.unwrap_or_else(|| {
            existing.classify_kind(new_credit_limit, change.purchase_id.as_ref(), credits)
        });

        let mut next = existing;
        next.credits = balance.credits;
        next.credit_limit = balance.credit_limit;
        next.is_premium = balance.is_premium;
        next.status = balance.status;
        if !balance.is_top_up {
            next.package_type = balance
                .product_id
                .as_deref()
                .map(PackageType::from_product_id);
            next.product_id = balance.product_id;
            next.expiration_date = change.expiration_date;
            next.will_renew = change.signal.will_renew;
            next.period_type = change.signal.period_type;
        }
        next.last_updated_at = now;
        if change.source != PurchaseSource::StatusSync {
            next.last_purchase_at = Some(now);
        }

        let metadata = PurchaseMetadata {
            purchase_id: change.purchase_id.clone(),
            kind,
            product_id,
            source: change.source,
            credits: next.credits,
            credit_limit: next.credit_limit,
            status: next.status,
            applied_at: now,
        };
        next.remember(metadata, ledger);

        Ok(LedgerDecision::Commit(next))
    }

    /// Classifies a subscription change against this (prior) record.
    ///
    /// No prior product means `Initial`; otherwise the limits decide, and an
    /// equal limit is a `Renewal` only for renewal-shaped keys.
    pub fn classify_kind(
        &self,
        new_credit_limit: i64,
        purchase_id: Option<&PurchaseId>,
        credits: &CreditConfig,
    ) -> PurchaseKind {
        let had_product = self
            .product_id
            .as_deref()
            .is_some_and(|p| p != credits.no_subscription_product_id);
        if !had_product {
            return PurchaseKind::Initial;
        }

        match new_credit_limit.cmp(&self.credit_limit) {
            std::cmp::Ordering::Greater => PurchaseKind::Upgrade,
            std::cmp::Ordering::Less => PurchaseKind::Downgrade,
            std::cmp::Ordering::Equal if purchase_id.is_some_and(|id| id.is_renewal()) => {
                PurchaseKind::Renewal
            }
            std::cmp::Ordering::Equal => PurchaseKind::Initial,
        }
    }

    /// Appends to the history and processed-id windows, evicting oldest first.
    fn remember(&mut self, metadata: PurchaseMetadata, ledger: &LedgerConfig) {
        if let Some(id) = &metadata.purchase_id {
            self.processed_purchase_ids.retain(|existing| existing != id);
            self.processed_purchase_ids.push(id.clone());
            truncate_front(&mut self.processed_purchase_ids, ledger.processed_ids_window);
        }
        self.purchase_history.push(metadata);
        truncate_front(&mut self.purchase_history, ledger.purchase_history_window);
    }

    /// Removes `cost` credits.
    pub fn deduct(&mut self, cost: i64, now: Timestamp) -> Result<(), CreditError> {
        if cost > self.credits {
            return Err(CreditError::insufficient_balance(cost, self.credits));
        }
        self.credits -= cost;
        self.last_updated_at = now;
        Ok(())
    }

    /// Returns `amount` credits to the balance.
    pub fn refund(&mut self, amount: i64, now: Timestamp) {
        self.credits = self.credits.saturating_add(amount);
        self.last_updated_at = now;
    }

    /// Merge patch carrying only the status fields that differ from this
    /// record, or `None` when the signal changes nothing.
    pub fn status_patch(
        &self,
        signal: &SubscriptionSignal,
        expiration_date: Option<Timestamp>,
        now: Timestamp,
    ) -> Option<StatusPatch> {
        let status = SubscriptionStatus::resolve(signal);
        let is_premium = signal.is_subscription_active();

        let patch = StatusPatch {
            is_premium: (is_premium != self.is_premium).then_some(is_premium),
            status: (status != self.status).then_some(status),
            will_renew: (signal.will_renew.is_some() && signal.will_renew != self.will_renew)
                .then_some(signal.will_renew)
                .flatten(),
            period_type: (signal.period_type.is_some()
                && signal.period_type != self.period_type)
                .then_some(signal.period_type)
                .flatten(),
            expiration_date: (expiration_date.is_some() && expiration_date != self.expiration_date)
                .then_some(expiration_date)
                .flatten(),
            last_updated_at: now,
        };

        (!patch.is_empty()).then_some(patch)
    }

    /// Patch marking this record expired, or `None` when it is not due.
    pub fn expiry_patch(&self, now: Timestamp) -> Option<StatusPatch> {
        let expired = self.expiration_date.is_some_and(|at| at.is_before(&now));
        if !expired || self.status == SubscriptionStatus::Expired {
            return None;
        }
        Some(StatusPatch {
            is_premium: self.is_premium.then_some(false),
            status: Some(SubscriptionStatus::Expired),
            will_renew: Some(false),
            period_type: None,
            expiration_date: None,
            last_updated_at: now,
        })
    }

    /// Applies a merge patch in memory, mirroring the store's merge write.
    pub fn apply_patch(&mut self, patch: &StatusPatch) {
        if let Some(is_premium) = patch.is_premium {
            self.is_premium = is_premium;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(will_renew) = patch.will_renew {
            self.will_renew = Some(will_renew);
        }
        if let Some(period_type) = patch.period_type {
            self.period_type = Some(period_type);
        }
        if let Some(expiration_date) = patch.expiration_date {
            self.expiration_date = Some(expiration_date);
        }
        self.last_updated_at = patch.last_updated_at;
    }
}

/// Partial document for status-only merge writes. Never touches credits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_premium: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<SubscriptionStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub will_renew: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period_type: Option<PeriodType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<Timestamp>,
    pub last_updated_at: Timestamp,
}

impl StatusPatch {
    fn is_empty(&self) -> bool {
        self.is_premium.is_none()
            && self.status.is_none()
            && self.will_renew.is_none()
            && self.period_type.is_none()
            && self.expiration_date.is_none()
    }

    /// True when the patch flips the premium flag.
    pub fn changes_premium(&self) -> bool {
        self.is_premium.is_some()
    }
}

fn truncate_front<T>(items: &mut Vec<T>, window: usize) {
    if items.len() > window {
        let excess = items.len() - window;
        items.drain(..excess);
    }
}
