//! SyncService - routes billing provider callbacks into the credit ledger.
//!
//! Purchases, renewals and plan changes go through the idempotent ledger
//! transaction. Passive status changes are merged without touching
//! credits, except a flip to premium, which is applied under the coarse
//! status-sync key. Events go out only after the ledger write committed.

use std::sync::Arc;

use thiserror::Error;

use super::coordinator::{CoordinatorError, ProviderInitializationCoordinator};
use super::handlers::credits::publish_outcome;
use super::ledger_transaction::{ApplyOutcome, CreditLedgerTransaction};
use super::notify;
use crate::domain::billing::{
    detect_entitlement_change, purchase_id, CreditError, EntitlementBaseline, EntitlementChange,
    LedgerChange, LedgerRecord, PremiumStatusChanged, PurchaseCompleted, PurchaseEvent,
    PurchaseKind, PurchaseSource, RenewalDetected, StatusPatch, SubscriptionSignal,
};
use crate::domain::foundation::{Timestamp, UserId};
use crate::ports::{BillingProvider, EntitlementSnapshot, EventPublisher, Package, ProviderError};

/// Errors from sync operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error(transparent)]
    Ledger(#[from] CreditError),

    #[error(transparent)]
    Coordinator(#[from] CoordinatorError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// The entitlement belongs to another identity; nothing was written.
    #[error("entitlement of {identity} cannot be applied to {user_id}")]
    IdentityMismatch { user_id: String, identity: String },
}

/// What a provider snapshot did to the ledger.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    /// Same product with a later expiration.
    Renewed(ApplyOutcome),
    /// Different product than the ledger's.
    PlanChanged {
        kind: PurchaseKind,
        outcome: ApplyOutcome,
    },
    /// First sighting or a flip to premium, applied as a ledger change.
    StatusApplied(ApplyOutcome),
    /// Status fields merged; credits untouched.
    StatusMerged(StatusPatch),
    /// Nothing changed.
    Unchanged,
}

/// Glue between provider callbacks and the ledger.
pub struct SyncService {
    ledger: Arc<CreditLedgerTransaction>,
    coordinator: ProviderInitializationCoordinator,
    provider: Arc<dyn BillingProvider>,
    event_publisher: Arc<dyn EventPublisher>,
    entitlement_id: String,
}

impl SyncService {
    pub fn new(
        ledger: Arc<CreditLedgerTransaction>,
        coordinator: ProviderInitializationCoordinator,
        provider: Arc<dyn BillingProvider>,
        event_publisher: Arc<dyn EventPublisher>,
        entitlement_id: impl Into<String>,
    ) -> Self {
        Self {
            ledger,
            coordinator,
            provider,
            event_publisher,
            entitlement_id: entitlement_id.into(),
        }
    }

    pub fn coordinator(&self) -> &ProviderInitializationCoordinator {
        &self.coordinator
    }

    /// Runs the provider purchase flow for `user_id` and applies the result.
    pub async fn purchase(
        &self,
        user_id: &UserId,
        package: &Package,
    ) -> Result<ApplyOutcome, SyncError> {
        self.coordinator.switch_user(user_id.as_str()).await?;

        let snapshot = match self.provider.purchase(package).await {
            Ok(snapshot) => snapshot,
            Err(ProviderError::PurchaseCancelled) => {
                tracing::info!(user_id = %user_id, product_id = %package.product_id, "Purchase cancelled");
                return Err(ProviderError::PurchaseCancelled.into());
            }
            Err(e) => return Err(e.into()),
        };

        self.on_purchase_completed(user_id, &package.product_id, &snapshot)
            .await
    }

    /// Restores previous purchases for `user_id` and reconciles the ledger.
    pub async fn restore(&self, user_id: &UserId) -> Result<SyncOutcome, SyncError> {
        self.coordinator.switch_user(user_id.as_str()).await?;
        let snapshot = self.provider.restore(user_id.as_str()).await?;
        self.reconcile(user_id, &snapshot, PurchaseSource::Restore)
            .await
    }

    /// Applies a completed purchase of `product_id`.
    ///
    /// Keyed on the provider's transaction id, so duplicate callbacks for
    /// one purchase apply once.
    pub async fn on_purchase_completed(
        &self,
        user_id: &UserId,
        product_id: &str,
        snapshot: &EntitlementSnapshot,
    ) -> Result<ApplyOutcome, SyncError> {
        self.ensure_identity(user_id, snapshot)?;

        let now = Timestamp::now();
        let event = PurchaseEvent {
            id: purchase_id::for_purchase(
                snapshot.original_transaction_id.as_deref(),
                product_id,
                now,
            ),
            kind: None,
            product_id: product_id.to_string(),
            source: PurchaseSource::Purchase,
            signal: snapshot.signal(&self.entitlement_id, now),
            expiration_date: snapshot.expiration_date,
            is_status_sync_only: false,
        };

        let outcome = self.ledger.apply(user_id, &event.into()).await?;
        if outcome.written {
            self.publish_purchase(user_id, product_id, &outcome).await;
        }
        Ok(outcome)
    }

    /// Reconciles the ledger with a snapshot pushed by the provider listener.
    pub async fn on_customer_info_updated(
        &self,
        user_id: &UserId,
        snapshot: &EntitlementSnapshot,
    ) -> Result<SyncOutcome, SyncError> {
        self.reconcile(user_id, snapshot, PurchaseSource::StatusSync)
            .await
    }

    /// Fetches the current snapshot and reconciles the ledger with it.
    pub async fn sync_current_status(&self, user_id: &UserId) -> Result<SyncOutcome, SyncError> {
        let snapshot = self.coordinator.current_entitlement().await?;
        self.on_customer_info_updated(user_id, &snapshot).await
    }

    async fn reconcile(
        &self,
        user_id: &UserId,
        snapshot: &EntitlementSnapshot,
        source: PurchaseSource,
    ) -> Result<SyncOutcome, SyncError> {
        let now = Timestamp::now();
        let signal = snapshot.signal(&self.entitlement_id, now);
        let current = snapshot.baseline(&self.entitlement_id);
        let record = self.ledger.read(user_id).await?;
        self.ensure_identity(user_id, snapshot)?;

        let previous = record
            .as_ref()
            .map(|r| EntitlementBaseline::new(r.product_id.clone(), r.expiration_date))
            .unwrap_or_default();
        let change = detect_entitlement_change(&previous, &current, self.ledger.credit_config())?;
        let txn = snapshot.original_transaction_id.as_deref();

        match (change, current.product_id.clone(), current.expiration_date) {
            (EntitlementChange::Renewal, Some(product_id), Some(expiration)) => {
                let change = LedgerChange {
                    purchase_id: Some(purchase_id::for_renewal(txn, &product_id, expiration)),
                    product_id: Some(product_id.clone()),
                    source: PurchaseSource::Renewal,
                    signal,
                    kind: Some(PurchaseKind::Renewal),
                    expiration_date: Some(expiration),
                    is_status_sync_only: false,
                };
                let outcome = self.ledger.apply(user_id, &change).await?;
                if outcome.written {
                    tracing::info!(user_id = %user_id, product_id = %product_id, "Renewal detected");
                    publish_outcome(self.event_publisher.as_ref(), user_id, &outcome).await;
                    notify::publish_correlated(
                        self.event_publisher.as_ref(),
                        &RenewalDetected::new(user_id.clone(), product_id, Some(expiration)),
                        outcome.purchase_id(),
                    )
                    .await;
                }
                Ok(SyncOutcome::Renewed(outcome))
            }
            (EntitlementChange::PlanChange(kind), Some(product_id), expiration) => {
                let change = LedgerChange {
                    purchase_id: Some(purchase_id::for_plan_change(
                        txn,
                        &product_id,
                        expiration.unwrap_or(now),
                    )),
                    product_id: Some(product_id.clone()),
                    source: match source {
                        PurchaseSource::Restore => PurchaseSource::Restore,
                        _ => PurchaseSource::Purchase,
                    },
                    signal,
                    kind: Some(kind),
                    expiration_date: expiration,
                    is_status_sync_only: false,
                };
                let outcome = self.ledger.apply(user_id, &change).await?;
                if outcome.written {
                    tracing::info!(user_id = %user_id, product_id = %product_id, kind = ?kind, "Plan change detected");
                    self.publish_purchase(user_id, &product_id, &outcome).await;
                }
                Ok(SyncOutcome::PlanChanged { kind, outcome })
            }
            _ => {
                self.sync_status(user_id, record, signal, &current, txn, source, now)
                    .await
            }
        }
    }

    /// Status path: merge when the premium flag holds or drops, apply when
    /// it turns on or the user has no ledger yet.
    #[allow(clippy::too_many_arguments)]
    async fn sync_status(
        &self,
        user_id: &UserId,
        record: Option<LedgerRecord>,
        signal: SubscriptionSignal,
        current: &EntitlementBaseline,
        txn: Option<&str>,
        source: PurchaseSource,
        now: Timestamp,
    ) -> Result<SyncOutcome, SyncError> {
        let premium_now = signal.is_subscription_active();

        if let Some(record) = record.as_ref().filter(|r| r.is_premium || !premium_now) {
            // Losing the entitlement is an expiry, not a return to "none"
            let signal = if record.is_premium && !premium_now {
                SubscriptionSignal {
                    is_expired: true,
                    ..signal
                }
            } else {
                signal
            };
            return self
                .merge_status(user_id, record, &signal, current.expiration_date, now)
                .await;
        }

        let (key, is_status_sync_only) = match (source, current.product_id.as_deref()) {
            (PurchaseSource::Restore, Some(product_id)) if premium_now => {
                (purchase_id::for_purchase(txn, product_id, now), false)
            }
            _ => (purchase_id::for_status_sync(user_id, premium_now), true),
        };
        let change = LedgerChange {
            purchase_id: Some(key),
            product_id: current.product_id.clone(),
            source,
            signal,
            kind: None,
            expiration_date: current.expiration_date,
            is_status_sync_only,
        };
        let outcome = self.ledger.apply(user_id, &change).await?;

        if outcome.already_processed {
            // The coarse key was used by an earlier flip; keep status current
            return self
                .merge_status(user_id, &outcome.record, &signal, current.expiration_date, now)
                .await;
        }

        publish_outcome(self.event_publisher.as_ref(), user_id, &outcome).await;
        Ok(SyncOutcome::StatusApplied(outcome))
    }

    async fn merge_status(
        &self,
        user_id: &UserId,
        record: &LedgerRecord,
        signal: &SubscriptionSignal,
        expiration_date: Option<Timestamp>,
        now: Timestamp,
    ) -> Result<SyncOutcome, SyncError> {
        let Some(patch) = record.status_patch(signal, expiration_date, now) else {
            tracing::debug!(user_id = %user_id, "Status unchanged");
            return Ok(SyncOutcome::Unchanged);
        };

        self.ledger.merge_status(user_id, &patch).await?;
        if patch.changes_premium() {
            notify::publish(
                self.event_publisher.as_ref(),
                &PremiumStatusChanged::new(user_id.clone(), patch.is_premium == Some(true)),
            )
            .await;
        }
        Ok(SyncOutcome::StatusMerged(patch))
    }

    /// Rejects a snapshot that belongs to another identity, or that arrives
    /// after the provider session moved on to someone else.
    fn ensure_identity(
        &self,
        user_id: &UserId,
        snapshot: &EntitlementSnapshot,
    ) -> Result<(), SyncError> {
        let current = self.coordinator.current_user();
        let foreign = [snapshot.app_user_id.as_deref(), current.as_deref()]
            .into_iter()
            .flatten()
            .find(|identity| *identity != user_id.as_str());

        match foreign {
            Some(identity) => {
                tracing::warn!(
                    user_id = %user_id,
                    identity,
                    "Discarding entitlement for another identity"
                );
                Err(SyncError::IdentityMismatch {
                    user_id: user_id.to_string(),
                    identity: identity.to_string(),
                })
            }
            None => Ok(()),
        }
    }

    async fn publish_purchase(&self, user_id: &UserId, product_id: &str, outcome: &ApplyOutcome) {
        publish_outcome(self.event_publisher.as_ref(), user_id, outcome).await;
        let kind = outcome
            .record
            .purchase_history
            .last()
            .map(|entry| entry.kind)
            .unwrap_or(PurchaseKind::Initial);
        notify::publish_correlated(
            self.event_publisher.as_ref(),
            &PurchaseCompleted::new(user_id.clone(), product_id, kind),
            outcome.purchase_id(),
        )
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{InMemoryDocumentStore, InMemoryEventBus, MockBillingProvider};
    use crate::config::{CreditConfig, LedgerConfig, ProviderConfig};
    use crate::domain::billing::{PeriodType, SubscriptionStatus};
    use secrecy::SecretString;
    use std::time::Duration;

    struct Fixture {
        mock: MockBillingProvider,
        bus: Arc<InMemoryEventBus>,
        ledger: Arc<CreditLedgerTransaction>,
        service: SyncService,
    }

    fn setup() -> Fixture {
        let mock = MockBillingProvider::new();
        let bus = Arc::new(InMemoryEventBus::new());
        let ledger = Arc::new(CreditLedgerTransaction::new(
            Arc::new(InMemoryDocumentStore::new()),
            CreditConfig::default(),
            LedgerConfig::default(),
        ));
        let config = ProviderConfig {
            api_key: Some(SecretString::new("appl_test".to_string())),
            ..Default::default()
        };
        let provider: Arc<dyn BillingProvider> = Arc::new(mock.clone());
        let coordinator = ProviderInitializationCoordinator::new(provider.clone(), config);
        let service = SyncService::new(ledger.clone(), coordinator, provider, bus.clone(), "premium");
        Fixture {
            mock,
            bus,
            ledger,
            service,
        }
    }

    fn user() -> UserId {
        UserId::new("user-1").unwrap()
    }

    fn snapshot(product: &str, expires_in_days: i64) -> EntitlementSnapshot {
        EntitlementSnapshot {
            app_user_id: Some("user-1".to_string()),
            active_entitlement_id: Some("premium".to_string()),
            product_id: Some(product.to_string()),
            expiration_date: Some(Timestamp::now().add_days(expires_in_days)),
            will_renew: Some(true),
            period_type: Some(PeriodType::Normal),
            original_transaction_id: Some("txn_1".to_string()),
        }
    }

    #[tokio::test]
    async fn purchase_callback_applies_once() {
        let f = setup();
        let snap = snapshot("app.monthly", 30);

        let first = f
            .service
            .on_purchase_completed(&user(), "app.monthly", &snap)
            .await
            .unwrap();
        let second = f
            .service
            .on_purchase_completed(&user(), "app.monthly", &snap)
            .await
            .unwrap();

        assert_eq!(first.credits, 100);
        assert!(second.already_processed);
        assert_eq!(f.bus.events_of_type("purchase.completed").len(), 1);
    }

    #[tokio::test]
    async fn later_expiration_is_a_renewal() {
        let f = setup();
        f.service
            .on_purchase_completed(&user(), "app.monthly", &snapshot("app.monthly", 30))
            .await
            .unwrap();
        f.ledger.deduct(&user(), 40).await.unwrap();

        let outcome = f
            .service
            .on_customer_info_updated(&user(), &snapshot("app.monthly", 60))
            .await
            .unwrap();

        let SyncOutcome::Renewed(applied) = outcome else {
            panic!("expected renewal");
        };
        assert_eq!(applied.credits, 100);
        assert_eq!(applied.record.processed_purchase_ids.len(), 2);
        assert!(f.bus.has_event("renewal.detected"));
    }

    #[tokio::test]
    async fn duplicate_renewal_callback_applies_once() {
        let f = setup();
        f.service
            .on_purchase_completed(&user(), "app.monthly", &snapshot("app.monthly", 30))
            .await
            .unwrap();
        let renewed = snapshot("app.monthly", 60);
        f.service.on_customer_info_updated(&user(), &renewed).await.unwrap();
        f.ledger.deduct(&user(), 10).await.unwrap();

        let outcome = f.service.on_customer_info_updated(&user(), &renewed).await.unwrap();

        // Same expiration as stored now, so nothing to renew
        assert_eq!(outcome, SyncOutcome::Unchanged);
        assert_eq!(f.ledger.read(&user()).await.unwrap().unwrap().credits, 90);
    }

    #[tokio::test]
    async fn product_switch_is_a_plan_change() {
        let f = setup();
        f.service
            .on_purchase_completed(&user(), "app.monthly", &snapshot("app.monthly", 30))
            .await
            .unwrap();

        let outcome = f
            .service
            .on_customer_info_updated(&user(), &snapshot("app.yearly", 365))
            .await
            .unwrap();

        let SyncOutcome::PlanChanged { kind, outcome } = outcome else {
            panic!("expected plan change");
        };
        assert_eq!(kind, PurchaseKind::Upgrade);
        assert_eq!(outcome.credits, 1200);
    }

    #[tokio::test]
    async fn cancellation_merges_status_and_keeps_credits() {
        let f = setup();
        let snap = snapshot("app.monthly", 30);
        f.service
            .on_purchase_completed(&user(), "app.monthly", &snap)
            .await
            .unwrap();
        f.bus.clear();

        let canceled = EntitlementSnapshot {
            will_renew: Some(false),
            ..snap
        };
        let outcome = f
            .service
            .on_customer_info_updated(&user(), &canceled)
            .await
            .unwrap();

        assert!(matches!(outcome, SyncOutcome::StatusMerged(_)));
        let record = f.ledger.read(&user()).await.unwrap().unwrap();
        assert_eq!(record.status, SubscriptionStatus::Canceled);
        assert!(record.is_premium);
        assert_eq!(record.credits, 100);
        assert!(!f.bus.has_event("premium_status.changed"));
    }

    #[tokio::test]
    async fn losing_entitlement_marks_expired_without_reset() {
        let f = setup();
        f.service
            .on_purchase_completed(&user(), "app.monthly", &snapshot("app.monthly", 30))
            .await
            .unwrap();
        f.ledger.deduct(&user(), 25).await.unwrap();

        f.service
            .on_customer_info_updated(&user(), &EntitlementSnapshot::none("user-1"))
            .await
            .unwrap();

        let record = f.ledger.read(&user()).await.unwrap().unwrap();
        assert_eq!(record.status, SubscriptionStatus::Expired);
        assert!(!record.is_premium);
        assert_eq!(record.credits, 75);
        assert!(f.bus.has_event("premium_status.changed"));
    }

    #[tokio::test]
    async fn first_sighting_of_premium_creates_ledger() {
        let f = setup();

        let outcome = f
            .service
            .on_customer_info_updated(&user(), &snapshot("app.weekly", 7))
            .await
            .unwrap();

        let SyncOutcome::StatusApplied(applied) = outcome else {
            panic!("expected status apply");
        };
        assert_eq!(applied.credits, 25);
        assert!(applied.record.is_premium);
    }

    #[tokio::test]
    async fn unchanged_snapshot_writes_nothing() {
        let f = setup();
        let snap = snapshot("app.monthly", 30);
        f.service
            .on_purchase_completed(&user(), "app.monthly", &snap)
            .await
            .unwrap();

        let outcome = f.service.on_customer_info_updated(&user(), &snap).await.unwrap();

        assert_eq!(outcome, SyncOutcome::Unchanged);
    }

    #[tokio::test]
    async fn purchase_flow_goes_through_provider() {
        let f = setup();
        f.service.coordinator().initialize(Some("user-1")).await.unwrap();

        let outcome = f
            .service
            .purchase(&user(), &Package::new("$rc_monthly", "app.monthly"))
            .await
            .unwrap();

        assert_eq!(outcome.credits, 100);
        assert_eq!(f.mock.call_count("purchase"), 1);
        assert!(f.bus.has_event("purchase.completed"));
    }

    #[tokio::test]
    async fn cancelled_purchase_leaves_ledger_untouched() {
        let f = setup();
        f.service.coordinator().initialize(Some("user-1")).await.unwrap();
        f.mock
            .set_method_error("purchase", ProviderError::PurchaseCancelled);

        let result = f
            .service
            .purchase(&user(), &Package::new("$rc_monthly", "app.monthly"))
            .await;

        assert_eq!(result, Err(SyncError::Provider(ProviderError::PurchaseCancelled)));
        assert_eq!(f.ledger.read(&user()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn restore_applies_restored_entitlement() {
        let f = setup();
        f.service.coordinator().initialize(Some("user-1")).await.unwrap();
        f.mock.set_snapshot("user-1", snapshot("app.yearly", 200));

        let outcome = f.service.restore(&user()).await.unwrap();

        let SyncOutcome::StatusApplied(applied) = outcome else {
            panic!("expected restored purchase");
        };
        assert_eq!(applied.credits, 1200);
        let last = applied.record.purchase_history.last().unwrap();
        assert_eq!(last.source, PurchaseSource::Restore);
    }

    #[tokio::test]
    async fn top_up_purchase_adds_credits() {
        let f = setup();
        f.service
            .on_purchase_completed(&user(), "app.monthly", &snapshot("app.monthly", 30))
            .await
            .unwrap();
        let pack = EntitlementSnapshot {
            original_transaction_id: Some("txn_pack".to_string()),
            ..snapshot("app.monthly", 30)
        };

        let outcome = f
            .service
            .on_purchase_completed(&user(), "app.credits_50", &pack)
            .await
            .unwrap();

        assert_eq!(outcome.credits, 150);
        assert_eq!(outcome.record.credit_limit, 100);
        assert_eq!(outcome.record.product_id.as_deref(), Some("app.monthly"));
    }

    #[tokio::test]
    async fn status_sync_for_another_logged_in_user_is_discarded() {
        let f = setup();
        f.mock.set_snapshot(
            "user-2",
            EntitlementSnapshot {
                app_user_id: Some("user-2".to_string()),
                ..snapshot("app.yearly", 365)
            },
        );
        f.service.coordinator().initialize(Some("user-2")).await.unwrap();

        let result = f.service.sync_current_status(&user()).await;

        assert_eq!(
            result,
            Err(SyncError::IdentityMismatch {
                user_id: "user-1".to_string(),
                identity: "user-2".to_string(),
            })
        );
        assert_eq!(f.ledger.read(&user()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn purchase_snapshot_for_another_user_is_not_applied() {
        let f = setup();
        let foreign = EntitlementSnapshot {
            app_user_id: Some("user-2".to_string()),
            ..snapshot("app.monthly", 30)
        };

        let result = f
            .service
            .on_purchase_completed(&user(), "app.monthly", &foreign)
            .await;

        assert!(matches!(result, Err(SyncError::IdentityMismatch { .. })));
        assert_eq!(f.ledger.read(&user()).await.unwrap(), None);
        assert_eq!(f.bus.event_count(), 0);
    }

    #[tokio::test]
    async fn unattributed_snapshot_checked_against_session_user() {
        let f = setup();
        f.service.coordinator().initialize(Some("user-2")).await.unwrap();
        let unattributed = EntitlementSnapshot {
            app_user_id: None,
            ..snapshot("app.monthly", 30)
        };

        let result = f
            .service
            .on_customer_info_updated(&user(), &unattributed)
            .await;

        assert!(matches!(result, Err(SyncError::IdentityMismatch { .. })));
        assert_eq!(f.ledger.read(&user()).await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn switch_during_purchase_discards_result() {
        let f = setup();
        f.service.coordinator().initialize(Some("user-1")).await.unwrap();
        f.mock.set_method_latency("purchase", Duration::from_secs(3));

        let purchasing_user = user();
        let package = Package::new("$rc_monthly", "app.monthly");
        let (purchased, switched) = tokio::join!(
            f.service.purchase(&purchasing_user, &package),
            async {
                tokio::time::sleep(Duration::from_millis(500)).await;
                f.service.coordinator().switch_user("user-2").await
            }
        );

        assert!(switched.is_ok());
        assert!(matches!(purchased, Err(SyncError::IdentityMismatch { .. })));
        assert_eq!(f.ledger.read(&user()).await.unwrap(), None);
        assert!(!f.bus.has_event("purchase.completed"));
    }
}
