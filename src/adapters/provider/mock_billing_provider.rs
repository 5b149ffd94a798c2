//! Mock billing provider for testing and the demo binary.
//!
//! Provides a configurable implementation of `BillingProvider`. Supports:
//! - Scripted entitlement snapshots per identity
//! - Simulated latency (deterministic under paused tokio time)
//! - Error injection
//! - Call tracking with timestamps

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::domain::billing::{PackageType, PeriodType};
use crate::domain::foundation::Timestamp;
use crate::ports::{BillingProvider, EntitlementSnapshot, Package, ProviderError};

const ANONYMOUS_IDENTITY: &str = "$RCAnonymousID:mock";

/// Mock billing provider.
///
/// # Example
///
/// ```ignore
/// let mock = MockBillingProvider::new();
///
/// // Script entitlements
/// mock.set_snapshot("user-1", premium_snapshot);
///
/// // Inject errors
/// mock.set_method_error("login", ProviderError::Network("offline".into()));
///
/// // Assert
/// assert_eq!(mock.call_count("configure"), 1);
/// ```
#[derive(Default)]
pub struct MockBillingProvider {
    inner: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    entitlement_id: String,
    configured: bool,
    current_identity: Option<String>,
    snapshots: HashMap<String, EntitlementSnapshot>,
    offerings: Vec<Package>,
    latency: Duration,
    method_latency: HashMap<String, Duration>,
    next_error: Option<ProviderError>,
    method_errors: HashMap<String, ProviderError>,
    transaction_counter: u64,
    call_log: Vec<MethodCall>,
}

/// Recorded method call for assertions.
#[derive(Debug, Clone)]
pub struct MethodCall {
    pub method: String,
    pub args: Vec<String>,
    pub at: Instant,
}

impl MockBillingProvider {
    /// Create a mock granting the `premium` entitlement on purchase.
    pub fn new() -> Self {
        Self::with_entitlement("premium")
    }

    /// Create a mock granting `entitlement_id` on purchase.
    pub fn with_entitlement(entitlement_id: impl Into<String>) -> Self {
        let mock = Self::default();
        mock.state().entitlement_id = entitlement_id.into();
        mock
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Configuration Methods
    // ════════════════════════════════════════════════════════════════════════════

    /// Set the snapshot returned for an identity.
    pub fn set_snapshot(&self, identity: &str, snapshot: EntitlementSnapshot) {
        self.state().snapshots.insert(identity.to_string(), snapshot);
    }

    /// Set the packages returned by `offerings`.
    pub fn set_offerings(&self, packages: Vec<Package>) {
        self.state().offerings = packages;
    }

    /// Delay every call by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        self.state().latency = latency;
    }

    /// Delay calls to one method by `latency`, overriding `set_latency`.
    pub fn set_method_latency(&self, method: &str, latency: Duration) {
        self.state()
            .method_latency
            .insert(method.to_string(), latency);
    }

    /// Set an error to return on the next call to any method.
    pub fn set_error(&self, error: ProviderError) {
        self.state().next_error = Some(error);
    }

    /// Set an error for a specific method.
    pub fn set_method_error(&self, method: &str, error: ProviderError) {
        self.state()
            .method_errors
            .insert(method.to_string(), error);
    }

    /// Clear all configured errors.
    pub fn clear_errors(&self) {
        let mut state = self.state();
        state.next_error = None;
        state.method_errors.clear();
    }

    /// Identity the SDK is currently logged in as.
    pub fn current_identity(&self) -> Option<String> {
        self.state().current_identity.clone()
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Call Tracking
    // ════════════════════════════════════════════════════════════════════════════

    /// Get all recorded method calls.
    pub fn calls(&self) -> Vec<MethodCall> {
        self.state().call_log.clone()
    }

    /// Recorded calls to one method, in call order.
    pub fn calls_to(&self, method: &str) -> Vec<MethodCall> {
        self.state()
            .call_log
            .iter()
            .filter(|c| c.method == method)
            .cloned()
            .collect()
    }

    /// Get count of calls to a method.
    pub fn call_count(&self, method: &str) -> usize {
        self.state()
            .call_log
            .iter()
            .filter(|c| c.method == method)
            .count()
    }

    /// Clear the call log.
    pub fn clear_calls(&self) {
        self.state().call_log.clear();
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Internal Helpers
    // ════════════════════════════════════════════════════════════════════════════

    /// Records the call, waits the configured latency, then applies any
    /// injected error.
    async fn enter(&self, method: &str, args: Vec<String>) -> Result<(), ProviderError> {
        let latency = {
            let mut state = self.state();
            state.call_log.push(MethodCall {
                method: method.to_string(),
                args,
                at: Instant::now(),
            });
            state
                .method_latency
                .get(method)
                .copied()
                .unwrap_or(state.latency)
        };

        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.state();
        if let Some(error) = state.method_errors.get(method) {
            return Err(error.clone());
        }
        if let Some(error) = state.next_error.take() {
            return Err(error);
        }
        Ok(())
    }

    fn require_configured(&self) -> Result<(), ProviderError> {
        if self.state().configured {
            Ok(())
        } else {
            Err(ProviderError::NotConfigured)
        }
    }

    fn snapshot_for(state: &MockState, identity: &str) -> EntitlementSnapshot {
        state
            .snapshots
            .get(identity)
            .cloned()
            .unwrap_or_else(|| EntitlementSnapshot::none(identity))
    }
}

impl Clone for MockBillingProvider {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[async_trait]
impl BillingProvider for MockBillingProvider {
    async fn configure(&self, api_key: &str, identity: Option<&str>) -> Result<(), ProviderError> {
        self.enter(
            "configure",
            vec![identity.unwrap_or_default().to_string()],
        )
        .await?;

        if api_key.trim().is_empty() {
            return Err(ProviderError::InvalidApiKey);
        }

        let mut state = self.state();
        if state.configured {
            return Err(ProviderError::Provider("configure called twice".to_string()));
        }
        state.configured = true;
        // Like the real SDK, an unidentified configure gets a device identity
        state.current_identity = Some(
            identity
                .map(str::to_string)
                .unwrap_or_else(|| ANONYMOUS_IDENTITY.to_string()),
        );
        Ok(())
    }

    async fn login(&self, identity: &str) -> Result<EntitlementSnapshot, ProviderError> {
        self.require_configured()?;
        self.enter("login", vec![identity.to_string()]).await?;

        let mut state = self.state();
        state.current_identity = Some(identity.to_string());
        Ok(Self::snapshot_for(&state, identity))
    }

    async fn current_entitlement(&self) -> Result<EntitlementSnapshot, ProviderError> {
        self.require_configured()?;
        self.enter("current_entitlement", Vec::new()).await?;

        let state = self.state();
        let identity = state
            .current_identity
            .clone()
            .ok_or_else(|| ProviderError::Provider("no identity logged in".to_string()))?;
        Ok(Self::snapshot_for(&state, &identity))
    }

    async fn offerings(&self) -> Result<Vec<Package>, ProviderError> {
        self.require_configured()?;
        self.enter("offerings", Vec::new()).await?;
        Ok(self.state().offerings.clone())
    }

    async fn purchase(&self, package: &Package) -> Result<EntitlementSnapshot, ProviderError> {
        self.require_configured()?;
        self.enter("purchase", vec![package.product_id.clone()]).await?;

        let mut state = self.state();
        let identity = state
            .current_identity
            .clone()
            .ok_or_else(|| ProviderError::Provider("no identity logged in".to_string()))?;

        state.transaction_counter += 1;
        let transaction_id = format!("txn_{}", state.transaction_counter);

        let mut snapshot = Self::snapshot_for(&state, &identity);
        if package.product_id.to_ascii_lowercase().contains("credit") {
            // Consumables leave entitlements alone but carry their own transaction
            snapshot.original_transaction_id = Some(transaction_id);
        } else {
            let expiration_days = match package.package_type {
                PackageType::Weekly => 7,
                PackageType::Yearly => 365,
                PackageType::Lifetime => 36_500,
                _ => 30,
            };
            snapshot = EntitlementSnapshot {
                app_user_id: Some(identity.clone()),
                active_entitlement_id: Some(state.entitlement_id.clone()),
                product_id: Some(package.product_id.clone()),
                expiration_date: Some(Timestamp::now().add_days(expiration_days)),
                will_renew: Some(true),
                period_type: Some(PeriodType::Normal),
                original_transaction_id: Some(transaction_id),
            };
            state.snapshots.insert(identity, snapshot.clone());
        }
        Ok(snapshot)
    }

    async fn restore(&self, identity: &str) -> Result<EntitlementSnapshot, ProviderError> {
        self.require_configured()?;
        self.enter("restore", vec![identity.to_string()]).await?;
        Ok(Self::snapshot_for(&self.state(), identity))
    }
}
