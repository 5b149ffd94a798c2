//! Billing provider port - the external subscription SDK.
//!
//! Treated as a black box. Every call is a suspension point and may fail;
//! the coordinator guarantees `configure` runs at most once and that at most
//! one `login` is in flight per process.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::billing::{EntitlementBaseline, PackageType, PeriodType, SubscriptionSignal};
use crate::domain::foundation::{DomainError, ErrorCode, Timestamp};

/// Normalized view of the provider's entitlement state for one identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitlementSnapshot {
    /// Identity the snapshot belongs to.
    pub app_user_id: Option<String>,
    /// Active entitlement id, `None` when the user has none.
    pub active_entitlement_id: Option<String>,
    /// Store product backing the active entitlement.
    pub product_id: Option<String>,
    pub expiration_date: Option<Timestamp>,
    pub will_renew: Option<bool>,
    pub period_type: Option<PeriodType>,
    pub original_transaction_id: Option<String>,
}

impl EntitlementSnapshot {
    /// Snapshot of an identity without any entitlement.
    pub fn none(app_user_id: impl Into<String>) -> Self {
        Self {
            app_user_id: Some(app_user_id.into()),
            ..Default::default()
        }
    }

    /// True when `entitlement_id` is the active entitlement.
    pub fn has_entitlement(&self, entitlement_id: &str) -> bool {
        self.active_entitlement_id.as_deref() == Some(entitlement_id)
    }

    /// Status signal for the premium entitlement as of `now`.
    ///
    /// An entitlement whose expiration already passed reads as expired.
    pub fn signal(&self, entitlement_id: &str, now: Timestamp) -> SubscriptionSignal {
        let entitled = self.has_entitlement(entitlement_id);
        let is_expired = entitled && self.expiration_date.is_some_and(|at| at.is_before(&now));
        SubscriptionSignal {
            is_premium: entitled && !is_expired,
            will_renew: self.will_renew,
            is_expired,
            period_type: self.period_type,
        }
    }

    /// Product and expiration pair compared by renewal detection.
    pub fn baseline(&self, entitlement_id: &str) -> EntitlementBaseline {
        if !self.has_entitlement(entitlement_id) {
            return EntitlementBaseline::default();
        }
        EntitlementBaseline::new(self.product_id.clone(), self.expiration_date)
    }
}

/// A purchasable package from the provider's current offering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Package {
    pub identifier: String,
    pub product_id: String,
    pub package_type: PackageType,
    pub price_string: Option<String>,
}

impl Package {
    pub fn new(identifier: impl Into<String>, product_id: impl Into<String>) -> Self {
        let product_id = product_id.into();
        Self {
            identifier: identifier.into(),
            package_type: PackageType::from_product_id(&product_id),
            product_id,
            price_string: None,
        }
    }
}

/// Errors from the billing provider.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("billing provider is not configured")]
    NotConfigured,

    #[error("billing provider rejected the API key")]
    InvalidApiKey,

    #[error("purchase was cancelled by the user")]
    PurchaseCancelled,

    #[error("network error: {0}")]
    Network(String),

    #[error("provider error: {0}")]
    Provider(String),
}

impl ProviderError {
    /// True for failures a later attempt may not hit.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProviderError::Network(_))
    }
}

impl From<ProviderError> for DomainError {
    fn from(err: ProviderError) -> Self {
        let code = match err {
            ProviderError::NotConfigured | ProviderError::InvalidApiKey => {
                ErrorCode::ConfigurationError
            }
            _ => ErrorCode::ProviderError,
        };
        DomainError::new(code, err.to_string())
    }
}

/// Port for the billing provider SDK.
#[async_trait]
pub trait BillingProvider: Send + Sync {
    /// One-time SDK setup. Must not be called twice per process.
    async fn configure(&self, api_key: &str, identity: Option<&str>) -> Result<(), ProviderError>;

    /// Switches the SDK to `identity` and returns its entitlements.
    async fn login(&self, identity: &str) -> Result<EntitlementSnapshot, ProviderError>;

    /// Entitlements of the identity currently logged in.
    async fn current_entitlement(&self) -> Result<EntitlementSnapshot, ProviderError>;

    /// Packages of the current offering.
    async fn offerings(&self) -> Result<Vec<Package>, ProviderError>;

    /// Runs the provider's purchase flow for `package`.
    async fn purchase(&self, package: &Package) -> Result<EntitlementSnapshot, ProviderError>;

    /// Restores previous purchases for `identity`.
    async fn restore(&self, identity: &str) -> Result<EntitlementSnapshot, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(dead_code)]
    fn assert_object_safe(_: &dyn BillingProvider) {}

    fn now() -> Timestamp {
        Timestamp::from_unix_millis(1_705_276_800_000)
    }

    fn premium_snapshot(expiration: Timestamp) -> EntitlementSnapshot {
        EntitlementSnapshot {
            app_user_id: Some("user-1".to_string()),
            active_entitlement_id: Some("premium".to_string()),
            product_id: Some("app.monthly".to_string()),
            expiration_date: Some(expiration),
            will_renew: Some(true),
            period_type: Some(PeriodType::Normal),
            original_transaction_id: Some("txn_1".to_string()),
        }
    }

    #[test]
    fn active_entitlement_is_premium() {
        let signal = premium_snapshot(now().add_days(30)).signal("premium", now());
        assert!(signal.is_premium);
        assert!(!signal.is_expired);
        assert_eq!(signal.will_renew, Some(true));
    }

    #[test]
    fn past_expiration_reads_as_expired() {
        let signal = premium_snapshot(now().minus_days(1)).signal("premium", now());
        assert!(!signal.is_premium);
        assert!(signal.is_expired);
    }

    #[test]
    fn other_entitlement_is_not_premium() {
        let signal = premium_snapshot(now().add_days(30)).signal("gold", now());
        assert!(!signal.is_premium);
        assert!(!signal.is_expired);
    }

    #[test]
    fn baseline_is_empty_without_entitlement() {
        let snapshot = EntitlementSnapshot::none("user-1");
        assert_eq!(snapshot.baseline("premium"), EntitlementBaseline::default());
    }

    #[test]
    fn package_derives_type_from_product() {
        let package = Package::new("$rc_monthly", "app.monthly");
        assert_eq!(package.package_type, PackageType::Monthly);
    }

    #[test]
    fn configuration_failures_map_to_configuration_code() {
        let err: DomainError = ProviderError::InvalidApiKey.into();
        assert_eq!(err.code, ErrorCode::ConfigurationError);
    }
}
