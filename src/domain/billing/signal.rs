//! Subscription signal - the minimal input to status resolution.

use serde::{Deserialize, Serialize};

use super::status::SubscriptionStatus;

/// Billing period reported by the provider for the active entitlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PeriodType {
    Normal,
    Intro,
    Trial,
}

/// Raw billing facts for one user at one moment.
///
/// Derived from the provider's entitlement snapshot at the call site and
/// never stored directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionSignal {
    pub is_premium: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub will_renew: Option<bool>,
    #[serde(default)]
    pub is_expired: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period_type: Option<PeriodType>,
}

impl SubscriptionSignal {
    /// Signal for a user without any entitlement.
    pub fn free() -> Self {
        Self::default()
    }

    /// Signal for a premium user on a normal, auto-renewing period.
    pub fn premium() -> Self {
        Self {
            is_premium: true,
            will_renew: Some(true),
            is_expired: false,
            period_type: Some(PeriodType::Normal),
        }
    }

    /// Signal for an entitlement whose period has ended.
    pub fn expired() -> Self {
        Self {
            is_premium: false,
            will_renew: Some(false),
            is_expired: true,
            period_type: None,
        }
    }

    pub fn with_will_renew(mut self, will_renew: bool) -> Self {
        self.will_renew = Some(will_renew);
        self
    }

    pub fn with_period_type(mut self, period_type: PeriodType) -> Self {
        self.period_type = Some(period_type);
        self
    }

    /// True when the signal grants a subscription allocation.
    pub fn is_subscription_active(&self) -> bool {
        SubscriptionStatus::resolve(self).has_access()
    }
}
