//! Canonical subscription status and the decision table that derives it.
//!
//! Rules are evaluated top to bottom and the first match wins:
//!
//! | # | Condition | Status |
//! |---|-----------|--------|
//! | 1 | not premium, not expired | `None` |
//! | 2 | expired | `Expired` |
//! | 3 | premium, trial, will not renew | `TrialCanceled` |
//! | 4 | premium, trial | `Trial` |
//! | 5 | premium, will not renew | `Canceled` |
//! | 6 | premium otherwise | `Active` |

use serde::{Deserialize, Serialize};

use super::signal::{PeriodType, SubscriptionSignal};

/// Canonical subscription status stored on the ledger record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// No entitlement at all.
    #[default]
    None,

    /// Paid, auto-renewing entitlement.
    Active,

    /// Free trial that will convert.
    Trial,

    /// Free trial with auto-renew turned off.
    TrialCanceled,

    /// Entitlement period has ended.
    Expired,

    /// Paid entitlement with auto-renew turned off. Access continues
    /// until the period ends.
    Canceled,
}

impl SubscriptionStatus {
    /// Resolves a billing signal into a canonical status.
    pub fn resolve(signal: &SubscriptionSignal) -> Self {
        let is_trial = signal.period_type == Some(PeriodType::Trial);
        let renew_off = signal.will_renew == Some(false);

        if !signal.is_premium && !signal.is_expired {
            SubscriptionStatus::None
        } else if signal.is_expired {
            SubscriptionStatus::Expired
        } else if is_trial && renew_off {
            SubscriptionStatus::TrialCanceled
        } else if is_trial {
            SubscriptionStatus::Trial
        } else if renew_off {
            SubscriptionStatus::Canceled
        } else {
            SubscriptionStatus::Active
        }
    }

    /// Returns true if this status grants premium access.
    pub fn has_access(&self) -> bool {
        matches!(
            self,
            SubscriptionStatus::Active
                | SubscriptionStatus::Trial
                | SubscriptionStatus::TrialCanceled
                | SubscriptionStatus::Canceled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::None => "none",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Trial => "trial",
            SubscriptionStatus::TrialCanceled => "trial_canceled",
            SubscriptionStatus::Expired => "expired",
            SubscriptionStatus::Canceled => "canceled",
        }
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
