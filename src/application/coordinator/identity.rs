//! Billing identities as seen by the coordinator.

use super::CoordinatorError;

/// Prefixes the provider and the app use for device-generated identities.
const ANONYMOUS_PREFIXES: [&str; 2] = ["$RCAnonymousID:", "anon_"];

/// An identity the provider can be logged in as.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AppIdentity(String);

impl AppIdentity {
    /// Trims `raw`; blank identities are rejected.
    pub fn parse(raw: &str) -> Result<Self, CoordinatorError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(CoordinatorError::InvalidIdentity(
                "identity cannot be empty".to_string(),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// True for device-generated identities.
    pub fn is_anonymous(&self) -> bool {
        is_anonymous(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AppIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub(crate) fn is_anonymous(identity: &str) -> bool {
    ANONYMOUS_PREFIXES
        .iter()
        .any(|prefix| identity.starts_with(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_identity_is_rejected() {
        assert!(AppIdentity::parse("   ").is_err());
    }

    #[test]
    fn identity_is_trimmed() {
        assert_eq!(AppIdentity::parse(" user-1 ").unwrap().as_str(), "user-1");
    }

    #[test]
    fn provider_and_app_anonymous_ids_are_anonymous() {
        assert!(AppIdentity::parse("$RCAnonymousID:abc123").unwrap().is_anonymous());
        assert!(AppIdentity::parse("anon_device42").unwrap().is_anonymous());
        assert!(!AppIdentity::parse("user-1").unwrap().is_anonymous());
    }
}
