//! Credit allocation configuration

use serde::Deserialize;
use std::collections::HashMap;

use super::error::ValidationError;
use crate::domain::billing::PackageType;

/// Credit allocation configuration.
///
/// Lookup order for a subscription product is `product_overrides`, then the
/// package type derived from the product id in `package_allocations`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CreditConfig {
    /// Explicit per-product credit limits.
    pub product_overrides: HashMap<String, i64>,

    /// Per-package-type credit limits.
    pub package_allocations: PackageAllocations,

    /// Product id meaning "no subscription"; always resolves to 0.
    pub no_subscription_product_id: String,

    /// Case-insensitive token marking a consumable top-up product.
    pub consumable_marker: String,

    /// Explicit per-product top-up amounts.
    pub top_up_amounts: HashMap<String, i64>,

    /// Top-up amount for consumables without an explicit entry.
    pub default_top_up_amount: Option<i64>,
}

/// Credit limits per package type.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PackageAllocations {
    pub weekly: Option<i64>,
    pub monthly: Option<i64>,
    pub yearly: Option<i64>,
    pub lifetime: Option<i64>,
}

impl PackageAllocations {
    /// Allocation for a package type, if configured.
    pub fn for_package(&self, package: PackageType) -> Option<i64> {
        match package {
            PackageType::Weekly => self.weekly,
            PackageType::Monthly => self.monthly,
            PackageType::Yearly => self.yearly,
            PackageType::Lifetime => self.lifetime,
            PackageType::Unknown => None,
        }
    }

    fn entries(&self) -> [(&'static str, Option<i64>); 4] {
        [
            ("weekly", self.weekly),
            ("monthly", self.monthly),
            ("yearly", self.yearly),
            ("lifetime", self.lifetime),
        ]
    }
}

impl Default for CreditConfig {
    fn default() -> Self {
        Self {
            product_overrides: HashMap::new(),
            package_allocations: PackageAllocations {
                weekly: Some(25),
                monthly: Some(100),
                yearly: Some(1200),
                lifetime: Some(1500),
            },
            no_subscription_product_id: "no_subscription".to_string(),
            consumable_marker: "credit".to_string(),
            top_up_amounts: HashMap::new(),
            default_top_up_amount: None,
        }
    }
}

impl CreditConfig {
    /// Validate credit configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.no_subscription_product_id.trim().is_empty() {
            return Err(ValidationError::MissingRequired("NO_SUBSCRIPTION_PRODUCT_ID"));
        }
        if self.consumable_marker.trim().is_empty() {
            return Err(ValidationError::MissingRequired("CONSUMABLE_MARKER"));
        }

        for (product, limit) in &self.product_overrides {
            if *limit < 0 {
                return Err(ValidationError::NegativeAllocation(product.clone()));
            }
        }
        for (package, limit) in self.package_allocations.entries() {
            if matches!(limit, Some(l) if l < 0) {
                return Err(ValidationError::NegativeAllocation(package.to_string()));
            }
        }
        for (product, amount) in &self.top_up_amounts {
            if *amount <= 0 {
                return Err(ValidationError::NegativeAllocation(product.clone()));
            }
        }
        if matches!(self.default_top_up_amount, Some(a) if a <= 0) {
            return Err(ValidationError::MustBePositive("DEFAULT_TOP_UP_AMOUNT"));
        }

        let any_package = self
            .package_allocations
            .entries()
            .iter()
            .any(|(_, limit)| limit.is_some());
        if !any_package && self.product_overrides.is_empty() {
            return Err(ValidationError::NoCreditAllocation);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(CreditConfig::default().validate().is_ok());
    }

    #[test]
    fn negative_override_is_rejected() {
        let mut config = CreditConfig::default();
        config.product_overrides.insert("app.monthly".to_string(), -1);
        assert_eq!(
            config.validate(),
            Err(ValidationError::NegativeAllocation("app.monthly".to_string()))
        );
    }

    #[test]
    fn empty_allocation_table_is_rejected() {
        let config = CreditConfig {
            package_allocations: PackageAllocations::default(),
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::NoCreditAllocation));
    }

    #[test]
    fn overrides_alone_are_enough() {
        let mut config = CreditConfig {
            package_allocations: PackageAllocations::default(),
            ..Default::default()
        };
        config.product_overrides.insert("pro".to_string(), 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn for_package_maps_each_type() {
        let allocations = CreditConfig::default().package_allocations;
        assert_eq!(allocations.for_package(PackageType::Monthly), Some(100));
        assert_eq!(allocations.for_package(PackageType::Unknown), None);
    }
}
