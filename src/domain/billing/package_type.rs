//! Package type derived from a store product identifier.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

// Letters on either side break the match, so `app.monthly`, `pro_year_2024`
// and `Lifetime-Access` match while `semiannualized` does not.
static PACKAGE_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:^|[^a-z])(weekly|week|monthly|month|yearly|year|annual|lifetime)(?:[^a-z]|$)")
        .expect("package token pattern is valid")
});

/// Billing cadence of a subscription product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageType {
    Weekly,
    Monthly,
    Yearly,
    Lifetime,
    Unknown,
}

impl PackageType {
    /// Derives the package type from a product identifier.
    ///
    /// Matching is case-insensitive and token-aware; the first recognized
    /// token wins.
    pub fn from_product_id(product_id: &str) -> Self {
        let Some(token) = PACKAGE_TOKEN
            .captures(product_id)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_ascii_lowercase())
        else {
            return PackageType::Unknown;
        };

        match token.as_str() {
            "weekly" | "week" => PackageType::Weekly,
            "monthly" | "month" => PackageType::Monthly,
            "yearly" | "year" | "annual" => PackageType::Yearly,
            "lifetime" => PackageType::Lifetime,
            _ => PackageType::Unknown,
        }
    }
}
