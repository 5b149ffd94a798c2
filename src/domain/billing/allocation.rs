//! Credit allocation strategy.
//!
//! Two pure decisions: how many credits a product grants, and how an event
//! transforms the existing balance (additive top-up, full reset, or no-op).

use once_cell::sync::Lazy;
use regex::Regex;

use super::errors::CreditError;
use super::ledger::LedgerRecord;
use super::package_type::PackageType;
use super::status::SubscriptionStatus;
use crate::config::CreditConfig;

static AMOUNT_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+").expect("amount token pattern is valid"));

/// Resolves the credit limit granted by a subscription product.
///
/// Order: explicit override, the no-subscription sentinel (always 0), then
/// the package type derived from the id. Anything else is a configuration
/// error; there is no silent nonzero default.
pub fn resolve_credit_limit(product_id: &str, config: &CreditConfig) -> Result<i64, CreditError> {
    if let Some(limit) = config.product_overrides.get(product_id) {
        return Ok(*limit);
    }
    if product_id == config.no_subscription_product_id {
        return Ok(0);
    }

    let package = PackageType::from_product_id(product_id);
    config
        .package_allocations
        .for_package(package)
        .ok_or_else(|| {
            CreditError::configuration(format!(
                "no credit limit configured for product '{}'",
                product_id
            ))
        })
}

/// True when the product is a consumable credit pack rather than a tier.
pub fn is_consumable(product_id: &str, config: &CreditConfig) -> bool {
    product_id
        .to_ascii_lowercase()
        .contains(&config.consumable_marker.to_ascii_lowercase())
}

/// Credits granted by one consumable purchase.
///
/// Explicit table first, then the last number embedded in the product id
/// (`app.credits_50` grants 50), then the configured default.
pub fn top_up_amount(product_id: &str, config: &CreditConfig) -> Result<i64, CreditError> {
    if let Some(amount) = config.top_up_amounts.get(product_id) {
        return Ok(*amount);
    }

    let embedded = AMOUNT_TOKEN
        .find_iter(product_id)
        .last()
        .and_then(|m| m.as_str().parse::<i64>().ok())
        .filter(|amount| *amount > 0);

    embedded
        .or(config.default_top_up_amount)
        .ok_or_else(|| {
            CreditError::configuration(format!(
                "no top-up amount configured for product '{}'",
                product_id
            ))
        })
}

/// Inputs to the balance decision.
#[derive(Debug, Clone)]
pub struct BalanceContext<'a> {
    pub status: SubscriptionStatus,
    pub is_status_sync_only: bool,
    pub existing: Option<&'a LedgerRecord>,
    pub new_credit_limit: i64,
    pub is_subscription_active: bool,
    pub product_id: &'a str,
}

/// Next subscription-visible state of the record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceResolution {
    pub credits: i64,
    pub credit_limit: i64,
    pub is_premium: bool,
    pub status: SubscriptionStatus,
    /// `None` for the no-subscription sentinel.
    pub product_id: Option<String>,
    pub is_top_up: bool,
    /// True when a status-only sync would rewrite identical values.
    pub skip: bool,
}

/// Decides the next balance for an event.
///
/// Consumables add to the existing balance and keep every subscription
/// field. Active subscription-tier events reset credits to the new limit.
/// Inactive ones (free or expired) keep the existing balance.
pub fn resolve_balance(
    ctx: &BalanceContext<'_>,
    config: &CreditConfig,
) -> Result<BalanceResolution, CreditError> {
    let existing_credits = ctx.existing.map(|r| r.credits).unwrap_or(0);

    let next = if is_consumable(ctx.product_id, config) {
        let amount = top_up_amount(ctx.product_id, config)?;
        BalanceResolution {
            credits: existing_credits.saturating_add(amount),
            credit_limit: ctx.existing.map(|r| r.credit_limit).unwrap_or(0),
            is_premium: ctx.existing.map(|r| r.is_premium).unwrap_or(false),
            status: ctx.existing.map(|r| r.status).unwrap_or_default(),
            product_id: ctx.existing.and_then(|r| r.product_id.clone()),
            is_top_up: true,
            skip: false,
        }
    } else {
        let credits = if ctx.is_subscription_active {
            ctx.new_credit_limit
        } else {
            existing_credits
        };
        let product_id = if ctx.product_id == config.no_subscription_product_id {
            None
        } else {
            Some(ctx.product_id.to_string())
        };
        BalanceResolution {
            credits: credits.max(0),
            credit_limit: ctx.new_credit_limit,
            is_premium: ctx.is_subscription_active,
            status: ctx.status,
            product_id,
            is_top_up: false,
            skip: false,
        }
    };

    let unchanged = ctx.existing.is_some_and(|r| {
        r.is_premium == next.is_premium
            && r.status == next.status
            && r.credits == next.credits
            && r.credit_limit == next.credit_limit
            && r.product_id == next.product_id
    });

    Ok(BalanceResolution {
        skip: ctx.is_status_sync_only && unchanged,
        ..next
    })
}
