//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (IDs, timestamps, errors, event envelope)
//! - `billing` - Credit ledger, status resolution, and renewal detection

pub mod billing;
pub mod foundation;
