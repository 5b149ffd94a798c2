//! Credit Sync - In-App Billing Synchronization Engine
//!
//! Reconciles billing provider events with a per-user credit ledger kept in
//! a remote document store, and derives a canonical subscription status.
//!
//! Laid out as ports and adapters: `domain` holds the pure ledger, status,
//! and allocation logic; `ports` the store, provider, and event bus
//! contracts; `adapters` in-memory implementations; `application` the
//! ledger transaction, coordinator, and sync service.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
