//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Storage
//!
//! - `DocumentStore` - Remote JSON documents with an atomic transform primitive
//!
//! ## Billing
//!
//! - `BillingProvider` - External subscription SDK (configure, login, purchase)
//!
//! ## Event Ports
//!
//! - `EventPublisher` - Port for publishing ledger events
//! - `EventSubscriber` - Port for subscribing to ledger events
//! - `EventHandler` - Handler that processes incoming events

mod billing_provider;
mod document_store;
mod event_publisher;
mod event_subscriber;

pub use billing_provider::{BillingProvider, EntitlementSnapshot, Package, ProviderError};
pub use document_store::{DocumentKey, DocumentStore, StoreError, Transform, TransformFn};
pub use event_publisher::EventPublisher;
pub use event_subscriber::{EventBus, EventHandler, EventSubscriber};
