//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `events` - Event bus implementations
//! - `storage` - Document store implementations
//! - `provider` - Billing provider implementations

pub mod events;
pub mod provider;
pub mod storage;

pub use events::InMemoryEventBus;
pub use provider::MockBillingProvider;
pub use storage::InMemoryDocumentStore;
