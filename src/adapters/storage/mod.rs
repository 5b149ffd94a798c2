//! Storage Adapters
//!
//! Implementations of the DocumentStore port.
//!
//! ## Available Adapters
//!
//! - **InMemoryDocumentStore** - Versioned documents in memory with
//!   optimistic compare-and-swap (testing/development)
//!
//! ## Usage
//!
//! ```ignore
//! use credit_sync::adapters::storage::InMemoryDocumentStore;
//!
//! let store = Arc::new(InMemoryDocumentStore::new());
//! ```

mod in_memory_document_store;

pub use in_memory_document_store::InMemoryDocumentStore;
