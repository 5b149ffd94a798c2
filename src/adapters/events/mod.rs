//! Event bus adapters.
//!
//! - `InMemoryEventBus` - In-process, fire-and-forget bus

mod in_memory;

pub use in_memory::InMemoryEventBus;
