//! EventSubscriber port - Interface for subscribing to ledger events.
//!
//! Dependents (UI state, credit-gated features) register handlers for
//! `credits.updated`, `purchase.completed`, `renewal.detected` and
//! `premium_status.changed`.

use async_trait::async_trait;
use std::sync::Arc;

use crate::domain::foundation::{DomainError, EventEnvelope};

/// Handler for processing domain events.
///
/// Errors returned here are logged by the bus and go no further.
///
/// # Example
///
/// ```ignore
/// struct CreditBadge { /* ... */ }
///
/// #[async_trait]
/// impl EventHandler for CreditBadge {
///     async fn handle(&self, event: EventEnvelope) -> Result<(), DomainError> {
///         let payload: CreditsUpdated = event.payload_as()?;
///         // Refresh the badge...
///         Ok(())
///     }
///
///     fn name(&self) -> &'static str {
///         "CreditBadge"
///     }
/// }
/// ```
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Process an event.
    async fn handle(&self, event: EventEnvelope) -> Result<(), DomainError>;

    /// Handler name for logging.
    fn name(&self) -> &'static str;
}

/// Port for subscribing to domain events.
///
/// # Example
///
/// ```ignore
/// subscriber.subscribe("credits.updated", badge);
/// subscriber.subscribe_all(&["purchase.completed", "renewal.detected"], receipts);
/// ```
pub trait EventSubscriber: Send + Sync {
    /// Subscribe handler to a specific event type.
    fn subscribe(&self, event_type: &str, handler: Arc<dyn EventHandler>);

    /// Subscribe handler to multiple event types.
    fn subscribe_all(&self, event_types: &[&str], handler: Arc<dyn EventHandler>);
}

/// Combined trait for event bus implementations.
pub trait EventBus: super::EventPublisher + EventSubscriber {}

// Any type that implements both traits is an EventBus
impl<T: super::EventPublisher + EventSubscriber> EventBus for T {}

#[cfg(test)]
mod tests {
    use super::*;

    // Compile-time check that traits are object-safe
    #[allow(dead_code)]
    fn assert_handler_object_safe(_: &dyn EventHandler) {}

    #[allow(dead_code)]
    fn assert_subscriber_object_safe(_: &dyn EventSubscriber) {}

    #[allow(dead_code)]
    fn assert_bus_object_safe(_: &dyn EventBus) {}

    #[allow(dead_code)]
    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn event_handler_is_send_sync() {
        #[allow(dead_code)]
        fn check<T: EventHandler>() {
            assert_send_sync::<T>();
        }
    }
}
