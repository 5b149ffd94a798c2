//! EventPublisher port - Interface for publishing ledger events.
//!
//! The outbound bus is fire-and-forget: subscriber failures are caught and
//! logged by the adapter and never reach the publisher.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, EventEnvelope};

/// Port for publishing domain events.
///
/// An `Err` means the event could not be handed to the transport at all.
/// It never reflects a subscriber failure.
///
/// # Example
///
/// ```ignore
/// let event = CreditsUpdated::new(user_id, record.credits, record.credit_limit);
/// publisher.publish(event.to_envelope()?).await?;
/// ```
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish a single event.
    async fn publish(&self, event: EventEnvelope) -> Result<(), DomainError>;

    /// Publish several events in order.
    async fn publish_all(&self, events: Vec<EventEnvelope>) -> Result<(), DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    // Compile-time check that trait is object-safe
    #[allow(dead_code)]
    fn assert_object_safe(_: &dyn EventPublisher) {}

    #[allow(dead_code)]
    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn event_publisher_is_send_sync() {
        #[allow(dead_code)]
        fn check<T: EventPublisher>() {
            assert_send_sync::<T>();
        }
    }
}
