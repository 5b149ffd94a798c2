//! Fire-and-forget publishing of ledger events.
//!
//! Ledger writes are already committed when events go out, so a failed
//! publish is logged and never turned into an operation failure.

use crate::domain::foundation::{PurchaseId, SerializableDomainEvent};
use crate::ports::EventPublisher;

/// Publishes `event` tagged with the user it concerns.
pub(crate) async fn publish<E>(publisher: &dyn EventPublisher, event: &E)
where
    E: SerializableDomainEvent,
{
    publish_correlated(publisher, event, None).await
}

/// Like [`publish`], correlating the envelope with the purchase that caused it.
pub(crate) async fn publish_correlated<E>(
    publisher: &dyn EventPublisher,
    event: &E,
    purchase_id: Option<&PurchaseId>,
) where
    E: SerializableDomainEvent,
{
    let envelope = match event.to_envelope() {
        Ok(envelope) => envelope.with_user_id(event.aggregate_id()),
        Err(e) => {
            tracing::warn!(event_type = event.event_type(), "Failed to build event: {}", e);
            return;
        }
    };
    let envelope = match purchase_id {
        Some(id) => envelope.with_correlation_id(id.as_str()),
        None => envelope,
    };

    if let Err(e) = publisher.publish(envelope).await {
        tracing::warn!(
            event_type = event.event_type(),
            aggregate_id = %event.aggregate_id(),
            "Failed to publish event: {}",
            e
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryEventBus;
    use crate::domain::billing::CreditsUpdated;
    use crate::domain::foundation::UserId;

    fn event() -> CreditsUpdated {
        CreditsUpdated::new(UserId::new("user-1").unwrap(), 70, 100)
    }

    #[tokio::test]
    async fn envelope_carries_user_and_purchase() {
        let bus = InMemoryEventBus::new();
        let purchase_id = PurchaseId::new("purchase_txn_9").unwrap();

        publish_correlated(&bus, &event(), Some(&purchase_id)).await;

        let envelope = &bus.published_events()[0];
        assert_eq!(envelope.metadata.user_id.as_deref(), Some("user-1"));
        assert_eq!(
            envelope.metadata.correlation_id.as_deref(),
            Some("purchase_txn_9")
        );
    }

    #[tokio::test]
    async fn uncorrelated_event_has_no_correlation_id() {
        let bus = InMemoryEventBus::new();

        publish(&bus, &event()).await;

        let envelope = &bus.published_events()[0];
        assert_eq!(envelope.metadata.user_id.as_deref(), Some("user-1"));
        assert_eq!(envelope.metadata.correlation_id, None);
    }
}
