use async_trait::async_trait;
use drayage_shared::DomainEvent;

/// Outbound side of the event bus. Delivery is best-effort: the coordinator
/// logs failures and never rolls back on them.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(
        &self,
        event: &DomainEvent,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Publisher that drops everything; for wiring without a bus
pub struct NoopEventPublisher;

#[async_trait]
impl EventPublisher for NoopEventPublisher {
    async fn publish(
        &self,
        event: &DomainEvent,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        tracing::debug!("Dropping event {} for {}", event.name(), event.key());
        Ok(())
    }
}
