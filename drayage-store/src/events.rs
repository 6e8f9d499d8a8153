use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::debug;
use drayage_core::events::EventPublisher;
use drayage_shared::DomainEvent;

/// In-process bus. Publishing with no subscribers is not an error.
#[derive(Clone)]
pub struct BroadcastEventPublisher {
    sender: broadcast::Sender<DomainEvent>,
}

impl BroadcastEventPublisher {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastEventPublisher {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[async_trait]
impl EventPublisher for BroadcastEventPublisher {
    async fn publish(
        &self,
        event: &DomainEvent,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let receivers = self.sender.send(event.clone()).unwrap_or(0);
        debug!("Published {} for {} to {} subscribers", event.name(), event.key(), receivers);
        Ok(())
    }
}

#[cfg(feature = "kafka")]
pub use kafka::EventProducer;

#[cfg(feature = "kafka")]
mod kafka {
    use super::*;
    use rdkafka::config::ClientConfig;
    use rdkafka::producer::{FutureProducer, FutureRecord};
    use rdkafka::util::Timeout;
    use std::time::Duration;
    use tracing::{error, info};

    /// Publishes every domain event to one topic, keyed by its entity id
    #[derive(Clone)]
    pub struct EventProducer {
        producer: FutureProducer,
        topic: String,
    }

    impl EventProducer {
        pub fn new(brokers: &str, topic: &str) -> Result<Self, rdkafka::error::KafkaError> {
            let producer: FutureProducer = ClientConfig::new()
                .set("bootstrap.servers", brokers)
                .set("message.timeout.ms", "5000")
                .create()?;

            Ok(Self {
                producer,
                topic: topic.to_string(),
            })
        }
    }

    #[async_trait]
    impl EventPublisher for EventProducer {
        async fn publish(
            &self,
            event: &DomainEvent,
        ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            let key = event.key().to_string();
            let payload = serde_json::to_string(event)?;
            let record = FutureRecord::to(&self.topic)
                .key(&key)
                .payload(&payload);

            match self.producer.send(record, Timeout::After(Duration::from_secs(0))).await {
                Ok(delivery) => {
                    info!(
                        "Sent {} to {}/{}: partition {} offset {}",
                        event.name(), self.topic, key, delivery.partition, delivery.offset
                    );
                    Ok(())
                }
                Err((e, _msg)) => {
                    error!("Failed to send {} to {}: {}", event.name(), self.topic, e);
                    Err(Box::new(e))
                }
            }
        }
    }
}
