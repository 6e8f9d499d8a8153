use std::net::SocketAddr;
use std::sync::Arc;
use anyhow::Context;
use drayage_api::{app, in_memory_state};
use drayage_core::events::EventPublisher;
use drayage_store::BroadcastEventPublisher;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "drayage_api=debug,drayage_order=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = drayage_store::Config::load().context("Failed to load config")?;
    tracing::info!("Starting Drayage API on port {}", config.server.port);

    let events = event_publisher(&config)?;
    let state = in_memory_state(
        config.business_rules.rates.clone(),
        config.business_rules.scheduling.clone(),
        events,
    );

    let app = app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(feature = "kafka")]
fn event_publisher(config: &drayage_store::Config) -> anyhow::Result<Arc<dyn EventPublisher>> {
    match &config.kafka {
        Some(kafka) => {
            tracing::info!("Publishing events to Kafka topic {}", kafka.topic);
            let producer = drayage_store::EventProducer::new(&kafka.brokers, &kafka.topic)
                .context("Failed to create Kafka producer")?;
            Ok(Arc::new(producer))
        }
        None => Ok(Arc::new(BroadcastEventPublisher::default())),
    }
}

#[cfg(not(feature = "kafka"))]
fn event_publisher(config: &drayage_store::Config) -> anyhow::Result<Arc<dyn EventPublisher>> {
    if config.kafka.is_some() {
        tracing::warn!("Kafka configured but the `kafka` feature is disabled; using the in-process bus");
    }
    Ok(Arc::new(BroadcastEventPublisher::default()))
}
