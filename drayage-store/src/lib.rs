pub mod app_config;
pub mod events;
pub mod memory;

pub use app_config::Config;
pub use events::BroadcastEventPublisher;
#[cfg(feature = "kafka")]
pub use events::EventProducer;
pub use memory::{MemoryStore, StoreError};
