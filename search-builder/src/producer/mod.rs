//! Producer module for the dimension search builder.
//!
//! Outbound messages (completion notifications and failure reports) are
//! written through [`MessageSink`], implemented for Kafka by
//! [`KafkaProducer`].

mod kafka_producer;
mod reporter;

pub use kafka_producer::KafkaProducer;
pub use reporter::ErrorReporter;

use async_trait::async_trait;

use crate::errors::IngestError;

/// Destination for encoded outbound messages.
#[async_trait]
pub trait MessageSink: Send + Sync {
    /// Send `payload` keyed by `key`, waiting for delivery.
    async fn send(&self, key: &str, payload: Vec<u8>) -> Result<(), IngestError>;
}
