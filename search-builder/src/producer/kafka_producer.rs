//! Kafka producer implementation for outbound messages.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use tracing::{debug, error, info, warn};

use search_builder_kafka::{create_future_producer, KafkaConfig};

use crate::errors::IngestError;
use crate::producer::MessageSink;
use crate::shutdown::Closer;

/// Time a message may wait in the local queue when it is full.
const DEFAULT_QUEUE_TIMEOUT: Duration = Duration::from_secs(5);

/// Time allowed for outstanding deliveries when the producer is closed.
const DEFAULT_FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// Time allowed for a metadata request made by the health check.
const DEFAULT_METADATA_TIMEOUT: Duration = Duration::from_secs(5);

/// Kafka producer bound to a single topic.
pub struct KafkaProducer {
    producer: FutureProducer,
    topic: String,
    name: String,
    flush_timeout: Duration,
    metadata_timeout: Duration,
    closed: AtomicBool,
}

impl KafkaProducer {
    /// Create a producer named `name` writing to `topic`.
    ///
    /// Messages larger than `max_bytes` are rejected by the client.
    pub fn new(
        config: &KafkaConfig,
        max_bytes: usize,
        topic: &str,
        name: &str,
    ) -> Result<Self, IngestError> {
        let producer = create_future_producer(config, max_bytes)
            .map_err(|e| IngestError::kafka(e.to_string()))?;

        info!(
            brokers = %config.brokers,
            topic = %topic,
            producer = %name,
            max_bytes = max_bytes,
            "Created Kafka producer"
        );

        Ok(Self {
            producer,
            topic: topic.to_string(),
            name: name.to_string(),
            flush_timeout: DEFAULT_FLUSH_TIMEOUT,
            metadata_timeout: DEFAULT_METADATA_TIMEOUT,
            closed: AtomicBool::new(false),
        })
    }

    /// Bound the metadata request made by [`KafkaProducer::fetch_topic_metadata`].
    pub fn with_metadata_timeout(mut self, timeout: Duration) -> Self {
        self.metadata_timeout = timeout;
        self
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn producer_name(&self) -> &str {
        &self.name
    }

    /// Ask the brokers for the metadata of the target topic.
    pub async fn fetch_topic_metadata(&self) -> Result<(), IngestError> {
        let producer = self.producer.clone();
        let topic = self.topic.clone();
        let timeout = self.metadata_timeout;

        tokio::task::spawn_blocking(move || {
            let metadata = producer.client().fetch_metadata(Some(&topic), timeout)?;
            match metadata.topics().iter().find(|t| t.name() == topic) {
                Some(entry) => match entry.error() {
                    Some(err) => Err(IngestError::kafka(format!("topic {}: {:?}", topic, err))),
                    None => Ok(()),
                },
                None => Err(IngestError::kafka(format!("topic {} not in metadata", topic))),
            }
        })
        .await
        .map_err(|e| IngestError::kafka(format!("metadata task failed: {}", e)))?
    }
}

#[async_trait]
impl MessageSink for KafkaProducer {
    async fn send(&self, key: &str, payload: Vec<u8>) -> Result<(), IngestError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(IngestError::closed(&self.name));
        }

        let record = FutureRecord::to(&self.topic).key(key).payload(&payload);
        let (partition, offset) = self
            .producer
            .send(record, DEFAULT_QUEUE_TIMEOUT)
            .await
            .map_err(|(e, _)| {
                error!(topic = %self.topic, error = %e, "Failed to deliver message");
                IngestError::from(e)
            })?;

        debug!(
            topic = %self.topic,
            partition = partition,
            offset = offset,
            "Message delivered"
        );
        Ok(())
    }
}

#[async_trait]
impl Closer for KafkaProducer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn close(&self) -> Result<(), IngestError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            warn!(producer = %self.name, "Producer already closed");
            return Ok(());
        }

        // flush blocks the calling thread until deliveries settle
        let producer = self.producer.clone();
        let timeout = self.flush_timeout;
        tokio::task::spawn_blocking(move || producer.flush(timeout))
            .await
            .map_err(|e| IngestError::kafka(format!("flush task failed: {}", e)))??;

        info!(producer = %self.name, topic = %self.topic, "Producer closed");
        Ok(())
    }
}
