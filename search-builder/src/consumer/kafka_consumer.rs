//! Kafka consumer implementation for the dimension search builder.
//!
//! Receives `hierarchy-built` messages one at a time and commits them
//! manually once they have been handled.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rdkafka::{
    consumer::{CommitMode, Consumer, StreamConsumer},
    message::Message as KafkaMessage,
    Offset, TopicPartitionList,
};
use tracing::{debug, info, warn};

use search_builder_kafka::{create_stream_consumer, KafkaConfig};

use crate::consumer::{InboundMessage, InboundQueue};
use crate::errors::IngestError;
use crate::shutdown::Closer;

/// Time allowed for a metadata request made by the health check.
const DEFAULT_METADATA_TIMEOUT: Duration = Duration::from_secs(5);

/// Kafka consumer for hierarchy notifications.
pub struct KafkaConsumer {
    consumer: Arc<StreamConsumer>,
    topic: String,
    metadata_timeout: Duration,
    subscribed: AtomicBool,
    paused: AtomicBool,
    closed: AtomicBool,
}

impl KafkaConsumer {
    /// Create a new Kafka consumer.
    ///
    /// # Arguments
    ///
    /// * `config` - Broker and security settings
    /// * `group_id` - Consumer group ID
    /// * `topic` - Topic to consume
    /// * `offset_oldest` - Start from the oldest message when the group has no committed offset
    ///
    /// # Returns
    ///
    /// * `Ok(KafkaConsumer)` - A new consumer instance
    /// * `Err(IngestError)` - If consumer creation fails
    pub fn new(
        config: &KafkaConfig,
        group_id: &str,
        topic: &str,
        offset_oldest: bool,
    ) -> Result<Self, IngestError> {
        let consumer = create_stream_consumer(config, group_id, offset_oldest)
            .map_err(|e| IngestError::kafka(e.to_string()))?;

        info!(
            brokers = %config.brokers,
            group_id = %group_id,
            topic = %topic,
            offset_oldest = offset_oldest,
            "Created Kafka consumer"
        );

        Ok(Self {
            consumer: Arc::new(consumer),
            topic: topic.to_string(),
            metadata_timeout: DEFAULT_METADATA_TIMEOUT,
            subscribed: AtomicBool::new(false),
            paused: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        })
    }

    /// Bound the metadata request made by [`KafkaConsumer::fetch_topic_metadata`].
    pub fn with_metadata_timeout(mut self, timeout: Duration) -> Self {
        self.metadata_timeout = timeout;
        self
    }

    /// Subscribe to the configured topic.
    pub fn subscribe(&self) -> Result<(), IngestError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(IngestError::closed(self.name()));
        }

        self.consumer
            .subscribe(&[self.topic.as_str()])
            .map_err(|e| IngestError::kafka(e.to_string()))?;
        self.subscribed.store(true, Ordering::SeqCst);

        info!(topic = %self.topic, "Subscribed to Kafka topic");
        Ok(())
    }

    /// Topics the consumer is currently subscribed to.
    pub fn subscription(&self) -> Result<Vec<String>, IngestError> {
        let list = self.consumer.subscription()?;
        Ok(list
            .elements()
            .iter()
            .map(|element| element.topic().to_string())
            .collect())
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Ask the brokers for the metadata of the consumed topic.
    ///
    /// Runs on the blocking pool since librdkafka waits for the answer.
    pub async fn fetch_topic_metadata(&self) -> Result<(), IngestError> {
        let consumer = self.consumer.clone();
        let topic = self.topic.clone();
        let timeout = self.metadata_timeout;

        tokio::task::spawn_blocking(move || {
            let metadata = consumer.fetch_metadata(Some(&topic), timeout)?;
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
impl InboundQueue for KafkaConsumer {
    async fn recv(&self) -> Result<Option<InboundMessage>, IngestError> {
        if self.closed.load(Ordering::SeqCst) {
            return Ok(None);
        }

        let msg = self.consumer.recv().await?;

        debug!(
            topic = %msg.topic(),
            partition = msg.partition(),
            offset = msg.offset(),
            "Received message from Kafka"
        );

        Ok(Some(InboundMessage::new(
            msg.topic(),
            msg.partition(),
            msg.offset(),
            msg.payload().map(<[u8]>::to_vec).unwrap_or_default(),
        )))
    }

    async fn commit(&self, message: &InboundMessage) -> Result<(), IngestError> {
        let mut tpl = TopicPartitionList::new();
        tpl.add_partition_offset(
            &message.topic,
            message.partition,
            Offset::Offset(message.offset + 1),
        )
        .map_err(|e| IngestError::kafka(e.to_string()))?;

        self.consumer
            .commit(&tpl, CommitMode::Async)
            .map_err(|e| IngestError::kafka(e.to_string()))?;

        Ok(())
    }

    /// Pause the assigned partitions.
    ///
    /// The consumer stays in its group so the partition of the message in
    /// flight is not handed to another member before it is committed.
    async fn stop_listening(&self) -> Result<(), IngestError> {
        if !self.subscribed.load(Ordering::SeqCst) {
            debug!(topic = %self.topic, "Consumer was not listening");
            return Ok(());
        }
        if self.paused.swap(true, Ordering::SeqCst) {
            debug!(topic = %self.topic, "Consumer already paused");
            return Ok(());
        }

        let assignment = self.consumer.assignment()?;
        self.consumer.pause(&assignment)?;

        info!(
            topic = %self.topic,
            partitions = assignment.count(),
            "Stopped listening to Kafka topic"
        );
        Ok(())
    }
}

#[async_trait]
impl Closer for KafkaConsumer {
    fn name(&self) -> &str {
        "kafka consumer"
    }

    async fn close(&self) -> Result<(), IngestError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            warn!("Kafka consumer already closed");
            return Ok(());
        }

        // Runs after the drain, so the last commit was made as a group member
        if self.subscribed.swap(false, Ordering::SeqCst) {
            self.consumer.unsubscribe();
        }
        self.consumer
            .unassign()
            .map_err(|e| IngestError::kafka(e.to_string()))?;

        info!(topic = %self.topic, "Kafka consumer closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn consumer() -> KafkaConsumer {
        let config = KafkaConfig::new("127.0.0.1:1", "search-builder-test");
        KafkaConsumer::new(&config, "search-builder-test", "hierarchy-built", true)
            .unwrap()
            .with_metadata_timeout(Duration::from_millis(200))
    }

    #[tokio::test]
    async fn test_stop_listening_keeps_group_membership() {
        let consumer = consumer();
        consumer.subscribe().unwrap();

        consumer.stop_listening().await.unwrap();

        assert!(consumer.is_paused());
        assert_eq!(consumer.subscription().unwrap(), vec!["hierarchy-built"]);
    }

    #[tokio::test]
    async fn test_close_leaves_the_group() {
        let consumer = consumer();
        consumer.subscribe().unwrap();
        consumer.stop_listening().await.unwrap();

        consumer.close().await.unwrap();
        consumer.close().await.unwrap();

        assert!(consumer.subscription().unwrap().is_empty());
        assert!(matches!(consumer.recv().await, Ok(None)));
        assert!(matches!(consumer.subscribe(), Err(IngestError::Closed(_))));
    }

    #[tokio::test]
    async fn test_stop_listening_before_subscribe_is_a_no_op() {
        let consumer = consumer();

        consumer.stop_listening().await.unwrap();

        assert!(!consumer.is_paused());
    }

    #[tokio::test]
    async fn test_metadata_fails_without_broker() {
        let consumer = consumer();

        let result = consumer.fetch_topic_metadata().await;

        assert!(matches!(result, Err(IngestError::KafkaError(_))));
    }
}
