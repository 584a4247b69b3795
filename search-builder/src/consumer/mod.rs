//! Consumer module for the dimension search builder.
//!
//! Provides the inbound queue abstraction and its Kafka implementation.

mod kafka_consumer;
mod messages;

pub use kafka_consumer::KafkaConsumer;
pub use messages::InboundMessage;

use async_trait::async_trait;

use crate::errors::IngestError;
use crate::shutdown::Closer;

/// Source of inbound notifications.
///
/// Only the shutdown coordinator calls [`InboundQueue::stop_listening`] and
/// [`Closer::close`]; the consumer loop only receives and commits.
#[async_trait]
pub trait InboundQueue: Closer {
    /// Wait for the next message.
    ///
    /// Returns `Ok(None)` once the queue has been closed. Errors for which
    /// [`IngestError::is_fatal`] is false may be followed by more messages.
    async fn recv(&self) -> Result<Option<InboundMessage>, IngestError>;

    /// Commit `message` so it is not delivered again to the group.
    async fn commit(&self, message: &InboundMessage) -> Result<(), IngestError>;

    /// Stop receiving new messages.
    async fn stop_listening(&self) -> Result<(), IngestError>;
}
