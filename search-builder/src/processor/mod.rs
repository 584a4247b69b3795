//! Processor module for the dimension search builder.
//!
//! Runs one index rebuild job per inbound notification.

mod message_processor;

pub use message_processor::{MessageProcessor, ProcessOutcome};
