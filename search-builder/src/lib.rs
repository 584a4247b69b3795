//! # Dimension Search Builder
//!
//! Rebuilds the search index of a dimension whenever its hierarchy has been
//! built: consumes `hierarchy-built` notifications from Kafka, walks the
//! hierarchy through the hierarchy API, writes one OpenSearch document per
//! dimension option and publishes a `dimension-search-built` notification.
//!
//! ## Architecture
//!
//! 1. **Consumer**: Receives notifications from Kafka
//! 2. **Processor**: Runs one index rebuild job per notification
//! 3. **Walker**: Turns the hierarchy tree into document writes
//! 4. **Orchestrator**: Pumps messages through the processor and commits them
//! 5. **Shutdown**: Drains the loop and closes every resource under one deadline
//!
//! ## Modules
//!
//! - [`config`]: Configuration and dependency initialization
//! - [`consumer`]: Inbound queue and its Kafka implementation
//! - [`producer`]: Completion and failure report producers
//! - [`processor`]: Per-message index rebuild
//! - [`walker`]: Hierarchy traversal
//! - [`orchestrator`]: Consumer loop
//! - [`shutdown`]: Graceful shutdown coordination
//! - [`health`]: Health check endpoint
//! - [`server`]: HTTP listener
//! - [`schema`]: Protobuf records exchanged over Kafka
//! - [`errors`]: Error types for the service

pub mod config;
pub mod consumer;
pub mod errors;
pub mod health;
pub mod orchestrator;
pub mod processor;
pub mod producer;
pub mod schema;
pub mod server;
pub mod service;
pub mod shutdown;
pub mod walker;

pub use config::{Config, ConfigError, Dependencies};
pub use errors::{IngestError, JobError};
pub use shutdown::ShutdownError;

use thiserror::Error;

/// Errors that end the service.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(#[from] ConfigError),

    /// A client or listener could not be created.
    #[error("Startup error: {0}")]
    StartupError(String),

    /// Ingest error.
    #[error("Ingest error: {0}")]
    IngestError(#[from] IngestError),

    /// Shutdown did not complete cleanly.
    #[error("Shutdown error: {0}")]
    ShutdownError(#[from] ShutdownError),
}

impl ServiceError {
    /// Create a startup error.
    pub fn startup(msg: impl Into<String>) -> Self {
        Self::StartupError(msg.into())
    }
}
