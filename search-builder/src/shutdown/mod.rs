//! Graceful shutdown.
//!
//! The coordinator owns every closable resource of the service and tears
//! them down in a fixed order under a single deadline.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::time::{timeout_at, Instant};
use tracing::{error, info, warn};

use crate::consumer::InboundQueue;
use crate::errors::IngestError;
use crate::orchestrator::{ConsumerLoopHandle, DrainError};

/// A resource released during shutdown.
///
/// Implementations must tolerate repeated calls; only the first one closes.
#[async_trait]
pub trait Closer: Send + Sync {
    /// Name used in logs and close failures.
    fn name(&self) -> &str;

    async fn close(&self) -> Result<(), IngestError>;
}

/// What started the shutdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReason {
    /// The process received a termination signal.
    Signal(&'static str),
    /// The inbound queue failed and can no longer deliver messages.
    QueueFailure(String),
    /// The HTTP listener stopped with an error.
    ServerFailure(String),
    /// The consumer loop stopped without being asked to.
    ConsumerExited,
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Signal(name) => write!(f, "received {}", name),
            Self::QueueFailure(e) => write!(f, "inbound queue failed: {}", e),
            Self::ServerFailure(e) => write!(f, "http listener failed: {}", e),
            Self::ConsumerExited => write!(f, "consumer loop exited"),
        }
    }
}

/// Lifecycle of the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownState {
    Running,
    Draining,
    Closed,
}

/// A resource that failed to close.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseFailure {
    pub resource: String,
    pub error: String,
}

impl fmt::Display for CloseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.resource, self.error)
    }
}

fn describe(failures: &[CloseFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors from a shutdown.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ShutdownError {
    /// The deadline expired. Every close was still attempted.
    #[error("shutdown timed out after {timeout:?} [{}]", describe(.failures))]
    Timeout {
        timeout: Duration,
        failures: Vec<CloseFailure>,
    },

    /// One or more resources failed to close.
    #[error("failed to close resources [{}]", describe(.0))]
    Close(Vec<CloseFailure>),
}

impl ShutdownError {
    pub fn failures(&self) -> &[CloseFailure] {
        match self {
            Self::Timeout { failures, .. } => failures,
            Self::Close(failures) => failures,
        }
    }
}

/// Tears down the service's resources once.
///
/// Order: stop the inbound listener, drain the consumer loop, close the
/// registered closers in registration order, then release the inbound
/// consumer. Each step runs even if an earlier one failed or the deadline has
/// passed; a step still pending at the deadline is abandoned.
pub struct ShutdownCoordinator {
    state: ShutdownState,
    timeout: Duration,
    inbound: Arc<dyn InboundQueue>,
    consumer_loop: Option<ConsumerLoopHandle>,
    closers: Vec<Arc<dyn Closer>>,
}

impl ShutdownCoordinator {
    pub fn new(
        timeout: Duration,
        inbound: Arc<dyn InboundQueue>,
        consumer_loop: ConsumerLoopHandle,
    ) -> Self {
        Self {
            state: ShutdownState::Running,
            timeout,
            inbound,
            consumer_loop: Some(consumer_loop),
            closers: Vec::new(),
        }
    }

    /// Register a resource to close after the consumer loop has drained.
    pub fn then_close(mut self, closer: Arc<dyn Closer>) -> Self {
        self.closers.push(closer);
        self
    }

    pub fn state(&self) -> ShutdownState {
        self.state
    }

    /// Run the shutdown.
    ///
    /// Calls after the first one return `Ok(())` without touching any
    /// resource.
    pub async fn shutdown(&mut self) -> Result<(), ShutdownError> {
        if self.state != ShutdownState::Running {
            warn!(state = ?self.state, "Shutdown already performed");
            return Ok(());
        }

        self.state = ShutdownState::Draining;
        let deadline = Instant::now() + self.timeout;
        let mut failures = Vec::new();
        let mut timed_out = false;

        info!(timeout = ?self.timeout, "Graceful shutdown started");

        let inbound_name = self.inbound.name().to_string();
        timed_out |= attempt(
            &inbound_name,
            deadline,
            self.inbound.stop_listening(),
            &mut failures,
        )
        .await;

        if let Some(consumer_loop) = self.consumer_loop.take() {
            match consumer_loop.drain(deadline).await {
                Ok(exit) => info!(exit = ?exit, "Consumer loop drained"),
                Err(e) => {
                    error!(error = %e, "Consumer loop did not drain cleanly");
                    timed_out |= e == DrainError::Timeout;
                    failures.push(CloseFailure {
                        resource: "consumer loop".to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }

        for closer in &self.closers {
            timed_out |= attempt(closer.name(), deadline, closer.close(), &mut failures).await;
        }

        timed_out |= attempt(&inbound_name, deadline, self.inbound.close(), &mut failures).await;

        self.state = ShutdownState::Closed;
        timed_out |= Instant::now() > deadline;

        if timed_out {
            error!(failures = failures.len(), "Graceful shutdown timed out");
            return Err(ShutdownError::Timeout {
                timeout: self.timeout,
                failures,
            });
        }
        if !failures.is_empty() {
            error!(failures = %describe(&failures), "Graceful shutdown finished with errors");
            return Err(ShutdownError::Close(failures));
        }

        info!("Graceful shutdown complete");
        Ok(())
    }
}

/// Run one close step until `deadline`, recording any failure.
///
/// Returns whether the step was abandoned at the deadline.
async fn attempt<F>(
    resource: &str,
    deadline: Instant,
    step: F,
    failures: &mut Vec<CloseFailure>,
) -> bool
where
    F: Future<Output = Result<(), IngestError>>,
{
    match timeout_at(deadline, step).await {
        Ok(Ok(())) => false,
        Ok(Err(e)) => {
            error!(resource = %resource, error = %e, "Failed to close resource");
            failures.push(CloseFailure {
                resource: resource.to_string(),
                error: e.to_string(),
            });
            false
        }
        Err(_) => {
            error!(resource = %resource, "Closing resource exceeded the shutdown deadline");
            failures.push(CloseFailure {
                resource: resource.to_string(),
                error: "deadline exceeded".to_string(),
            });
            true
        }
    }
}
