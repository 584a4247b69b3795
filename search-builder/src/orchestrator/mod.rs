//! Orchestrator module for the dimension search builder.
//!
//! The consumer loop pumps inbound messages through the processor one at a
//! time and commits each of them once handled, whatever the outcome.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, error, info, instrument, warn};

use crate::consumer::{InboundMessage, InboundQueue};
use crate::processor::{MessageProcessor, ProcessOutcome};
use crate::shutdown::ShutdownReason;

/// Why the consumer loop stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopExit {
    /// A close was requested.
    Closed,
    /// The inbound queue stopped delivering messages.
    QueueClosed,
    /// The inbound queue reported an unrecoverable error.
    Fatal(String),
}

/// Counters kept by the consumer loop.
#[derive(Debug, Default)]
pub struct LoopStats {
    processed: AtomicU64,
    failed: AtomicU64,
    committed: AtomicU64,
}

/// Snapshot of [`LoopStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopTotals {
    pub processed: u64,
    pub failed: u64,
    pub committed: u64,
}

impl LoopStats {
    pub fn totals(&self) -> LoopTotals {
        LoopTotals {
            processed: self.processed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            committed: self.committed.load(Ordering::Relaxed),
        }
    }
}

/// Single-task message pump feeding the [`MessageProcessor`].
pub struct ConsumerLoop {
    queue: Arc<dyn InboundQueue>,
    processor: MessageProcessor,
    stats: Arc<LoopStats>,
    shutdown_trigger: Option<mpsc::Sender<ShutdownReason>>,
}

impl ConsumerLoop {
    pub fn new(queue: Arc<dyn InboundQueue>, processor: MessageProcessor) -> Self {
        Self {
            queue,
            processor,
            stats: Arc::new(LoopStats::default()),
            shutdown_trigger: None,
        }
    }

    /// Request a shutdown through `trigger` whenever the loop stops on its own.
    pub fn with_shutdown_trigger(mut self, trigger: mpsc::Sender<ShutdownReason>) -> Self {
        self.shutdown_trigger = Some(trigger);
        self
    }

    /// Run the loop on its own task.
    pub fn spawn(self) -> ConsumerLoopHandle {
        let (close_tx, close_rx) = broadcast::channel(1);
        let stats = self.stats.clone();
        let join = tokio::spawn(self.run(close_rx));
        ConsumerLoopHandle::new(close_tx, join, stats)
    }

    /// Run until a close is requested or the queue stops.
    ///
    /// A close request is only observed between messages, so the message in
    /// flight is always finished and committed.
    #[instrument(skip_all)]
    pub async fn run(self, mut close_rx: broadcast::Receiver<()>) -> LoopExit {
        info!("Consumer loop started");

        let exit = loop {
            tokio::select! {
                biased;
                _ = close_rx.recv() => {
                    info!("Consumer loop received close request");
                    break LoopExit::Closed;
                }
                received = self.queue.recv() => {
                    match received {
                        Ok(Some(message)) => self.handle(message).await,
                        Ok(None) => {
                            warn!("Inbound queue closed");
                            break LoopExit::QueueClosed;
                        }
                        Err(e) if e.is_fatal() => {
                            error!(error = %e, "Fatal inbound queue error");
                            break LoopExit::Fatal(e.to_string());
                        }
                        Err(e) => {
                            warn!(error = %e, "Inbound queue error");
                        }
                    }
                }
            }
        };

        let totals = self.stats.totals();
        info!(
            processed = totals.processed,
            failed = totals.failed,
            committed = totals.committed,
            exit = ?exit,
            "Consumer loop stopped"
        );

        if exit != LoopExit::Closed {
            if let Some(trigger) = &self.shutdown_trigger {
                let reason = match &exit {
                    LoopExit::Fatal(e) => ShutdownReason::QueueFailure(e.clone()),
                    _ => ShutdownReason::ConsumerExited,
                };
                if trigger.send(reason).await.is_err() {
                    debug!("Shutdown already in progress");
                }
            }
        }

        exit
    }

    async fn handle(&self, message: InboundMessage) {
        let outcome = self.processor.process(&message.payload).await;
        match outcome {
            ProcessOutcome::Processed { .. } => {
                self.stats.processed.fetch_add(1, Ordering::Relaxed);
            }
            ProcessOutcome::DecodeFailed | ProcessOutcome::Failed { .. } => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
            }
        }

        // Failed jobs are committed too; they surface through the report topic
        match self.queue.commit(&message).await {
            Ok(()) => {
                self.stats.committed.fetch_add(1, Ordering::Relaxed);
                debug!(
                    topic = %message.topic,
                    partition = message.partition,
                    offset = message.offset,
                    "Committed message"
                );
            }
            Err(e) => {
                error!(
                    topic = %message.topic,
                    partition = message.partition,
                    offset = message.offset,
                    error = %e,
                    "Failed to commit message"
                );
            }
        }
    }
}

/// Errors from draining the consumer loop.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DrainError {
    #[error("consumer loop did not drain before the deadline")]
    Timeout,

    #[error("consumer loop task failed: {0}")]
    Task(String),
}

/// Handle to a consumer loop running on its own task.
pub struct ConsumerLoopHandle {
    close_tx: broadcast::Sender<()>,
    join: JoinHandle<LoopExit>,
    stats: Arc<LoopStats>,
}

impl ConsumerLoopHandle {
    pub fn new(
        close_tx: broadcast::Sender<()>,
        join: JoinHandle<LoopExit>,
        stats: Arc<LoopStats>,
    ) -> Self {
        Self {
            close_tx,
            join,
            stats,
        }
    }

    pub fn totals(&self) -> LoopTotals {
        self.stats.totals()
    }

    /// Ask the loop to stop and wait for it until `deadline`.
    ///
    /// A loop still running at the deadline is aborted, dropping the message
    /// in flight without committing it.
    pub async fn drain(mut self, deadline: Instant) -> Result<LoopExit, DrainError> {
        // Fails only when the loop has already stopped
        let _ = self.close_tx.send(());

        match timeout_at(deadline, &mut self.join).await {
            Ok(Ok(exit)) => Ok(exit),
            Ok(Err(e)) => Err(DrainError::Task(e.to_string())),
            Err(_) => {
                self.join.abort();
                Err(DrainError::Timeout)
            }
        }
    }
}
