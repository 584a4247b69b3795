//! HTTP listener.
//!
//! Serves the service's router on its own task until it is closed.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::errors::IngestError;
use crate::shutdown::{Closer, ShutdownReason};

/// Running HTTP listener.
pub struct HttpServer {
    local_addr: SocketAddr,
    stop_tx: Mutex<Option<oneshot::Sender<()>>>,
    task: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl HttpServer {
    /// Bind `addr` and start serving `app`.
    ///
    /// If the listener fails while serving, the error is sent through
    /// `shutdown_trigger`.
    pub async fn start(
        addr: SocketAddr,
        app: Router,
        shutdown_trigger: mpsc::Sender<ShutdownReason>,
    ) -> Result<Self, IngestError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| IngestError::server(format!("failed to bind {}: {}", addr, e)))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| IngestError::server(e.to_string()))?;

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = stop_rx.await;
                })
                .await;

            if let Err(e) = result {
                error!(error = %e, "HTTP listener failed");
                let _ = shutdown_trigger
                    .send(ShutdownReason::ServerFailure(e.to_string()))
                    .await;
            }
        });

        info!(addr = %local_addr, "HTTP listener started");
        info!("- Health endpoint: http://{}/health", local_addr);

        Ok(Self {
            local_addr,
            stop_tx: Mutex::new(Some(stop_tx)),
            task: Mutex::new(Some(task)),
            closed: AtomicBool::new(false),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

#[async_trait]
impl Closer for HttpServer {
    fn name(&self) -> &str {
        "http listener"
    }

    async fn close(&self) -> Result<(), IngestError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            warn!("HTTP listener already closed");
            return Ok(());
        }

        if let Some(stop_tx) = self.stop_tx.lock().await.take() {
            // The listener may already have stopped on its own
            let _ = stop_tx.send(());
        }

        let task = self.task.lock().await.take();
        if let Some(task) = task {
            task.await
                .map_err(|e| IngestError::server(format!("listener task failed: {}", e)))?;
        }

        info!(addr = %self.local_addr, "HTTP listener closed");
        Ok(())
    }
}
