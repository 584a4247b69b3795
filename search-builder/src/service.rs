//! Service lifecycle.
//!
//! Starts every component, waits for a shutdown trigger and runs the
//! graceful shutdown.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::config::{Config, Dependencies};
use crate::health;
use crate::orchestrator::ConsumerLoop;
use crate::server::HttpServer;
use crate::shutdown::{ShutdownCoordinator, ShutdownReason};
use crate::ServiceError;

/// Run the service until a termination signal or an unrecoverable error.
///
/// Returns an error if startup fails or the shutdown does not complete
/// cleanly.
pub async fn run(config: Config) -> Result<(), ServiceError> {
    let deps = Dependencies::new(&config)?;
    let (trigger_tx, mut trigger_rx) = mpsc::channel::<ShutdownReason>(4);

    let server = HttpServer::start(
        config.bind_addr,
        health::router(deps.health.clone()),
        trigger_tx.clone(),
    )
    .await?;

    deps.consumer.subscribe()?;

    let consumer_loop = ConsumerLoop::new(deps.consumer.clone(), deps.processor)
        .with_shutdown_trigger(trigger_tx)
        .spawn();

    let mut coordinator = ShutdownCoordinator::new(
        config.graceful_shutdown_timeout,
        deps.consumer,
        consumer_loop,
    )
    .then_close(deps.completion_producer)
    .then_close(deps.error_producer)
    .then_close(Arc::new(server));

    info!(
        topic = %config.hierarchy_built_topic,
        "Ready to process hierarchy notifications"
    );

    let reason = wait_for_trigger(&mut trigger_rx).await;
    info!(reason = %reason, "Shutdown triggered");

    coordinator.shutdown().await?;
    Ok(())
}

/// Wait for SIGINT, SIGTERM or a reason sent by a component.
async fn wait_for_trigger(trigger_rx: &mut mpsc::Receiver<ShutdownReason>) -> ShutdownReason {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install SIGINT handler");
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to install SIGTERM handler");
                    std::future::pending::<()>().await;
                }
            }
        }
        #[cfg(not(unix))]
        std::future::pending::<()>().await;
    };

    tokio::select! {
        _ = interrupt => ShutdownReason::Signal("SIGINT"),
        _ = terminate => ShutdownReason::Signal("SIGTERM"),
        reason = trigger_rx.recv() => reason.unwrap_or(ShutdownReason::ConsumerExited),
    }
}
