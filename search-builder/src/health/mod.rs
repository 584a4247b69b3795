//! Health check.
//!
//! Aggregates the liveness of the service's collaborators into a single
//! report served at `GET /health`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use hierarchy_client::HierarchyClient;
use search_builder_repository::OpenSearchProvider;

use crate::consumer::KafkaConsumer;
use crate::producer::KafkaProducer;

/// A named liveness check of one collaborator.
#[async_trait]
pub trait Checker: Send + Sync {
    fn name(&self) -> &str;

    /// Returns a description of the problem when the collaborator is unhealthy.
    async fn check(&self) -> Result<(), String>;
}

#[async_trait]
impl Checker for OpenSearchProvider {
    fn name(&self) -> &str {
        "OpenSearch"
    }

    async fn check(&self) -> Result<(), String> {
        self.ping().await.map_err(|e| e.to_string())
    }
}

#[async_trait]
impl Checker for HierarchyClient {
    fn name(&self) -> &str {
        "Hierarchy API"
    }

    async fn check(&self) -> Result<(), String> {
        self.check_health().await.map_err(|e| e.to_string())
    }
}

#[async_trait]
impl Checker for KafkaConsumer {
    fn name(&self) -> &str {
        "Kafka Consumer"
    }

    async fn check(&self) -> Result<(), String> {
        self.fetch_topic_metadata().await.map_err(|e| e.to_string())
    }
}

/// Producers are reported under their own name.
#[async_trait]
impl Checker for KafkaProducer {
    fn name(&self) -> &str {
        self.producer_name()
    }

    async fn check(&self) -> Result<(), String> {
        self.fetch_topic_metadata().await.map_err(|e| e.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HealthStatus {
    Ok,
    Critical,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub name: String,
    pub status: HealthStatus,
    pub message: String,
    pub last_checked: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub version: String,
    pub start_time: DateTime<Utc>,
    /// Milliseconds since `start_time`.
    pub uptime: i64,
    pub checks: Vec<CheckResult>,
}

/// Runs every registered checker and aggregates the results.
pub struct HealthCheck {
    version: String,
    start_time: DateTime<Utc>,
    check_timeout: Duration,
    checkers: Vec<Arc<dyn Checker>>,
}

impl HealthCheck {
    pub fn new(version: impl Into<String>, check_timeout: Duration) -> Self {
        Self {
            version: version.into(),
            start_time: Utc::now(),
            check_timeout,
            checkers: Vec::new(),
        }
    }

    pub fn with_checker(mut self, checker: Arc<dyn Checker>) -> Self {
        self.checkers.push(checker);
        self
    }

    /// Run all checks. The report is `CRITICAL` if any check fails.
    pub async fn report(&self) -> HealthReport {
        let mut checks = Vec::with_capacity(self.checkers.len());

        for checker in &self.checkers {
            let outcome = match tokio::time::timeout(self.check_timeout, checker.check()).await {
                Ok(outcome) => outcome,
                Err(_) => Err(format!("no answer within {:?}", self.check_timeout)),
            };

            let (status, message) = match outcome {
                Ok(()) => (HealthStatus::Ok, format!("{} is ok", checker.name())),
                Err(e) => {
                    warn!(check = %checker.name(), error = %e, "Health check failed");
                    (HealthStatus::Critical, e)
                }
            };

            checks.push(CheckResult {
                name: checker.name().to_string(),
                status,
                message,
                last_checked: Utc::now(),
            });
        }

        let status = if checks.iter().all(|c| c.status == HealthStatus::Ok) {
            HealthStatus::Ok
        } else {
            HealthStatus::Critical
        };

        let now = Utc::now();
        HealthReport {
            status,
            version: self.version.clone(),
            start_time: self.start_time,
            uptime: (now - self.start_time).num_milliseconds(),
            checks,
        }
    }
}

/// Create the router serving the health endpoint.
pub fn router(health: Arc<HealthCheck>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .with_state(health)
}

async fn health_handler(State(health): State<Arc<HealthCheck>>) -> impl IntoResponse {
    let report = health.report().await;
    let status = match report.status {
        HealthStatus::Ok => StatusCode::OK,
        HealthStatus::Critical => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(report))
}
