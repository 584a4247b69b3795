//! Failure reporting.
//!
//! Failed jobs are published to the report topic so that they surface
//! outside the service's logs.

use std::sync::Arc;

use tracing::{error, info, warn};

use search_builder_shared::FailureReport;

use crate::errors::IngestError;
use crate::producer::MessageSink;
use crate::schema::encode_report;

/// Publishes failure reports on behalf of a named service.
#[derive(Clone)]
pub struct ErrorReporter {
    sink: Arc<dyn MessageSink>,
    service_name: String,
}

impl ErrorReporter {
    pub fn new(sink: Arc<dyn MessageSink>, service_name: impl Into<String>) -> Self {
        Self {
            sink,
            service_name: service_name.into(),
        }
    }

    /// Publish `report`, keyed by its instance id.
    ///
    /// Reports without an instance id are dropped with a warning.
    pub async fn report(&self, report: &FailureReport) -> Result<(), IngestError> {
        if report.instance_id.is_empty() {
            warn!(event = %report.message, "Dropping failure report without instance id");
            return Ok(());
        }

        let payload = encode_report(report, &self.service_name);
        self.sink
            .send(&report.instance_id, payload)
            .await
            .inspect_err(|e| {
                error!(
                    instance_id = %report.instance_id,
                    error = %e,
                    "Failed to publish failure report"
                )
            })?;

        info!(
            instance_id = %report.instance_id,
            event = %report.message,
            "Published failure report"
        );
        Ok(())
    }
}
