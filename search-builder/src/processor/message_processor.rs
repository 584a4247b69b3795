//! Message processor implementation.
//!
//! Decodes a `hierarchy-built` notification, rebuilds the search index for
//! the instance dimension it names and publishes the completion message.

use std::sync::Arc;

use tracing::{error, info, instrument};

use hierarchy_client::HierarchyFetcher;
use search_builder_repository::SearchIndexProvider;
use search_builder_shared::{FailureReport, HierarchyNotification};

use crate::errors::JobError;
use crate::producer::{ErrorReporter, MessageSink};
use crate::schema::{decode_notification, encode_completion};
use crate::walker::HierarchyWalker;

/// Result of processing one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// The index was rebuilt and the completion message sent.
    Processed { documents: usize },
    /// The message could not be decoded; nothing was reported.
    DecodeFailed,
    /// The job failed after the instance was known.
    Failed { reported: bool },
}

impl ProcessOutcome {
    pub fn is_processed(&self) -> bool {
        matches!(self, Self::Processed { .. })
    }
}

/// Processor that turns hierarchy notifications into rebuilt indexes.
///
/// Each job is terminal on its first error. Errors never escape
/// [`MessageProcessor::process`]; they are logged and, when the instance is
/// known, published through the [`ErrorReporter`].
pub struct MessageProcessor {
    hierarchy: Arc<dyn HierarchyFetcher>,
    index: Arc<dyn SearchIndexProvider>,
    completions: Arc<dyn MessageSink>,
    reporter: ErrorReporter,
}

impl MessageProcessor {
    pub fn new(
        hierarchy: Arc<dyn HierarchyFetcher>,
        index: Arc<dyn SearchIndexProvider>,
        completions: Arc<dyn MessageSink>,
        reporter: ErrorReporter,
    ) -> Self {
        Self {
            hierarchy,
            index,
            completions,
            reporter,
        }
    }

    /// Process one raw inbound payload.
    pub async fn process(&self, payload: &[u8]) -> ProcessOutcome {
        let notification = match decode_notification(payload) {
            Ok(notification) => notification,
            Err(e) => {
                error!(error = %e, "Decode failed, message will be skipped");
                return ProcessOutcome::DecodeFailed;
            }
        };

        match self.rebuild(&notification).await {
            Ok(documents) => {
                info!(
                    instance_id = %notification.instance_id,
                    dimension = %notification.dimension,
                    documents = documents,
                    "Dimension search index rebuilt"
                );
                ProcessOutcome::Processed { documents }
            }
            Err(e) => {
                error!(
                    instance_id = %notification.instance_id,
                    dimension = %notification.dimension,
                    kind = e.kind().as_str(),
                    error = %e,
                    "Event failed to process"
                );

                let report = FailureReport::job_failed(
                    notification.instance_id.as_str(),
                    &notification.dimension,
                    &e,
                );
                let reported = self.reporter.report(&report).await.is_ok();
                ProcessOutcome::Failed { reported }
            }
        }
    }

    /// Rebuild the index for `notification`, returning the number of documents written.
    #[instrument(
        skip(self, notification),
        fields(instance_id = %notification.instance_id, dimension = %notification.dimension)
    )]
    async fn rebuild(&self, notification: &HierarchyNotification) -> Result<usize, JobError> {
        let instance_id = notification.instance_id.as_str();
        let dimension = notification.dimension.as_str();

        let root = self.hierarchy.get_root(instance_id, dimension).await?;

        // The index is always rebuilt from scratch
        let status = self.index.delete_index(instance_id, dimension).await?;
        if status == 404 {
            info!("No existing index to delete");
        }
        self.index.create_index(instance_id, dimension).await?;

        let walker = HierarchyWalker::new(self.hierarchy.as_ref(), self.index.as_ref());
        let summary = walker.walk(instance_id, dimension, &root).await?;

        let payload = encode_completion(&notification.completed());
        self.completions
            .send(instance_id, payload)
            .await
            .map_err(|e| JobError::emit(e.to_string()))?;

        Ok(summary.documents_written)
    }
}
