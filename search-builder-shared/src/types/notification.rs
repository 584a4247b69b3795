//! Job notifications.
//!
//! A rebuild job starts with a `HierarchyNotification` and ends with either a
//! `CompletionNotification` or a `FailureReport`.

use serde::{Deserialize, Serialize};

/// Notification that the hierarchy for an instance dimension has been built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyNotification {
    pub instance_id: String,
    pub dimension: String,
}

impl HierarchyNotification {
    pub fn new(instance_id: impl Into<String>, dimension: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            dimension: dimension.into(),
        }
    }

    /// The completion notification for this job.
    pub fn completed(&self) -> CompletionNotification {
        CompletionNotification {
            instance_id: self.instance_id.clone(),
            dimension: self.dimension.clone(),
        }
    }
}

/// Notification that the search index for an instance dimension is complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionNotification {
    pub instance_id: String,
    pub dimension: String,
}

/// Report of a job that failed after its instance was known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureReport {
    pub instance_id: String,
    pub message: String,
    /// Display text of the error that ended the job.
    pub cause: String,
}

impl FailureReport {
    /// Build the report for a failed job on `dimension`.
    pub fn job_failed(
        instance_id: impl Into<String>,
        dimension: &str,
        cause: impl std::fmt::Display,
    ) -> Self {
        Self {
            instance_id: instance_id.into(),
            message: format!("event failed to process, dimension is [{}]", dimension),
            cause: cause.to_string(),
        }
    }
}
