//! Protobuf records exchanged over Kafka.
//!
//! The inbound `hierarchy-built` and outbound `dimension-search-built` topics
//! carry the same two-field record; failures go to `report-events`.

use prost::Message;

use search_builder_shared::{CompletionNotification, FailureReport, HierarchyNotification};

use crate::errors::JobError;

/// Record published when a dimension hierarchy has been built.
#[derive(Clone, PartialEq, Message)]
pub struct HierarchyBuilt {
    #[prost(string, tag = "1")]
    pub instance_id: String,
    #[prost(string, tag = "2")]
    pub dimension_name: String,
}

/// Record published when a dimension search index has been rebuilt.
#[derive(Clone, PartialEq, Message)]
pub struct SearchIndexBuilt {
    #[prost(string, tag = "1")]
    pub instance_id: String,
    #[prost(string, tag = "2")]
    pub dimension_name: String,
}

/// Record published when a job fails.
#[derive(Clone, PartialEq, Message)]
pub struct ReportEvent {
    #[prost(string, tag = "1")]
    pub instance_id: String,
    #[prost(string, tag = "2")]
    pub event: String,
    #[prost(string, tag = "3")]
    pub error: String,
    #[prost(string, tag = "4")]
    pub service_name: String,
}

/// Decode an inbound `hierarchy-built` payload.
///
/// Both identifiers must be present; a record missing either cannot name an
/// index and is treated as undecodable.
pub fn decode_notification(payload: &[u8]) -> Result<HierarchyNotification, JobError> {
    let record = HierarchyBuilt::decode(payload)
        .map_err(|e| JobError::decode(format!("Failed to decode HierarchyBuilt: {}", e)))?;

    if record.instance_id.is_empty() {
        return Err(JobError::decode("HierarchyBuilt is missing instance_id"));
    }
    if record.dimension_name.is_empty() {
        return Err(JobError::decode("HierarchyBuilt is missing dimension_name"));
    }

    Ok(HierarchyNotification::new(
        record.instance_id,
        record.dimension_name,
    ))
}

/// Encode a completion notification as a `SearchIndexBuilt` record.
pub fn encode_completion(completion: &CompletionNotification) -> Vec<u8> {
    SearchIndexBuilt {
        instance_id: completion.instance_id.clone(),
        dimension_name: completion.dimension.clone(),
    }
    .encode_to_vec()
}

/// Encode a failure report as a `ReportEvent` record from `service_name`.
pub fn encode_report(report: &FailureReport, service_name: &str) -> Vec<u8> {
    ReportEvent {
        instance_id: report.instance_id.clone(),
        event: report.message.clone(),
        error: report.cause.clone(),
        service_name: service_name.to_string(),
    }
    .encode_to_vec()
}
