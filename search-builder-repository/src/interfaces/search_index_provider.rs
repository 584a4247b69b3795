//! Search index provider trait definition.

use async_trait::async_trait;

use search_builder_shared::SearchDocument;

use crate::errors::SearchIndexError;

/// Abstracts the search index backend used to rebuild dimension indexes.
///
/// Indexes are named `{instance_id}_{dimension}`. On success every method
/// returns the HTTP status the backend answered with.
#[async_trait]
pub trait SearchIndexProvider: Send + Sync {
    /// Delete the index for an instance dimension.
    ///
    /// A missing index is not an error: the call returns `Ok(404)`.
    /// Any other non-2xx status is returned as `SearchIndexError::UnexpectedStatus`.
    async fn delete_index(&self, instance_id: &str, dimension: &str)
        -> Result<u16, SearchIndexError>;

    /// Create the index for an instance dimension with the fixed mapping.
    async fn create_index(&self, instance_id: &str, dimension: &str)
        -> Result<u16, SearchIndexError>;

    /// Write one document, using its code as the document id.
    ///
    /// Documents with an empty code are rejected with
    /// `SearchIndexError::ValidationError` before any request is sent.
    async fn put_document(
        &self,
        instance_id: &str,
        dimension: &str,
        document: &SearchDocument,
    ) -> Result<u16, SearchIndexError>;
}
