//! OpenSearch provider implementation.
//!
//! This module provides the concrete implementation of `SearchIndexProvider`
//! using the OpenSearch Rust crate.

use std::time::Duration;

use async_trait::async_trait;
use opensearch::{
    http::response::Response,
    http::transport::{SingleNodeConnectionPool, TransportBuilder},
    indices::{IndicesCreateParts, IndicesDeleteParts},
    IndexParts, OpenSearch,
};
use tracing::{debug, error, info};
use url::Url;

use search_builder_shared::{index_name, SearchDocument};

use crate::errors::SearchIndexError;
use crate::interfaces::SearchIndexProvider;
use crate::opensearch::index_config::get_index_settings;

/// OpenSearch provider implementation.
///
/// # Example
///
/// ```ignore
/// let provider = OpenSearchProvider::new("http://localhost:9200", Duration::from_secs(30))?;
///
/// provider.delete_index("instance", "geography").await?;
/// provider.create_index("instance", "geography").await?;
/// provider.put_document("instance", "geography", &document).await?;
/// ```
pub struct OpenSearchProvider {
    client: OpenSearch,
}

impl OpenSearchProvider {
    /// Create a new OpenSearch provider for the server at `url`.
    ///
    /// No request is made until the first operation. `timeout` bounds each
    /// request.
    pub fn new(url: &str, timeout: Duration) -> Result<Self, SearchIndexError> {
        let parsed_url =
            Url::parse(url).map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let conn_pool = SingleNodeConnectionPool::new(parsed_url);
        let transport = TransportBuilder::new(conn_pool)
            .disable_proxy()
            .timeout(timeout)
            .build()
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let client = OpenSearch::new(transport);

        info!(url = %url, "Created OpenSearch provider");

        Ok(Self { client })
    }

    /// Ping the cluster.
    pub async fn ping(&self) -> Result<(), SearchIndexError> {
        let response = self
            .client
            .ping()
            .send()
            .await
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        Self::check_status("Ping", response).await.map(|_| ())
    }

    /// Return the status of a successful response, or the status and body of
    /// a failed one.
    async fn check_status(operation: &str, response: Response) -> Result<u16, SearchIndexError> {
        let status = response.status_code();
        if status.is_success() {
            return Ok(status.as_u16());
        }

        let error_body = response.text().await.unwrap_or_default();
        Err(SearchIndexError::unexpected_status(
            operation,
            status.as_u16(),
            error_body,
        ))
    }

    fn validate_document(document: &SearchDocument) -> Result<(), SearchIndexError> {
        if document.code.is_empty() {
            return Err(SearchIndexError::validation(
                "missing dimension option code".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl SearchIndexProvider for OpenSearchProvider {
    async fn delete_index(
        &self,
        instance_id: &str,
        dimension: &str,
    ) -> Result<u16, SearchIndexError> {
        let index = index_name(instance_id, dimension);

        let response = self
            .client
            .indices()
            .delete(IndicesDeleteParts::Index(&[index.as_str()]))
            .send()
            .await
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        // 404 is acceptable - the index may never have been built
        if response.status_code().as_u16() == 404 {
            debug!(index = %index, "Index did not exist");
            return Ok(404);
        }

        let status = Self::check_status("Delete index", response)
            .await
            .inspect_err(|e| error!(index = %index, error = %e, "Delete index request failed"))?;

        debug!(index = %index, status = status, "Index deleted");
        Ok(status)
    }

    async fn create_index(
        &self,
        instance_id: &str,
        dimension: &str,
    ) -> Result<u16, SearchIndexError> {
        let index = index_name(instance_id, dimension);

        let response = self
            .client
            .indices()
            .create(IndicesCreateParts::Index(&index))
            .body(get_index_settings())
            .send()
            .await
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let status = Self::check_status("Create index", response)
            .await
            .inspect_err(|e| error!(index = %index, error = %e, "Create index request failed"))?;

        info!(index = %index, status = status, "Index created");
        Ok(status)
    }

    async fn put_document(
        &self,
        instance_id: &str,
        dimension: &str,
        document: &SearchDocument,
    ) -> Result<u16, SearchIndexError> {
        Self::validate_document(document)?;

        let index = index_name(instance_id, dimension);

        let response = self
            .client
            .index(IndexParts::IndexId(&index, &document.code))
            .body(document)
            .send()
            .await
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let status = Self::check_status("Index document", response)
            .await
            .inspect_err(|e| {
                error!(index = %index, code = %document.code, error = %e, "Index document request failed")
            })?;

        debug!(index = %index, code = %document.code, "Document indexed");
        Ok(status)
    }
}
