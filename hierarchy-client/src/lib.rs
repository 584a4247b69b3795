//! Hierarchy API client for reading dimension option trees.
//!
//! This crate provides:
//! - [`HierarchyFetcher`] trait for abstracting hierarchy access
//! - [`HierarchyClient`] production client that calls the hierarchy API over HTTP
//! - [`MockHierarchyClient`] mock client for testing with pre-registered nodes
//!
//! ## Usage
//!
//! ```ignore
//! use hierarchy_client::{HierarchyClient, HierarchyFetcher};
//!
//! let client = HierarchyClient::new("http://localhost:22600", Duration::from_secs(30))?;
//! let root = client.get_root("instance-id", "geography").await?;
//! for child in &root.children {
//!     let node = client.get_node("instance-id", "geography", &child.code_id).await?;
//! }
//! ```

mod mock;
pub mod models;

pub use mock::{MockHierarchyClient, MockRequest};

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client as ReqwestClient, StatusCode, Url};
use tracing::{debug, error};

use search_builder_shared::HierarchyNode;

use crate::models::HierarchyResponse;

#[derive(Debug, Clone, thiserror::Error)]
pub enum HierarchyError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("unexpected status code {status} from hierarchy api: {url}")]
    UnexpectedStatus { status: u16, url: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("invalid response body: {0}")]
    InvalidResponse(String),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

pub type Result<T> = std::result::Result<T, HierarchyError>;

/// Trait for reading hierarchy nodes.
///
/// Production code uses [`HierarchyClient`], while tests can use
/// [`MockHierarchyClient`] or their own implementations.
#[async_trait]
pub trait HierarchyFetcher: Send + Sync {
    /// Fetch the root node of the hierarchy for an instance dimension.
    async fn get_root(&self, instance_id: &str, dimension: &str) -> Result<HierarchyNode>;

    /// Fetch a single node of the hierarchy by its code.
    async fn get_node(
        &self,
        instance_id: &str,
        dimension: &str,
        code_id: &str,
    ) -> Result<HierarchyNode>;
}

/// Production hierarchy client.
///
/// Each call performs exactly one `GET`; there is no retry at this layer.
pub struct HierarchyClient {
    base_url: Url,
    client: ReqwestClient,
}

impl HierarchyClient {
    /// Create a client for the hierarchy API at `url`.
    ///
    /// `timeout` bounds every request, including reading the body.
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(url).map_err(|e| HierarchyError::InvalidUrl(e.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(HierarchyError::InvalidUrl(url.to_string()));
        }

        let client = ReqwestClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| HierarchyError::Transport(e.to_string()))?;

        Ok(Self { base_url, client })
    }

    /// Build a url below the base url, percent-encoding each segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| HierarchyError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Call the hierarchy API's own health endpoint.
    pub async fn check_health(&self) -> Result<()> {
        let url = self.endpoint(&["health"])?;
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| HierarchyError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(HierarchyError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(())
    }

    async fn fetch(&self, url: Url, what: &str) -> Result<HierarchyNode> {
        debug!(url = %url, "Requesting {}", what);

        let response = self.client.get(url.clone()).send().await.map_err(|e| {
            error!(url = %url, error = %e, "Hierarchy api request failed");
            HierarchyError::Transport(e.to_string())
        })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(HierarchyError::NotFound(format!("{} at {}", what, url)));
        }
        if !status.is_success() {
            error!(url = %url, status = %status, "Unexpected status from hierarchy api");
            return Err(HierarchyError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body: HierarchyResponse = response
            .json()
            .await
            .map_err(|e| HierarchyError::InvalidResponse(e.to_string()))?;

        Ok(HierarchyNode::from(body))
    }
}

#[async_trait]
impl HierarchyFetcher for HierarchyClient {
    async fn get_root(&self, instance_id: &str, dimension: &str) -> Result<HierarchyNode> {
        let url = self.endpoint(&["hierarchies", instance_id, dimension])?;
        self.fetch(url, "root dimension option").await
    }

    async fn get_node(
        &self,
        instance_id: &str,
        dimension: &str,
        code_id: &str,
    ) -> Result<HierarchyNode> {
        let url = self.endpoint(&["hierarchies", instance_id, dimension, code_id])?;
        self.fetch(url, "dimension option").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::task::JoinHandle;

    /// Read one request head from `stream`.
    async fn read_request(stream: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = stream.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    /// Answer a single request with `status` and `body`, returning the
    /// base url and the request that was received.
    async fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let request = read_request(&mut stream).await;
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            let _ = stream.shutdown().await;
            request
        });

        (format!("http://{}", addr), handle)
    }

    const NODE_BODY: &str = r#"{
        "links": {
            "code": {"id": "K02000001", "href": "http://localhost/codes/K02000001"},
            "self": {"href": "http://localhost/hierarchies/inst-1/geography/K02000001"}
        },
        "label": "United Kingdom",
        "has_data": true,
        "no_of_children": 1,
        "children": [
            {"links": {"code": {"id": "E92000001"}}, "label": "England"}
        ]
    }"#;

    #[tokio::test]
    async fn test_get_node_sends_get_and_parses_body() {
        let (url, server) = serve_once("200 OK", NODE_BODY).await;

        let node = client(&url)
            .get_node("inst-1", "geography", "K02000001")
            .await
            .unwrap();

        let request = server.await.unwrap();
        assert!(request.starts_with("GET /hierarchies/inst-1/geography/K02000001 HTTP/1.1"));
        assert_eq!(node.code, "K02000001");
        assert_eq!(node.label, "United Kingdom");
        assert!(node.has_data);
        assert_eq!(node.child_count, 1);
        assert_eq!(node.children[0].code_id, "E92000001");
    }

    #[tokio::test]
    async fn test_get_root_not_found() {
        let (url, server) = serve_once("404 Not Found", "{}").await;

        let result = client(&url).get_root("inst-1", "geography").await;

        let request = server.await.unwrap();
        assert!(request.starts_with("GET /hierarchies/inst-1/geography HTTP/1.1"));
        assert!(matches!(result, Err(HierarchyError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_get_node_unexpected_status() {
        let (url, server) = serve_once("500 Internal Server Error", "{}").await;

        let result = client(&url).get_node("inst-1", "geography", "K02000001").await;

        server.await.unwrap();
        assert!(matches!(
            result,
            Err(HierarchyError::UnexpectedStatus { status: 500, .. })
        ));
    }

    #[tokio::test]
    async fn test_malformed_body_is_invalid_response() {
        let (url, server) = serve_once("200 OK", "not json").await;

        let result = client(&url).get_root("inst-1", "geography").await;

        server.await.unwrap();
        assert!(matches!(result, Err(HierarchyError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn test_refused_connection_is_transport_error() {
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };

        let result = client(&format!("http://{}", addr))
            .get_root("inst-1", "geography")
            .await;

        assert!(matches!(result, Err(HierarchyError::Transport(_))));
    }

    #[tokio::test]
    async fn test_check_health() {
        let (url, server) = serve_once("200 OK", "{}").await;
        client(&url).check_health().await.unwrap();
        assert!(server.await.unwrap().starts_with("GET /health HTTP/1.1"));

        let (url, server) = serve_once("503 Service Unavailable", "{}").await;
        let result = client(&url).check_health().await;
        server.await.unwrap();
        assert!(matches!(
            result,
            Err(HierarchyError::UnexpectedStatus { status: 503, .. })
        ));
    }

    fn client(url: &str) -> HierarchyClient {
        HierarchyClient::new(url, Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn test_root_endpoint() {
        let url = client("http://localhost:22600")
            .endpoint(&["hierarchies", "inst-1", "geography"])
            .unwrap();
        assert_eq!(url.as_str(), "http://localhost:22600/hierarchies/inst-1/geography");
    }

    #[test]
    fn test_node_endpoint_keeps_base_path_and_encodes() {
        let url = client("http://localhost:22600/api/")
            .endpoint(&["hierarchies", "inst-1", "geography", "a b/c"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:22600/api/hierarchies/inst-1/geography/a%20b%2Fc"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let result = HierarchyClient::new("not a url", Duration::from_secs(1));
        assert!(matches!(result, Err(HierarchyError::InvalidUrl(_))));

        let result = HierarchyClient::new("mailto:someone@example.com", Duration::from_secs(1));
        assert!(matches!(result, Err(HierarchyError::InvalidUrl(_))));
    }
}
