//! Mock hierarchy client for testing and local development.
//!
//! The `MockHierarchyClient` serves a root and a set of nodes registered up
//! front, can be told to fail for specific codes and records every request it
//! receives.
//!
//! # Example
//!
//! ```ignore
//! use hierarchy_client::{HierarchyFetcher, MockHierarchyClient};
//! use search_builder_shared::HierarchyNode;
//!
//! let client = MockHierarchyClient::new();
//! client.set_root(HierarchyNode::new("root", "Root").with_children(["A"]));
//! client.register_node(HierarchyNode::new("A", "Alpha"));
//!
//! let root = client.get_root("instance", "dimension").await?;
//! ```

use std::collections::HashMap;
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;

use search_builder_shared::HierarchyNode;

use crate::{HierarchyError, HierarchyFetcher, Result};

/// A request received by the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockRequest {
    pub instance_id: String,
    pub dimension: String,
    /// `None` for root requests.
    pub code_id: Option<String>,
}

/// Mock hierarchy client that returns pre-registered nodes.
pub struct MockHierarchyClient {
    root: RwLock<Option<HierarchyNode>>,
    nodes: RwLock<HashMap<String, HierarchyNode>>,
    failures: RwLock<HashMap<String, HierarchyError>>,
    root_failure: RwLock<Option<HierarchyError>>,
    requests: Mutex<Vec<MockRequest>>,
}

impl MockHierarchyClient {
    /// Create a new empty mock client. Root requests return `NotFound` until
    /// a root is set.
    pub fn new() -> Self {
        Self {
            root: RwLock::new(None),
            nodes: RwLock::new(HashMap::new()),
            failures: RwLock::new(HashMap::new()),
            root_failure: RwLock::new(None),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Create a mock serving `root` and `nodes`.
    pub fn with_tree(root: HierarchyNode, nodes: impl IntoIterator<Item = HierarchyNode>) -> Self {
        let client = Self::new();
        client.set_root(root);
        for node in nodes {
            client.register_node(node);
        }
        client
    }

    pub fn set_root(&self, root: HierarchyNode) {
        *self.root.write().unwrap() = Some(root);
    }

    /// Register a node, keyed by its code.
    pub fn register_node(&self, node: HierarchyNode) {
        self.nodes.write().unwrap().insert(node.code.clone(), node);
    }

    /// Make requests for `code_id` fail with `error`.
    pub fn fail_node(&self, code_id: &str, error: HierarchyError) {
        self.failures
            .write()
            .unwrap()
            .insert(code_id.to_string(), error);
    }

    /// Make root requests fail with `error`.
    pub fn fail_root(&self, error: HierarchyError) {
        *self.root_failure.write().unwrap() = Some(error);
    }

    /// All requests received so far, in order.
    pub fn requests(&self) -> Vec<MockRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Codes of all node requests received so far, in order.
    pub fn requested_codes(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter_map(|r| r.code_id.clone())
            .collect()
    }

    fn record(&self, instance_id: &str, dimension: &str, code_id: Option<&str>) {
        self.requests.lock().unwrap().push(MockRequest {
            instance_id: instance_id.to_string(),
            dimension: dimension.to_string(),
            code_id: code_id.map(str::to_string),
        });
    }
}

impl Default for MockHierarchyClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HierarchyFetcher for MockHierarchyClient {
    async fn get_root(&self, instance_id: &str, dimension: &str) -> Result<HierarchyNode> {
        self.record(instance_id, dimension, None);

        if let Some(error) = self.root_failure.read().unwrap().clone() {
            return Err(error);
        }

        self.root.read().unwrap().clone().ok_or_else(|| {
            HierarchyError::NotFound(format!(
                "root dimension option for {}/{} not found in mock",
                instance_id, dimension
            ))
        })
    }

    async fn get_node(
        &self,
        instance_id: &str,
        dimension: &str,
        code_id: &str,
    ) -> Result<HierarchyNode> {
        self.record(instance_id, dimension, Some(code_id));

        if let Some(error) = self.failures.read().unwrap().get(code_id).cloned() {
            return Err(error);
        }

        self.nodes
            .read()
            .unwrap()
            .get(code_id)
            .cloned()
            .ok_or_else(|| {
                HierarchyError::NotFound(format!("dimension option {} not found in mock", code_id))
            })
    }
}
