//! Hierarchy node types.
//!
//! A `HierarchyNode` is one dimension option of a hierarchy tree as served by
//! the hierarchy API, reduced to the fields the search builder needs.

use serde::{Deserialize, Serialize};

/// Reference from a parent node to one of its children.
///
/// An empty `code_id` means the child cannot be addressed and is skipped
/// during traversal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildRef {
    pub code_id: String,
}

impl ChildRef {
    pub fn new(code_id: impl Into<String>) -> Self {
        Self {
            code_id: code_id.into(),
        }
    }

    /// Whether the reference can be followed.
    pub fn is_followable(&self) -> bool {
        !self.code_id.is_empty()
    }
}

/// One node of a hierarchy tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyNode {
    /// Code identifying the dimension option.
    pub code: String,
    /// Human readable label.
    pub label: String,
    /// Whether observations exist for this option.
    pub has_data: bool,
    /// Number of children reported by the hierarchy API.
    pub child_count: i64,
    /// Link to this node in the hierarchy API.
    pub self_url: String,
    /// Children in source order.
    pub children: Vec<ChildRef>,
}

impl HierarchyNode {
    /// Create a leaf node with the given code and label.
    ///
    /// # Example
    ///
    /// ```
    /// use search_builder_shared::HierarchyNode;
    ///
    /// let node = HierarchyNode::new("K02000001", "United Kingdom")
    ///     .with_children(["E92000001", "W92000004"]);
    /// assert_eq!(node.child_count, 2);
    /// ```
    pub fn new(code: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            label: label.into(),
            has_data: false,
            child_count: 0,
            self_url: String::new(),
            children: Vec::new(),
        }
    }

    /// Replace the children with references to the given codes.
    ///
    /// `child_count` is updated to match.
    pub fn with_children<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.children = codes.into_iter().map(ChildRef::new).collect();
        self.child_count = self.children.len() as i64;
        self
    }

    pub fn with_has_data(mut self, has_data: bool) -> Self {
        self.has_data = has_data;
        self
    }

    pub fn with_self_url(mut self, url: impl Into<String>) -> Self {
        self.self_url = url.into();
        self
    }
}
