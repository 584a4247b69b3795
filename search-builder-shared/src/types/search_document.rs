//! Search document types.
//!
//! This module defines the document structure written to a dimension search
//! index, one per hierarchy node.

use serde::{Deserialize, Serialize};

use crate::types::hierarchy_node::HierarchyNode;

/// Name of the search index for an instance dimension.
///
/// # Example
///
/// ```
/// use search_builder_shared::index_name;
///
/// assert_eq!(index_name("inst-1", "geography"), "inst-1_geography");
/// ```
pub fn index_name(instance_id: &str, dimension: &str) -> String {
    format!("{}_{}", instance_id, dimension)
}

/// Document representation of a dimension option in the search index.
///
/// `code` doubles as the document id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchDocument {
    pub code: String,
    pub has_data: bool,
    pub label: String,
    pub number_of_children: i64,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub url: String,
}

impl From<&HierarchyNode> for SearchDocument {
    fn from(node: &HierarchyNode) -> Self {
        Self {
            code: node.code.clone(),
            has_data: node.has_data,
            label: node.label.clone(),
            number_of_children: node.child_count,
            url: node.self_url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_hierarchy_node() {
        let node = HierarchyNode::new("E92000001", "England")
            .with_has_data(true)
            .with_self_url("http://hierarchy/hierarchies/i/geo/E92000001")
            .with_children(["E12000001", "E12000002"]);

        let doc = SearchDocument::from(&node);
        assert_eq!(doc.code, "E92000001");
        assert_eq!(doc.label, "England");
        assert!(doc.has_data);
        assert_eq!(doc.number_of_children, 2);
        assert_eq!(doc.url, "http://hierarchy/hierarchies/i/geo/E92000001");
    }

    #[test]
    fn test_serialization_field_names() {
        let doc = SearchDocument::from(&HierarchyNode::new("A", "Alpha"));
        let json = serde_json::to_value(&doc).unwrap();

        assert_eq!(json["code"], "A");
        assert_eq!(json["has_data"], false);
        assert_eq!(json["label"], "Alpha");
        assert_eq!(json["number_of_children"], 0);
        // Empty urls are omitted
        assert!(json.get("url").is_none());
    }
}
