//! Response bodies returned by the hierarchy API.

use std::collections::HashMap;

use serde::Deserialize;

use search_builder_shared::{ChildRef, HierarchyNode};

/// A link entry inside `links`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Link {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub href: String,
}

/// Body of `GET /hierarchies/{instance}/{dimension}[/{code}]`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HierarchyResponse {
    #[serde(default)]
    pub links: HashMap<String, Link>,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub has_data: bool,
    #[serde(default)]
    pub no_of_children: i64,
    #[serde(default)]
    pub children: Vec<Element>,
}

/// A child entry of a hierarchy response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Element {
    #[serde(default)]
    pub links: HashMap<String, Link>,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub has_data: bool,
    #[serde(default)]
    pub no_of_children: i64,
}

fn link_field<'a>(links: &'a HashMap<String, Link>, name: &str, pick: fn(&Link) -> &str) -> &'a str {
    links.get(name).map(pick).unwrap_or_default()
}

impl From<HierarchyResponse> for HierarchyNode {
    /// Children are addressed by their `code` link id; the node url is its
    /// `self` link.
    fn from(response: HierarchyResponse) -> Self {
        let children = response
            .children
            .iter()
            .map(|child| ChildRef::new(link_field(&child.links, "code", |l| &l.id)))
            .collect();

        HierarchyNode {
            code: link_field(&response.links, "code", |l| &l.id).to_string(),
            label: response.label,
            has_data: response.has_data,
            child_count: response.no_of_children,
            self_url: link_field(&response.links, "self", |l| &l.href).to_string(),
            children,
        }
    }
}
