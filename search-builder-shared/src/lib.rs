//! # Search Builder Shared
//!
//! This crate defines the data structures shared across the dimension search
//! builder: the notifications that start and finish a rebuild job, the
//! hierarchy nodes read from the hierarchy API and the documents written to
//! the search index.

pub mod types;

pub use types::hierarchy_node::{ChildRef, HierarchyNode};
pub use types::notification::{CompletionNotification, FailureReport, HierarchyNotification};
pub use types::search_document::{index_name, SearchDocument};
