//! Core data structures used across the search builder.

pub mod hierarchy_node;
pub mod notification;
pub mod search_document;
