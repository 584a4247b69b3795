//! # Search Builder Repository
//!
//! This crate provides the trait and the OpenSearch implementation used to
//! rebuild a dimension search index: deleting and recreating the index and
//! writing one document per dimension option.

pub mod errors;
pub mod interfaces;
pub mod opensearch;

pub use errors::SearchIndexError;
pub use interfaces::SearchIndexProvider;
pub use opensearch::OpenSearchProvider;
