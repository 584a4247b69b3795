//! Interface definitions for the search index provider.
//!
//! The `SearchIndexProvider` trait allows the OpenSearch backend to be swapped
//! for a mock in tests.

mod search_index_provider;

pub use search_index_provider::SearchIndexProvider;
