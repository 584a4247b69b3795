//! OpenSearch index settings and mappings.
//!
//! Every dimension index is created with the same settings; the mapping
//! version is stored in the index `_meta` so older indexes can be recognised.

use serde_json::{json, Value};

/// Version of the dimension option mapping.
pub const MAPPING_VERSION: u32 = 1;

/// Get the index settings and mappings for a dimension search index.
///
/// The configuration includes:
/// - **autocomplete analyzer**: edge n-grams over the label for search-as-you-type
/// - **Keyword fields**: the option code for exact lookups
/// - **Non-indexed url**: stored for display only
pub fn get_index_settings() -> Value {
    json!({
        "settings": {
            "number_of_shards": 1,
            "number_of_replicas": 1,
            "analysis": {
                "filter": {
                    "autocomplete_filter": {
                        "type": "edge_ngram",
                        "min_gram": 1,
                        "max_gram": 20
                    }
                },
                "analyzer": {
                    "autocomplete": {
                        "type": "custom",
                        "tokenizer": "standard",
                        "filter": ["lowercase", "autocomplete_filter"]
                    }
                }
            }
        },
        "mappings": {
            "_meta": {
                "mapping_version": MAPPING_VERSION
            },
            "properties": {
                "code": {
                    "type": "keyword"
                },
                "has_data": {
                    "type": "boolean"
                },
                "label": {
                    "type": "text",
                    "analyzer": "autocomplete",
                    "search_analyzer": "standard",
                    "fields": {
                        "raw": {
                            "type": "keyword"
                        }
                    }
                },
                "number_of_children": {
                    "type": "long"
                },
                "url": {
                    "type": "keyword",
                    "index": false
                }
            }
        }
    })
}
