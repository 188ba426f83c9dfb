// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Search sources and the normalized record they produce

pub mod aggregator;
pub mod sources;

use async_trait::async_trait;
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::Result;

pub use aggregator::{Aggregator, SearchOptions};
pub use sources::{build_sources, ApiSource, JsonFileSource};

/// A search result in the common shape every source maps to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedResult {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub link: String,
    pub source: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl NormalizedResult {
    /// Metadata string field, or "" when absent
    pub fn metadata_str(&self, key: &str) -> &str {
        self.metadata.get(key).and_then(Value::as_str).unwrap_or("")
    }

    /// MD5 of `title|description`, used for content deduplication
    pub fn content_hash(&self) -> String {
        md5_hex(&format!("{}|{}", self.title, self.description))
    }
}

/// Hex-encoded MD5 digest
pub fn md5_hex(input: &str) -> String {
    hex::encode(Md5::digest(input.as_bytes()))
}

/// A source of raw search results
#[async_trait]
pub trait SearchProvider: Send + Sync {
    fn name(&self) -> &str;

    fn is_enabled(&self) -> bool;

    /// Raw items for `query`, at most `count` of them
    async fn search(&self, query: &str, count: usize) -> Result<Vec<Value>>;

    /// Items need a non-empty `id`, `title` and `link`
    fn validate(&self, item: &Value) -> bool {
        ["id", "title", "link"]
            .iter()
            .all(|field| item.get(field).map(is_truthy).unwrap_or(false))
    }

    fn normalize(&self, item: &Value) -> NormalizedResult {
        NormalizedResult {
            id: item.get("id").map(value_to_string).unwrap_or_default(),
            title: item.get("title").map(value_to_string).unwrap_or_default(),
            description: item.get("description").map(value_to_string).unwrap_or_default(),
            link: item.get("link").map(value_to_string).unwrap_or_default(),
            source: self.name().to_string(),
            timestamp: item.get("timestamp").filter(|v| !v.is_null()).map(value_to_string),
            metadata: item
                .get("metadata")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default(),
        }
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Strings pass through unquoted; numbers and the rest use their JSON text
fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Named;

    #[async_trait]
    impl SearchProvider for Named {
        fn name(&self) -> &str {
            "named"
        }
        fn is_enabled(&self) -> bool {
            true
        }
        async fn search(&self, _query: &str, _count: usize) -> Result<Vec<Value>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn validation_requires_id_title_and_link() {
        let p = Named;
        assert!(p.validate(&json!({"id": 1, "title": "t", "link": "l"})));
        assert!(!p.validate(&json!({"id": "", "title": "t", "link": "l"})));
        assert!(!p.validate(&json!({"id": "1", "title": "t"})));
        assert!(!p.validate(&json!({"id": "1", "title": null, "link": "l"})));
    }

    #[test]
    fn numeric_ids_become_strings() {
        let result = Named.normalize(&json!({
            "id": 42,
            "title": "Engineer",
            "link": "https://jobs.example/42",
            "metadata": {"company": "Acme"}
        }));
        assert_eq!(result.id, "42");
        assert_eq!(result.source, "named");
        assert_eq!(result.description, "");
        assert_eq!(result.timestamp, None);
        assert_eq!(result.metadata_str("company"), "Acme");
    }

    #[test]
    fn content_hash_matches_md5_of_title_and_description() {
        let result = Named.normalize(&json!({"id": "1", "title": "a", "description": "b", "link": "x"}));
        assert_eq!(result.content_hash(), md5_hex("a|b"));
        assert_eq!(md5_hex(""), "d41d8cd98f00b204e9800998ecf8427e");
    }
}
