// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Merge results from several sources into one filtered list

use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashSet;
use tracing::{debug, error, info};

use super::{NormalizedResult, SearchProvider};
use crate::config::{BlockKind, BlockRule};

/// Options for one aggregated search
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub count: usize,
    pub deduplicate: bool,
    /// Field to sort by; a leading `-` sorts ascending
    pub sort_by: Option<String>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self { count: 10, deduplicate: true, sort_by: None }
    }
}

pub struct Aggregator {
    providers: Vec<Box<dyn SearchProvider>>,
    blocked: Vec<BlockRule>,
}

impl Aggregator {
    /// Disabled providers are dropped here and never queried
    pub fn new(providers: Vec<Box<dyn SearchProvider>>, blocked: Vec<BlockRule>) -> Self {
        let providers = providers.into_iter().filter(|p| p.is_enabled()).collect();
        Self { providers, blocked }
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Query every provider in turn, then filter, deduplicate, sort and truncate
    pub async fn search(&self, query: &str, options: &SearchOptions) -> Vec<NormalizedResult> {
        let mut all = Vec::new();

        for provider in &self.providers {
            info!("Searching {}...", provider.name());
            match provider.search(query, options.count).await {
                Ok(items) => {
                    for item in &items {
                        if provider.validate(item) {
                            all.push(provider.normalize(item));
                        } else {
                            debug!("Invalid item from {}: {}", provider.name(), item);
                        }
                    }
                }
                Err(e) => {
                    error!("{} search failed: {}", provider.name(), e);
                }
            }
        }

        let mut results = self.filter_blocked(all);
        if options.deduplicate {
            results = deduplicate(results);
        }
        if let Some(field) = &options.sort_by {
            results = sort_results(results, field);
        }
        results.truncate(options.count);
        results
    }

    fn filter_blocked(&self, items: Vec<NormalizedResult>) -> Vec<NormalizedResult> {
        items
            .into_iter()
            .filter(|item| {
                let blocked = self.is_blocked(item);
                if blocked {
                    debug!("Blocked: {}", item.title);
                }
                !blocked
            })
            .collect()
    }

    pub fn is_blocked(&self, item: &NormalizedResult) -> bool {
        self.blocked.iter().any(|rule| {
            let needle = rule.value.to_lowercase();
            match rule.kind {
                BlockKind::Site => item.link.to_lowercase().contains(&needle),
                BlockKind::Employer => item.metadata_str("company").to_lowercase().contains(&needle),
                BlockKind::Keyword => {
                    item.title.to_lowercase().contains(&needle)
                        || item.description.to_lowercase().contains(&needle)
                }
                BlockKind::Unknown => false,
            }
        })
    }
}

/// Drop repeats by link, then by content hash; first occurrence wins
pub fn deduplicate(items: Vec<NormalizedResult>) -> Vec<NormalizedResult> {
    let mut seen_urls = HashSet::new();
    let mut seen_hashes = HashSet::new();
    let mut unique = Vec::with_capacity(items.len());

    for item in items {
        if !item.link.is_empty() && seen_urls.contains(&item.link) {
            debug!("Duplicate URL: {}", item.link);
            continue;
        }
        let hash = item.content_hash();
        if seen_hashes.contains(&hash) {
            debug!("Duplicate content: {}", item.title);
            continue;
        }
        seen_urls.insert(item.link.clone());
        seen_hashes.insert(hash);
        unique.push(item);
    }

    unique
}

/// Stable sort on a top-level field (falling back to `metadata`).
/// Descending unless the field starts with `-`. Keys of mixed kinds leave
/// the input order untouched.
pub fn sort_results(items: Vec<NormalizedResult>, sort_by: &str) -> Vec<NormalizedResult> {
    let (field, descending) = match sort_by.strip_prefix('-') {
        Some(field) => (field, false),
        None => (sort_by, true),
    };

    let keys: Vec<Value> = items.iter().map(|item| sort_key(item, field)).collect();
    let Some(kind) = common_kind(&keys) else {
        error!("Sort failed: field '{}' holds values of different kinds", field);
        return items;
    };

    let mut keyed: Vec<(Value, NormalizedResult)> = keys.into_iter().zip(items).collect();
    keyed.sort_by(|(a, _), (b, _)| {
        let ord = compare(a, b, kind);
        if descending {
            ord.reverse()
        } else {
            ord
        }
    });
    keyed.into_iter().map(|(_, item)| item).collect()
}

fn sort_key(item: &NormalizedResult, field: &str) -> Value {
    let top = match field {
        "id" => Some(Value::String(item.id.clone())),
        "title" => Some(Value::String(item.title.clone())),
        "description" => Some(Value::String(item.description.clone())),
        "link" => Some(Value::String(item.link.clone())),
        "source" => Some(Value::String(item.source.clone())),
        "timestamp" => item.timestamp.clone().map(Value::String),
        _ => None,
    };
    top.or_else(|| item.metadata.get(field).cloned())
        .unwrap_or_else(|| Value::String(String::new()))
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum KeyKind {
    Number,
    Text,
    Bool,
}

fn kind_of(value: &Value) -> Option<KeyKind> {
    match value {
        Value::Number(_) => Some(KeyKind::Number),
        Value::String(_) => Some(KeyKind::Text),
        Value::Bool(_) => Some(KeyKind::Bool),
        _ => None,
    }
}

fn common_kind(keys: &[Value]) -> Option<KeyKind> {
    let mut kinds = keys.iter().map(kind_of);
    let first = match kinds.next() {
        Some(kind) => kind?,
        None => return Some(KeyKind::Text),
    };
    kinds.all(|k| k == Some(first)).then_some(first)
}

fn compare(a: &Value, b: &Value, kind: KeyKind) -> Ordering {
    match kind {
        KeyKind::Number => {
            let (x, y) = (a.as_f64().unwrap_or(0.0), b.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        KeyKind::Text => a.as_str().unwrap_or("").cmp(b.as_str().unwrap_or("")),
        KeyKind::Bool => a.as_bool().unwrap_or(false).cmp(&b.as_bool().unwrap_or(false)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AsmfError, Result};
    use async_trait::async_trait;
    use serde_json::json;

    struct Canned {
        name: &'static str,
        enabled: bool,
        items: Vec<Value>,
    }

    #[async_trait]
    impl SearchProvider for Canned {
        fn name(&self) -> &str {
            self.name
        }
        fn is_enabled(&self) -> bool {
            self.enabled
        }
        async fn search(&self, _query: &str, _count: usize) -> Result<Vec<Value>> {
            Ok(self.items.clone())
        }
    }

    struct Failing;

    #[async_trait]
    impl SearchProvider for Failing {
        fn name(&self) -> &str {
            "failing"
        }
        fn is_enabled(&self) -> bool {
            true
        }
        async fn search(&self, _query: &str, _count: usize) -> Result<Vec<Value>> {
            Err(AsmfError::ProviderUnavailable("rate limited".to_string()))
        }
    }

    fn item(id: &str, title: &str, link: &str) -> Value {
        json!({"id": id, "title": title, "description": "", "link": link})
    }

    fn result(title: &str, link: &str, metadata: Value) -> NormalizedResult {
        NormalizedResult {
            id: title.to_string(),
            title: title.to_string(),
            description: String::new(),
            link: link.to_string(),
            source: "test".to_string(),
            timestamp: None,
            metadata: metadata.as_object().cloned().unwrap_or_default(),
        }
    }

    fn rule(kind: BlockKind, value: &str) -> BlockRule {
        BlockRule { kind, value: value.to_string(), reason: String::new() }
    }

    #[tokio::test]
    async fn failing_provider_is_skipped() {
        let agg = Aggregator::new(
            vec![
                Box::new(Failing),
                Box::new(Canned { name: "ok", enabled: true, items: vec![item("1", "A", "https://a")] }),
            ],
            Vec::new(),
        );
        let results = agg.search("q", &SearchOptions::default()).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].source, "ok");
    }

    #[tokio::test]
    async fn disabled_providers_are_not_queried() {
        let agg = Aggregator::new(
            vec![Box::new(Canned { name: "off", enabled: false, items: vec![item("1", "A", "https://a")] })],
            Vec::new(),
        );
        assert!(agg.provider_names().is_empty());
        assert!(agg.search("q", &SearchOptions::default()).await.is_empty());
    }

    #[tokio::test]
    async fn invalid_items_are_dropped_and_count_truncates() {
        let items = vec![
            item("1", "A", "https://a"),
            json!({"id": "2", "title": "no link"}),
            item("3", "C", "https://c"),
            item("4", "D", "https://d"),
        ];
        let agg = Aggregator::new(vec![Box::new(Canned { name: "src", enabled: true, items })], Vec::new());
        let options = SearchOptions { count: 2, ..SearchOptions::default() };
        let titles: Vec<String> = agg.search("q", &options).await.into_iter().map(|r| r.title).collect();
        assert_eq!(titles, vec!["A", "C"]);
    }

    #[test]
    fn duplicate_link_and_duplicate_content_are_removed() {
        let items = vec![
            result("A", "https://same", json!({})),
            result("B", "https://same", json!({})),
            result("A", "https://other", json!({})),
            result("C", "", json!({})),
            result("D", "", json!({})),
        ];
        let titles: Vec<String> = deduplicate(items).into_iter().map(|r| r.title).collect();
        assert_eq!(titles, vec!["A", "C", "D"]);
    }

    #[test]
    fn block_rules_are_case_insensitive() {
        let agg = Aggregator::new(
            Vec::new(),
            vec![
                rule(BlockKind::Site, "SPAM.example"),
                rule(BlockKind::Employer, "acme"),
                rule(BlockKind::Keyword, "unpaid"),
            ],
        );
        assert!(agg.is_blocked(&result("Job", "https://spam.example/1", json!({}))));
        assert!(agg.is_blocked(&result("Job", "https://ok", json!({"company": "ACME Corp"}))));
        assert!(agg.is_blocked(&result("Unpaid internship", "https://ok", json!({}))));
        assert!(!agg.is_blocked(&result("Job", "https://ok", json!({"company": "Globex"}))));
    }

    #[test]
    fn sort_descending_by_default_and_ascending_with_dash() {
        let items = vec![
            result("b", "1", json!({"salary": 50})),
            result("a", "2", json!({"salary": 90})),
            result("c", "3", json!({"salary": 70})),
        ];
        let desc: Vec<String> = sort_results(items.clone(), "salary").into_iter().map(|r| r.title).collect();
        assert_eq!(desc, vec!["a", "c", "b"]);
        let asc: Vec<String> = sort_results(items, "-title").into_iter().map(|r| r.title).collect();
        assert_eq!(asc, vec!["a", "b", "c"]);
    }

    #[test]
    fn mixed_key_kinds_leave_order_unchanged() {
        let items = vec![
            result("x", "1", json!({"score": 3})),
            result("y", "2", json!({})),
            result("z", "3", json!({"score": 1})),
        ];
        let titles: Vec<String> = sort_results(items, "score").into_iter().map(|r| r.title).collect();
        assert_eq!(titles, vec!["x", "y", "z"]);
    }

    #[test]
    fn equal_keys_keep_input_order() {
        let items = vec![
            result("first", "1", json!({"rank": 1})),
            result("second", "2", json!({"rank": 1})),
        ];
        let titles: Vec<String> = sort_results(items, "rank").into_iter().map(|r| r.title).collect();
        assert_eq!(titles, vec!["first", "second"]);
    }
}
