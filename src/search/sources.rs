// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Concrete search sources: a JSON HTTP API and a local JSON file

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};

use super::SearchProvider;
use crate::config::{AppConfig, SourceKind};
use crate::{AsmfError, Result};

/// REST endpoint answering `GET base_url?q=..&count=..` with JSON
pub struct ApiSource {
    name: String,
    enabled: bool,
    base_url: String,
    api_key: Option<String>,
    client: Client,
}

impl ApiSource {
    pub fn new(name: &str, base_url: &str, api_key: Option<String>, enabled: bool) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AsmfError::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            name: name.to_string(),
            enabled,
            base_url: base_url.to_string(),
            api_key,
            client,
        })
    }
}

#[async_trait]
impl SearchProvider for ApiSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    async fn search(&self, query: &str, count: usize) -> Result<Vec<Value>> {
        let mut request = self
            .client
            .get(&self.base_url)
            .query(&[("q", query.to_string()), ("count", count.to_string())]);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            warn!("{} rate limited", self.name);
            return Err(AsmfError::ProviderUnavailable(format!("{} rate limited (HTTP 429)", self.name)));
        }
        let body: Value = response.error_for_status()?.json().await?;
        let mut items = extract_items(body)?;
        items.truncate(count);
        Ok(items)
    }
}

/// Items stored as a JSON array (or `{"results": [...]}`) on disk
pub struct JsonFileSource {
    name: String,
    enabled: bool,
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(name: &str, path: impl Into<PathBuf>, enabled: bool) -> Self {
        Self { name: name.to_string(), enabled, path: path.into() }
    }
}

#[async_trait]
impl SearchProvider for JsonFileSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Case-insensitive match on title or description; an empty query matches all
    async fn search(&self, query: &str, count: usize) -> Result<Vec<Value>> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        let items = extract_items(serde_json::from_str(&content)?)?;
        let needle = query.trim().to_lowercase();

        Ok(items
            .into_iter()
            .filter(|item| {
                needle.is_empty()
                    || ["title", "description"].iter().any(|field| {
                        item.get(field)
                            .and_then(Value::as_str)
                            .map(|s| s.to_lowercase().contains(&needle))
                            .unwrap_or(false)
                    })
            })
            .take(count)
            .collect())
    }
}

fn extract_items(body: Value) -> Result<Vec<Value>> {
    match body {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => match map.remove("results") {
            Some(Value::Array(items)) => Ok(items),
            _ => Err(AsmfError::Parse("expected a JSON array or an object with a 'results' array".to_string())),
        },
        _ => Err(AsmfError::Parse("expected a JSON array of results".to_string())),
    }
}

/// Instantiate every configured source, enabled or not
pub fn build_sources(config: &AppConfig) -> Result<Vec<Box<dyn SearchProvider>>> {
    let mut sources: Vec<Box<dyn SearchProvider>> = Vec::new();
    for (name, source) in &config.providers {
        debug!("Configuring source {} (enabled: {})", name, source.enabled);
        match &source.kind {
            SourceKind::Api { base_url, api_key } => {
                sources.push(Box::new(ApiSource::new(name, base_url, api_key.clone(), source.enabled)?));
            }
            SourceKind::File { path } => {
                sources.push(Box::new(JsonFileSource::new(name, path, source.enabled)));
            }
        }
    }
    Ok(sources)
}
