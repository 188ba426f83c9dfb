// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Configuration management for asmf
//!
//! Settings live in a JSON file that is merged key-by-key over the built-in
//! defaults, so a config file only needs to name the values it changes.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

use crate::{AsmfError, Result};

/// Main application configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    /// Instructions prepended to evaluation prompts
    #[serde(default = "default_system_instructions")]
    pub system_instructions: String,

    /// Sites, employers and keywords removed from aggregated results
    #[serde(default)]
    pub blocked_entities: Vec<BlockRule>,

    /// Search sources keyed by name
    #[serde(default)]
    pub providers: BTreeMap<String, SourceConfig>,

    #[serde(default)]
    pub evaluation: EvaluationConfig,

    #[serde(default)]
    pub deduplication: DeduplicationConfig,

    #[serde(default)]
    pub tracking: TrackingConfig,

    /// AI backend settings
    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub domain: DomainFileConfig,

    /// Pull request review settings
    #[serde(default)]
    pub review: ReviewConfig,

    /// Webhook server settings
    #[serde(default)]
    pub webhook: WebhookConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// A single blocklist rule
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct BlockRule {
    #[serde(rename = "type")]
    pub kind: BlockKind,
    pub value: String,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    /// Substring of the result link
    Site,
    /// Substring of `metadata.company`
    Employer,
    /// Substring of the title or description
    Keyword,
    #[serde(other)]
    Unknown,
}

impl std::str::FromStr for BlockKind {
    type Err = AsmfError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "site" => Ok(Self::Site),
            "employer" => Ok(Self::Employer),
            "keyword" => Ok(Self::Keyword),
            other => Err(AsmfError::InvalidInput(format!(
                "unknown block type '{}' (expected site, employer or keyword)",
                other
            ))),
        }
    }
}

/// A configured search source
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SourceConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(flatten)]
    pub kind: SourceKind,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceKind {
    /// REST API returning a JSON array (or `{"results": [...]}`)
    Api {
        base_url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        api_key: Option<String>,
    },
    /// Local JSON file holding an array of raw results
    File { path: String },
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EvaluationConfig {
    #[serde(default = "default_score_threshold")]
    pub score_threshold: f64,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_criteria")]
    pub criteria: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DeduplicationConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_dedup_method")]
    pub method: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TrackingConfig {
    #[serde(default = "default_storage_path")]
    pub storage_path: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LlmConfig {
    /// Try local backends before cloud ones
    #[serde(default)]
    pub prefer_local: bool,
    /// Provider names in priority order (cloud first)
    #[serde(default = "default_fallback_chain")]
    pub fallback_chain: Vec<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub ollama: OllamaConfig,
    #[serde(default = "default_gemini")]
    pub gemini: CloudProviderConfig,
    #[serde(default = "default_openai")]
    pub openai: CloudProviderConfig,
    #[serde(default = "default_anthropic")]
    pub anthropic: CloudProviderConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct OllamaConfig {
    #[serde(default = "default_ollama_url")]
    pub url: String,
    #[serde(default = "default_ollama_model")]
    pub model: String,
    /// Timeout for the availability probe
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,
    #[serde(default = "default_generate_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CloudProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DomainFileConfig {
    #[serde(default = "default_domain_path")]
    pub config_path: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ReviewConfig {
    #[serde(default = "default_review_model")]
    pub model: String,
    #[serde(default = "default_patterns_path")]
    pub patterns_path: String,
    #[serde(default = "default_max_diff_size")]
    pub max_diff_size: usize,
    #[serde(default = "default_review_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_github_api")]
    pub github_api_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WebhookConfig {
    #[serde(default = "default_web_host")]
    pub host: String,
    #[serde(default = "default_web_port")]
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_secret: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default value functions
fn default_system_instructions() -> String { "Evaluate items for relevance and quality.".to_string() }
fn default_score_threshold() -> f64 { 0.7 }
fn default_batch_size() -> usize { 10 }
fn default_criteria() -> String { "Evaluate items for quality and relevance".to_string() }
fn default_true() -> bool { true }
fn default_dedup_method() -> String { "url".to_string() }
fn default_storage_path() -> String { "data/tracked_items.json".to_string() }
fn default_fallback_chain() -> Vec<String> { vec!["gemini".to_string(), "ollama".to_string()] }
fn default_max_tokens() -> u32 { 2000 }
fn default_temperature() -> f32 { 0.7 }
fn default_ollama_url() -> String { "http://localhost:11434".to_string() }
fn default_ollama_model() -> String { "qwen2.5-coder:32b".to_string() }
fn default_probe_timeout() -> u64 { 5 }
fn default_generate_timeout() -> u64 { 120 }
fn default_domain_path() -> String { "config/domain.yaml".to_string() }
fn default_review_model() -> String { "qwen2.5:14b-q4".to_string() }
fn default_patterns_path() -> String { ".github/CODE_REVIEW_PATTERNS.md".to_string() }
fn default_max_diff_size() -> usize { 50_000 }
fn default_review_timeout() -> u64 { 300 }
fn default_github_api() -> String { "https://api.github.com".to_string() }
fn default_web_host() -> String { "0.0.0.0".to_string() }
fn default_web_port() -> u16 { 5000 }
fn default_log_level() -> String { "info".to_string() }

fn default_gemini() -> CloudProviderConfig {
    CloudProviderConfig { api_key: None, model: "gemini-1.5-pro".to_string(), base_url: None }
}

fn default_openai() -> CloudProviderConfig {
    CloudProviderConfig { api_key: None, model: "gpt-4o".to_string(), base_url: None }
}

fn default_anthropic() -> CloudProviderConfig {
    CloudProviderConfig {
        api_key: None,
        model: "claude-3-sonnet-20240229".to_string(),
        base_url: None,
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            system_instructions: default_system_instructions(),
            blocked_entities: Vec::new(),
            providers: BTreeMap::new(),
            evaluation: EvaluationConfig::default(),
            deduplication: DeduplicationConfig::default(),
            tracking: TrackingConfig::default(),
            llm: LlmConfig::default(),
            domain: DomainFileConfig::default(),
            review: ReviewConfig::default(),
            webhook: WebhookConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            score_threshold: default_score_threshold(),
            batch_size: default_batch_size(),
            criteria: default_criteria(),
        }
    }
}

impl Default for DeduplicationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            method: default_dedup_method(),
        }
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self { storage_path: default_storage_path() }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            prefer_local: false,
            fallback_chain: default_fallback_chain(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            ollama: OllamaConfig::default(),
            gemini: default_gemini(),
            openai: default_openai(),
            anthropic: default_anthropic(),
        }
    }
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            url: default_ollama_url(),
            model: default_ollama_model(),
            probe_timeout_secs: default_probe_timeout(),
            timeout_secs: default_generate_timeout(),
        }
    }
}

impl Default for DomainFileConfig {
    fn default() -> Self {
        Self { config_path: default_domain_path() }
    }
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            model: default_review_model(),
            patterns_path: default_patterns_path(),
            max_diff_size: default_max_diff_size(),
            timeout_secs: default_review_timeout(),
            github_api_url: default_github_api(),
        }
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            host: default_web_host(),
            port: default_web_port(),
            github_token: None,
            webhook_secret: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level() }
    }
}

impl AppConfig {
    /// Load configuration from a JSON file, then apply environment overrides
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config = Self::from_json_str(&content)?;
            info!("Loaded config from {:?}", path);
            config
        } else {
            info!("Config file not found at {:?}, using defaults", path);
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse a JSON document and merge it over the defaults
    pub fn from_json_str(content: &str) -> Result<Self> {
        let user: Value = serde_json::from_str(content)
            .map_err(|e| AsmfError::Config(format!("Failed to parse config: {}", e)))?;
        let mut merged = serde_json::to_value(Self::default())?;
        deep_merge(&mut merged, user);
        serde_json::from_value(merged)
            .map_err(|e| AsmfError::Config(format!("Invalid config: {}", e)))
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Saved config to {:?}", path);
        Ok(())
    }

    /// Credentials and endpoints from the environment win over the file
    pub fn apply_env_overrides(&mut self) {
        let env = |key: &str| std::env::var(key).ok().filter(|v| !v.is_empty());

        if let Some(url) = env("OLLAMA_BASE_URL") {
            self.llm.ollama.url = url;
        }
        if let Some(model) = env("OLLAMA_MODEL") {
            self.llm.ollama.model = model.clone();
            self.review.model = model;
        }
        if let Some(timeout) = env("OLLAMA_TIMEOUT").and_then(|t| t.parse::<f64>().ok()) {
            self.llm.ollama.probe_timeout_secs = timeout.ceil().max(1.0) as u64;
        }
        if let Some(key) = env("GEMINI_API_KEY") {
            self.llm.gemini.api_key = Some(key);
        }
        if let Some(key) = env("OPENAI_API_KEY") {
            self.llm.openai.api_key = Some(key);
        }
        if let Some(key) = env("ANTHROPIC_API_KEY") {
            self.llm.anthropic.api_key = Some(key);
        }
        if let Some(token) = env("GITHUB_TOKEN") {
            self.webhook.github_token = Some(token);
        }
        if let Some(secret) = env("GITHUB_WEBHOOK_SECRET") {
            self.webhook.webhook_secret = Some(secret);
        }
        if let Some(prefer) = env("PREFER_LOCAL") {
            self.llm.prefer_local = matches!(prefer.to_lowercase().as_str(), "1" | "true" | "yes");
        }
    }

    /// Get a value by dot-notation key, e.g. `evaluation.score_threshold`
    pub fn get(&self, key: &str) -> Option<Value> {
        let root = serde_json::to_value(self).ok()?;
        key.split('.')
            .try_fold(&root, |value, part| value.get(part))
            .cloned()
    }

    /// Set a value by dot-notation key; the result must still be a valid config
    pub fn set(&mut self, key: &str, value: Value) -> Result<()> {
        let mut root = serde_json::to_value(&*self)?;
        let parts: Vec<&str> = key.split('.').collect();
        let (last, parents) = parts
            .split_last()
            .ok_or_else(|| AsmfError::Config("empty config key".to_string()))?;

        let mut node = &mut root;
        for part in parents {
            let obj = node
                .as_object_mut()
                .ok_or_else(|| AsmfError::Config(format!("'{}' is not an object", part)))?;
            node = obj
                .entry(part.to_string())
                .or_insert_with(|| Value::Object(Default::default()));
        }
        node.as_object_mut()
            .ok_or_else(|| AsmfError::Config(format!("cannot set '{}'", key)))?
            .insert(last.to_string(), value);

        *self = serde_json::from_value(root)
            .map_err(|e| AsmfError::Config(format!("Invalid value for '{}': {}", key, e)))?;
        Ok(())
    }

    /// Add a blocklist rule; returns false if an identical rule exists
    pub fn add_blocked_entity(&mut self, kind: BlockKind, value: &str, reason: &str) -> bool {
        if self.blocked_entities.iter().any(|r| r.kind == kind && r.value == value) {
            debug!("Entity already blocked: {:?}={}", kind, value);
            return false;
        }
        self.blocked_entities.push(BlockRule {
            kind,
            value: value.to_string(),
            reason: reason.to_string(),
        });
        info!("Added blocked entity: {:?}={}", kind, value);
        true
    }

    /// Remove a blocklist rule; returns false if nothing matched
    pub fn remove_blocked_entity(&mut self, kind: BlockKind, value: &str) -> bool {
        let before = self.blocked_entities.len();
        self.blocked_entities.retain(|r| !(r.kind == kind && r.value == value));
        let removed = self.blocked_entities.len() < before;
        if removed {
            info!("Removed blocked entity: {:?}={}", kind, value);
        } else {
            debug!("Entity not found: {:?}={}", kind, value);
        }
        removed
    }

    pub fn source_config(&self, name: &str) -> Option<&SourceConfig> {
        self.providers.get(name)
    }

    /// A source counts as enabled only if it is configured and switched on
    pub fn is_source_enabled(&self, name: &str) -> bool {
        self.source_config(name).map(|c| c.enabled).unwrap_or(false)
    }

    /// Copy of the config with every credential masked, for display
    pub fn redacted(&self) -> Self {
        let mask = |v: &Option<String>| v.as_ref().map(|_| "***".to_string());
        let mut copy = self.clone();
        copy.llm.gemini.api_key = mask(&self.llm.gemini.api_key);
        copy.llm.openai.api_key = mask(&self.llm.openai.api_key);
        copy.llm.anthropic.api_key = mask(&self.llm.anthropic.api_key);
        copy.webhook.github_token = mask(&self.webhook.github_token);
        copy.webhook.webhook_secret = mask(&self.webhook.webhook_secret);
        for source in copy.providers.values_mut() {
            if let SourceKind::Api { api_key, .. } = &mut source.kind {
                *api_key = mask(api_key);
            }
        }
        copy
    }
}

/// Recursively merge `update` into `base`; objects merge, everything else replaces
pub fn deep_merge(base: &mut Value, update: Value) {
    match (base, update) {
        (Value::Object(base_map), Value::Object(update_map)) => {
            for (key, value) in update_map {
                let both_objects = value.is_object()
                    && base_map.get(&key).map(Value::is_object).unwrap_or(false);
                match base_map.get_mut(&key) {
                    Some(existing) if both_objects => deep_merge(existing, value),
                    _ => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (base, update) => *base = update,
    }
}
