// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! AI backends and the fallback chain that picks one of them
//!
//! Every backend implements [`AiProvider`]. [`ProviderSelector`] walks an
//! ordered list of candidates once, building each and asking whether it is
//! available, and hands back the first that is. There is no retry: a backend
//! that fails to build or reports itself unavailable is simply skipped and
//! recorded in the error returned when nothing is left.

pub mod anthropic;
pub mod gemini;
pub mod ollama;
pub mod openai;

use async_trait::async_trait;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::config::LlmConfig;
use crate::{AsmfError, Result};

/// Extra key/value context rendered in front of a prompt
pub type PromptContext = BTreeMap<String, String>;

/// Trait for AI backends
#[async_trait]
pub trait AiProvider: Send + Sync {
    /// Name of this provider
    fn name(&self) -> &str;

    /// Model identifier requests are sent to
    fn model(&self) -> &str;

    /// Whether inference happens on this machine
    fn is_local(&self) -> bool {
        false
    }

    /// Send a prompt (with optional context) and return the model's text
    async fn analyze(&self, prompt: &str, context: Option<&PromptContext>) -> Result<String>;

    /// Check if the provider is configured and reachable
    async fn is_available(&self) -> bool;

    /// Human-readable reason used when `is_available` is false
    fn unavailable_reason(&self) -> String {
        "reported unavailable".to_string()
    }
}

/// Render context as `key: value` blocks followed by the prompt
pub fn format_prompt_with_context(prompt: &str, context: Option<&PromptContext>) -> String {
    match context {
        Some(ctx) if !ctx.is_empty() => {
            let context_str = ctx
                .iter()
                .map(|(k, v)| format!("{}: {}", k, v))
                .collect::<Vec<_>>()
                .join("\n\n");
            format!("{}\n\n{}", context_str, prompt)
        }
        _ => prompt.to_string(),
    }
}

type BuildFn = Box<dyn Fn() -> Result<Box<dyn AiProvider>> + Send + Sync>;

/// A backend that can be built on demand
pub struct ProviderCandidate {
    name: String,
    build: BuildFn,
}

impl ProviderCandidate {
    pub fn new<F>(name: &str, build: F) -> Self
    where
        F: Fn() -> Result<Box<dyn AiProvider>> + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            build: Box::new(build),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Candidate for a provider name from `llm.fallback_chain`
    pub fn from_name(name: &str, config: &LlmConfig) -> Self {
        match name.to_lowercase().as_str() {
            "ollama" => {
                let cfg = config.ollama.clone();
                let settings = GenerationSettings::from(config);
                Self::new("ollama", move || {
                    Ok(Box::new(ollama::OllamaProvider::new(&cfg, settings)?) as Box<dyn AiProvider>)
                })
            }
            "gemini" => {
                let cfg = config.gemini.clone();
                let settings = GenerationSettings::from(config);
                Self::new("gemini", move || {
                    Ok(Box::new(gemini::GeminiProvider::new(&cfg, settings)?) as Box<dyn AiProvider>)
                })
            }
            "openai" => {
                let cfg = config.openai.clone();
                let settings = GenerationSettings::from(config);
                Self::new("openai", move || {
                    Ok(Box::new(openai::OpenAiProvider::new(&cfg, settings)?) as Box<dyn AiProvider>)
                })
            }
            "anthropic" => {
                let cfg = config.anthropic.clone();
                let settings = GenerationSettings::from(config);
                Self::new("anthropic", move || {
                    Ok(Box::new(anthropic::AnthropicProvider::new(&cfg, settings)?) as Box<dyn AiProvider>)
                })
            }
            other => {
                let other = other.to_string();
                Self::new(&other.clone(), move || {
                    Err(AsmfError::Config(format!("Unknown provider: {}", other)))
                })
            }
        }
    }
}

/// Token and temperature limits shared by all backends
#[derive(Debug, Clone, Copy)]
pub struct GenerationSettings {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl From<&LlmConfig> for GenerationSettings {
    fn from(config: &LlmConfig) -> Self {
        Self {
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }
}

/// Availability report for one candidate
#[derive(Debug, Clone)]
pub struct ProviderStatus {
    pub name: String,
    pub available: bool,
    pub detail: String,
}

/// Ordered fallback chain over provider candidates
pub struct ProviderSelector {
    candidates: Vec<ProviderCandidate>,
}

impl ProviderSelector {
    /// Candidates in priority order, most preferred first
    pub fn new(candidates: Vec<ProviderCandidate>) -> Self {
        Self { candidates }
    }

    /// Build the chain named by `llm.fallback_chain`
    pub fn from_config(config: &LlmConfig) -> Self {
        Self::new(
            config
                .fallback_chain
                .iter()
                .map(|name| ProviderCandidate::from_name(name, config))
                .collect(),
        )
    }

    /// Candidate names in the order they would be tried
    pub fn order(&self, prefer_local: bool) -> Vec<&str> {
        self.ordered(prefer_local).map(|c| c.name()).collect()
    }

    fn ordered(&self, prefer_local: bool) -> Box<dyn Iterator<Item = &ProviderCandidate> + '_> {
        if prefer_local {
            Box::new(self.candidates.iter().rev())
        } else {
            Box::new(self.candidates.iter())
        }
    }

    /// Return the first candidate that builds and reports itself available
    pub async fn select(&self, prefer_local: bool) -> Result<Box<dyn AiProvider>> {
        let mut attempts = Vec::new();

        for candidate in self.ordered(prefer_local) {
            debug!("Trying AI provider: {}", candidate.name());
            match (candidate.build)() {
                Ok(provider) => {
                    if provider.is_available().await {
                        info!("Using AI provider: {} ({})", provider.name(), provider.model());
                        return Ok(provider);
                    }
                    let reason = provider.unavailable_reason();
                    warn!("Provider {} unavailable: {}", candidate.name(), reason);
                    attempts.push((candidate.name().to_string(), reason));
                }
                Err(e) => {
                    warn!("Failed to instantiate provider {}: {}", candidate.name(), e);
                    attempts.push((candidate.name().to_string(), e.to_string()));
                }
            }
        }

        Err(AsmfError::NoProviderAvailable(attempts))
    }

    /// Probe every candidate without stopping at the first success
    pub async fn status(&self, prefer_local: bool) -> Vec<ProviderStatus> {
        let mut report = Vec::new();
        for candidate in self.ordered(prefer_local) {
            let status = match (candidate.build)() {
                Ok(provider) => {
                    let available = provider.is_available().await;
                    let detail = if available {
                        format!("model {}", provider.model())
                    } else {
                        provider.unavailable_reason()
                    };
                    ProviderStatus { name: candidate.name().to_string(), available, detail }
                }
                Err(e) => ProviderStatus {
                    name: candidate.name().to_string(),
                    available: false,
                    detail: e.to_string(),
                },
            };
            report.push(status);
        }
        report
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Scripted provider for tests
    pub struct FakeProvider {
        pub name: String,
        pub available: bool,
        pub replies: std::sync::Mutex<Vec<Result<String>>>,
        pub calls: Arc<AtomicUsize>,
    }

    impl FakeProvider {
        pub fn new(name: &str, available: bool) -> Self {
            Self {
                name: name.to_string(),
                available,
                replies: std::sync::Mutex::new(Vec::new()),
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        /// Replies are handed out in order; once exhausted, prompts are echoed
        pub fn with_replies(self, replies: Vec<Result<String>>) -> Self {
            *self.replies.lock().unwrap() = replies.into_iter().rev().collect();
            self
        }
    }

    #[async_trait]
    impl AiProvider for FakeProvider {
        fn name(&self) -> &str {
            &self.name
        }

        fn model(&self) -> &str {
            "fake-model"
        }

        async fn analyze(&self, prompt: &str, context: Option<&PromptContext>) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.replies.lock().unwrap().pop() {
                Some(reply) => reply,
                None => Ok(format_prompt_with_context(prompt, context)),
            }
        }

        async fn is_available(&self) -> bool {
            self.available
        }

        fn unavailable_reason(&self) -> String {
            format!("{} is switched off", self.name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::FakeProvider;
    use super::*;

    fn candidate(name: &'static str, available: bool) -> ProviderCandidate {
        ProviderCandidate::new(name, move || {
            Ok(Box::new(FakeProvider::new(name, available)) as Box<dyn AiProvider>)
        })
    }

    fn broken(name: &'static str) -> ProviderCandidate {
        ProviderCandidate::new(name, move || Err(AsmfError::Config(format!("{} misconfigured", name))))
    }

    #[tokio::test]
    async fn first_available_candidate_wins() {
        let selector = ProviderSelector::new(vec![
            candidate("cloud", false),
            candidate("local", true),
            candidate("spare", true),
        ]);
        let provider = selector.select(false).await.unwrap();
        assert_eq!(provider.name(), "local");
    }

    #[tokio::test]
    async fn prefer_local_reverses_order() {
        let selector = ProviderSelector::new(vec![candidate("cloud", true), candidate("local", true)]);
        assert_eq!(selector.select(false).await.unwrap().name(), "cloud");
        assert_eq!(selector.select(true).await.unwrap().name(), "local");
        assert_eq!(selector.order(true), vec!["local", "cloud"]);
    }

    #[tokio::test]
    async fn constructor_failure_moves_to_next() {
        let selector = ProviderSelector::new(vec![broken("cloud"), candidate("local", true)]);
        assert_eq!(selector.select(false).await.unwrap().name(), "local");
    }

    #[tokio::test]
    async fn exhausted_chain_lists_every_attempt() {
        let selector = ProviderSelector::new(vec![broken("cloud"), candidate("local", false)]);
        let err = selector.select(false).await.err().unwrap();
        match &err {
            AsmfError::NoProviderAvailable(attempts) => {
                assert_eq!(attempts.len(), 2);
                assert_eq!(attempts[0].0, "cloud");
                assert!(attempts[0].1.contains("misconfigured"));
                assert_eq!(attempts[1], ("local".to_string(), "local is switched off".to_string()));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn unknown_names_are_recorded_as_attempts() {
        let config = LlmConfig {
            fallback_chain: vec!["mystery".to_string()],
            ..LlmConfig::default()
        };
        let err = ProviderSelector::from_config(&config).select(false).await.err().unwrap();
        assert!(err.to_string().contains("Unknown provider: mystery"));
    }

    #[test]
    fn context_is_prepended() {
        let mut ctx = PromptContext::new();
        ctx.insert("file".to_string(), "main.rs".to_string());
        ctx.insert("lang".to_string(), "rust".to_string());
        assert_eq!(
            format_prompt_with_context("Review it", Some(&ctx)),
            "file: main.rs\n\nlang: rust\n\nReview it"
        );
        assert_eq!(format_prompt_with_context("Review it", None), "Review it");
    }
}
