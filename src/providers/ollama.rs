// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Local inference through an Ollama daemon

use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use super::{format_prompt_with_context, AiProvider, GenerationSettings, PromptContext};
use crate::config::OllamaConfig;
use crate::ollama::{GenerateOptions, OllamaClient};
use crate::{AsmfError, Result};

pub struct OllamaProvider {
    client: OllamaClient,
    model: String,
    options: GenerateOptions,
    /// Result of the `/api/tags` probe, taken once
    available: OnceCell<bool>,
}

impl OllamaProvider {
    pub fn new(config: &OllamaConfig, settings: GenerationSettings) -> Result<Self> {
        let client = OllamaClient::with_timeout(&config.url, Duration::from_secs(config.timeout_secs))?
            .probe_timeout(Duration::from_secs(config.probe_timeout_secs));

        Ok(Self {
            client,
            model: config.model.clone(),
            options: GenerateOptions {
                temperature: Some(settings.temperature),
                top_p: None,
                num_predict: Some(settings.max_tokens),
            },
            available: OnceCell::new(),
        })
    }

    async fn probe(&self) -> bool {
        *self
            .available
            .get_or_init(|| async {
                match self.client.health_check().await {
                    Ok(()) => {
                        debug!("Ollama reachable at {}", self.client.base_url());
                        true
                    }
                    Err(e) => {
                        warn!("{}", e);
                        false
                    }
                }
            })
            .await
    }
}

#[async_trait]
impl AiProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn is_local(&self) -> bool {
        true
    }

    async fn analyze(&self, prompt: &str, context: Option<&PromptContext>) -> Result<String> {
        if prompt.trim().is_empty() {
            return Err(AsmfError::InvalidInput("prompt must not be empty".to_string()));
        }
        if !self.probe().await {
            return Err(AsmfError::ProviderUnavailable(format!(
                "Ollama is not available at {}",
                self.client.base_url()
            )));
        }

        let full_prompt = format_prompt_with_context(prompt, context);
        self.client
            .generate_with_options(&self.model, &full_prompt, Some(&self.options))
            .await
    }

    async fn is_available(&self) -> bool {
        self.probe().await
    }

    fn unavailable_reason(&self) -> String {
        format!(
            "Ollama not reachable at {} (start it with `ollama serve`)",
            self.client.base_url()
        )
    }
}
