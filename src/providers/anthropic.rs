// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Anthropic Messages API

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use super::{format_prompt_with_context, AiProvider, GenerationSettings, PromptContext};
use crate::config::CloudProviderConfig;
use crate::{AsmfError, Result};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    client: Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
    settings: GenerationSettings,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

impl AnthropicProvider {
    pub fn new(config: &CloudProviderConfig, settings: GenerationSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| AsmfError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
            model: config.model.clone(),
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            settings,
        })
    }
}

#[async_trait]
impl AiProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn analyze(&self, prompt: &str, context: Option<&PromptContext>) -> Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AsmfError::ProviderUnavailable(self.unavailable_reason()))?;

        let body = json!({
            "model": self.model,
            "max_tokens": self.settings.max_tokens,
            "temperature": self.settings.temperature,
            "messages": [{"role": "user", "content": format_prompt_with_context(prompt, context)}],
        });

        debug!("Sending request to Anthropic: model={}", self.model);
        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AsmfError::ProviderUnavailable(format!(
                "Anthropic returned status {}",
                response.status()
            )));
        }

        let parsed: MessagesResponse = response.json().await?;
        Ok(parsed.content.into_iter().next().map(|b| b.text).unwrap_or_default())
    }

    async fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    fn unavailable_reason(&self) -> String {
        "ANTHROPIC_API_KEY not configured".to_string()
    }
}
