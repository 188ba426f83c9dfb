// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Google Gemini over the Generative Language REST API

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use super::{format_prompt_with_context, AiProvider, GenerationSettings, PromptContext};
use crate::config::CloudProviderConfig;
use crate::{AsmfError, Result};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

pub struct GeminiProvider {
    client: Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
    settings: GenerationSettings,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Content,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

impl GeminiProvider {
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
impl AiProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn analyze(&self, prompt: &str, context: Option<&PromptContext>) -> Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AsmfError::ProviderUnavailable(self.unavailable_reason()))?;

        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model);
        let body = json!({
            "contents": [{"parts": [{"text": format_prompt_with_context(prompt, context)}]}],
            "generationConfig": {
                "maxOutputTokens": self.settings.max_tokens,
                "temperature": self.settings.temperature,
            }
        });

        debug!("Sending request to Gemini: model={}", self.model);
        let response = self
            .client
            .post(&url)
            .query(&[("key", api_key)])
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AsmfError::ProviderUnavailable(format!(
                "Gemini returned status {}",
                response.status()
            )));
        }

        let parsed: GenerateContentResponse = response.json().await?;
        let text = parsed
            .candidates
            .into_iter()
            .next()
            .map(|c| c.content.parts.into_iter().map(|p| p.text).collect::<String>())
            .unwrap_or_default();
        Ok(text)
    }

    async fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    fn unavailable_reason(&self) -> String {
        "GEMINI_API_KEY not configured".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> GenerationSettings {
        GenerationSettings { max_tokens: 10, temperature: 0.1 }
    }

    #[tokio::test]
    async fn availability_follows_api_key() {
        let mut config = CloudProviderConfig {
            api_key: None,
            model: "gemini-1.5-pro".to_string(),
            base_url: None,
        };
        let provider = GeminiProvider::new(&config, settings()).unwrap();
        assert!(!provider.is_available().await);
        let err = provider.analyze("hi", None).await.unwrap_err();
        assert!(matches!(err, AsmfError::ProviderUnavailable(_)));

        config.api_key = Some("key".to_string());
        assert!(GeminiProvider::new(&config, settings()).unwrap().is_available().await);
    }

    #[test]
    fn response_text_is_read_from_first_candidate() {
        let parsed: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates": [{"content": {"parts": [{"text": "a"}, {"text": "b"}]}}]}"#,
        )
        .unwrap();
        let part_count = parsed.candidates[0].content.parts.len();
        assert_eq!(part_count, 2);
    }
}
