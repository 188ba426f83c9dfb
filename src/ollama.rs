// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Ollama API client for local AI inference

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::{AsmfError, Result};

/// Ollama API client
#[derive(Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
    probe_timeout: Duration,
}

/// Sampling options forwarded to `/api/generate`
#[derive(Debug, Clone, Default, Serialize)]
pub struct GenerateOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_predict: Option<u32>,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<&'a GenerateOptions>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelInfo>,
}

#[derive(Deserialize)]
struct ModelInfo {
    name: String,
}

#[derive(Serialize)]
struct PullRequest<'a> {
    name: &'a str,
    stream: bool,
}

impl OllamaClient {
    /// Create a new Ollama client with the default 120s generation timeout
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, Duration::from_secs(120))
    }

    /// Create a client whose requests time out after `timeout`
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AsmfError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: normalize_base_url(base_url),
            probe_timeout: Duration::from_secs(5),
        })
    }

    /// Timeout used by `health_check` and `list_models`
    pub fn probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check if Ollama is available
    pub async fn health_check(&self) -> Result<()> {
        let url = format!("{}/api/tags", self.base_url);

        let response = self
            .client
            .get(&url)
            .timeout(self.probe_timeout)
            .send()
            .await
            .map_err(|e| {
                AsmfError::ProviderUnavailable(format!(
                    "Cannot connect to Ollama at {}: {}",
                    self.base_url, e
                ))
            })?;

        if !response.status().is_success() {
            return Err(AsmfError::ProviderUnavailable(format!(
                "Ollama at {} returned status {}",
                self.base_url,
                response.status()
            )));
        }

        Ok(())
    }

    /// List installed models
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/api/tags", self.base_url);

        let response = self
            .client
            .get(&url)
            .timeout(self.probe_timeout)
            .send()
            .await?
            .error_for_status()?;

        let tags: TagsResponse = response.json().await?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    /// Check if a specific model is installed
    pub async fn model_available(&self, model: &str) -> Result<bool> {
        let models = self.list_models().await?;
        Ok(models.iter().any(|m| m == model || *m == format!("{}:latest", model)))
    }

    /// Generate text completion
    pub async fn generate(&self, model: &str, prompt: &str) -> Result<String> {
        self.generate_with_options(model, prompt, None).await
    }

    /// Generate text completion with sampling options
    pub async fn generate_with_options(
        &self,
        model: &str,
        prompt: &str,
        options: Option<&GenerateOptions>,
    ) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);

        let request = GenerateRequest {
            model,
            prompt,
            stream: false,
            options,
        };

        debug!("Sending request to Ollama: model={}", model);

        let response = self.client.post(&url).json(&request).send().await?;

        if !response.status().is_success() {
            return Err(AsmfError::ProviderUnavailable(format!(
                "Ollama returned status {}",
                response.status()
            )));
        }

        let result: GenerateResponse = response.json().await?;
        Ok(result.response)
    }

    /// Download a model into the local daemon (blocks until finished)
    pub async fn pull_model(&self, model: &str) -> Result<()> {
        let url = format!("{}/api/pull", self.base_url);
        info!("Pulling model {} (this may take a while)", model);

        self.client
            .post(&url)
            .timeout(Duration::from_secs(3600))
            .json(&PullRequest { name: model, stream: false })
            .send()
            .await?
            .error_for_status()?;

        info!("Model {} pulled", model);
        Ok(())
    }
}

/// Strip trailing slashes and endpoint paths users paste into the URL
fn normalize_base_url(base_url: &str) -> String {
    base_url
        .trim_end_matches('/')
        .replace("/api/generate", "")
        .replace("/api/chat", "")
        .replace("/api/tags", "")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_is_normalized() {
        assert_eq!(normalize_base_url("http://localhost:11434/"), "http://localhost:11434");
        assert_eq!(
            normalize_base_url("http://localhost:11434/api/generate"),
            "http://localhost:11434"
        );
    }

    #[test]
    fn generate_request_omits_empty_options() {
        let request = GenerateRequest { model: "m", prompt: "p", stream: false, options: None };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("options").is_none());

        let options = GenerateOptions { temperature: Some(0.3), top_p: Some(0.9), num_predict: None };
        let request = GenerateRequest { model: "m", prompt: "p", stream: false, options: Some(&options) };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["options"]["top_p"], serde_json::json!(0.9_f32));
        assert!(json["options"].get("num_predict").is_none());
    }

    #[tokio::test]
    async fn unreachable_daemon_reports_unavailable() {
        let client = OllamaClient::new("http://127.0.0.1:9")
            .unwrap()
            .probe_timeout(Duration::from_millis(500));
        let err = client.health_check().await.unwrap_err();
        assert!(matches!(err, AsmfError::ProviderUnavailable(_)));
    }
}
