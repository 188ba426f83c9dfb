// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Components wired from one loaded configuration

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::AppConfig;
use crate::domain::{DomainConfig, DomainExpert};
use crate::ollama::OllamaClient;
use crate::providers::{AiProvider, ProviderSelector};
use crate::search::{build_sources, Aggregator};
use crate::selector::ModelSelector;
use crate::tracker::Tracker;
use crate::Result;

/// Built once in `main` and passed to every command
pub struct AppContext {
    pub config: AppConfig,
    pub config_path: PathBuf,
}

impl AppContext {
    pub fn load(config_path: &Path) -> Result<Self> {
        Ok(Self::new(AppConfig::load(config_path)?, config_path))
    }

    pub fn new(config: AppConfig, config_path: &Path) -> Self {
        Self { config, config_path: config_path.to_path_buf() }
    }

    pub fn save_config(&self) -> Result<()> {
        self.config.save(&self.config_path)
    }

    pub fn ollama_client(&self) -> Result<OllamaClient> {
        let ollama = &self.config.llm.ollama;
        Ok(OllamaClient::with_timeout(&ollama.url, Duration::from_secs(ollama.timeout_secs))?
            .probe_timeout(Duration::from_secs(ollama.probe_timeout_secs)))
    }

    pub fn provider_selector(&self) -> ProviderSelector {
        ProviderSelector::from_config(&self.config.llm)
    }

    /// First available AI backend, honouring `llm.prefer_local`
    pub async fn select_provider(&self) -> Result<Box<dyn AiProvider>> {
        self.provider_selector().select(self.config.llm.prefer_local).await
    }

    /// Hardware-detected selector unless `vram_gb` is given
    pub fn model_selector(&self, vram_gb: Option<f64>) -> Result<ModelSelector> {
        let selector = match vram_gb {
            Some(vram) => ModelSelector::with_vram(vram),
            None => ModelSelector::detect(),
        };
        Ok(selector.with_ollama(self.ollama_client()?))
    }

    pub fn tracker(&self) -> Result<Tracker> {
        Tracker::open(&self.config.tracking.storage_path)
    }

    pub fn domain_expert(&self) -> DomainExpert {
        DomainExpert::new(DomainConfig::load(Path::new(&self.config.domain.config_path)))
    }

    pub fn aggregator(&self) -> Result<Aggregator> {
        Ok(Aggregator::new(build_sources(&self.config)?, self.config.blocked_entities.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn components_follow_configuration() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.tracking.storage_path = dir.path().join("items.json").to_string_lossy().to_string();
        config.domain.config_path = dir.path().join("missing.yaml").to_string_lossy().to_string();
        config.llm.fallback_chain = vec!["gemini".to_string(), "ollama".to_string()];

        let ctx = AppContext::new(config, &dir.path().join("config.json"));
        assert_eq!(ctx.provider_selector().order(true), vec!["ollama", "gemini"]);
        assert_eq!(ctx.domain_expert().config().name, "general");
        assert!(ctx.tracker().unwrap().get_all(None).is_empty());
        assert_eq!(ctx.model_selector(Some(16.0)).unwrap().tier().as_str(), "high");

        ctx.save_config().unwrap();
        assert!(dir.path().join("config.json").exists());
    }
}
