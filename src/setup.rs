// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Local Ollama installation checks and `.env` generation

use std::path::Path;
use tracing::{debug, info, warn};

use crate::ollama::OllamaClient;
use crate::selector::hardware::{run_with_timeout, PROBE_TIMEOUT};
use crate::{AsmfError, Result};

const ENV_BANNER: &str = "# Ollama Configuration (added by asmf setup)";

/// `ollama --version` output, if the binary is on PATH
pub fn ollama_version() -> Option<String> {
    let version = run_with_timeout("ollama", &["--version"], PROBE_TIMEOUT).map(|out| out.trim().to_string());
    if version.is_none() {
        debug!("ollama --version unavailable");
    }
    version
}

/// Settings written to `.env`, in file order
pub fn env_settings(base_url: &str, model: &str, prefer_local: bool) -> Vec<(&'static str, String)> {
    vec![
        ("OLLAMA_BASE_URL", base_url.to_string()),
        ("OLLAMA_TIMEOUT", "5.0".to_string()),
        ("OLLAMA_MODEL", model.to_string()),
        ("PREFER_LOCAL", prefer_local.to_string()),
    ]
}

/// Replace existing `KEY=` lines in place and append any missing keys.
///
/// Comments and unrelated lines are kept as they are.
pub fn merge_env(existing: &str, settings: &[(&str, String)]) -> String {
    let mut updated = Vec::new();
    let mut lines: Vec<String> = existing
        .lines()
        .map(|line| {
            let stripped = line.trim();
            if stripped.is_empty() || stripped.starts_with('#') {
                return line.to_string();
            }
            let key = stripped.split('=').next().unwrap_or("").trim();
            match settings.iter().find(|(k, _)| *k == key) {
                Some((k, v)) => {
                    updated.push(*k);
                    format!("{}={}", k, v)
                }
                None => line.to_string(),
            }
        })
        .collect();

    let missing: Vec<_> = settings.iter().filter(|(k, _)| !updated.contains(k)).collect();
    if !missing.is_empty() {
        lines.push(String::new());
        lines.push(ENV_BANNER.to_string());
        lines.extend(missing.iter().map(|(k, v)| format!("{}={}", k, v)));
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

/// Merge settings into the env file at `path`, creating it if needed
pub fn write_env_file(path: &Path, settings: &[(&str, String)]) -> Result<()> {
    let existing = if path.exists() { std::fs::read_to_string(path)? } else { String::new() };
    std::fs::write(path, merge_env(&existing, settings))?;
    info!("Updated {}", path.display());
    Ok(())
}

/// Run a short generation with the first installed model
pub async fn verify_installation(client: &OllamaClient) -> Result<String> {
    let models = client.list_models().await?;
    let Some(model) = models.first() else {
        warn!("No models installed");
        return Err(AsmfError::NotFound("no Ollama models installed".to_string()));
    };
    info!("Testing inference with {}", model);
    let reply = client
        .generate(model, "Say 'Hello from Ollama!' and nothing else.")
        .await?;
    Ok(reply.trim().chars().take(50).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn existing_keys_are_replaced_in_place() {
        let existing = "# secrets\nGEMINI_API_KEY=abc\nOLLAMA_MODEL=old\n";
        let settings = env_settings("http://localhost:11434", "llama3.2:3b", true);
        let merged = merge_env(existing, &settings);

        let lines: Vec<&str> = merged.lines().collect();
        assert_eq!(&lines[..3], &["# secrets", "GEMINI_API_KEY=abc", "OLLAMA_MODEL=llama3.2:3b"]);
        assert!(merged.contains(ENV_BANNER));
        assert!(merged.contains("PREFER_LOCAL=true\n"));
        assert_eq!(merged.matches("OLLAMA_MODEL=").count(), 1);
    }

    #[test]
    fn no_banner_when_everything_was_present() {
        let settings = env_settings("http://h:1", "m", false);
        let existing: String = settings.iter().map(|(k, _)| format!("{}=x\n", k)).collect();
        let merged = merge_env(&existing, &settings);
        assert!(!merged.contains(ENV_BANNER));
        assert!(merged.contains("PREFER_LOCAL=false"));
    }

    #[test]
    fn env_file_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        write_env_file(&path, &env_settings("http://localhost:11434", "phi3:mini", true)).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("OLLAMA_MODEL=phi3:mini"));
        assert!(content.contains("OLLAMA_BASE_URL=http://localhost:11434"));
    }
}
