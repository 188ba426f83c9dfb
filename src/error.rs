// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Error types for asmf

use thiserror::Error;

/// Result type alias for asmf operations
pub type Result<T> = std::result::Result<T, AsmfError>;

/// asmf error types
#[derive(Error, Debug)]
pub enum AsmfError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File system error: {0}")]
    FileSystem(#[from] std::io::Error),

    #[error("API error: {0}")]
    Api(#[from] reqwest::Error),

    #[error("Provider not available: {0}")]
    ProviderUnavailable(String),

    #[error("No AI providers available: {}", format_attempts(.0))]
    NoProviderAvailable(Vec<(String, String)>),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid status: {0}")]
    InvalidStatus(String),

    #[error("Item not found: {0}")]
    NotFound(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("PDF error: {0}")]
    Pdf(String),

    #[error("GitHub error: {0}")]
    GitHub(String),

    #[error("Review error: {0}")]
    Review(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

fn format_attempts(attempts: &[(String, String)]) -> String {
    if attempts.is_empty() {
        return "no providers configured".to_string();
    }
    attempts
        .iter()
        .map(|(name, reason)| format!("{}: {}", name, reason))
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_provider_error_lists_every_attempt() {
        let err = AsmfError::NoProviderAvailable(vec![
            ("gemini".to_string(), "GEMINI_API_KEY not set".to_string()),
            ("ollama".to_string(), "not reachable".to_string()),
        ]);
        let msg = err.to_string();
        assert!(msg.contains("gemini: GEMINI_API_KEY not set"));
        assert!(msg.contains("ollama: not reachable"));
    }
}
