// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Minimal GitHub REST client for pull request reviews

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::{AsmfError, Result};

const DIFF_MEDIA_TYPE: &str = "application/vnd.github.v3.diff";
const JSON_MEDIA_TYPE: &str = "application/vnd.github.v3+json";

/// One changed file as listed by `GET /pulls/{n}/files`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PrFile {
    pub filename: String,
    #[serde(default)]
    pub additions: u64,
    #[serde(default)]
    pub deletions: u64,
}

#[derive(Serialize)]
struct CommentRequest<'a> {
    body: &'a str,
}

#[derive(Clone)]
pub struct GitHubClient {
    client: Client,
    api_url: String,
}

impl GitHubClient {
    pub fn new(token: &str, api_url: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| AsmfError::Config("GitHub token contains invalid characters".to_string()))?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(USER_AGENT, HeaderValue::from_static("Ollama-PR-Reviewer"));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AsmfError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, api_url: api_url.trim_end_matches('/').to_string() })
    }

    fn pull_url(&self, repo: &str, pr_number: u64) -> String {
        format!("{}/repos/{}/pulls/{}", self.api_url, repo, pr_number)
    }

    async fn send(&self, request: RequestBuilder, what: &str) -> Result<reqwest::Response> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AsmfError::GitHub(format!("{} failed with {}: {}", what, status, body.trim())));
        }
        Ok(response)
    }

    /// Unified diff of the pull request
    pub async fn get_pr_diff(&self, repo: &str, pr_number: u64) -> Result<String> {
        debug!("Fetching diff for {}#{}", repo, pr_number);
        let request = self.client.get(self.pull_url(repo, pr_number)).header(ACCEPT, DIFF_MEDIA_TYPE);
        Ok(self.send(request, "Fetching PR diff").await?.text().await?)
    }

    pub async fn get_pr_files(&self, repo: &str, pr_number: u64) -> Result<Vec<PrFile>> {
        debug!("Fetching changed files for {}#{}", repo, pr_number);
        let url = format!("{}/files", self.pull_url(repo, pr_number));
        let request = self.client.get(url).header(ACCEPT, JSON_MEDIA_TYPE);
        Ok(self.send(request, "Fetching PR files").await?.json().await?)
    }

    /// Post an issue comment on the pull request
    pub async fn post_comment(&self, repo: &str, pr_number: u64, body: &str) -> Result<()> {
        let url = format!("{}/repos/{}/issues/{}/comments", self.api_url, repo, pr_number);
        let request = self
            .client
            .post(url)
            .header(ACCEPT, JSON_MEDIA_TYPE)
            .json(&CommentRequest { body });
        self.send(request, "Posting PR comment").await?;
        info!("Posted comment on {}#{}", repo, pr_number);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pull_urls_ignore_trailing_slash() {
        let client = GitHubClient::new("token", "https://api.github.com/").unwrap();
        assert_eq!(client.pull_url("owner/repo", 7), "https://api.github.com/repos/owner/repo/pulls/7");
    }

    #[test]
    fn files_deserialize_from_api_shape() {
        let files: Vec<PrFile> = serde_json::from_str(
            r#"[{"filename": "src/lib.rs", "additions": 3, "deletions": 1, "status": "modified"}]"#,
        )
        .unwrap();
        assert_eq!(files[0], PrFile { filename: "src/lib.rs".to_string(), additions: 3, deletions: 1 });
    }

    #[test]
    fn newline_in_token_is_a_config_error() {
        assert!(matches!(GitHubClient::new("bad\ntoken", "https://api.github.com"), Err(AsmfError::Config(_))));
    }

    #[tokio::test]
    async fn unreachable_api_is_an_error() {
        let client = GitHubClient::new("token", "http://127.0.0.1:9").unwrap();
        assert!(client.get_pr_diff("owner/repo", 1).await.is_err());
    }
}
