// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Pull request review through a local Ollama model
//!
//! [`OllamaReviewer`] fetches the diff and changed-file list from GitHub,
//! builds a review prompt (optionally guided by a patterns document), asks
//! Ollama for a review and wraps the answer for posting as a PR comment.

pub mod github;

use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::ollama::{GenerateOptions, OllamaClient};
use crate::{AsmfError, Result};

pub use github::{GitHubClient, PrFile};

const TRUNCATION_MARKER: &str = "\n\n[... diff truncated due to size ...]";

const DEFAULT_GUIDELINES: &str =
    "Review the code for common anti-patterns, performance issues, and security vulnerabilities.";

/// Comment posted when a review could not be produced
pub const FAILURE_COMMENT: &str = "⚠️ **Automated Review Failed**\n\n\
    The Ollama PR review encountered an error. \
    Please check the webhook server logs for details.";

/// Produces reviews and posts them back to the pull request
#[async_trait]
pub trait ReviewPipeline: Send + Sync {
    /// Review text ready to post
    async fn review(&self, repo: &str, pr_number: u64) -> Result<String>;

    async fn post_comment(&self, repo: &str, pr_number: u64, body: &str) -> Result<()>;
}

/// Read the review patterns document; missing means basic review mode
pub fn load_review_patterns(path: &Path) -> String {
    match std::fs::read_to_string(path) {
        Ok(content) => {
            info!("Loading review patterns from: {}", path.display());
            content
        }
        Err(_) => {
            warn!("{} not found - using basic review mode", path.display());
            String::new()
        }
    }
}

/// Cut the diff to `max_chars` characters and append a marker
pub fn truncate_diff(diff: &str, max_chars: usize) -> String {
    match diff.char_indices().nth(max_chars) {
        Some((cut, _)) => {
            warn!("PR diff is very large - truncating for analysis");
            format!("{}{}", &diff[..cut], TRUNCATION_MARKER)
        }
        None => diff.to_string(),
    }
}

pub fn format_review_prompt(diff: &str, files: &[PrFile], patterns: &str) -> String {
    let files_summary = files
        .iter()
        .map(|f| format!("- {} (+{} -{})", f.filename, f.additions, f.deletions))
        .collect::<Vec<_>>()
        .join("\n");
    let guidelines = if patterns.trim().is_empty() { DEFAULT_GUIDELINES } else { patterns };

    format!(
        r#"You are an expert code reviewer analyzing a GitHub pull request. Your task is to identify code quality issues, performance problems, and security vulnerabilities based on established anti-patterns.

## Review Guidelines

{guidelines}

## Pull Request Changes

### Changed Files:
{files_summary}

### Code Diff:
```diff
{diff}
```

## Your Task

1. Review the code changes against the anti-patterns guide
2. Identify specific issues with file names and line numbers when possible
3. Provide clear, actionable feedback
4. Suggest fixes for each issue found
5. Highlight any security vulnerabilities

## Output Format

### Summary
[Brief overview of the review - number of issues found by category]

### Issues Found

#### [Category: Performance/Quality/Security]
**File:** `filename` (line X-Y if applicable)
**Issue:** [Description of the anti-pattern]
**Suggestion:** [How to fix it]

### Positive Observations
[Highlight any well-written code that follows best practices]

### Recommendation
[Overall recommendation: Approve / Request Changes / Comment]

---

Begin your review:
"#
    )
}

/// Header and footer naming the model around the raw review
pub fn wrap_review(review: &str, model: &str, patterns_path: &str) -> String {
    format!(
        "## 🤖 Automated Code Review (Ollama)\n\n{}\n\n---\n*Reviewed by Ollama ({}) • [Learn more about review patterns]({})*\n",
        review.trim(),
        model,
        patterns_path
    )
}

/// Bot accounts and PRs whose body mentions Copilot
pub fn is_copilot_authored(pull_request: &Value) -> bool {
    let login = pull_request
        .pointer("/user/login")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_lowercase();
    if ["copilot", "github-actions[bot]", "dependabot[bot]"]
        .iter()
        .any(|p| login.contains(p))
    {
        return true;
    }
    pull_request
        .get("body")
        .and_then(Value::as_str)
        .map(|b| b.to_lowercase().contains("copilot"))
        .unwrap_or(false)
}

pub struct OllamaReviewer {
    github: GitHubClient,
    ollama: OllamaClient,
    model: String,
    patterns: String,
    patterns_path: String,
    max_diff_size: usize,
}

impl OllamaReviewer {
    pub fn new(github: GitHubClient, ollama: OllamaClient, model: &str, patterns: String) -> Self {
        Self {
            github,
            ollama,
            model: model.to_string(),
            patterns,
            patterns_path: ".github/CODE_REVIEW_PATTERNS.md".to_string(),
            max_diff_size: 50_000,
        }
    }

    /// Build from configuration; a GitHub token is required
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let token = config
            .webhook
            .github_token
            .as_deref()
            .ok_or_else(|| AsmfError::Config("GITHUB_TOKEN environment variable is required".to_string()))?;
        let github = GitHubClient::new(token, &config.review.github_api_url)?;
        let ollama = OllamaClient::with_timeout(
            &config.llm.ollama.url,
            Duration::from_secs(config.review.timeout_secs),
        )?;
        let patterns = load_review_patterns(Path::new(&config.review.patterns_path));

        let mut reviewer = Self::new(github, ollama, &config.review.model, patterns);
        reviewer.patterns_path = config.review.patterns_path.clone();
        reviewer.max_diff_size = config.review.max_diff_size;
        Ok(reviewer)
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl ReviewPipeline for OllamaReviewer {
    async fn review(&self, repo: &str, pr_number: u64) -> Result<String> {
        info!("Starting review for {} PR #{}", repo, pr_number);

        let diff = self.github.get_pr_diff(repo, pr_number).await?;
        if diff.trim().is_empty() {
            return Err(AsmfError::Review("Failed to fetch PR diff".to_string()));
        }
        let files = self.github.get_pr_files(repo, pr_number).await?;
        if files.is_empty() {
            return Err(AsmfError::Review("Failed to fetch PR files".to_string()));
        }

        let diff = truncate_diff(&diff, self.max_diff_size);
        let prompt = format_review_prompt(&diff, &files, &self.patterns);

        info!("Analyzing with Ollama ({})", self.model);
        let options = GenerateOptions { temperature: Some(0.3), top_p: Some(0.9), num_predict: None };
        let review = self
            .ollama
            .generate_with_options(&self.model, &prompt, Some(&options))
            .await
            .map_err(|e| AsmfError::Review(format!("Failed to analyze with Ollama: {}", e)))?;

        if review.trim().is_empty() {
            return Err(AsmfError::Review("Ollama returned an empty review".to_string()));
        }
        Ok(wrap_review(&review, &self.model, &self.patterns_path))
    }

    async fn post_comment(&self, repo: &str, pr_number: u64, body: &str) -> Result<()> {
        self.github.post_comment(repo, pr_number, body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn short_diffs_are_untouched() {
        assert_eq!(truncate_diff("+a\n-b", 100), "+a\n-b");
    }

    #[test]
    fn long_diffs_are_cut_with_marker() {
        let diff = "é".repeat(20);
        let cut = truncate_diff(&diff, 10);
        assert!(cut.starts_with(&"é".repeat(10)));
        assert!(cut.ends_with("[... diff truncated due to size ...]"));
        assert!(!cut.contains(&"é".repeat(11)));
    }

    #[test]
    fn prompt_lists_files_and_falls_back_to_basic_guidelines() {
        let files = vec![PrFile { filename: "src/main.rs".to_string(), additions: 10, deletions: 2 }];
        let prompt = format_review_prompt("+fn main() {}", &files, "");
        assert!(prompt.contains("- src/main.rs (+10 -2)"));
        assert!(prompt.contains(DEFAULT_GUIDELINES));
        assert!(prompt.contains("```diff\n+fn main() {}\n```"));

        let guided = format_review_prompt("", &files, "Never block in async code.");
        assert!(guided.contains("Never block in async code."));
        assert!(!guided.contains(DEFAULT_GUIDELINES));
    }

    #[test]
    fn review_is_wrapped_with_model_name() {
        let wrapped = wrap_review("  Looks fine.\n", "qwen2.5:14b-q4", ".github/CODE_REVIEW_PATTERNS.md");
        assert!(wrapped.starts_with("## 🤖 Automated Code Review (Ollama)\n\nLooks fine.\n"));
        assert!(wrapped.contains("*Reviewed by Ollama (qwen2.5:14b-q4)"));
    }

    #[test]
    fn patterns_file_is_optional() {
        assert_eq!(load_review_patterns(Path::new("/nonexistent/PATTERNS.md")), "");

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "# Patterns").unwrap();
        assert_eq!(load_review_patterns(file.path()), "# Patterns");
    }

    #[test]
    fn copilot_detection() {
        assert!(is_copilot_authored(&json!({"user": {"login": "Copilot"}})));
        assert!(is_copilot_authored(&json!({"user": {"login": "dependabot[bot]"}})));
        assert!(is_copilot_authored(&json!({"user": {"login": "alice"}, "body": "Drafted with Copilot"})));
        assert!(!is_copilot_authored(&json!({"user": {"login": "alice"}, "body": null})));
        assert!(!is_copilot_authored(&json!({})));
    }

    #[test]
    fn reviewer_requires_a_token() {
        let config = AppConfig::default();
        assert!(matches!(OllamaReviewer::from_config(&config), Err(AsmfError::Config(_))));
    }
}
