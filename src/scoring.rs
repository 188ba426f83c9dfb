// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Batch relevance scoring through an AI provider

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::providers::AiProvider;
use crate::{AsmfError, Result};

/// Score given to items whose batch could not be scored
pub const FALLBACK_SCORE: f64 = 0.5;

static BRACKETED: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[([\d\.,\s]+)\]").expect("valid regex"));
static LOOSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"0\.\d+|1\.0").expect("valid regex"));

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredItem {
    pub item: Value,
    pub score: f64,
}

fn build_prompt(batch: &[Value], criteria: &str) -> Result<String> {
    Ok(format!(
        "Evaluate these items based on: {}\n\nItems:\n{}\n\n\
         Return ONLY a JSON array of scores (0.0-1.0), one per item:\n[0.85, 0.62, 0.91, ...]",
        criteria,
        serde_json::to_string_pretty(batch)?
    ))
}

/// Score `items` in batches of `batch_size`; output order matches input order
pub async fn batch_evaluate(
    provider: &dyn AiProvider,
    items: &[Value],
    criteria: &str,
    batch_size: usize,
) -> Vec<ScoredItem> {
    let mut results = Vec::with_capacity(items.len());

    for (index, batch) in items.chunks(batch_size.max(1)).enumerate() {
        debug!("Scoring batch {} ({} items) with {}", index + 1, batch.len(), provider.name());

        let scores = match build_prompt(batch, criteria) {
            Ok(prompt) => match provider.analyze(&prompt, None).await {
                Ok(response) => parse_scores(&response),
                Err(e) => Err(e),
            },
            Err(e) => Err(e),
        };

        let scores = scores.unwrap_or_else(|e| {
            error!("Batch evaluation failed: {}", e);
            Vec::new()
        });
        if !scores.is_empty() && scores.len() < batch.len() {
            warn!(
                "Model returned {} scores for {} items; the rest get {}",
                scores.len(),
                batch.len(),
                FALLBACK_SCORE
            );
        }

        for (i, item) in batch.iter().enumerate() {
            results.push(ScoredItem {
                item: item.clone(),
                score: scores.get(i).copied().unwrap_or(FALLBACK_SCORE),
            });
        }
    }

    results
}

/// Items at or above `threshold`, best first
pub fn passing(mut scored: Vec<ScoredItem>, threshold: f64) -> Vec<ScoredItem> {
    scored.retain(|s| s.score >= threshold);
    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    scored
}

/// Pull a list of scores out of free-form model output.
///
/// Tries a JSON array, then the first bracketed number list, then any
/// `0.x` / `1.0` numbers in the text.
pub fn parse_scores(response: &str) -> Result<Vec<f64>> {
    if let Ok(Value::Array(values)) = serde_json::from_str::<Value>(response.trim()) {
        let parsed: Option<Vec<f64>> = values
            .iter()
            .map(|v| match v {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse().ok(),
                _ => None,
            })
            .collect();
        if let Some(scores) = parsed {
            return Ok(scores);
        }
    }

    if let Some(caps) = BRACKETED.captures(response) {
        let inner = caps.get(1).map(|m| m.as_str()).unwrap_or("");
        return inner
            .split(',')
            .map(|s| {
                s.trim()
                    .parse::<f64>()
                    .map_err(|_| AsmfError::Parse(format!("bad score '{}' in [{}]", s.trim(), inner)))
            })
            .collect();
    }

    let loose: Vec<f64> = LOOSE
        .find_iter(response)
        .filter_map(|m| m.as_str().parse().ok())
        .collect();
    if !loose.is_empty() {
        return Ok(loose);
    }

    Err(AsmfError::Parse(format!("Could not parse scores from: {}", response)))
}
