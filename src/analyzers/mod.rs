// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Analyzers pair an AI provider with domain logic

pub mod claims;

use async_trait::async_trait;

use crate::{AsmfError, Result};

pub use claims::{ClaimAnalyzer, ClaimAssessment};

/// Trait for structured analysis tasks
#[async_trait]
pub trait Analyzer: Send + Sync {
    type Input: Send + Sync;
    type Output: Send;

    /// Name of this analyzer
    fn name(&self) -> &'static str;

    /// Reject input that cannot be analyzed at all
    fn validate_input(&self, _input: &Self::Input) -> bool {
        true
    }

    /// Analyze a single item
    async fn analyze(&self, input: &Self::Input) -> Result<Self::Output>;

    /// Analyze items one after another; output order matches input order
    async fn batch_analyze(&self, items: &[Self::Input]) -> Result<Vec<Self::Output>> {
        let mut results = Vec::with_capacity(items.len());
        for item in items {
            if !self.validate_input(item) {
                return Err(AsmfError::InvalidInput(format!("{} rejected an item", self.name())));
            }
            results.push(self.analyze(item).await?);
        }
        Ok(results)
    }
}
