// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Patent claim analysis: domain checks first, then a model assessment

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

use super::Analyzer;
use crate::domain::{DomainExpert, ValidationResult};
use crate::parsers::patent::{ClaimType, PatentClaim};
use crate::providers::{AiProvider, PromptContext};
use crate::{AsmfError, Result};

#[derive(Debug, Clone, Serialize)]
pub struct ClaimAssessment {
    pub number: u32,
    pub claim_type: ClaimType,
    pub process_type: Option<String>,
    pub temperature: ValidationResult,
    pub mass_balance: ValidationResult,
    pub equipment: ValidationResult,
    /// Model's free-text assessment
    pub assessment: String,
    pub provider: String,
}

impl ClaimAssessment {
    /// True when every domain check passed
    pub fn plausible(&self) -> bool {
        self.temperature.valid && self.mass_balance.valid && self.equipment.valid
    }
}

pub struct ClaimAnalyzer {
    provider: Arc<dyn AiProvider>,
    expert: DomainExpert,
}

impl ClaimAnalyzer {
    pub fn new(provider: Arc<dyn AiProvider>, expert: DomainExpert) -> Self {
        Self { provider, expert }
    }

    fn build_context(&self, claim: &PatentClaim, checks: &[(&str, &ValidationResult)]) -> PromptContext {
        let mut ctx = PromptContext::new();
        ctx.insert("Domain".to_string(), self.expert.config().description.clone());
        if let Some(process) = self.expert.identify_process_type(&claim.text) {
            ctx.insert("Process type".to_string(), process);
        }
        if !claim.depends_on.is_empty() {
            let deps: Vec<String> = claim.depends_on.iter().map(u32::to_string).collect();
            ctx.insert("Depends on claims".to_string(), deps.join(", "));
        }
        for (label, result) in checks {
            let mut line = format!("{} ({})", result.reason, if result.valid { "ok" } else { "FAILED" });
            if let Some(warning) = &result.warning {
                line.push_str(&format!("; warning: {}", warning));
            }
            ctx.insert(format!("{} check", label), line);
        }
        ctx
    }
}

#[async_trait]
impl Analyzer for ClaimAnalyzer {
    type Input = PatentClaim;
    type Output = ClaimAssessment;

    fn name(&self) -> &'static str {
        "claims"
    }

    fn validate_input(&self, claim: &PatentClaim) -> bool {
        !claim.text.trim().is_empty()
    }

    async fn analyze(&self, claim: &PatentClaim) -> Result<ClaimAssessment> {
        if !self.validate_input(claim) {
            return Err(AsmfError::InvalidInput(format!("Claim {} has no text", claim.number)));
        }

        let temperature = self.expert.validate_temperature_claim(&claim.text);
        let mass_balance = self.expert.check_mass_balance(&claim.text);
        let equipment = self.expert.validate_equipment_design(&claim.text);
        debug!(
            "Claim {}: temperature={} mass_balance={} equipment={}",
            claim.number, temperature.valid, mass_balance.valid, equipment.valid
        );

        let context = self.build_context(
            claim,
            &[("Temperature", &temperature), ("Mass balance", &mass_balance), ("Equipment", &equipment)],
        );
        let prompt = format!(
            "Assess the technical feasibility of patent claim {}. \
             Point out anything physically implausible and say whether the domain checks above are right.\n\n\
             Claim: {}",
            claim.number, claim.text
        );

        info!("Analyzing claim {} with {}", claim.number, self.provider.name());
        let assessment = self.provider.analyze(&prompt, Some(&context)).await?;

        Ok(ClaimAssessment {
            number: claim.number,
            claim_type: claim.claim_type,
            process_type: self.expert.identify_process_type(&claim.text),
            temperature,
            mass_balance,
            equipment,
            assessment: assessment.trim().to_string(),
            provider: self.provider.name().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DomainConfig;
    use crate::providers::testing::FakeProvider;

    fn analyzer(provider: FakeProvider) -> ClaimAnalyzer {
        let config = DomainConfig::from_yaml_str(
            r#"
domain: {name: thermal_processing, description: Thermal systems}
temperature_ranges:
  pyrolysis: [300, 600]
process_types: [pyrolysis]
"#,
        )
        .unwrap();
        ClaimAnalyzer::new(Arc::new(provider), DomainExpert::new(config))
    }

    fn claim(number: u32, text: &str) -> PatentClaim {
        PatentClaim { number, text: text.to_string(), claim_type: ClaimType::Independent, depends_on: vec![] }
    }

    #[tokio::test]
    async fn domain_checks_feed_the_prompt() {
        let a = analyzer(FakeProvider::new("fake", true));
        let result = a.analyze(&claim(1, "A pyrolysis reactor operated at 800°C")).await.unwrap();

        assert!(!result.temperature.valid);
        assert!(!result.plausible());
        assert_eq!(result.process_type.as_deref(), Some("pyrolysis"));
        // FakeProvider echoes the rendered prompt
        assert!(result.assessment.contains("Temperature check: Pyrolysis temperature 800°C"));
        assert!(result.assessment.contains("Process type: pyrolysis"));
        assert_eq!(result.provider, "fake");
    }

    #[tokio::test]
    async fn empty_claim_is_rejected() {
        let a = analyzer(FakeProvider::new("fake", true));
        assert!(matches!(a.analyze(&claim(3, "  ")).await, Err(AsmfError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn batch_keeps_order_and_stops_on_error() {
        let a = analyzer(
            FakeProvider::new("fake", true).with_replies(vec![Ok("first".to_string()), Ok("second".to_string())]),
        );
        let out = a.batch_analyze(&[claim(1, "A method"), claim(2, "A system at 450°C")]).await.unwrap();
        assert_eq!(out.iter().map(|c| c.assessment.as_str()).collect::<Vec<_>>(), vec!["first", "second"]);
        assert!(out[1].plausible());

        let failing = analyzer(
            FakeProvider::new("fake", true).with_replies(vec![Err(AsmfError::ProviderUnavailable("down".into()))]),
        );
        assert!(failing.batch_analyze(&[claim(1, "A method")]).await.is_err());
    }
}
