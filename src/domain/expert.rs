// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Plausibility checks for numeric claims in technical text

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{info, warn};

use super::DomainConfig;

static TEMPERATURE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)\s*(?:degrees?\s*)?(?:C|Celsius|°C)").expect("valid regex"));

static PERCENTAGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)\s*(?:%|percent)").expect("valid regex"));

/// Outcome of one check
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl ValidationResult {
    fn ok(reason: &str) -> Self {
        Self { valid: true, reason: reason.to_string(), warning: None }
    }

    fn fail(reason: String) -> Self {
        Self { valid: false, reason, warning: None }
    }
}

pub struct DomainExpert {
    config: DomainConfig,
}

impl DomainExpert {
    pub fn new(config: DomainConfig) -> Self {
        info!("Initialized {} domain expert", config.name);
        Self { config }
    }

    pub fn config(&self) -> &DomainConfig {
        &self.config
    }

    /// Every `N °C` style temperature in the text
    pub fn extract_temperatures(&self, text: &str) -> Vec<i64> {
        extract_numbers(&TEMPERATURE, text, "temperature")
    }

    /// Every `N %` style percentage in the text
    pub fn extract_percentages(&self, text: &str) -> Vec<i64> {
        extract_numbers(&PERCENTAGE, text, "percentage")
    }

    /// Error message if the temperature is implausible for the whole domain
    pub fn check_temperature_in_range(&self, temp: i64) -> Option<String> {
        if self.config.validate_temperature(temp as f64) {
            return None;
        }
        match self.config.overall_range() {
            Some((lo, hi)) => Some(format!(
                "Temperature {}°C outside typical {} range (~{}-{}°C)",
                temp,
                self.config.name,
                fmt_num(lo),
                fmt_num(hi)
            )),
            None => Some(format!("Temperature {}°C may be unrealistic", temp)),
        }
    }

    /// Error message if the text names a process whose range excludes `temp`
    pub fn check_temperature_process_match(&self, temp: i64, text: &str) -> Option<String> {
        let lower = text.to_lowercase();
        let t = temp as f64;
        self.config
            .temperature_ranges()
            .iter()
            .find_map(|(process, (min, max))| {
                let name = process.replace('_', " ");
                if lower.contains(&name) && !(*min <= t && t <= *max) {
                    Some(format!(
                        "{} temperature {}°C outside typical range {}-{}°C",
                        title_case(&name),
                        temp,
                        fmt_num(*min),
                        fmt_num(*max)
                    ))
                } else {
                    None
                }
            })
    }

    /// Check each extracted temperature; the first failure is reported
    pub fn validate_temperature_claim(&self, text: &str) -> ValidationResult {
        let temperatures = self.extract_temperatures(text);
        if temperatures.is_empty() {
            return ValidationResult::ok("No specific temperatures claimed");
        }

        for temp in temperatures {
            if let Some(reason) = self.check_temperature_in_range(temp) {
                return ValidationResult::fail(reason);
            }
            if let Some(reason) = self.check_temperature_process_match(temp, text) {
                return ValidationResult::fail(reason);
            }
        }

        ValidationResult::ok("Temperature claims are reasonable")
    }

    /// More than two equipment types in one text is flagged, not rejected
    pub fn validate_equipment_design(&self, text: &str) -> ValidationResult {
        let lower = text.to_lowercase();
        let mentions = self
            .config
            .equipment_types
            .iter()
            .filter(|e| lower.contains(&e.replace('_', " ")))
            .count();

        if mentions > 2 {
            return ValidationResult {
                valid: true,
                reason: "Multiple equipment types may indicate hybrid system".to_string(),
                warning: Some("Verify design is not overly complex".to_string()),
            };
        }
        ValidationResult::ok("Equipment design appears feasible")
    }

    /// First configured process type mentioned in the text
    pub fn identify_process_type(&self, text: &str) -> Option<String> {
        let lower = text.to_lowercase();
        self.config
            .process_types
            .iter()
            .find(|p| lower.contains(&p.to_lowercase()))
            .map(|p| p.replace(' ', "_"))
    }

    /// Product name to description; the same list for every process
    pub fn typical_products_for_process(&self, _process_type: &str) -> BTreeMap<String, String> {
        self.config
            .products()
            .iter()
            .map(|(name, info)| (name.clone(), info.get("description").cloned().unwrap_or_default()))
            .collect()
    }

    /// Yields summing past 105% cannot be right
    pub fn check_mass_balance(&self, text: &str) -> ValidationResult {
        let percentages = self.extract_percentages(text);
        if percentages.is_empty() {
            return ValidationResult::ok("No specific yields claimed");
        }

        let total = percentages.iter().fold(0i64, |acc, p| acc.saturating_add(*p));
        if total > 105 {
            return ValidationResult::fail(format!("Claimed yields sum to {}%, exceeding 100%", total));
        }
        ValidationResult::ok("Yield claims appear balanced")
    }
}

/// Digit runs too long for `i64` saturate to `i64::MAX` so they still fail range checks
fn extract_numbers(pattern: &Regex, text: &str, what: &str) -> Vec<i64> {
    pattern
        .captures_iter(text)
        .filter_map(|caps| {
            let raw = caps.get(1)?.as_str();
            Some(raw.parse::<i64>().unwrap_or_else(|_| {
                warn!("{} {} out of range, saturating", what, raw);
                i64::MAX
            }))
        })
        .collect()
}

/// `300` rather than `300.0` for whole numbers
fn fmt_num(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        value.to_string()
    }
}

fn title_case(s: &str) -> String {
    s.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
