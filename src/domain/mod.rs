// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Domain knowledge loaded from YAML
//!
//! A domain file names temperature ranges per process, equipment, feedstocks,
//! products and operating conditions. Everything is optional; a missing or
//! unreadable file yields a `general` domain with no ranges.

pub mod expert;

use serde::Serialize;
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{error, info, warn};

use crate::{AsmfError, Result};

pub use expert::{DomainExpert, ValidationResult};

/// Lower pressure bound (bar) when none is configured
const DEFAULT_MIN_PRESSURE: f64 = 0.1;
/// Upper pressure bound (bar) when none is configured
const DEFAULT_MAX_PRESSURE: f64 = 1000.0;

#[derive(Debug, Clone, Serialize)]
pub struct DomainConfig {
    pub name: String,
    pub description: String,
    /// Process name to `(min, max)` in Celsius, in file order
    temperature_ranges: Vec<(String, (f64, f64))>,
    pub equipment_types: Vec<String>,
    pub feedstocks: Vec<String>,
    /// Product name to metadata (`description`, `typical_yield`, ...)
    products: Vec<(String, BTreeMap<String, String>)>,
    pub process_types: Vec<String>,
    operating_conditions: Value,
}

impl Default for DomainConfig {
    fn default() -> Self {
        Self {
            name: "general".to_string(),
            description: "General technical analysis".to_string(),
            temperature_ranges: Vec::new(),
            equipment_types: Vec::new(),
            feedstocks: Vec::new(),
            products: Vec::new(),
            process_types: Vec::new(),
            operating_conditions: Value::Mapping(Default::default()),
        }
    }
}

impl DomainConfig {
    /// Load from `path`, falling back to defaults when missing or broken
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            warn!("Domain config not found at {:?}, using default config", path);
            return Self::default();
        }

        let parsed = std::fs::read_to_string(path)
            .map_err(AsmfError::from)
            .and_then(|content| Self::from_yaml_str(&content));
        match parsed {
            Ok(config) => {
                info!("Loaded domain config from {:?}", path);
                config
            }
            Err(e) => {
                error!("Failed to load domain config: {}", e);
                Self::default()
            }
        }
    }

    /// Parse YAML leniently; malformed sections are skipped
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let root: Value = serde_yaml::from_str(content)?;
        let domain = root.get("domain");

        Ok(Self {
            name: domain
                .and_then(|d| d.get("name"))
                .and_then(Value::as_str)
                .unwrap_or("general")
                .to_string(),
            description: domain
                .and_then(|d| d.get("description"))
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string(),
            temperature_ranges: parse_ranges(root.get("temperature_ranges")),
            equipment_types: string_list(root.get("equipment_types")),
            feedstocks: string_list(root.get("feedstocks")),
            products: parse_products(root.get("products")),
            process_types: string_list(root.get("process_types")),
            operating_conditions: root
                .get("operating_conditions")
                .cloned()
                .unwrap_or(Value::Mapping(Default::default())),
        })
    }

    pub fn temperature_ranges(&self) -> &[(String, (f64, f64))] {
        &self.temperature_ranges
    }

    pub fn products(&self) -> &[(String, BTreeMap<String, String>)] {
        &self.products
    }

    pub fn product_names(&self) -> Vec<&str> {
        self.products.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn operating_conditions(&self) -> &Value {
        &self.operating_conditions
    }

    /// Lowest minimum and highest maximum over all ranges
    pub fn overall_range(&self) -> Option<(f64, f64)> {
        let mut ranges = self.temperature_ranges.iter().map(|(_, r)| *r);
        let first = ranges.next()?;
        Some(ranges.fold(first, |(lo, hi), (min, max)| (lo.min(min), hi.max(max))))
    }

    /// Whether a temperature (Celsius) is plausible for this domain.
    ///
    /// Inside any configured range passes; otherwise the overall range is
    /// widened by 100 below and 200 above. With no ranges, -50..=2000 applies.
    pub fn validate_temperature(&self, celsius: f64) -> bool {
        let Some((lo, hi)) = self.overall_range() else {
            return (-50.0..=2000.0).contains(&celsius);
        };
        if self
            .temperature_ranges
            .iter()
            .any(|(_, (min, max))| *min <= celsius && celsius <= *max)
        {
            return true;
        }
        lo - 100.0 <= celsius && celsius <= hi + 200.0
    }

    /// Pressure in bar against `operating_conditions.pressure.{min,max}`
    pub fn validate_pressure(&self, bar: f64) -> bool {
        let pressure = self.operating_conditions.get("pressure");
        let bound = |key: &str, default: f64| {
            pressure
                .and_then(|p| p.get(key))
                .and_then(Value::as_f64)
                .unwrap_or(default)
        };
        bound("min", DEFAULT_MIN_PRESSURE) <= bar && bar <= bound("max", DEFAULT_MAX_PRESSURE)
    }
}

fn parse_ranges(value: Option<&Value>) -> Vec<(String, (f64, f64))> {
    let Some(Value::Mapping(map)) = value else {
        return Vec::new();
    };

    let mut ranges = Vec::new();
    for (key, range) in map {
        let name = scalar_to_string(key);
        let bounds = match range {
            Value::Sequence(items) if items.len() == 2 => {
                match (items[0].as_f64(), items[1].as_f64()) {
                    (Some(min), Some(max)) => Some((min, max)),
                    _ => None,
                }
            }
            _ => None,
        };
        match bounds {
            Some(bounds) => ranges.push((name, bounds)),
            None => warn!(
                "Invalid temperature range for key '{}': {:?}. Expected a list of two numbers.",
                name, range
            ),
        }
    }
    ranges
}

fn parse_products(value: Option<&Value>) -> Vec<(String, BTreeMap<String, String>)> {
    let Some(Value::Mapping(map)) = value else {
        return Vec::new();
    };
    map.iter()
        .map(|(name, info)| {
            let fields = match info {
                Value::Mapping(fields) => fields
                    .iter()
                    .map(|(k, v)| (scalar_to_string(k), scalar_to_string(v)))
                    .collect(),
                _ => BTreeMap::new(),
            };
            (scalar_to_string(name), fields)
        })
        .collect()
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Sequence(items)) => items.iter().map(scalar_to_string).collect(),
        _ => Vec::new(),
    }
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        other => serde_yaml::to_string(other).unwrap_or_default().trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const THERMAL: &str = r#"
domain:
  name: thermal_processing
  description: Test thermal systems
temperature_ranges:
  low_temp: [200, 400]
  high_temp: [600, 900]
equipment_types: [reactor_a, reactor_b]
feedstocks: [biomass, plastic]
products:
  bio_oil: {description: Liquid fuel, typical_yield: "50%"}
  syngas: {description: Gas fuel}
process_types: [pyrolysis, gasification]
operating_conditions:
  pressure: {min: 1.0, max: 10.0}
"#;

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(THERMAL.as_bytes()).unwrap();
        let config = DomainConfig::load(file.path());

        assert_eq!(config.name, "thermal_processing");
        assert_eq!(config.description, "Test thermal systems");
        assert_eq!(
            config.temperature_ranges(),
            &[
                ("low_temp".to_string(), (200.0, 400.0)),
                ("high_temp".to_string(), (600.0, 900.0))
            ]
        );
        assert_eq!(config.equipment_types, vec!["reactor_a", "reactor_b"]);
        assert_eq!(config.product_names(), vec!["bio_oil", "syngas"]);
        assert_eq!(config.products()[0].1["typical_yield"], "50%");
    }

    #[test]
    fn missing_file_uses_general_defaults() {
        let config = DomainConfig::load(Path::new("/nonexistent/domain.yaml"));
        assert_eq!(config.name, "general");
        assert_eq!(config.description, "General technical analysis");
        assert!(config.temperature_ranges().is_empty());
    }

    #[test]
    fn malformed_ranges_are_skipped() {
        let config = DomainConfig::from_yaml_str(
            r#"
temperature_ranges:
  valid: [100, 200]
  invalid_single: [100]
  invalid_string: "100-200"
  invalid_mixed: [100, "high"]
"#,
        )
        .unwrap();
        let names: Vec<&str> = config.temperature_ranges().iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["valid"]);
    }

    #[test]
    fn temperature_validation_with_buffer() {
        let config = DomainConfig::from_yaml_str(THERMAL).unwrap();
        assert!(config.validate_temperature(300.0));
        assert!(config.validate_temperature(750.0));
        assert!(config.validate_temperature(100.0));
        assert!(config.validate_temperature(1100.0));
        assert!(!config.validate_temperature(-200.0));
        assert!(!config.validate_temperature(5000.0));
    }

    #[test]
    fn temperature_validation_without_ranges() {
        let config = DomainConfig::default();
        assert!(config.validate_temperature(25.0));
        assert!(config.validate_temperature(1500.0));
        assert!(!config.validate_temperature(-100.0));
        assert!(!config.validate_temperature(3000.0));
    }

    #[test]
    fn pressure_bounds_come_from_operating_conditions() {
        let config = DomainConfig::from_yaml_str(THERMAL).unwrap();
        assert!(config.validate_pressure(5.0));
        assert!(config.validate_pressure(1.0));
        assert!(config.validate_pressure(10.0));
        assert!(!config.validate_pressure(0.5));
        assert!(!config.validate_pressure(11.0));

        let defaults = DomainConfig::default();
        assert!(defaults.validate_pressure(0.1));
        assert!(!defaults.validate_pressure(0.05));
        assert!(defaults.validate_pressure(1000.0));
    }
}
