// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

#![no_main]

use libfuzzer_sys::fuzz_target;
use once_cell::sync::Lazy;

use asmf::domain::{DomainConfig, DomainExpert};

static EXPERT: Lazy<DomainExpert> = Lazy::new(|| {
    let config = DomainConfig::from_yaml_str(
        "domain: {name: thermal}\ntemperature_ranges:\n  pyrolysis: [300, 600]\n  gasification: [600, 900]\n",
    )
    .unwrap_or_default();
    DomainExpert::new(config)
});

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    let doc = asmf::parsers::patent::parse_text(text);
    for claim in &doc.claims {
        assert!(claim.depends_on.windows(2).all(|w| w[0] < w[1]));
    }

    let _ = asmf::scoring::parse_scores(text);
    let _ = asmf::review::truncate_diff(text, 64);
    let _ = asmf::config::AppConfig::from_json_str(text);
    let _ = DomainConfig::from_yaml_str(text);

    let temperature = EXPERT.validate_temperature_claim(text);
    if EXPERT.extract_temperatures(text).is_empty() {
        assert!(temperature.valid);
    }
    let balance = EXPERT.check_mass_balance(text);
    if EXPERT.extract_percentages(text).iter().any(|p| *p > 105) {
        assert!(!balance.valid);
    }
});
