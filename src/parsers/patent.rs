// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Patent text parsing: title, abstract and numbered claims

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, info};

use super::pdf;
use crate::Result;

/// Largest `claims A-B` span expanded into individual numbers
const MAX_CLAIM_RANGE: u32 = 500;

static CLAIMS_HEADERS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)CLAIMS?\s*\n",
        r"(?i)What is claimed(?: is)?:?\s*\n",
        r"(?i)We claim:?\s*\n",
        r"(?i)I claim:?\s*\n",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

/// Blank line then an upper-case heading ends the claims
static CLAIMS_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n[ \t]*\n[ \t]*[A-Z]{2,}").expect("valid regex"));

static ABSTRACT_START: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)ABSTRACT\s+").expect("valid regex"));

/// Blank line then any letter ends the abstract
static ABSTRACT_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n[ \t]*\n[ \t]*[A-Za-z]").expect("valid regex"));

static CLAIM_START: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^[ \t]*(\d+)\.\s+").expect("valid regex"));

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

static DEP_SINGLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)(?:of|in)\s+claim\s+(\d+)").expect("valid regex"));

static DEP_RANGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:of|in)\s+claims\s+(\d+)\s*-\s*(\d+)").expect("valid regex"));

static DEP_LIST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:of|in)\s+(?:any of\s+)?claims?\s+([\d,\s]+(?:(?:or|and)\s+\d+)?)").expect("valid regex")
});

static NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimType {
    Independent,
    Dependent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatentClaim {
    pub number: u32,
    pub text: String,
    pub claim_type: ClaimType,
    pub depends_on: Vec<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatentDocument {
    pub title: Option<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    pub claims: Vec<PatentClaim>,
}

impl PatentDocument {
    pub fn independent_claims(&self) -> impl Iterator<Item = &PatentClaim> {
        self.claims.iter().filter(|c| c.claim_type == ClaimType::Independent)
    }

    pub fn dependent_claims(&self) -> impl Iterator<Item = &PatentClaim> {
        self.claims.iter().filter(|c| c.claim_type == ClaimType::Dependent)
    }
}

/// Parse a patent PDF; the PDF title metadata fills in a missing title
pub fn parse_pdf(path: &Path) -> Result<PatentDocument> {
    info!("Parsing patent PDF: {:?}", path);
    let text = pdf::extract_text(path)?;
    let mut doc = parse_text(&text);
    if doc.title.is_none() {
        doc.title = pdf::document_title(path);
    }
    info!("Extracted {} claims from {:?}", doc.claims.len(), path);
    Ok(doc)
}

/// Parse already-extracted patent text. Missing sections are left empty.
pub fn parse_text(text: &str) -> PatentDocument {
    PatentDocument {
        title: extract_title(text),
        abstract_text: extract_abstract(text),
        claims: extract_claims(text),
    }
}

/// First reasonably sized, not all-caps line among the first 20
pub fn extract_title(text: &str) -> Option<String> {
    text.split('\n')
        .take(20)
        .map(str::trim)
        .find(|line| {
            let len = line.chars().count();
            len > 5 && len < 200 && !is_all_upper(line) && !line.starts_with("United States Patent")
        })
        .map(str::to_string)
}

pub fn extract_abstract(text: &str) -> Option<String> {
    let start = ABSTRACT_START.find(text)?;
    let rest = &text[start.end()..];
    let end = ABSTRACT_END.find(rest)?;
    let abstract_text = rest[..end.start()].trim();
    (!abstract_text.is_empty()).then(|| abstract_text.to_string())
}

/// Body of the claims section, from the first header pattern that matches
pub fn claims_section(text: &str) -> Option<&str> {
    let header = CLAIMS_HEADERS.iter().find_map(|re| re.find(text))?;
    let rest = &text[header.end()..];
    let end = CLAIMS_END.find(rest).map(|m| m.start()).unwrap_or(rest.len());
    Some(&rest[..end])
}

pub fn extract_claims(text: &str) -> Vec<PatentClaim> {
    let Some(section) = claims_section(text) else {
        debug!("No claims section found");
        return Vec::new();
    };

    let starts: Vec<(usize, usize, u32)> = CLAIM_START
        .captures_iter(section)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let number = caps.get(1)?.as_str().parse().ok()?;
            Some((whole.start(), whole.end(), number))
        })
        .collect();

    starts
        .iter()
        .enumerate()
        .map(|(i, &(_, body_start, number))| {
            let body_end = starts.get(i + 1).map(|next| next.0).unwrap_or(section.len());
            let text = clean_claim_text(&section[body_start..body_end]);
            let depends_on = parse_dependencies(&text);
            let claim_type = if depends_on.is_empty() {
                ClaimType::Independent
            } else {
                ClaimType::Dependent
            };
            PatentClaim { number, text, claim_type, depends_on }
        })
        .collect()
}

fn clean_claim_text(text: &str) -> String {
    WHITESPACE.replace_all(text, " ").trim().to_string()
}

/// Claim numbers referenced as "of claim N", "claims A-B" or "any of claims A, B"
pub fn parse_dependencies(claim_text: &str) -> Vec<u32> {
    let mut deps = BTreeSet::new();

    for caps in DEP_SINGLE.captures_iter(claim_text) {
        if let Some(n) = caps.get(1).and_then(|m| m.as_str().parse().ok()) {
            deps.insert(n);
        }
    }

    for caps in DEP_RANGE.captures_iter(claim_text) {
        let bounds = (
            caps.get(1).and_then(|m| m.as_str().parse::<u32>().ok()),
            caps.get(2).and_then(|m| m.as_str().parse::<u32>().ok()),
        );
        if let (Some(start), Some(end)) = bounds {
            if start <= end && end - start <= MAX_CLAIM_RANGE {
                deps.extend(start..=end);
            }
        }
    }

    for caps in DEP_LIST.captures_iter(claim_text) {
        if let Some(list) = caps.get(1) {
            deps.extend(NUMBER.find_iter(list.as_str()).filter_map(|m| m.as_str().parse::<u32>().ok()));
        }
    }

    deps.into_iter().collect()
}

fn is_all_upper(s: &str) -> bool {
    s.chars().any(char::is_uppercase) && !s.chars().any(char::is_lowercase)
}
