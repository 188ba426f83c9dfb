// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! asmf: AI search/match framework
//!
//! Picks an AI backend (local Ollama or a cloud API) through a fallback
//! chain, recommends local models for the available VRAM, aggregates and
//! deduplicates search results, tracks items in a JSON store, checks
//! technical claims against a domain configuration and reviews pull
//! requests from a GitHub webhook.

pub mod analyzers;
pub mod config;
pub mod context;
pub mod domain;
pub mod error;
pub mod ollama;
pub mod parsers;
pub mod providers;
pub mod review;
pub mod scoring;
pub mod search;
pub mod selector;
pub mod setup;
pub mod tracker;
pub mod web;

pub use config::AppConfig;
pub use error::{AsmfError, Result};
