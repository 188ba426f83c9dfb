// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Document parsers

pub mod patent;
pub mod pdf;

pub use patent::{ClaimType, PatentClaim, PatentDocument};
