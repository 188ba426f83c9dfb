// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! PDF text and metadata extraction

use std::path::Path;
use tracing::{debug, info, warn};

use crate::{AsmfError, Result};

/// Extract all text from a PDF
pub fn extract_text(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(AsmfError::NotFound(format!("PDF not found: {}", path.display())));
    }
    let bytes = std::fs::read(path)?;
    let text = pdf_extract::extract_text_from_mem(&bytes)
        .map_err(|e| AsmfError::Pdf(format!("Text extraction failed: {}", e)))?;

    if text.trim().is_empty() {
        warn!("No text extracted from {:?}", path);
    } else {
        info!("Extracted {} total characters from {:?}", text.len(), path);
    }
    Ok(text)
}

/// `/Info /Title` from the document trailer, if set
pub fn document_title(path: &Path) -> Option<String> {
    let bytes = std::fs::read(path).ok()?;
    let doc = match lopdf::Document::load_mem(&bytes) {
        Ok(doc) => doc,
        Err(e) => {
            debug!("Failed to load PDF metadata: {}", e);
            return None;
        }
    };

    let info = doc.trailer.get(b"Info").ok()?;
    let dict = match info.as_reference() {
        Ok(id) => doc.get_dictionary(id).ok()?,
        Err(_) => info.as_dict().ok()?,
    };
    let raw = dict.get(b"Title").ok()?.as_str().ok()?;
    let title = decode_pdf_string(raw);
    let title = title.trim();
    (!title.is_empty()).then(|| title.to_string())
}

/// PDF text strings are UTF-16BE with a BOM, or a single-byte encoding
fn decode_pdf_string(raw: &[u8]) -> String {
    if let Some(body) = raw.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = body
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    String::from_utf8_lossy(raw).into_owned()
}
