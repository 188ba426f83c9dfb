// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Status tracking for items moving through a search/evaluate workflow
//!
//! Items live in a single JSON array on disk. Every mutation rewrites the
//! whole file; there is no locking, so concurrent writers race and the last
//! one wins. A store that cannot be read is an error, never an empty start.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, error, info, warn};

use crate::search::{md5_hex, NormalizedResult};
use crate::{AsmfError, Result};

/// Keys owned by the tracker; input fields with these names are replaced
const RESERVED_KEYS: [&str; 5] = ["id", "status", "tracked_at", "updated_at", "history"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    New,
    InProgress,
    Completed,
    Rejected,
}

impl Status {
    pub const ALL: [Status; 4] = [Status::New, Status::InProgress, Status::Completed, Status::Rejected];

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::New => "new",
            Status::InProgress => "in_progress",
            Status::Completed => "completed",
            Status::Rejected => "rejected",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Status {
    type Err = AsmfError;

    fn from_str(s: &str) -> Result<Self> {
        Status::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| AsmfError::InvalidStatus(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryAction {
    Tracked,
    StatusChange,
}

/// One entry in an item's history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,
    pub action: HistoryAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_status: Option<Status>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_status: Option<Status>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// A tracked item: tracker bookkeeping plus whatever fields it was tracked with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedItem {
    pub id: String,
    pub status: Status,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub tracked_at: DateTime<Utc>,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub updated_at: DateTime<Utc>,
    pub history: Vec<HistoryEntry>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl TrackedItem {
    pub fn field_str(&self, key: &str) -> &str {
        self.fields.get(key).and_then(Value::as_str).unwrap_or("")
    }
}

/// RFC 3339, or a naive ISO timestamp taken as UTC
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|naive| Utc.from_utc_datetime(&naive))
        })
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {}", raw)))
}

/// Stable id: MD5 of the link, or of `title|description` without one
pub fn generate_id(item: &Map<String, Value>) -> String {
    let text = |key: &str| item.get(key).and_then(Value::as_str).unwrap_or("");
    let link = text("link");
    let digest = if link.is_empty() {
        md5_hex(&format!("{}|{}", text("title"), text("description")))
    } else {
        md5_hex(link)
    };
    digest[..16].to_string()
}

/// JSON-file-backed item tracker
pub struct Tracker {
    path: PathBuf,
    items: Vec<TrackedItem>,
}

impl Tracker {
    /// Open (or start) the store at `path`, creating parent directories.
    /// Fails on a store that exists but cannot be read or parsed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let items = load(&path)?;
        debug!("Loaded {} tracked items from {:?}", items.len(), path);
        Ok(Self { path, items })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `items` to disk, then make them current
    fn commit(&mut self, items: Vec<TrackedItem>) -> Result<()> {
        let json = serde_json::to_string_pretty(&items)?;
        fs::write(&self.path, json)?;
        self.items = items;
        Ok(())
    }

    /// Add an item; `None` if an item with the same id is already tracked
    pub fn track(&mut self, item: &Map<String, Value>, status: Status) -> Result<Option<String>> {
        let id = generate_id(item);
        if self.get_by_id(&id).is_some() {
            debug!("Duplicate item: {}", item.get("title").and_then(serde_json::Value::as_str).unwrap_or(""));
            return Ok(None);
        }

        let mut fields = item.clone();
        for key in RESERVED_KEYS {
            fields.remove(key);
        }

        let now = Utc::now();
        let mut items = self.items.clone();
        items.push(TrackedItem {
            id: id.clone(),
            status,
            tracked_at: now,
            updated_at: now,
            history: vec![HistoryEntry {
                timestamp: now,
                action: HistoryAction::Tracked,
                status: Some(status),
                old_status: None,
                new_status: None,
                note: None,
            }],
            fields,
        });
        self.commit(items)?;

        info!("Tracked item: {}", id);
        Ok(Some(id))
    }

    /// Track a search result with all its fields
    pub fn track_result(&mut self, result: &NormalizedResult, status: Status) -> Result<Option<String>> {
        match serde_json::to_value(result)? {
            Value::Object(map) => self.track(&map, status),
            _ => Err(AsmfError::InvalidInput("search result is not an object".to_string())),
        }
    }

    /// Move an item to any status, recording the change
    pub fn update_status(&mut self, id: &str, new_status: Status, note: Option<&str>) -> Result<()> {
        let mut items = self.items.clone();
        let item = items
            .iter_mut()
            .find(|item| item.id == id)
            .ok_or_else(|| AsmfError::NotFound(id.to_string()))?;

        let old_status = item.status;
        let now = Utc::now();
        item.status = new_status;
        item.updated_at = now;
        item.history.push(HistoryEntry {
            timestamp: now,
            action: HistoryAction::StatusChange,
            status: None,
            old_status: Some(old_status),
            new_status: Some(new_status),
            note: note.filter(|n| !n.is_empty()).map(str::to_string),
        });

        self.commit(items)?;
        info!("Updated {}: {} -> {}", id, old_status, new_status);
        Ok(())
    }

    pub fn get_by_id(&self, id: &str) -> Option<&TrackedItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn get_all(&self, status: Option<Status>) -> Vec<&TrackedItem> {
        self.items
            .iter()
            .filter(|item| status.map_or(true, |s| item.status == s))
            .collect()
    }

    /// Remove an item; returns whether anything was removed
    pub fn delete(&mut self, id: &str) -> Result<bool> {
        let before = self.items.len();
        let items: Vec<TrackedItem> = self.items.iter().filter(|item| item.id != id).cloned().collect();
        self.commit(items)?;
        let removed = self.items.len() < before;
        if removed {
            info!("Deleted item: {}", id);
        }
        Ok(removed)
    }

    pub fn clear_all(&mut self) -> Result<()> {
        self.commit(Vec::new())?;
        info!("Cleared all tracked items");
        Ok(())
    }

    /// Item count per status; every status is present
    pub fn stats(&self) -> BTreeMap<Status, usize> {
        let mut stats: BTreeMap<Status, usize> = Status::ALL.into_iter().map(|s| (s, 0)).collect();
        for item in &self.items {
            *stats.entry(item.status).or_insert(0) += 1;
        }
        stats
    }

    /// Write items as CSV; columns are every key except `history`, sorted.
    /// Returns the number of rows written (nothing is written for zero).
    pub fn export_csv(&self, output: &Path, status: Option<Status>) -> Result<usize> {
        let items = self.get_all(status);
        if items.is_empty() {
            warn!("No items to export");
            return Ok(0);
        }

        let rows: Vec<Map<String, Value>> = items
            .iter()
            .map(|item| match serde_json::to_value(item) {
                Ok(Value::Object(map)) => Ok(map),
                Ok(_) => Ok(Map::new()),
                Err(e) => Err(AsmfError::from(e)),
            })
            .collect::<Result<_>>()?;

        let columns: Vec<String> = rows
            .iter()
            .flat_map(|row| row.keys().cloned())
            .filter(|key| key != "history")
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut writer = csv::Writer::from_path(output)?;
        writer.write_record(&columns)?;
        for row in &rows {
            writer.write_record(columns.iter().map(|key| cell(row.get(key))))?;
        }
        writer.flush()?;

        info!("Exported {} items to {:?}", rows.len(), output);
        Ok(rows.len())
    }
}

fn load(path: &Path) -> Result<Vec<TrackedItem>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|e| {
        error!("Failed to load tracked items from {:?}: {}", path, e);
        AsmfError::Parse(format!("tracker store {}: {}", path.display(), e))
    })
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
