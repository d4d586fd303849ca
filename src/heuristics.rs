//! Heuristic configuration: signal weights, the implemented-score threshold,
//! and the manual status override map.
//!
//! Both config files are optional on disk; a missing file leaves the defaults
//! in place, while a malformed file is a hard error.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// Classification outcome for a handler or packet.
///
/// `Missing` never applies to an analyzed handler; it exists for the chart and
/// count buckets where unregistered catalog IDs are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Implemented,
    Partial,
    Stub,
    Panic,
    Missing,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Implemented => "implemented",
            Status::Partial => "partial",
            Status::Stub => "stub",
            Status::Panic => "panic",
            Status::Missing => "missing",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Status::Implemented => "Implemented",
            Status::Partial => "Partial",
            Status::Stub => "Stub",
            Status::Panic => "Panic",
            Status::Missing => "Missing",
        }
    }

    /// Statuses a manual override may assign. `missing` is computed from the
    /// catalog and cannot be forced by hand.
    pub fn parse_override(value: &str) -> Option<Status> {
        match value {
            "implemented" => Some(Status::Implemented),
            "partial" => Some(Status::Partial),
            "stub" => Some(Status::Stub),
            "panic" => Some(Status::Panic),
            _ => None,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeuristicsConfig {
    pub weights: Weights,
    pub thresholds: Thresholds,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Weights {
    pub send_message: i64,
    pub response_struct: i64,
    pub request_struct: i64,
    pub proto_setter: i64,
    pub request_parse: i64,
    pub client_usage: i64,
    pub commander_usage: i64,
    pub orm_usage: i64,
    pub misc_usage: i64,
    pub db_write: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub implemented_min: i64,
}

impl Default for HeuristicsConfig {
    fn default() -> Self {
        Self {
            weights: Weights::default(),
            thresholds: Thresholds::default(),
        }
    }
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            send_message: 3,
            response_struct: 2,
            request_struct: 1,
            proto_setter: 1,
            request_parse: 1,
            client_usage: 1,
            commander_usage: 2,
            orm_usage: 2,
            misc_usage: 1,
            db_write: 2,
        }
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self { implemented_min: 4 }
    }
}

pub fn load_heuristics(path: &Path) -> Result<HeuristicsConfig> {
    match std::fs::read_to_string(path) {
        Ok(data) => serde_json::from_str(&data)
            .with_context(|| format!("parse heuristics config {}", path.display())),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(HeuristicsConfig::default()),
        Err(err) => Err(err).with_context(|| format!("read {}", path.display())),
    }
}

/// Load the manual override map: packet-ID string to status string. Every
/// status must be one of the four override-legal values.
pub fn load_overrides(path: &Path) -> Result<BTreeMap<String, Status>> {
    let raw: BTreeMap<String, String> = match std::fs::read_to_string(path) {
        Ok(data) => serde_json::from_str(&data)
            .with_context(|| format!("parse overrides {}", path.display()))?,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(err) => return Err(err).with_context(|| format!("read {}", path.display())),
    };
    let mut overrides = BTreeMap::new();
    for (id, value) in raw {
        let Some(status) = Status::parse_override(&value) else {
            bail!("invalid override status {value:?} for packet {id}");
        };
        overrides.insert(id, status);
    }
    Ok(overrides)
}
