//! Normalized artifact records.

use chrono::{DateTime, NaiveDateTime};
use serde_json::{Map, Value};

use crate::error::{Result, StatsError};

/// One AQL result item, field name to value, exactly as returned.
pub type RawRecord = Map<String, Value>;

/// Stand-in for a missing uploader so unattributed artifacts still form a group.
pub const UNKNOWN_USER: &str = "unknown";

/// One artifact's metadata, normalized for reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRecord {
    pub name: String,
    pub repository: String,
    /// Size in bytes
    pub size: u64,
    /// Creation time as wall-clock time at the server; `None` when absent or unparseable
    pub created: Option<NaiveDateTime>,
    pub modified: Option<NaiveDateTime>,
    pub downloads: u64,
    /// Uploading user, or [`UNKNOWN_USER`]
    pub user: String,
}

impl ArtifactRecord {
    /// Normalizes the result item at position `index`.
    ///
    /// `name` and `repo` are required. Everything else falls back to a
    /// default: size and downloads to 0, timestamps to `None`, the uploader
    /// to [`UNKNOWN_USER`]. A size that is present but not a non-negative
    /// integer is an error.
    pub fn from_raw(index: usize, raw: &RawRecord) -> Result<Self> {
        let name = required_str(index, raw, "name")?;
        let repository = required_str(index, raw, "repo")?;
        let size = parse_size(index, raw.get("size"))?;

        let user = match raw.get("created_by").and_then(Value::as_str) {
            Some(user) if !user.trim().is_empty() => user.to_string(),
            _ => UNKNOWN_USER.to_string(),
        };

        Ok(Self {
            name,
            repository,
            size,
            created: parse_timestamp(raw.get("created")),
            modified: parse_timestamp(raw.get("modified")),
            downloads: download_count(raw),
            user,
        })
    }
}

fn required_str(index: usize, raw: &RawRecord, field: &str) -> Result<String> {
    match raw.get(field) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(StatsError::Transform {
            index,
            reason: format!("field '{}' must be a string, got {}", field, other),
        }),
        None => Err(StatsError::Transform {
            index,
            reason: format!("missing field '{}'", field),
        }),
    }
}

fn parse_size(index: usize, value: Option<&Value>) -> Result<u64> {
    let invalid = |v: &Value| StatsError::Transform {
        index,
        reason: format!("field 'size' must be a non-negative integer, got {}", v),
    };

    match value {
        None | Some(Value::Null) => Ok(0),
        Some(v) => match v {
            Value::Number(n) => n.as_u64().ok_or_else(|| invalid(v)),
            Value::String(s) => s.trim().parse::<u64>().map_err(|_| invalid(v)),
            _ => Err(invalid(v)),
        },
    }
}

/// Parses an RFC 3339 timestamp, keeping the server's wall-clock time.
fn parse_timestamp(value: Option<&Value>) -> Option<NaiveDateTime> {
    let text = value?.as_str()?;
    DateTime::parse_from_rfc3339(text.trim())
        .ok()
        .map(|dt| dt.naive_local())
}

/// Downloads live in the first entry of the `stats` array that `.include("stat")` adds.
fn download_count(raw: &RawRecord) -> u64 {
    raw.get("stats")
        .and_then(Value::as_array)
        .and_then(|stats| stats.first())
        .and_then(|stat| stat.get("downloads"))
        .and_then(Value::as_u64)
        .unwrap_or(0)
}
