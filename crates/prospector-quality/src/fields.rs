//! Field lookups in raw JSON payloads.
//!
//! Paths are dotted (`company.name`). Arrays are searched element-wise at
//! every level, so `posts.postedAt` matches when any post carries a date.

use chrono::{DateTime, NaiveDate, Utc};
use prospector_core::Timestamp;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A parsed dotted field path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    /// Parse `a.b.c`; `None` if any segment is empty.
    #[must_use]
    pub fn parse(path: &str) -> Option<Self> {
        let segments: Vec<String> = path.trim().split('.').map(str::to_string).collect();
        if segments.iter().any(|s| s.trim().is_empty()) {
            return None;
        }
        Some(Self(segments))
    }

    /// Path segments.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Whether the payload has a non-empty value at this path.
    #[must_use]
    pub fn is_present(&self, payload: &Value) -> bool {
        let mut found = false;
        visit(payload, &self.0, &mut |v| {
            if !is_empty_value(v) {
                found = true;
            }
        });
        found
    }

    /// Most recent timestamp found at this path.
    #[must_use]
    pub fn latest_timestamp(&self, payload: &Value) -> Option<Timestamp> {
        let mut latest: Option<DateTime<Utc>> = None;
        visit(payload, &self.0, &mut |v| {
            if let Some(ts) = v.as_str().and_then(parse_timestamp) {
                latest = Some(latest.map_or(ts, |l| l.max(ts)));
            }
        });
        latest.map(Timestamp::from)
    }
}

impl TryFrom<String> for FieldPath {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("invalid field path '{value}'"))
    }
}

impl From<FieldPath> for String {
    fn from(path: FieldPath) -> Self {
        path.to_string()
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

fn visit<F: FnMut(&Value)>(value: &Value, path: &[String], f: &mut F) {
    if let Value::Array(items) = value {
        for item in items {
            visit(item, path, f);
        }
        return;
    }
    match path.split_first() {
        None => f(value),
        Some((head, rest)) => {
            if let Some(next) = value.get(head.as_str()) {
                visit(next, rest, f);
            }
        }
    }
}

/// Whether a JSON value carries no information.
#[must_use]
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.iter().all(is_empty_value),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}
