//! Raw backend rows, as delivered before normalization.
//!
//! Loosely typed columns stay as [`serde_json::Value`]: the hosted tables
//! hold a mix of numbers, numeric strings, JSON-encoded strings and nulls.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A row of the `subjects` relation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct RawSubjectRow {
    pub id: Value,
    pub subject_id: Value,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub age: Value,
    pub sex: Option<String>,
    pub race: Option<String>,
    pub weight: Value,
    pub height: Value,
    /// Structured object or JSON-encoded string
    pub prescription: Value,
    /// Structured array/object or JSON-encoded string
    pub dosing_windows: Value,
    pub curr_adherence_score: Value,
    pub pill_weight: Value,
}

/// A row of the `events` relation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct RawEventRow {
    pub id: Value,
    pub subject_id: Value,
    pub date: Option<String>,
    /// Time of day, or occasionally a full timestamp
    pub time: Option<String>,
    pub pill_count: Value,
    pub grams: Value,
    pub adherence_score: Value,
    pub anomaly_id: Value,
}
