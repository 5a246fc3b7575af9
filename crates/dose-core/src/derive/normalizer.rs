//! Backend row normalizer.
//!
//! Handles:
//! - Loosely typed columns (numbers, numeric strings, nulls)
//! - JSON-encoded prescription and dosing-window columns
//! - Date/time reconstruction across the formats the ingestion tools write
//! - Fraction → display percentage conversion

use std::borrow::Cow;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::{Map, Value};
use tracing::debug;

use crate::models::{DosingWindow, Event, Prescription, RawEventRow, RawSubjectRow, Subject};

/// Normalizer for raw backend rows.
pub struct RowNormalizer {
    /// Calendar date formats, tried in order
    date_formats: Vec<String>,
    /// Time-of-day formats, tried in order
    time_formats: Vec<String>,
    /// Combined date-time formats (besides RFC 3339)
    timestamp_formats: Vec<String>,
}

impl Default for RowNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl RowNormalizer {
    /// Create a normalizer with the default format tables.
    pub fn new() -> Self {
        Self {
            date_formats: Self::default_date_formats(),
            time_formats: Self::default_time_formats(),
            timestamp_formats: Self::default_timestamp_formats(),
        }
    }

    /// Normalize a subject row.
    pub fn normalize_subject(&self, row: &RawSubjectRow) -> Subject {
        let adherence_score = value_as_f64(&row.curr_adherence_score).unwrap_or(0.0);

        Subject {
            row_id: value_as_i64(&row.id),
            subject_id: value_as_string(&row.subject_id),
            first_name: row.first_name.clone().unwrap_or_default(),
            last_name: row.last_name.clone().unwrap_or_default(),
            age: value_as_i64(&row.age).and_then(|age| u32::try_from(age).ok()),
            sex: row.sex.clone().unwrap_or_default(),
            race: row.race.clone().unwrap_or_default(),
            weight: value_as_string(&row.weight),
            height: value_as_string(&row.height),
            prescription: self.parse_prescription(&row.prescription),
            dosing_windows: self.parse_dosing_windows(&row.dosing_windows),
            adherence_score,
            adherence_percent: adherence_percent(adherence_score),
            pill_weight: value_as_f64(&row.pill_weight),
        }
    }

    /// Normalize a batch of subject rows, keeping order.
    pub fn normalize_subjects(&self, rows: &[RawSubjectRow]) -> Vec<Subject> {
        rows.iter().map(|row| self.normalize_subject(row)).collect()
    }

    /// Normalize an event row.
    pub fn normalize_event(&self, row: &RawEventRow) -> Event {
        let date_str = row.date.as_deref();
        let time_str = row.time.as_deref();

        let timestamp = self.derive_timestamp(date_str, time_str);
        let date = timestamp
            .map(|ts| ts.date())
            .or_else(|| date_str.and_then(|d| self.parse_date(d)));
        let time = timestamp
            .map(|ts| ts.time())
            .or_else(|| time_str.and_then(|t| self.parse_time(t)));

        Event {
            row_id: value_as_i64(&row.id),
            subject_id: value_as_string(&row.subject_id),
            date,
            time,
            timestamp,
            pill_count: value_as_i64(&row.pill_count),
            grams: value_as_f64(&row.grams),
            adherence_score: value_as_f64(&row.adherence_score),
            anomaly_code: value_as_i64(&row.anomaly_id).unwrap_or(0),
        }
    }

    /// Normalize a batch of event rows, keeping order.
    pub fn normalize_events(&self, rows: &[RawEventRow]) -> Vec<Event> {
        rows.iter().map(|row| self.normalize_event(row)).collect()
    }

    /// Read a prescription column; anything unreadable becomes `{0,0,0}`.
    pub fn parse_prescription(&self, value: &Value) -> Prescription {
        let Some(decoded) = decode_structured(value, "prescription") else {
            return Prescription::zeroed();
        };

        match decoded.as_ref() {
            Value::Object(map) => Prescription {
                doses_per_day: field_u32(map, &["dosesPerDay", "doses_per_day"]),
                pills_per_dose: field_u32(map, &["pillsPerDose", "pills_per_dose"]),
                total_pills_prescribed: field_u32(
                    map,
                    &[
                        "totalPillsPrescribed",
                        "total_pills_prescribed",
                        "pillCount",
                        "pill_count",
                    ],
                ),
            },
            other => {
                debug!(value = %other, "prescription is not an object, using zeroed prescription");
                Prescription::zeroed()
            }
        }
    }

    /// Read a dosing-window column; anything unreadable becomes an empty list.
    pub fn parse_dosing_windows(&self, value: &Value) -> Vec<DosingWindow> {
        let Some(decoded) = decode_structured(value, "dosingWindows") else {
            return Vec::new();
        };

        match decoded.as_ref() {
            Value::Array(items) => items
                .iter()
                .filter_map(|item| match item {
                    Value::Object(map) => Some(DosingWindow::new(
                        map.get("start").map(value_as_string).unwrap_or_default(),
                        map.get("end").map(value_as_string).unwrap_or_default(),
                    )),
                    Value::String(at) => Some(DosingWindow::new(at.trim(), at.trim())),
                    _ => None,
                })
                .collect(),
            // Labelled form written by the ingestion scripts: {"morning": "08:00", ...}
            Value::Object(map) => {
                let mut windows: Vec<DosingWindow> = map
                    .values()
                    .filter_map(|v| v.as_str())
                    .map(|at| DosingWindow::new(at.trim(), at.trim()))
                    .collect();
                windows.sort_by_key(|w| (w.start_time().is_none(), w.start_time()));
                windows
            }
            other => {
                debug!(value = %other, "dosing windows are not a list, using none");
                Vec::new()
            }
        }
    }

    /// Reconstruct a local timestamp from separate date and time fields.
    ///
    /// A time field that already holds a full timestamp wins.
    pub fn derive_timestamp(&self, date: Option<&str>, time: Option<&str>) -> Option<NaiveDateTime> {
        if let Some(ts) = time.and_then(|t| self.parse_timestamp(t)) {
            return Some(ts);
        }

        let date = self.parse_date(date?)?;
        let time = self.parse_time(time?)?;
        Some(date.and_time(time))
    }

    /// Parse a calendar date.
    pub fn parse_date(&self, value: &str) -> Option<NaiveDate> {
        let value = value.trim();
        if value.is_empty() {
            return None;
        }
        self.date_formats
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
            .or_else(|| self.parse_timestamp(value).map(|ts| ts.date()))
    }

    /// Parse a time of day.
    pub fn parse_time(&self, value: &str) -> Option<NaiveTime> {
        let value = value.trim();
        if value.is_empty() {
            return None;
        }
        self.time_formats
            .iter()
            .find_map(|fmt| NaiveTime::parse_from_str(value, fmt).ok())
    }

    /// Parse a combined date-time.
    pub fn parse_timestamp(&self, value: &str) -> Option<NaiveDateTime> {
        let value = value.trim();
        if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
            return Some(ts.naive_local());
        }
        self.timestamp_formats
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
    }

    /// Accept an additional date format.
    pub fn add_date_format(&mut self, format: &str) {
        self.date_formats.push(format.to_string());
    }

    /// Accept an additional time-of-day format.
    pub fn add_time_format(&mut self, format: &str) {
        self.time_formats.push(format.to_string());
    }

    fn default_date_formats() -> Vec<String> {
        // Two-digit years before four-digit: %Y would read "25" as year 25.
        ["%Y-%m-%d", "%m/%d/%y", "%m/%d/%Y"]
            .iter()
            .map(|f| f.to_string())
            .collect()
    }

    fn default_time_formats() -> Vec<String> {
        ["%H:%M:%S%.f", "%H:%M", "%I:%M %p", "%I:%M:%S %p"]
            .iter()
            .map(|f| f.to_string())
            .collect()
    }

    fn default_timestamp_formats() -> Vec<String> {
        [
            "%Y-%m-%dT%H:%M:%S%.f",
            "%Y-%m-%d %H:%M:%S%.f",
            "%Y-%m-%dT%H:%M",
            "%Y-%m-%d %H:%M",
        ]
        .iter()
        .map(|f| f.to_string())
        .collect()
    }
}

/// Convert a stored 0.0 - 1.0 score into a 0 - 100 display percentage.
///
/// Rounds half up; representation error is settled first so that
/// 0.845 gives 85 rather than 84.
pub fn adherence_percent(fraction: f64) -> u8 {
    if !fraction.is_finite() {
        return 0;
    }
    let scaled = fraction * 100.0;
    let settled = (scaled * 1e6).round() / 1e6;
    (settled + 0.5).floor().clamp(0.0, 100.0) as u8
}

/// Decode a column that may hold structured JSON or a JSON-encoded string.
fn decode_structured<'a>(value: &'a Value, column: &str) -> Option<Cow<'a, Value>> {
    match value {
        Value::Null => None,
        Value::String(encoded) => match serde_json::from_str::<Value>(encoded) {
            Ok(decoded) if !decoded.is_null() => Some(Cow::Owned(decoded)),
            Ok(_) => None,
            Err(e) => {
                debug!(column, error = %e, "unreadable JSON column, using default");
                None
            }
        },
        other => Some(Cow::Borrowed(other)),
    }
}

fn field_u32(map: &Map<String, Value>, keys: &[&str]) -> u32 {
    keys.iter()
        .find_map(|key| map.get(*key).and_then(value_as_i64))
        .map(|n| u32::try_from(n.max(0)).unwrap_or(u32::MAX))
        .unwrap_or(0)
}

/// Read an integer from a number or numeric string.
pub(crate) fn value_as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.round() as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(|f| f.round() as i64)
            })
        }
        _ => None,
    }
}

/// Read a float from a number or numeric string.
pub(crate) fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

/// Display form of a scalar column; null and structures become "".
pub(crate) fn value_as_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}
