//! Bottle event models.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// Anomaly classifier attached to an event by ingestion.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Anomaly {
    /// Code 0
    None,
    /// Code 1: opened before the nearest dosing window
    Early,
    /// Code 2: opened after the nearest dosing window
    Late,
    /// Code 3: dose size mismatch or explicit non-ingestion
    DoseMismatch,
    /// Any other non-zero code
    Other(i64),
}

impl Anomaly {
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => Anomaly::None,
            1 => Anomaly::Early,
            2 => Anomaly::Late,
            3 => Anomaly::DoseMismatch,
            other => Anomaly::Other(other),
        }
    }

    pub fn code(&self) -> i64 {
        match self {
            Anomaly::None => 0,
            Anomaly::Early => 1,
            Anomaly::Late => 2,
            Anomaly::DoseMismatch => 3,
            Anomaly::Other(code) => *code,
        }
    }

    pub fn is_anomalous(&self) -> bool {
        !matches!(self, Anomaly::None)
    }
}

/// Event-log timeliness column.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Timeliness {
    OnTime,
    Early,
    Late,
}

impl Timeliness {
    pub fn label(&self) -> &'static str {
        match self {
            Timeliness::OnTime => "On time",
            Timeliness::Early => "Early",
            Timeliness::Late => "Late",
        }
    }
}

/// A pill-bottle event for one subject.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    /// Backend row id, when the backend assigns one
    pub row_id: Option<i64>,
    pub subject_id: String,
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    /// Local date-time derived from date and time
    pub timestamp: Option<NaiveDateTime>,
    /// Pills left in the bottle at this reading
    pub pill_count: Option<i64>,
    /// Bottle weight reading
    pub grams: Option<f64>,
    /// Adherence score snapshot (0.0 - 1.0)
    pub adherence_score: Option<f64>,
    /// Anomaly code as stored (0 = none)
    pub anomaly_code: i64,
}

impl Event {
    pub fn anomaly(&self) -> Anomaly {
        Anomaly::from_code(self.anomaly_code)
    }

    pub fn timeliness(&self) -> Timeliness {
        match self.anomaly() {
            Anomaly::Early => Timeliness::Early,
            Anomaly::Late => Timeliness::Late,
            _ => Timeliness::OnTime,
        }
    }

    /// Calendar day the event belongs to.
    pub fn day(&self) -> Option<NaiveDate> {
        self.timestamp.map(|ts| ts.date()).or(self.date)
    }

    /// Explicit "no dose taken" signal: code 3 with a zero snapshot.
    pub fn is_explicit_miss(&self) -> bool {
        self.anomaly() == Anomaly::DoseMismatch && self.adherence_score == Some(0.0)
    }

    /// Merge key for change notifications.
    pub fn content_key(&self) -> (String, Option<NaiveDateTime>) {
        (self.subject_id.clone(), self.timestamp)
    }
}

impl AsRef<Event> for Event {
    fn as_ref(&self) -> &Event {
        self
    }
}

/// An event with its reconstructed dose size.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DoseEvent {
    #[serde(flatten)]
    pub event: Event,
    /// Pills consumed since the previous reading (0 on refill or first reading)
    pub dose_size: u32,
}

impl AsRef<Event> for DoseEvent {
    fn as_ref(&self) -> &Event {
        &self.event
    }
}

/// One point of the pill-count chart.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PillCountPoint {
    pub timestamp: NaiveDateTime,
    pub pill_count: i64,
}

/// An event as written by ingestion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewEvent {
    pub subject_id: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub pill_count: Option<i64>,
    pub grams: Option<f64>,
    pub adherence_score: Option<f64>,
    pub anomaly_code: i64,
}

impl NewEvent {
    /// Create an anomaly-free event at the given local date-time.
    pub fn at(subject_id: impl Into<String>, at: NaiveDateTime, pill_count: Option<i64>) -> Self {
        Self {
            subject_id: subject_id.into(),
            date: at.date(),
            time: at.time(),
            pill_count,
            grams: None,
            adherence_score: None,
            anomaly_code: 0,
        }
    }
}
