//! Study subject models.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

/// Prescribed regimen for a subject.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Prescription {
    /// Doses expected per calendar day
    pub doses_per_day: u32,
    /// Pills taken at each dose
    pub pills_per_dose: u32,
    /// Pills dispensed into the bottle
    pub total_pills_prescribed: u32,
}

impl Prescription {
    /// Zeroed prescription used when the stored value cannot be read.
    pub fn zeroed() -> Self {
        Self::default()
    }

    /// Doses per day for calendar classification (non-positive means two).
    pub fn effective_doses_per_day(&self) -> u32 {
        if self.doses_per_day == 0 {
            crate::derive::DEFAULT_DOSES_PER_DAY
        } else {
            self.doses_per_day
        }
    }
}

/// A daily time-of-day interval during which a dose is expected.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DosingWindow {
    /// Window start ("HH:MM")
    pub start: String,
    /// Window end ("HH:MM")
    pub end: String,
}

impl DosingWindow {
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }

    /// Parsed window start, if well formed.
    pub fn start_time(&self) -> Option<NaiveTime> {
        parse_clock(&self.start)
    }

    /// Parsed window end, if well formed.
    pub fn end_time(&self) -> Option<NaiveTime> {
        parse_clock(&self.end)
    }
}

fn parse_clock(value: &str) -> Option<NaiveTime> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .ok()
}

/// A study subject with typed, defaulted fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Subject {
    /// Backend row id, when the backend assigns one
    pub row_id: Option<i64>,
    /// Study subject identifier
    pub subject_id: String,
    pub first_name: String,
    pub last_name: String,
    pub age: Option<u32>,
    pub sex: String,
    pub race: String,
    /// Display weight (e.g. "70 kg")
    pub weight: String,
    /// Display height (e.g. "180 cm")
    pub height: String,
    pub prescription: Prescription,
    pub dosing_windows: Vec<DosingWindow>,
    /// Current adherence score as stored (0.0 - 1.0)
    pub adherence_score: f64,
    /// Adherence score for display (0 - 100)
    pub adherence_percent: u8,
    /// Grams per pill, learned by ingestion
    pub pill_weight: Option<f64>,
}

impl Subject {
    /// "First Last" as shown in the subject picker.
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    /// Compact form used in histogram membership lists.
    pub fn summary(&self) -> SubjectSummary {
        SubjectSummary {
            subject_id: self.subject_id.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            adherence_percent: self.adherence_percent,
        }
    }
}

/// Subject reference carried by aggregate reports.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubjectSummary {
    pub subject_id: String,
    pub first_name: String,
    pub last_name: String,
    pub adherence_percent: u8,
}

/// Intake payload for a new subject.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewSubject {
    pub subject_id: String,
    pub first_name: String,
    pub last_name: String,
    pub age: u32,
    pub sex: String,
    pub race: String,
    pub weight: String,
    pub height: String,
    pub prescription: Prescription,
    pub dosing_windows: Vec<DosingWindow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pill_weight: Option<f64>,
}

impl NewSubject {
    /// Create an intake payload with a one-dose-a-day regimen.
    pub fn new(subject_id: String, first_name: String, last_name: String) -> Self {
        Self {
            subject_id,
            first_name,
            last_name,
            age: 0,
            sex: String::new(),
            race: String::new(),
            weight: String::new(),
            height: String::new(),
            prescription: Prescription {
                doses_per_day: 1,
                pills_per_dose: 1,
                total_pills_prescribed: 30,
            },
            dosing_windows: vec![DosingWindow::new("08:00", "08:30")],
            pill_weight: None,
        }
    }
}
