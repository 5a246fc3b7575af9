//! Derived report models: adherence calendar and aggregate histogram.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::subject::SubjectSummary;

/// Adherence classification of a single calendar day.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum CalendarDayStatus {
    Good,
    Partial,
    Missed,
    /// Outside the monitored date range
    NoData,
}

impl CalendarDayStatus {
    pub fn label(&self) -> &'static str {
        match self {
            CalendarDayStatus::Good => "good",
            CalendarDayStatus::Partial => "partial",
            CalendarDayStatus::Missed => "missed",
            CalendarDayStatus::NoData => "no data",
        }
    }
}

/// One day cell of the adherence calendar.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub status: CalendarDayStatus,
    /// Events recorded on this day
    pub event_count: u32,
    pub tooltip: String,
}

/// A month of the adherence calendar, laid out Sunday-first.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CalendarMonth {
    pub year: i32,
    pub month: u32,
    /// Blank cells before day 1 (Sunday = 0)
    pub leading_blanks: u32,
    pub days: Vec<CalendarDay>,
}

impl CalendarMonth {
    /// Grid cells in display order; `None` is a blank cell.
    pub fn cells(&self) -> Vec<Option<&CalendarDay>> {
        let mut cells: Vec<Option<&CalendarDay>> =
            (0..self.leading_blanks).map(|_| None).collect();
        cells.extend(self.days.iter().map(Some));
        cells
    }

    /// Count of days with the given status.
    pub fn count(&self, status: CalendarDayStatus) -> usize {
        self.days.iter().filter(|d| d.status == status).count()
    }
}

/// One adherence-range bucket of the aggregate histogram.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistogramBucket {
    /// Display range, e.g. "21-40%"
    pub range: String,
    pub min: u8,
    pub max: u8,
    pub count: usize,
    /// Share of all subjects, rounded
    pub percentage: u8,
    pub subjects: Vec<SubjectSummary>,
}

/// The five fixed adherence buckets.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Histogram {
    pub total_subjects: usize,
    pub buckets: Vec<HistogramBucket>,
}

/// Headline figures for the aggregate view.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AggregateStats {
    pub total_subjects: usize,
    pub average_adherence: u8,
    /// Subjects at or above 80%
    pub high_adherence: usize,
    /// Subjects below 60%
    pub low_adherence: usize,
    pub high_share: u8,
    pub low_share: u8,
    /// Subjects in the 81-100% bucket
    pub excellent: usize,
}
