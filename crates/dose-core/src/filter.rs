//! Event-log filters.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::models::{DoseEvent, Timeliness};

/// Date-range choices of the event log.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum DateRange {
    #[default]
    All,
    Last7Days,
    Last30Days,
    Last90Days,
}

impl DateRange {
    /// Days covered, `None` for no limit.
    pub fn days(&self) -> Option<u64> {
        match self {
            DateRange::All => None,
            DateRange::Last7Days => Some(7),
            DateRange::Last30Days => Some(30),
            DateRange::Last90Days => Some(90),
        }
    }

    /// Earliest date kept, counting `today` as the first day.
    pub fn earliest(&self, today: NaiveDate) -> Option<NaiveDate> {
        self.days()
            .map(|days| today.checked_sub_days(Days::new(days - 1)).unwrap_or(NaiveDate::MIN))
    }

    /// Whether an event on `date` is inside the range.
    pub fn contains(&self, date: Option<NaiveDate>, today: NaiveDate) -> bool {
        match self.earliest(today) {
            None => true,
            Some(earliest) => date.is_some_and(|d| d >= earliest && d <= today),
        }
    }
}

/// Event-log filter selection. Unset fields match everything.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventFilter {
    pub timeliness: Option<Timeliness>,
    pub dose_size: Option<u32>,
    pub date_range: DateRange,
}

impl EventFilter {
    /// Filter that keeps everything.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_timeliness(mut self, timeliness: Timeliness) -> Self {
        self.timeliness = Some(timeliness);
        self
    }

    pub fn with_dose_size(mut self, dose_size: u32) -> Self {
        self.dose_size = Some(dose_size);
        self
    }

    pub fn with_date_range(mut self, date_range: DateRange) -> Self {
        self.date_range = date_range;
        self
    }

    pub fn matches(&self, event: &DoseEvent, today: NaiveDate) -> bool {
        if let Some(timeliness) = self.timeliness {
            if event.event.timeliness() != timeliness {
                return false;
            }
        }
        if let Some(dose_size) = self.dose_size {
            if event.dose_size != dose_size {
                return false;
            }
        }
        self.date_range.contains(event.event.day(), today)
    }

    /// Matching events, in input order.
    pub fn apply<'a>(&self, events: &'a [DoseEvent], today: NaiveDate) -> Vec<&'a DoseEvent> {
        events.iter().filter(|e| self.matches(e, today)).collect()
    }
}
