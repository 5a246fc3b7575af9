//! Month calendar heatmap of daily adherence.

use std::collections::BTreeMap;

use chrono::{Datelike, Months, NaiveDate};

use super::{DeriveError, DeriveResult, DEFAULT_DOSES_PER_DAY};
use crate::models::{CalendarDay, CalendarDayStatus, CalendarMonth, Event};

/// Doses per day used for classification; non-positive means the default.
pub fn effective_doses_per_day(doses_per_day: i64) -> u32 {
    if doses_per_day <= 0 {
        DEFAULT_DOSES_PER_DAY
    } else {
        u32::try_from(doses_per_day).unwrap_or(u32::MAX)
    }
}

/// Classify one day.
///
/// `observed` is the first and last day with any event for the subject.
pub fn classify_day(
    date: NaiveDate,
    day_events: &[&Event],
    observed: Option<(NaiveDate, NaiveDate)>,
    doses_per_day: u32,
) -> CalendarDayStatus {
    let Some((first, last)) = observed else {
        return CalendarDayStatus::NoData;
    };
    if date < first || date > last {
        return CalendarDayStatus::NoData;
    }
    if day_events.is_empty() {
        return CalendarDayStatus::Missed;
    }
    if day_events.iter().any(|e| e.is_explicit_miss()) {
        return CalendarDayStatus::Missed;
    }
    if day_events.iter().any(|e| e.anomaly().is_anomalous())
        || (day_events.len() as u64) < u64::from(doses_per_day)
    {
        return CalendarDayStatus::Partial;
    }
    CalendarDayStatus::Good
}

/// Build the calendar for `year`/`month` from a subject's events.
pub fn build_calendar_month<E: AsRef<Event>>(
    events: &[E],
    doses_per_day: i64,
    year: i32,
    month: u32,
) -> DeriveResult<CalendarMonth> {
    let first_day =
        NaiveDate::from_ymd_opt(year, month, 1).ok_or(DeriveError::InvalidMonth { year, month })?;
    let next_month = first_day
        .checked_add_months(Months::new(1))
        .ok_or(DeriveError::InvalidMonth { year, month })?;
    let doses = effective_doses_per_day(doses_per_day);

    let mut by_day: BTreeMap<NaiveDate, Vec<&Event>> = BTreeMap::new();
    for event in events.iter().map(|e| e.as_ref()) {
        if let Some(day) = event.day() {
            by_day.entry(day).or_default().push(event);
        }
    }

    let observed = match (by_day.keys().next(), by_day.keys().next_back()) {
        (Some(first), Some(last)) => Some((*first, *last)),
        _ => None,
    };

    let days = first_day
        .iter_days()
        .take_while(|date| *date < next_month)
        .map(|date| {
            let day_events = by_day.get(&date).map(Vec::as_slice).unwrap_or(&[]);
            let status = classify_day(date, day_events, observed, doses);
            CalendarDay {
                date,
                status,
                event_count: day_events.len() as u32,
                tooltip: tooltip(date, status, day_events.len(), doses),
            }
        })
        .collect();

    Ok(CalendarMonth {
        year,
        month,
        leading_blanks: first_day.weekday().num_days_from_sunday(),
        days,
    })
}

fn tooltip(date: NaiveDate, status: CalendarDayStatus, taken: usize, doses: u32) -> String {
    let day = date.format("%b %-d, %Y");
    match status {
        CalendarDayStatus::NoData => format!("{}: no data", day),
        _ => format!("{}: {} ({} of {} doses)", day, status.label(), taken, doses),
    }
}
