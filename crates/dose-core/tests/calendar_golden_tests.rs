//! Golden tests for the adherence calendar.

use chrono::{NaiveDate, NaiveDateTime};
use dose_core::derive::{build_calendar_month, reconstruct_dose_sizes};
use dose_core::models::{CalendarDayStatus, Event};

fn event(at: &str, pills: Option<i64>, code: i64, score: Option<f64>) -> Event {
    let ts = NaiveDateTime::parse_from_str(at, "%Y-%m-%d %H:%M").unwrap();
    Event {
        row_id: None,
        subject_id: "1001".into(),
        date: Some(ts.date()),
        time: Some(ts.time()),
        timestamp: Some(ts),
        pill_count: pills,
        grams: None,
        adherence_score: score,
        anomaly_code: code,
    }
}

fn day(month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, month, day).unwrap()
}

/// Events on March 3, 5 (with a non-ingestion marker), 6 and 10 only.
fn march_events() -> Vec<Event> {
    vec![
        event("2025-03-03 09:00", Some(30), 0, Some(1.0)),
        event("2025-03-03 21:00", Some(28), 0, Some(1.0)),
        event("2025-03-05 09:10", Some(28), 3, Some(0.0)),
        event("2025-03-06 08:55", Some(27), 0, Some(1.0)),
        event("2025-03-06 22:40", Some(26), 2, Some(0.5)),
        event("2025-03-10 09:00", Some(25), 0, Some(1.0)),
    ]
}

#[test]
fn test_march_day_statuses() {
    let calendar = build_calendar_month(&march_events(), 2, 2025, 3).unwrap();

    let cases = vec![
        (1, CalendarDayStatus::NoData),
        (2, CalendarDayStatus::NoData),
        (3, CalendarDayStatus::Good),
        (4, CalendarDayStatus::Missed),
        (5, CalendarDayStatus::Missed),
        (6, CalendarDayStatus::Partial),
        (7, CalendarDayStatus::Missed),
        (10, CalendarDayStatus::Partial),
        (11, CalendarDayStatus::NoData),
        (31, CalendarDayStatus::NoData),
    ];

    for (d, expected) in cases {
        let cell = &calendar.days[(d - 1) as usize];
        assert_eq!(cell.date, day(3, d));
        assert_eq!(cell.status, expected, "March {} should be {:?}", d, expected);
    }
}

#[test]
fn test_neighbouring_months_have_no_data() {
    for month in [2, 4] {
        let calendar = build_calendar_month(&march_events(), 2, 2025, month).unwrap();
        assert!(calendar
            .days
            .iter()
            .all(|d| d.status == CalendarDayStatus::NoData));
    }
}

#[test]
fn test_layout_and_tooltips() {
    let calendar = build_calendar_month(&march_events(), 2, 2025, 3).unwrap();

    // March 1, 2025 is a Saturday
    assert_eq!(calendar.leading_blanks, 6);
    assert_eq!(calendar.days.len(), 31);
    assert_eq!(calendar.cells().len(), 37);

    assert_eq!(calendar.days[2].tooltip, "Mar 3, 2025: good (2 of 2 doses)");
    assert_eq!(calendar.days[3].tooltip, "Mar 4, 2025: missed (0 of 2 doses)");
    assert_eq!(calendar.days[0].tooltip, "Mar 1, 2025: no data");
}

#[test]
fn test_non_positive_doses_default_to_two() {
    let events = vec![event("2025-03-03 09:00", Some(30), 0, None)];
    for doses in [0, -1] {
        let calendar = build_calendar_month(&events, doses, 2025, 3).unwrap();
        assert_eq!(calendar.days[2].status, CalendarDayStatus::Partial);
    }

    let calendar = build_calendar_month(&events, 1, 2025, 3).unwrap();
    assert_eq!(calendar.days[2].status, CalendarDayStatus::Good);
}

#[test]
fn test_two_clean_doses_make_a_good_day() {
    let events = vec![
        event("2025-03-01 09:00", Some(30), 0, None),
        event("2025-03-01 21:00", Some(28), 0, None),
    ];

    let doses = reconstruct_dose_sizes(events.clone());
    assert_eq!(doses[1].dose_size, 2);

    let calendar = build_calendar_month(&doses, 2, 2025, 3).unwrap();
    assert_eq!(calendar.days[0].status, CalendarDayStatus::Good);
    assert_eq!(calendar.days[0].event_count, 2);
}

#[test]
fn test_no_events_means_no_data() {
    let events: Vec<Event> = Vec::new();
    let calendar = build_calendar_month(&events, 2, 2025, 3).unwrap();
    assert_eq!(calendar.count(CalendarDayStatus::NoData), 31);
}
