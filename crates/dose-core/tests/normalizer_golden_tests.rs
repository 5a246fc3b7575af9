//! Golden tests for the row normalizer.
//!
//! Rows are written as the hosted backend and the ingestion tools produce them.

use dose_core::derive::{adherence_percent, RowNormalizer};
use dose_core::models::{RawEventRow, RawSubjectRow};
use serde_json::json;

/// Event row case: raw columns in, derived timestamp out.
struct TimestampCase {
    id: &'static str,
    date: Option<&'static str>,
    time: Option<&'static str>,
    expected: Option<&'static str>,
}

fn get_timestamp_cases() -> Vec<TimestampCase> {
    vec![
        TimestampCase {
            id: "iso-date-24h-time",
            date: Some("2025-03-04"),
            time: Some("09:15:00"),
            expected: Some("2025-03-04 09:15:00"),
        },
        TimestampCase {
            id: "iso-date-short-time",
            date: Some("2025-03-04"),
            time: Some("21:05"),
            expected: Some("2025-03-04 21:05:00"),
        },
        TimestampCase {
            id: "us-date-12h-time",
            date: Some("09/26/25"),
            time: Some("02:06 PM"),
            expected: Some("2025-09-26 14:06:00"),
        },
        TimestampCase {
            id: "us-long-year",
            date: Some("09/26/2025"),
            time: Some("12:30 AM"),
            expected: Some("2025-09-26 00:30:00"),
        },
        TimestampCase {
            id: "fractional-seconds",
            date: Some("2025-03-04"),
            time: Some("07:59:59.250"),
            expected: Some("2025-03-04 07:59:59"),
        },
        TimestampCase {
            id: "full-timestamp-in-time-column",
            date: Some("2025-03-01"),
            time: Some("2025-03-04T09:15:00"),
            expected: Some("2025-03-04 09:15:00"),
        },
        TimestampCase {
            id: "rfc3339-in-time-column",
            date: None,
            time: Some("2025-03-04T09:15:00+00:00"),
            expected: Some("2025-03-04 09:15:00"),
        },
        TimestampCase {
            id: "missing-time",
            date: Some("2025-03-04"),
            time: None,
            expected: None,
        },
        TimestampCase {
            id: "missing-date",
            date: None,
            time: Some("09:15"),
            expected: None,
        },
        TimestampCase {
            id: "garbage-date",
            date: Some("yesterday"),
            time: Some("09:15"),
            expected: None,
        },
    ]
}

#[test]
fn test_timestamp_golden_cases() {
    let normalizer = RowNormalizer::new();

    for case in get_timestamp_cases() {
        let row = RawEventRow {
            subject_id: json!("S-1"),
            date: case.date.map(|s| s.to_string()),
            time: case.time.map(|s| s.to_string()),
            ..Default::default()
        };
        let event = normalizer.normalize_event(&row);
        let actual = event
            .timestamp
            .map(|ts| ts.format("%Y-%m-%d %H:%M:%S").to_string());

        assert_eq!(
            actual.as_deref(),
            case.expected,
            "Case {}: timestamp mismatch",
            case.id
        );
    }
}

#[test]
fn test_undated_event_keeps_its_date() {
    let normalizer = RowNormalizer::new();
    let row = RawEventRow {
        date: Some("2025-03-04".into()),
        time: Some("soon".into()),
        ..Default::default()
    };
    let event = normalizer.normalize_event(&row);
    assert!(event.timestamp.is_none());
    assert_eq!(event.day().map(|d| d.to_string()).as_deref(), Some("2025-03-04"));
}

#[test]
fn test_adherence_percent_cases() {
    let cases = vec![
        (0.0, 0),
        (0.004, 0),
        (0.005, 1),
        (0.5, 50),
        (0.755, 76),
        (0.845, 85),
        (0.995, 100),
        (1.0, 100),
        (1.7, 100),
        (-0.2, 0),
        (f64::NAN, 0),
    ];

    for (fraction, expected) in cases {
        assert_eq!(
            adherence_percent(fraction),
            expected,
            "Fraction {} should display as {}",
            fraction,
            expected
        );
    }
}

#[test]
fn test_subject_row_shapes() {
    let normalizer = RowNormalizer::new();

    let rows: Vec<RawSubjectRow> = serde_json::from_value(json!([
        {
            "id": 1,
            "subjectId": 1001,
            "firstName": "Ada",
            "lastName": "Lovelace",
            "age": "36",
            "weight": 60,
            "prescription": "{\"dosesPerDay\": 2, \"pillsPerDose\": \"1\", \"totalPillsPrescribed\": 60}",
            "dosingWindows": "[{\"start\": \"08:00\", \"end\": \"08:30\"}, {\"start\": \"20:00\", \"end\": \"20:30\"}]",
            "currAdherenceScore": 0.845
        },
        {
            "id": 2,
            "subjectId": "1002",
            "prescription": {"doses_per_day": 1, "pills_per_dose": 2, "pillCount": 30},
            "dosingWindows": {"evening": "21:00", "morning": "07:00"},
            "currAdherenceScore": "0.755"
        },
        {
            "id": 3,
            "subjectId": "1003",
            "prescription": "not json",
            "dosingWindows": null,
            "currAdherenceScore": "n/a"
        }
    ]))
    .unwrap();

    let subjects = normalizer.normalize_subjects(&rows);

    let ada = &subjects[0];
    assert_eq!(ada.subject_id, "1001");
    assert_eq!(ada.age, Some(36));
    assert_eq!(ada.weight, "60");
    assert_eq!(ada.prescription.doses_per_day, 2);
    assert_eq!(ada.prescription.pills_per_dose, 1);
    assert_eq!(ada.dosing_windows[1].start, "20:00");
    assert_eq!(ada.adherence_percent, 85);

    let second = &subjects[1];
    assert_eq!(second.prescription.total_pills_prescribed, 30);
    let starts: Vec<_> = second.dosing_windows.iter().map(|w| w.start.as_str()).collect();
    assert_eq!(starts, vec!["07:00", "21:00"]);
    assert_eq!(second.adherence_percent, 76);

    let third = &subjects[2];
    assert_eq!(third.prescription.doses_per_day, 0);
    assert!(third.dosing_windows.is_empty());
    assert_eq!(third.adherence_percent, 0);
    assert_eq!(third.first_name, "");
}
