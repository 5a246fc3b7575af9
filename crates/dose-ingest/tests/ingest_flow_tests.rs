//! Scale link to dashboard, end to end, against a file-backed database.

use chrono::{NaiveDate, NaiveDateTime};
use dose_core::db::Database;
use dose_core::models::{Anomaly, CalendarDayStatus, DosingWindow, NewSubject, Prescription};
use dose_core::session::DashboardSession;
use dose_ingest::{
    drain_connection, parse_reading, CohortGenerator, LineBuffer, LinkSummary, ReadingRecorder,
    DEFAULT_TARE_GRAMS,
};
use std::io::Cursor;

fn at(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
}

fn enrolled(db: &Database) {
    let mut subject = NewSubject::new("2001".into(), "Alan".into(), "Turing".into());
    subject.prescription = Prescription {
        doses_per_day: 2,
        pills_per_dose: 1,
        total_pills_prescribed: 20,
    };
    subject.dosing_windows = vec![
        DosingWindow::new("08:00", "08:30"),
        DosingWindow::new("20:00", "20:30"),
    ];
    db.insert_subject(&subject).unwrap();
}

#[test]
fn test_scale_readings_reach_the_dashboard() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(dir.path().join("dose.db")).unwrap();
    enrolled(&db);

    let mut session = DashboardSession::new(&db);
    assert_eq!(session.load_subjects().len(), 1);
    assert!(session.select_subject("2001").is_empty());

    let mut buffer = LineBuffer::new();
    let mut recorder = ReadingRecorder::new(&db);

    let lines = buffer.push(b"29.68\n29.1");
    assert_eq!(lines.len(), 1);
    let grams = parse_reading(&lines[0], DEFAULT_TARE_GRAMS).unwrap();
    let first = recorder.record("2001", grams, at("2025-03-01 08:05")).unwrap();
    assert_eq!(first.pill_count, 20);
    assert_eq!(first.anomaly, Anomaly::None);

    let lines = buffer.push(b"8\n");
    let grams = parse_reading(&lines[0], DEFAULT_TARE_GRAMS).unwrap();
    let second = recorder.record("2001", grams, at("2025-03-01 20:10")).unwrap();
    assert_eq!(second.pill_count, 19);
    assert_eq!(second.pills_taken, 1);
    assert_eq!(second.anomaly, Anomaly::None);

    // Two subject updates and two event inserts
    assert_eq!(session.pump(), 4);

    let events = session.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].event.pill_count, Some(19));
    assert_eq!(events[0].dose_size, 1);

    let subject = session.selected_subject().unwrap();
    assert_eq!(subject.adherence_percent, 100);
    assert_eq!(subject.pill_weight, Some(second.grams_per_pill));

    let march = session.calendar(2025, 3).unwrap();
    let first_of_march = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
    let first_day = march.days.iter().find(|d| d.date == first_of_march).unwrap();
    assert_eq!(first_day.status, CalendarDayStatus::Good);
}

#[test]
fn test_scale_connection_records_each_line() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(dir.path().join("dose.db")).unwrap();
    enrolled(&db);

    let mut session = DashboardSession::new(&db);
    session.load_subjects();
    session.select_subject("2001");

    let mut recorder = ReadingRecorder::new(&db);
    let mut link = Cursor::new(b"29.68\r\nHX711 ready\n29.18\n\n29.1".to_vec());
    let mut stamps = vec![at("2025-03-01 08:05"), at("2025-03-01 20:10")].into_iter();

    let summary = drain_connection(&mut link, &mut recorder, "2001", DEFAULT_TARE_GRAMS, || {
        stamps.next().unwrap()
    })
    .unwrap();
    assert_eq!(summary, LinkSummary { recorded: 2, rejected: 1 });

    // The unterminated trailing reading is not recorded
    assert_eq!(db.list_event_rows("2001", 10).unwrap().len(), 2);

    session.pump();
    let counts: Vec<_> = session.events().iter().map(|e| e.event.pill_count).collect();
    assert_eq!(counts, vec![Some(19), Some(20)]);
    assert_eq!(session.events()[0].dose_size, 1);
}

#[test]
fn test_garbage_lines_are_skipped() {
    let mut buffer = LineBuffer::new();
    let readings: Vec<f64> = buffer
        .push(b"HX711 ready\n30.00\nerr\n")
        .iter()
        .filter_map(|line| parse_reading(line, DEFAULT_TARE_GRAMS).ok())
        .collect();

    assert_eq!(readings.len(), 1);
    assert!((readings[0] - 10.32).abs() < 1e-9);
}

#[test]
fn test_seeded_cohort_is_reproducible() {
    let dir = tempfile::tempdir().unwrap();
    let start = NaiveDate::from_ymd_opt(2025, 2, 1).unwrap();

    let counts = |name: &str| {
        let db = Database::open(dir.path().join(name)).unwrap();
        let summary = CohortGenerator::seeded(42)
            .populate(&db, 5, start, 14)
            .unwrap();

        let mut session = DashboardSession::new(&db);
        let ids: Vec<String> = session
            .load_subjects()
            .iter()
            .map(|s| s.subject_id.clone())
            .collect();
        let percents: Vec<u8> = session
            .subjects()
            .iter()
            .map(|s| s.adherence_percent)
            .collect();
        (summary, ids, percents, session.histogram().total_subjects)
    };

    let (a_summary, a_ids, a_percents, a_total) = counts("a.db");
    let (b_summary, b_ids, b_percents, b_total) = counts("b.db");

    assert_eq!(a_summary, b_summary);
    assert_eq!(a_ids, vec!["1000", "1001", "1002", "1003", "1004"]);
    assert_eq!(a_ids, b_ids);
    assert_eq!(a_percents, b_percents);
    assert_eq!(a_total, 5);
    assert_eq!(a_total, b_total);
}
