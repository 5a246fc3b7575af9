//! Change detection for pull-based backends.

use std::collections::HashMap;

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::backend::{Change, Topic};
use crate::derive::value_as_string;
use crate::models::{RawEventRow, RawSubjectRow};

/// Remembers a fingerprint per row and reports what changed between fetches.
///
/// The first snapshot of a topic only seeds the baseline: rows already
/// present when a subscription opens are not reported as inserts.
#[derive(Debug, Default)]
pub struct SnapshotDiff {
    seen: HashMap<Topic, HashMap<String, String>>,
}

impl SnapshotDiff {
    pub fn new() -> Self {
        Self::default()
    }

    /// Diff a fresh `subjects` snapshot against the last one.
    pub fn observe_subjects(&mut self, rows: &[RawSubjectRow]) -> Vec<Change> {
        let keyed = rows.iter().map(|row| (subject_key(row), row));
        self.observe(Topic::Subjects, keyed)
            .into_iter()
            .map(|(inserted, row)| {
                if inserted {
                    Change::SubjectInserted(row.clone())
                } else {
                    Change::SubjectUpdated(row.clone())
                }
            })
            .collect()
    }

    /// Diff a fresh events snapshot for one subject against the last one.
    pub fn observe_events(&mut self, subject_id: &str, rows: &[RawEventRow]) -> Vec<Change> {
        let keyed = rows.iter().map(|row| (event_key(row), row));
        self.observe(Topic::events(subject_id), keyed)
            .into_iter()
            .map(|(inserted, row)| {
                if inserted {
                    Change::EventInserted(row.clone())
                } else {
                    Change::EventUpdated(row.clone())
                }
            })
            .collect()
    }

    /// Drop the baseline for a topic nobody listens to any more.
    pub fn forget(&mut self, topic: &Topic) {
        self.seen.remove(topic);
    }

    /// Forget every topic not in `active`.
    pub fn retain_topics(&mut self, active: &[Topic]) {
        self.seen.retain(|topic, _| active.contains(topic));
    }

    pub fn is_tracking(&self, topic: &Topic) -> bool {
        self.seen.contains_key(topic)
    }

    fn observe<'r, R: Serialize>(
        &mut self,
        topic: Topic,
        rows: impl Iterator<Item = (String, &'r R)>,
    ) -> Vec<(bool, &'r R)> {
        let seeding = !self.seen.contains_key(&topic);
        let known = self.seen.entry(topic).or_default();
        let mut changed = Vec::new();

        for (key, row) in rows {
            let print = fingerprint(row);
            match known.insert(key, print.clone()) {
                None if !seeding => changed.push((true, row)),
                Some(previous) if previous != print => changed.push((false, row)),
                _ => {}
            }
        }
        changed
    }
}

fn subject_key(row: &RawSubjectRow) -> String {
    let id = value_as_string(&row.subject_id);
    if id.is_empty() {
        format!("#{}", value_as_string(&row.id))
    } else {
        id
    }
}

fn event_key(row: &RawEventRow) -> String {
    if row.id.is_null() {
        format!(
            "{}|{}",
            row.date.as_deref().unwrap_or_default(),
            row.time.as_deref().unwrap_or_default()
        )
    } else {
        format!("#{}", value_as_string(&row.id))
    }
}

/// SHA-256 of the row's JSON form, hex-encoded.
fn fingerprint<R: Serialize>(row: &R) -> String {
    let bytes = serde_json::to_vec(row).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn subject(id: &str, score: f64) -> RawSubjectRow {
        RawSubjectRow {
            subject_id: id.into(),
            curr_adherence_score: score.into(),
            ..Default::default()
        }
    }

    fn event(id: i64, pills: i64) -> RawEventRow {
        RawEventRow {
            id: id.into(),
            subject_id: "S-1".into(),
            date: Some("2025-03-01".into()),
            time: Some("08:00:00".into()),
            pill_count: pills.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_first_snapshot_seeds_silently() {
        let mut diff = SnapshotDiff::new();
        assert!(diff.observe_subjects(&[subject("a", 0.5)]).is_empty());
        assert!(diff.is_tracking(&Topic::Subjects));
        assert!(diff.observe_subjects(&[subject("a", 0.5)]).is_empty());
    }

    #[test]
    fn test_reports_inserts_and_updates() {
        let mut diff = SnapshotDiff::new();
        diff.observe_subjects(&[subject("a", 0.5)]);

        let changes = diff.observe_subjects(&[subject("a", 0.75), subject("b", 0.0)]);
        assert_eq!(changes.len(), 2);
        assert!(matches!(&changes[0], Change::SubjectUpdated(r) if r.subject_id == Value::from("a")));
        assert!(matches!(&changes[1], Change::SubjectInserted(r) if r.subject_id == Value::from("b")));
    }

    #[test]
    fn test_events_tracked_per_subject() {
        let mut diff = SnapshotDiff::new();
        diff.observe_events("S-1", &[event(1, 30)]);

        let changes = diff.observe_events("S-1", &[event(2, 28), event(1, 30)]);
        assert_eq!(changes, vec![Change::EventInserted(event(2, 28))]);

        // A different subject starts from its own baseline
        assert!(diff.observe_events("S-2", &[event(3, 10)]).is_empty());

        diff.forget(&Topic::events("S-1"));
        assert!(!diff.is_tracking(&Topic::events("S-1")));
        diff.retain_topics(&[Topic::Subjects]);
        assert!(!diff.is_tracking(&Topic::events("S-2")));
        assert!(diff.observe_events("S-1", &[event(4, 26)]).is_empty());
    }

    #[test]
    fn test_fingerprint_is_hex_sha256() {
        let print = fingerprint(&event(1, 30));
        assert_eq!(print.len(), 64);
        assert_eq!(print, fingerprint(&event(1, 30)));
        assert_ne!(print, fingerprint(&event(1, 29)));
    }
}
