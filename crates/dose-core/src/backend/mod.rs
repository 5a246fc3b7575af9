//! Data backend seam.
//!
//! The dashboard reads subjects and events from a hosted relational backend
//! and reacts to its insert/update notifications. Everything behind this
//! trait is an external collaborator: the local SQLite [`Database`] and the
//! hosted PostgREST service both implement it.
//!
//! [`Database`]: crate::db::Database

mod hub;

pub use hub::*;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::derive::value_as_string;
use crate::models::{NewSubject, RawEventRow, RawSubjectRow};

/// Most recent events fetched per subject.
pub const DEFAULT_EVENT_LIMIT: usize = 200;

/// Backend errors.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Unexpected response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Backend returned no row for insert")]
    EmptyInsert,
}

pub type BackendResult<T> = Result<T, BackendError>;

/// What a subscription listens to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Topic {
    /// Every row of `subjects`
    Subjects,
    /// Rows of `events` for one subject
    Events { subject_id: String },
}

impl Topic {
    pub fn events(subject_id: impl Into<String>) -> Self {
        Topic::Events {
            subject_id: subject_id.into(),
        }
    }
}

/// An insert or update notification carrying the changed row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Change {
    SubjectInserted(RawSubjectRow),
    SubjectUpdated(RawSubjectRow),
    EventInserted(RawEventRow),
    EventUpdated(RawEventRow),
}

impl Change {
    /// Topic this change is delivered on.
    pub fn topic(&self) -> Topic {
        match self {
            Change::SubjectInserted(_) | Change::SubjectUpdated(_) => Topic::Subjects,
            Change::EventInserted(row) | Change::EventUpdated(row) => {
                Topic::events(value_as_string(&row.subject_id))
            }
        }
    }
}

/// Row fetch, insert and change notification operations the dashboard needs.
pub trait Backend {
    /// All rows of `subjects`.
    fn fetch_subjects(&self) -> BackendResult<Vec<RawSubjectRow>>;

    /// Insert a subject and return the stored row.
    fn insert_subject(&self, subject: &NewSubject) -> BackendResult<RawSubjectRow>;

    /// A subject's most recent events, date and time descending.
    fn fetch_events(&self, subject_id: &str, limit: usize) -> BackendResult<Vec<RawEventRow>>;

    /// Notifications for inserts/updates on `subjects`.
    fn subscribe_subjects(&self) -> BackendResult<Subscription>;

    /// Notifications for inserts/updates on one subject's events.
    fn subscribe_events(&self, subject_id: &str) -> BackendResult<Subscription>;

    /// Publish pending changes for pull-based backends. Returns deliveries.
    fn poll_changes(&self) -> BackendResult<usize> {
        Ok(0)
    }
}

impl<T: Backend + ?Sized> Backend for Box<T> {
    fn fetch_subjects(&self) -> BackendResult<Vec<RawSubjectRow>> {
        (**self).fetch_subjects()
    }

    fn insert_subject(&self, subject: &NewSubject) -> BackendResult<RawSubjectRow> {
        (**self).insert_subject(subject)
    }

    fn fetch_events(&self, subject_id: &str, limit: usize) -> BackendResult<Vec<RawEventRow>> {
        (**self).fetch_events(subject_id, limit)
    }

    fn subscribe_subjects(&self) -> BackendResult<Subscription> {
        (**self).subscribe_subjects()
    }

    fn subscribe_events(&self, subject_id: &str) -> BackendResult<Subscription> {
        (**self).subscribe_events(subject_id)
    }

    fn poll_changes(&self) -> BackendResult<usize> {
        (**self).poll_changes()
    }
}

/// Lets a session borrow a backend that other code also writes through.
impl<T: Backend + ?Sized> Backend for &T {
    fn fetch_subjects(&self) -> BackendResult<Vec<RawSubjectRow>> {
        (**self).fetch_subjects()
    }

    fn insert_subject(&self, subject: &NewSubject) -> BackendResult<RawSubjectRow> {
        (**self).insert_subject(subject)
    }

    fn fetch_events(&self, subject_id: &str, limit: usize) -> BackendResult<Vec<RawEventRow>> {
        (**self).fetch_events(subject_id, limit)
    }

    fn subscribe_subjects(&self) -> BackendResult<Subscription> {
        (**self).subscribe_subjects()
    }

    fn subscribe_events(&self, subject_id: &str) -> BackendResult<Subscription> {
        (**self).subscribe_events(subject_id)
    }

    fn poll_changes(&self) -> BackendResult<usize> {
        (**self).poll_changes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_topic_uses_stringified_subject() {
        let change = Change::EventUpdated(RawEventRow {
            subject_id: 42.into(),
            ..Default::default()
        });
        assert_eq!(change.topic(), Topic::events("42"));
        assert_eq!(
            Change::SubjectUpdated(RawSubjectRow::default()).topic(),
            Topic::Subjects
        );
    }
}
