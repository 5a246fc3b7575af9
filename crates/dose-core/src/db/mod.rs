//! Local SQLite backend.
//!
//! Mirrors the hosted `subjects`/`events` relations so the dashboard, the
//! ingestion tools and the test suite can run without the hosted service.
//! Every write is published on the database's [`ChangeHub`].

mod events;
mod schema;
mod subjects;

pub use schema::*;
#[allow(unused_imports)]
pub use events::*;
#[allow(unused_imports)]
pub use subjects::*;

use rusqlite::Connection;
use std::path::Path;
use thiserror::Error;

use crate::backend::{Backend, BackendError, BackendResult, ChangeHub, Subscription, Topic};
use crate::models::{NewSubject, RawEventRow, RawSubjectRow};

/// Database errors.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Record not found: {0}")]
    NotFound(String),
}

pub type DbResult<T> = Result<T, DbError>;

impl From<DbError> for BackendError {
    fn from(e: DbError) -> Self {
        BackendError::Storage(e.to_string())
    }
}

/// Database connection wrapper.
pub struct Database {
    conn: Connection,
    hub: ChangeHub,
}

impl Database {
    /// Open database at path, creating if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn,
            hub: ChangeHub::new(),
        };
        db.initialize()?;
        Ok(db)
    }

    /// Create in-memory database (for testing).
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn,
            hub: ChangeHub::new(),
        };
        db.initialize()?;
        Ok(db)
    }

    /// Initialize schema.
    fn initialize(&self) -> DbResult<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Get raw connection (for advanced queries).
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Change notifications for writes made through this handle.
    pub fn hub(&self) -> &ChangeHub {
        &self.hub
    }
}

impl Backend for Database {
    fn fetch_subjects(&self) -> BackendResult<Vec<RawSubjectRow>> {
        Ok(self.list_subject_rows()?)
    }

    fn insert_subject(&self, subject: &NewSubject) -> BackendResult<RawSubjectRow> {
        Ok(Database::insert_subject(self, subject)?)
    }

    fn fetch_events(&self, subject_id: &str, limit: usize) -> BackendResult<Vec<RawEventRow>> {
        Ok(self.list_event_rows(subject_id, limit)?)
    }

    fn subscribe_subjects(&self) -> BackendResult<Subscription> {
        Ok(self.hub.subscribe(Topic::Subjects))
    }

    fn subscribe_events(&self, subject_id: &str) -> BackendResult<Subscription> {
        Ok(self.hub.subscribe(Topic::events(subject_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory() {
        let db = Database::open_in_memory();
        assert!(db.is_ok());
    }

    #[test]
    fn test_schema_initialized() {
        let db = Database::open_in_memory().unwrap();

        let tables: Vec<String> = db
            .conn()
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();

        assert!(tables.contains(&"subjects".to_string()));
        assert!(tables.contains(&"events".to_string()));
    }

    #[test]
    fn test_open_file_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dose.db");

        {
            let db = Database::open(&path).unwrap();
            let subject = NewSubject::new("S-1".into(), "Ada".into(), "Lovelace".into());
            db.insert_subject(&subject).unwrap();
        }

        let db = Database::open(&path).unwrap();
        assert_eq!(db.fetch_subjects().unwrap().len(), 1);
    }
}
