//! SQLite schema definition.

/// Complete local database schema.
pub const SCHEMA: &str = r#"
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Subjects
-- ============================================================================

CREATE TABLE IF NOT EXISTS subjects (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    subject_id TEXT NOT NULL UNIQUE,
    first_name TEXT NOT NULL DEFAULT '',
    last_name TEXT NOT NULL DEFAULT '',
    age INTEGER,
    sex TEXT NOT NULL DEFAULT '',
    race TEXT NOT NULL DEFAULT '',
    weight TEXT NOT NULL DEFAULT '',
    height TEXT NOT NULL DEFAULT '',
    prescription TEXT NOT NULL DEFAULT '{}',      -- JSON {dosesPerDay, pillsPerDose, totalPillsPrescribed}
    dosing_windows TEXT NOT NULL DEFAULT '[]',    -- JSON array of {start, end}
    curr_adherence_score REAL,                    -- 0.0 - 1.0
    pill_weight REAL,                             -- grams per pill
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- ============================================================================
-- Events (appended by ingestion)
-- ============================================================================

CREATE TABLE IF NOT EXISTS events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    subject_id TEXT NOT NULL REFERENCES subjects(subject_id),
    date TEXT NOT NULL,                           -- YYYY-MM-DD
    time TEXT NOT NULL,                           -- HH:MM:SS
    pill_count INTEGER,
    grams REAL,
    adherence_score REAL,                         -- snapshot, 0.0 - 1.0
    anomaly_id INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_events_subject_time ON events(subject_id, date, time);
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_valid() {
        let conn = Connection::open_in_memory().unwrap();
        let result = conn.execute_batch(SCHEMA);
        assert!(result.is_ok(), "Schema should be valid SQL: {:?}", result);
    }

    #[test]
    fn test_schema_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();
        assert!(conn.execute_batch(SCHEMA).is_ok());
    }

    #[test]
    fn test_subject_id_unique() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();

        conn.execute("INSERT INTO subjects (subject_id) VALUES ('S-1')", [])
            .unwrap();
        let result = conn.execute("INSERT INTO subjects (subject_id) VALUES ('S-1')", []);
        assert!(result.is_err());
    }

    #[test]
    fn test_event_defaults() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();

        conn.execute("INSERT INTO subjects (subject_id) VALUES ('S-1')", [])
            .unwrap();
        conn.execute(
            "INSERT INTO events (subject_id, date, time) VALUES ('S-1', '2025-03-01', '09:00:00')",
            [],
        )
        .unwrap();
        let anomaly: i64 = conn
            .query_row("SELECT anomaly_id FROM events", [], |row| row.get(0))
            .unwrap();
        assert_eq!(anomaly, 0);
    }

    #[test]
    fn test_event_requires_subject() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();

        let result = conn.execute(
            "INSERT INTO events (subject_id, date, time) VALUES ('S-9', '2025-03-01', '09:00:00')",
            [],
        );
        assert!(result.is_err());
    }
}
