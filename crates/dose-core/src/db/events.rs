//! Event database operations.

use chrono::NaiveDate;
use rusqlite::{params, OptionalExtension, Row};
use serde_json::Value;
use tracing::debug;

use super::{Database, DbError, DbResult};
use crate::backend::Change;
use crate::models::{NewEvent, RawEventRow};

const EVENT_COLUMNS: &str =
    "id, subject_id, date, time, pill_count, grams, adherence_score, anomaly_id";

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S";

fn event_row(row: &Row<'_>) -> rusqlite::Result<RawEventRow> {
    Ok(RawEventRow {
        id: Value::from(row.get::<_, i64>(0)?),
        subject_id: Value::String(row.get(1)?),
        date: Some(row.get(2)?),
        time: Some(row.get(3)?),
        pill_count: Value::from(row.get::<_, Option<i64>>(4)?),
        grams: Value::from(row.get::<_, Option<f64>>(5)?),
        adherence_score: Value::from(row.get::<_, Option<f64>>(6)?),
        anomaly_id: Value::from(row.get::<_, i64>(7)?),
    })
}

impl Database {
    /// Append an event and return the stored row.
    pub fn insert_event(&self, event: &NewEvent) -> DbResult<RawEventRow> {
        self.conn.execute(
            r#"
            INSERT INTO events (
                subject_id, date, time, pill_count, grams, adherence_score, anomaly_id
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                event.subject_id,
                event.date.format(DATE_FORMAT).to_string(),
                event.time.format(TIME_FORMAT).to_string(),
                event.pill_count,
                event.grams,
                event.adherence_score,
                event.anomaly_code,
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        let row = self
            .get_event_row(id)?
            .ok_or_else(|| DbError::NotFound(format!("event {}", id)))?;
        debug!(event = id, subject_id = %event.subject_id, "event inserted");
        self.hub.publish(Change::EventInserted(row.clone()));
        Ok(row)
    }

    /// Overwrite an existing event.
    pub fn update_event(&self, id: i64, event: &NewEvent) -> DbResult<RawEventRow> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE events SET
                subject_id = ?2, date = ?3, time = ?4, pill_count = ?5,
                grams = ?6, adherence_score = ?7, anomaly_id = ?8
            WHERE id = ?1
            "#,
            params![
                id,
                event.subject_id,
                event.date.format(DATE_FORMAT).to_string(),
                event.time.format(TIME_FORMAT).to_string(),
                event.pill_count,
                event.grams,
                event.adherence_score,
                event.anomaly_code,
            ],
        )?;

        if rows_affected == 0 {
            return Err(DbError::NotFound(format!("event {}", id)));
        }

        let row = self
            .get_event_row(id)?
            .ok_or_else(|| DbError::NotFound(format!("event {}", id)))?;
        self.hub.publish(Change::EventUpdated(row.clone()));
        Ok(row)
    }

    /// Get an event row by id.
    pub fn get_event_row(&self, id: i64) -> DbResult<Option<RawEventRow>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM events WHERE id = ?", EVENT_COLUMNS),
                [id],
                event_row,
            )
            .optional()
            .map_err(Into::into)
    }

    /// A subject's most recent events, newest first.
    pub fn list_event_rows(&self, subject_id: &str, limit: usize) -> DbResult<Vec<RawEventRow>> {
        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT {} FROM events
            WHERE subject_id = ?1
            ORDER BY date DESC, time DESC, id DESC
            LIMIT ?2
            "#,
            EVENT_COLUMNS
        ))?;

        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt.query_map(params![subject_id, limit], event_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Anomaly codes recorded for a subject on one day, oldest first.
    pub fn event_codes_on(&self, subject_id: &str, date: NaiveDate) -> DbResult<Vec<i64>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT anomaly_id FROM events
            WHERE subject_id = ?1 AND date = ?2
            ORDER BY time, id
            "#,
        )?;

        let codes = stmt.query_map(
            params![subject_id, date.format(DATE_FORMAT).to_string()],
            |row| row.get(0),
        )?;
        codes.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}
