//! Subject database operations.

use rusqlite::{params, OptionalExtension, Row};
use serde_json::Value;
use tracing::info;

use super::{Database, DbError, DbResult};
use crate::backend::Change;
use crate::derive::RowNormalizer;
use crate::models::{NewSubject, RawSubjectRow, Subject};

const SUBJECT_COLUMNS: &str = r#"
    id, subject_id, first_name, last_name, age, sex, race, weight, height,
    prescription, dosing_windows, curr_adherence_score, pill_weight
"#;

fn subject_row(row: &Row<'_>) -> rusqlite::Result<RawSubjectRow> {
    Ok(RawSubjectRow {
        id: Value::from(row.get::<_, i64>(0)?),
        subject_id: Value::String(row.get(1)?),
        first_name: Some(row.get(2)?),
        last_name: Some(row.get(3)?),
        age: Value::from(row.get::<_, Option<i64>>(4)?),
        sex: Some(row.get(5)?),
        race: Some(row.get(6)?),
        weight: Value::String(row.get(7)?),
        height: Value::String(row.get(8)?),
        // Stored JSON-encoded, the same as the hosted table
        prescription: Value::String(row.get(9)?),
        dosing_windows: Value::String(row.get(10)?),
        curr_adherence_score: Value::from(row.get::<_, Option<f64>>(11)?),
        pill_weight: Value::from(row.get::<_, Option<f64>>(12)?),
    })
}

impl Database {
    /// Insert a new subject and return the stored row.
    pub fn insert_subject(&self, subject: &NewSubject) -> DbResult<RawSubjectRow> {
        self.conn.execute(
            r#"
            INSERT INTO subjects (
                subject_id, first_name, last_name, age, sex, race, weight, height,
                prescription, dosing_windows, pill_weight
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                subject.subject_id,
                subject.first_name,
                subject.last_name,
                subject.age,
                subject.sex,
                subject.race,
                subject.weight,
                subject.height,
                serde_json::to_string(&subject.prescription)?,
                serde_json::to_string(&subject.dosing_windows)?,
                subject.pill_weight,
            ],
        )?;

        let row = self
            .get_subject_row(&subject.subject_id)?
            .ok_or_else(|| DbError::NotFound(subject.subject_id.clone()))?;
        info!(subject_id = %subject.subject_id, "subject inserted");
        self.hub.publish(Change::SubjectInserted(row.clone()));
        Ok(row)
    }

    /// Get a subject row by study identifier.
    pub fn get_subject_row(&self, subject_id: &str) -> DbResult<Option<RawSubjectRow>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM subjects WHERE subject_id = ?", SUBJECT_COLUMNS),
                [subject_id],
                subject_row,
            )
            .optional()
            .map_err(Into::into)
    }

    /// Get a normalized subject by study identifier.
    pub fn get_subject(&self, subject_id: &str) -> DbResult<Option<Subject>> {
        let row = self.get_subject_row(subject_id)?;
        Ok(row.map(|r| RowNormalizer::new().normalize_subject(&r)))
    }

    /// List all subject rows in insertion order.
    pub fn list_subject_rows(&self) -> DbResult<Vec<RawSubjectRow>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM subjects ORDER BY id",
            SUBJECT_COLUMNS
        ))?;

        let rows = stmt.query_map([], subject_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Store a new adherence score (and learned pill weight) for a subject.
    pub fn update_subject_score(
        &self,
        subject_id: &str,
        adherence_score: f64,
        pill_weight: Option<f64>,
    ) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE subjects SET
                curr_adherence_score = ?2,
                pill_weight = COALESCE(?3, pill_weight),
                updated_at = datetime('now')
            WHERE subject_id = ?1
            "#,
            params![subject_id, adherence_score, pill_weight],
        )?;

        if rows_affected > 0 {
            if let Some(row) = self.get_subject_row(subject_id)? {
                self.hub.publish(Change::SubjectUpdated(row));
            }
        }
        Ok(rows_affected > 0)
    }
}
