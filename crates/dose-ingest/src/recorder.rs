//! Reading recorder.
//!
//! Pipeline per reading: subject lookup → pill weight → classification →
//! adherence snapshot → event insert → subject update.

use std::collections::HashMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use dose_core::db::Database;
use dose_core::models::{Anomaly, NewEvent, RawEventRow};

use crate::{daily_adherence, DoseClassifier, IngestError, IngestResult};

/// What was written for one reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedReading {
    pub row: RawEventRow,
    pub grams_per_pill: f64,
    pub pill_count: i64,
    pub pills_taken: i64,
    pub anomaly: Anomaly,
    pub adherence_score: f64,
}

/// Records scale readings for subjects in a local database.
pub struct ReadingRecorder<'a> {
    db: &'a Database,
    classifier: DoseClassifier,
    previous_grams: HashMap<String, f64>,
}

impl<'a> ReadingRecorder<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self::with_classifier(db, DoseClassifier::new())
    }

    pub fn with_classifier(db: &'a Database, classifier: DoseClassifier) -> Self {
        Self {
            db,
            classifier,
            previous_grams: HashMap::new(),
        }
    }

    /// Last weight recorded for a subject in this session.
    pub fn previous_weight(&self, subject_id: &str) -> Option<f64> {
        self.previous_grams.get(subject_id).copied()
    }

    /// Record one reading of `grams` (tare already removed) taken at `at`.
    pub fn record(
        &mut self,
        subject_id: &str,
        grams: f64,
        at: NaiveDateTime,
    ) -> IngestResult<RecordedReading> {
        let subject = self
            .db
            .get_subject(subject_id)?
            .ok_or_else(|| IngestError::UnknownSubject(subject_id.to_string()))?;

        let rx = subject.prescription;
        let grams_per_pill = match subject.pill_weight {
            Some(weight) if weight > 0.0 => weight,
            _ => grams / f64::from(rx.total_pills_prescribed.max(1)),
        };
        let pill_count = if grams_per_pill > 0.0 {
            (grams / grams_per_pill).round() as i64
        } else {
            0
        };

        let classification = self.classifier.classify(
            self.previous_weight(subject_id),
            grams,
            grams_per_pill,
            rx.pills_per_dose,
            at.time(),
            &subject.dosing_windows,
        );
        let code = classification.anomaly.code();

        let today = self.db.event_codes_on(subject_id, at.date())?;
        let adherence_score = daily_adherence(&today, code);

        let event = NewEvent {
            subject_id: subject_id.to_string(),
            date: at.date(),
            time: at.time(),
            pill_count: Some(pill_count),
            grams: Some(grams),
            adherence_score: Some(adherence_score),
            anomaly_code: code,
        };
        // Event first, so a rejected insert leaves the subject untouched
        let row = self.db.insert_event(&event)?;
        self.db
            .update_subject_score(subject_id, adherence_score, Some(grams_per_pill))?;
        self.previous_grams.insert(subject_id.to_string(), grams);

        if classification.anomaly.is_anomalous() {
            warn!(subject_id, code, pills_taken = classification.pills_taken, "anomalous reading");
        } else {
            info!(subject_id, pill_count, "reading recorded");
        }

        Ok(RecordedReading {
            row,
            grams_per_pill,
            pill_count,
            pills_taken: classification.pills_taken,
            anomaly: classification.anomaly,
            adherence_score,
        })
    }
}
