//! Dose Core Library
//!
//! Adherence monitoring for smart pill bottles: subjects, bottle events and
//! the reports a clinician reads from them.
//!
//! # Architecture
//!
//! ```text
//!   Hosted backend (PostgREST)      Local SQLite
//!             │                          │
//!             └──────────┬───────────────┘
//!                        │  Backend trait: rows + change notifications
//!                        ▼
//!                  Row normalizer
//!                        │
//!          ┌─────────────┼──────────────┐
//!          ▼             ▼              ▼
//!   Dose-size rebuild  Calendar     Histogram
//!          │          aggregator    aggregator
//!          └─────────────┬──────────────┘
//!                        ▼
//!               Dashboard session ──► FFI (view layer)
//! ```
//!
//! # Core Principle
//!
//! **Events are immutable facts.** Everything shown is derived from the rows
//! and recomputed whenever they change; nothing derived is written back.
//!
//! # Modules
//!
//! - [`models`]: Raw rows, typed records and report types
//! - [`derive`]: Normalizer, dose-size reconstruction, calendar and histogram
//! - [`filter`]: Event log filters
//! - [`backend`]: Backend trait and change notification hub
//! - [`db`]: SQLite backend
//! - [`rest`]: PostgREST query paths, snapshot diffing and (feature `remote`) client
//! - [`session`]: Dashboard state, reducer and session driver
//! - [`config`]: Environment configuration

pub mod backend;
pub mod config;
pub mod db;
pub mod derive;
pub mod filter;
pub mod models;
pub mod rest;
pub mod session;

// Re-export commonly used types
pub use backend::{Backend, Change, ChangeHub, Subscription, Topic};
pub use config::Config;
pub use db::Database;
pub use derive::RowNormalizer;
pub use filter::{DateRange, EventFilter};
pub use models::{
    AggregateStats, CalendarDay, CalendarDayStatus, CalendarMonth, DoseEvent, DosingWindow,
    Event, Histogram, HistogramBucket, NewEvent, NewSubject, Prescription, Subject, Timeliness,
};
pub use session::{DashboardSession, DashboardState, LoadState};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::sync::{Arc, Mutex};

use chrono::NaiveDate;

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum DoseError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Backend error: {0}")]
    BackendError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<db::DbError> for DoseError {
    fn from(e: db::DbError) -> Self {
        DoseError::DatabaseError(e.to_string())
    }
}

impl From<backend::BackendError> for DoseError {
    fn from(e: backend::BackendError) -> Self {
        DoseError::BackendError(e.to_string())
    }
}

impl From<config::ConfigError> for DoseError {
    fn from(e: config::ConfigError) -> Self {
        DoseError::ConfigError(e.to_string())
    }
}

impl From<derive::DeriveError> for DoseError {
    fn from(e: derive::DeriveError) -> Self {
        DoseError::InvalidInput(e.to_string())
    }
}

impl From<session::SessionError> for DoseError {
    fn from(e: session::SessionError) -> Self {
        match e {
            session::SessionError::Backend(e) => e.into(),
            session::SessionError::Derive(e) => e.into(),
        }
    }
}

impl From<serde_json::Error> for DoseError {
    fn from(e: serde_json::Error) -> Self {
        DoseError::SerializationError(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for DoseError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        DoseError::DatabaseError(format!("Lock poisoned: {}", e))
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

type BoxedBackend = Box<dyn Backend + Send>;

fn core_for(backend: BoxedBackend, event_limit: usize) -> Arc<DoseCore> {
    Arc::new(DoseCore {
        session: Mutex::new(DashboardSession::with_event_limit(backend, event_limit)),
    })
}

/// Open or create a local database at the given path.
#[uniffi::export]
pub fn open_database(path: String) -> Result<Arc<DoseCore>, DoseError> {
    let db = Database::open(&path)?;
    Ok(core_for(Box::new(db), backend::DEFAULT_EVENT_LIMIT))
}

/// Create an in-memory database (for testing).
#[uniffi::export]
pub fn open_database_in_memory() -> Result<Arc<DoseCore>, DoseError> {
    let db = Database::open_in_memory()?;
    Ok(core_for(Box::new(db), backend::DEFAULT_EVENT_LIMIT))
}

/// Connect to the hosted backend named by `DOSE_BACKEND_URL`/`DOSE_BACKEND_KEY`.
#[cfg(feature = "remote")]
#[uniffi::export]
pub fn open_remote_from_env() -> Result<Arc<DoseCore>, DoseError> {
    let config = Config::from_env()?;
    let backend = rest::RestBackend::new(&config)?;
    Ok(core_for(Box::new(backend), config.event_limit))
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe dashboard session wrapper for FFI.
#[derive(uniffi::Object)]
pub struct DoseCore {
    session: Mutex<DashboardSession<BoxedBackend>>,
}

#[uniffi::export]
impl DoseCore {
    // =========================================================================
    // Subjects
    // =========================================================================

    /// Fetch all subjects and start listening for changes.
    pub fn load_subjects(&self) -> Result<Vec<FfiSubject>, DoseError> {
        let mut session = self.session.lock()?;
        Ok(session.load_subjects().iter().map(FfiSubject::from).collect())
    }

    /// Subjects as currently known.
    pub fn subjects(&self) -> Result<Vec<FfiSubject>, DoseError> {
        let session = self.session.lock()?;
        Ok(session.subjects().iter().map(FfiSubject::from).collect())
    }

    /// Insert a subject from the intake form.
    pub fn create_subject(&self, subject: FfiNewSubject) -> Result<FfiSubject, DoseError> {
        let mut session = self.session.lock()?;
        let created = session.create_subject(&subject.into())?;
        Ok(FfiSubject::from(&created))
    }

    // =========================================================================
    // Selection
    // =========================================================================

    /// Select a subject and load its events (newest first).
    pub fn select_subject(&self, subject_id: String) -> Result<Vec<FfiDoseEvent>, DoseError> {
        let mut session = self.session.lock()?;
        Ok(session
            .select_subject(&subject_id)
            .iter()
            .map(FfiDoseEvent::from)
            .collect())
    }

    pub fn clear_selection(&self) -> Result<(), DoseError> {
        self.session.lock()?.clear_selection();
        Ok(())
    }

    pub fn selected_subject(&self) -> Result<Option<FfiSubject>, DoseError> {
        let session = self.session.lock()?;
        Ok(session.selected_subject().map(FfiSubject::from))
    }

    /// Apply pending change notifications; returns how many were applied.
    pub fn pump(&self) -> Result<u32, DoseError> {
        let applied = self.session.lock()?.pump();
        Ok(u32::try_from(applied).unwrap_or(u32::MAX))
    }

    // =========================================================================
    // Event views
    // =========================================================================

    pub fn events(&self) -> Result<Vec<FfiDoseEvent>, DoseError> {
        let session = self.session.lock()?;
        Ok(session.events().iter().map(FfiDoseEvent::from).collect())
    }

    /// Event log filtered by timeliness, dose size and date range.
    ///
    /// `today` is `YYYY-MM-DD` in the clinician's local time.
    pub fn filtered_events(
        &self,
        timeliness: Option<FfiTimeliness>,
        dose_size: Option<u32>,
        date_range: FfiDateRange,
        today: String,
    ) -> Result<Vec<FfiDoseEvent>, DoseError> {
        let today = NaiveDate::parse_from_str(&today, "%Y-%m-%d")
            .map_err(|e| DoseError::InvalidInput(format!("today {:?}: {}", today, e)))?;

        let mut filter = EventFilter::all().with_date_range(date_range.into());
        if let Some(t) = timeliness {
            filter = filter.with_timeliness(t.into());
        }
        if let Some(size) = dose_size {
            filter = filter.with_dose_size(size);
        }

        let session = self.session.lock()?;
        Ok(session
            .filtered_events(&filter, today)
            .into_iter()
            .map(FfiDoseEvent::from)
            .collect())
    }

    pub fn pill_count_series(&self) -> Result<Vec<FfiPillCountPoint>, DoseError> {
        let session = self.session.lock()?;
        Ok(session
            .pill_count_series()
            .into_iter()
            .map(|p| FfiPillCountPoint {
                timestamp: p.timestamp.format(TIMESTAMP_FORMAT).to_string(),
                pill_count: p.pill_count,
            })
            .collect())
    }

    // =========================================================================
    // Reports
    // =========================================================================

    /// Adherence calendar of the selected subject for one month.
    pub fn calendar(&self, year: i32, month: u32) -> Result<FfiCalendarMonth, DoseError> {
        let session = self.session.lock()?;
        Ok(session.calendar(year, month)?.into())
    }

    pub fn histogram(&self) -> Result<Vec<FfiHistogramBucket>, DoseError> {
        let session = self.session.lock()?;
        Ok(session
            .histogram()
            .buckets
            .into_iter()
            .map(FfiHistogramBucket::from)
            .collect())
    }

    pub fn aggregate_stats(&self) -> Result<FfiAggregateStats, DoseError> {
        let session = self.session.lock()?;
        Ok(session.aggregate_stats().into())
    }
}

// =========================================================================
// FFI Types
// =========================================================================

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// FFI-safe dosing window.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiDosingWindow {
    pub start: String,
    pub end: String,
}

/// FFI-safe subject.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiSubject {
    pub subject_id: String,
    pub row_id: Option<i64>,
    pub first_name: String,
    pub last_name: String,
    pub age: Option<u32>,
    pub sex: String,
    pub race: String,
    pub weight: String,
    pub height: String,
    pub doses_per_day: u32,
    pub pills_per_dose: u32,
    pub total_pills_prescribed: u32,
    pub dosing_windows: Vec<FfiDosingWindow>,
    pub adherence_percent: u8,
    pub pill_weight: Option<f64>,
}

impl From<&Subject> for FfiSubject {
    fn from(subject: &Subject) -> Self {
        Self {
            subject_id: subject.subject_id.clone(),
            row_id: subject.row_id,
            first_name: subject.first_name.clone(),
            last_name: subject.last_name.clone(),
            age: subject.age,
            sex: subject.sex.clone(),
            race: subject.race.clone(),
            weight: subject.weight.clone(),
            height: subject.height.clone(),
            doses_per_day: subject.prescription.doses_per_day,
            pills_per_dose: subject.prescription.pills_per_dose,
            total_pills_prescribed: subject.prescription.total_pills_prescribed,
            dosing_windows: subject
                .dosing_windows
                .iter()
                .map(|w| FfiDosingWindow {
                    start: w.start.clone(),
                    end: w.end.clone(),
                })
                .collect(),
            adherence_percent: subject.adherence_percent,
            pill_weight: subject.pill_weight,
        }
    }
}

/// FFI-safe intake payload.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiNewSubject {
    pub subject_id: String,
    pub first_name: String,
    pub last_name: String,
    pub age: u32,
    pub sex: String,
    pub race: String,
    pub weight: String,
    pub height: String,
    pub doses_per_day: u32,
    pub pills_per_dose: u32,
    pub total_pills_prescribed: u32,
    pub dosing_windows: Vec<FfiDosingWindow>,
}

impl From<FfiNewSubject> for NewSubject {
    fn from(subject: FfiNewSubject) -> Self {
        NewSubject {
            subject_id: subject.subject_id,
            first_name: subject.first_name,
            last_name: subject.last_name,
            age: subject.age,
            sex: subject.sex,
            race: subject.race,
            weight: subject.weight,
            height: subject.height,
            prescription: Prescription {
                doses_per_day: subject.doses_per_day,
                pills_per_dose: subject.pills_per_dose,
                total_pills_prescribed: subject.total_pills_prescribed,
            },
            dosing_windows: subject
                .dosing_windows
                .into_iter()
                .map(|w| DosingWindow::new(w.start, w.end))
                .collect(),
            pill_weight: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum FfiTimeliness {
    OnTime,
    Early,
    Late,
}

impl From<FfiTimeliness> for Timeliness {
    fn from(t: FfiTimeliness) -> Self {
        match t {
            FfiTimeliness::OnTime => Timeliness::OnTime,
            FfiTimeliness::Early => Timeliness::Early,
            FfiTimeliness::Late => Timeliness::Late,
        }
    }
}

impl From<Timeliness> for FfiTimeliness {
    fn from(t: Timeliness) -> Self {
        match t {
            Timeliness::OnTime => FfiTimeliness::OnTime,
            Timeliness::Early => FfiTimeliness::Early,
            Timeliness::Late => FfiTimeliness::Late,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum FfiDateRange {
    All,
    Last7Days,
    Last30Days,
    Last90Days,
}

impl From<FfiDateRange> for DateRange {
    fn from(range: FfiDateRange) -> Self {
        match range {
            FfiDateRange::All => DateRange::All,
            FfiDateRange::Last7Days => DateRange::Last7Days,
            FfiDateRange::Last30Days => DateRange::Last30Days,
            FfiDateRange::Last90Days => DateRange::Last90Days,
        }
    }
}

/// FFI-safe event-log row.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiDoseEvent {
    pub row_id: Option<i64>,
    pub subject_id: String,
    pub date: Option<String>,
    pub time: Option<String>,
    pub timestamp: Option<String>,
    pub pill_count: Option<i64>,
    pub grams: Option<f64>,
    pub adherence_score: Option<f64>,
    pub anomaly_code: i64,
    pub timeliness: FfiTimeliness,
    pub dose_size: u32,
}

impl From<&DoseEvent> for FfiDoseEvent {
    fn from(dose: &DoseEvent) -> Self {
        let event = &dose.event;
        Self {
            row_id: event.row_id,
            subject_id: event.subject_id.clone(),
            date: event.date.map(|d| d.format(DATE_FORMAT).to_string()),
            time: event.time.map(|t| t.format(TIME_FORMAT).to_string()),
            timestamp: event
                .timestamp
                .map(|ts| ts.format(TIMESTAMP_FORMAT).to_string()),
            pill_count: event.pill_count,
            grams: event.grams,
            adherence_score: event.adherence_score,
            anomaly_code: event.anomaly_code,
            timeliness: event.timeliness().into(),
            dose_size: dose.dose_size,
        }
    }
}

/// FFI-safe pill-count chart point.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPillCountPoint {
    pub timestamp: String,
    pub pill_count: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum FfiDayStatus {
    Good,
    Partial,
    Missed,
    NoData,
}

impl From<CalendarDayStatus> for FfiDayStatus {
    fn from(status: CalendarDayStatus) -> Self {
        match status {
            CalendarDayStatus::Good => FfiDayStatus::Good,
            CalendarDayStatus::Partial => FfiDayStatus::Partial,
            CalendarDayStatus::Missed => FfiDayStatus::Missed,
            CalendarDayStatus::NoData => FfiDayStatus::NoData,
        }
    }
}

/// FFI-safe calendar day.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiCalendarDay {
    pub date: String,
    pub status: FfiDayStatus,
    pub event_count: u32,
    pub tooltip: String,
}

/// FFI-safe calendar month.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiCalendarMonth {
    pub year: i32,
    pub month: u32,
    pub leading_blanks: u32,
    pub days: Vec<FfiCalendarDay>,
}

impl From<CalendarMonth> for FfiCalendarMonth {
    fn from(month: CalendarMonth) -> Self {
        Self {
            year: month.year,
            month: month.month,
            leading_blanks: month.leading_blanks,
            days: month
                .days
                .into_iter()
                .map(|d| FfiCalendarDay {
                    date: d.date.format(DATE_FORMAT).to_string(),
                    status: d.status.into(),
                    event_count: d.event_count,
                    tooltip: d.tooltip,
                })
                .collect(),
        }
    }
}

/// FFI-safe histogram bucket.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiHistogramBucket {
    pub range: String,
    pub min: u8,
    pub max: u8,
    pub count: u32,
    pub percentage: u8,
    pub subject_ids: Vec<String>,
    pub subject_names: Vec<String>,
}

impl From<HistogramBucket> for FfiHistogramBucket {
    fn from(bucket: HistogramBucket) -> Self {
        Self {
            range: bucket.range,
            min: bucket.min,
            max: bucket.max,
            count: u32::try_from(bucket.count).unwrap_or(u32::MAX),
            percentage: bucket.percentage,
            subject_ids: bucket
                .subjects
                .iter()
                .map(|s| s.subject_id.clone())
                .collect(),
            subject_names: bucket
                .subjects
                .iter()
                .map(|s| format!("{} {}", s.first_name, s.last_name).trim().to_string())
                .collect(),
        }
    }
}

/// FFI-safe aggregate statistics.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiAggregateStats {
    pub total_subjects: u32,
    pub average_adherence: u8,
    pub high_adherence: u32,
    pub low_adherence: u32,
    pub high_share: u8,
    pub low_share: u8,
    pub excellent: u32,
}

impl From<AggregateStats> for FfiAggregateStats {
    fn from(stats: AggregateStats) -> Self {
        let count = |n: usize| u32::try_from(n).unwrap_or(u32::MAX);
        Self {
            total_subjects: count(stats.total_subjects),
            average_adherence: stats.average_adherence,
            high_adherence: count(stats.high_adherence),
            low_adherence: count(stats.low_adherence),
            high_share: stats.high_share,
            low_share: stats.low_share,
            excellent: count(stats.excellent),
        }
    }
}
