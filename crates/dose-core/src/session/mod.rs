//! Dashboard session.
//!
//! Owns the backend handle, the live subscriptions and a [`DashboardState`].
//! Backend calls happen here; every state change goes through
//! [`DashboardState::reduce`]. The host calls [`DashboardSession::pump`] from
//! its event loop to apply pending change notifications.

mod state;

pub use state::*;

use chrono::NaiveDate;
use thiserror::Error;
use tracing::{info, warn};

use crate::backend::{Backend, BackendError, Change, Subscription, DEFAULT_EVENT_LIMIT};
use crate::derive::{
    aggregate_stats, build_calendar_month, build_histogram, pill_count_series, DeriveError,
    RowNormalizer,
};
use crate::filter::EventFilter;
use crate::models::{
    AggregateStats, CalendarMonth, DoseEvent, Histogram, NewSubject, PillCountPoint, Subject,
};

/// Session errors.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Derive(#[from] DeriveError),
}

pub type SessionResult<T> = Result<T, SessionError>;

/// One clinician's view of the study.
pub struct DashboardSession<B: Backend> {
    backend: B,
    normalizer: RowNormalizer,
    state: DashboardState,
    event_limit: usize,
    subjects_subscription: Option<Subscription>,
    events_subscription: Option<Subscription>,
}

impl<B: Backend> DashboardSession<B> {
    pub fn new(backend: B) -> Self {
        Self::with_event_limit(backend, DEFAULT_EVENT_LIMIT)
    }

    pub fn with_event_limit(backend: B, event_limit: usize) -> Self {
        Self {
            backend,
            normalizer: RowNormalizer::new(),
            state: DashboardState::new(),
            event_limit,
            subjects_subscription: None,
            events_subscription: None,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn state(&self) -> &DashboardState {
        &self.state
    }

    /// Fetch every subject and start listening for subject changes.
    ///
    /// A failed fetch is logged and leaves an empty list.
    pub fn load_subjects(&mut self) -> &[Subject] {
        self.state.reduce(Action::SubjectsRequested);
        match self.backend.fetch_subjects() {
            Ok(rows) => {
                let subjects = self.normalizer.normalize_subjects(&rows);
                info!(count = subjects.len(), "subjects loaded");
                self.state.reduce(Action::SubjectsLoaded(subjects));
            }
            Err(e) => {
                warn!(error = %e, "failed to fetch subjects");
                self.state.reduce(Action::SubjectsFailed(e.to_string()));
            }
        }

        if self.subjects_subscription.is_none() {
            match self.backend.subscribe_subjects() {
                Ok(subscription) => self.subjects_subscription = Some(subscription),
                Err(e) => warn!(error = %e, "failed to subscribe to subjects"),
            }
        }
        &self.state.subjects
    }

    /// Make `subject_id` the selected subject and load its events.
    pub fn select_subject(&mut self, subject_id: &str) -> &[DoseEvent] {
        // Release the old listener before opening the next one
        self.events_subscription = None;
        self.state.reduce(Action::SubjectSelected(subject_id.to_string()));

        match self.backend.fetch_events(subject_id, self.event_limit) {
            Ok(rows) => {
                let events = self.normalizer.normalize_events(&rows);
                self.state.reduce(Action::EventsLoaded {
                    subject_id: subject_id.to_string(),
                    events,
                });
            }
            Err(e) => {
                warn!(subject_id, error = %e, "failed to fetch events");
                self.state.reduce(Action::EventsFailed {
                    subject_id: subject_id.to_string(),
                    message: e.to_string(),
                });
            }
        }

        match self.backend.subscribe_events(subject_id) {
            Ok(subscription) => self.events_subscription = Some(subscription),
            Err(e) => warn!(subject_id, error = %e, "failed to subscribe to events"),
        }
        &self.state.events
    }

    pub fn clear_selection(&mut self) {
        self.events_subscription = None;
        self.state.reduce(Action::SelectionCleared);
    }

    /// Insert a subject through the backend and add it to the list.
    pub fn create_subject(&mut self, subject: &NewSubject) -> SessionResult<Subject> {
        let row = self.backend.insert_subject(subject)?;
        let created = self.normalizer.normalize_subject(&row);
        self.state.reduce(Action::SubjectChanged(created.clone()));
        Ok(created)
    }

    /// Apply pending change notifications. Returns how many were applied.
    pub fn pump(&mut self) -> usize {
        if let Err(e) = self.backend.poll_changes() {
            warn!(error = %e, "failed to poll backend changes");
        }

        let mut changes = Vec::new();
        for subscription in [&self.subjects_subscription, &self.events_subscription]
            .into_iter()
            .flatten()
        {
            changes.extend(subscription.drain());
        }

        let applied = changes.len();
        for change in changes {
            let action = match change {
                Change::SubjectInserted(row) | Change::SubjectUpdated(row) => {
                    Action::SubjectChanged(self.normalizer.normalize_subject(&row))
                }
                Change::EventInserted(row) | Change::EventUpdated(row) => {
                    Action::EventChanged(self.normalizer.normalize_event(&row))
                }
            };
            self.state.reduce(action);
        }
        applied
    }

    /// View accessors. A failed fetch reads as an empty list.
    pub fn subjects(&self) -> &[Subject] {
        &self.state.subjects
    }

    pub fn selected_subject(&self) -> Option<&Subject> {
        self.state.selected_subject()
    }

    pub fn events(&self) -> &[DoseEvent] {
        &self.state.events
    }

    pub fn filtered_events(&self, filter: &EventFilter, today: NaiveDate) -> Vec<&DoseEvent> {
        filter.apply(&self.state.events, today)
    }

    pub fn pill_count_series(&self) -> Vec<PillCountPoint> {
        pill_count_series(&self.state.events)
    }

    /// Adherence calendar for the selected subject.
    pub fn calendar(&self, year: i32, month: u32) -> SessionResult<CalendarMonth> {
        let doses_per_day = self
            .selected_subject()
            .map(|s| i64::from(s.prescription.doses_per_day))
            .unwrap_or(0);
        Ok(build_calendar_month(
            &self.state.events,
            doses_per_day,
            year,
            month,
        )?)
    }

    pub fn histogram(&self) -> Histogram {
        build_histogram(&self.state.subjects)
    }

    pub fn aggregate_stats(&self) -> AggregateStats {
        aggregate_stats(&self.state.subjects)
    }

    /// Whether an event listener is currently open.
    pub fn has_event_subscription(&self) -> bool {
        self.events_subscription.is_some()
    }
}
