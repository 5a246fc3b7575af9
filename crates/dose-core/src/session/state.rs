//! Dashboard state and its reducer.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::derive::reconstruct_newest_first;
use crate::models::{DoseEvent, Event, Subject};

/// Progress of one backend fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadState {
    #[default]
    Idle,
    Loading,
    Loaded,
    /// Fetch failed; the message is for logs, views show an empty list
    Failed(String),
}

impl LoadState {
    pub fn is_failed(&self) -> bool {
        matches!(self, LoadState::Failed(_))
    }
}

/// Everything the dashboard shows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DashboardState {
    pub subjects: Vec<Subject>,
    pub subjects_state: LoadState,
    pub selected: Option<String>,
    /// Selected subject's events, newest first, dose sizes populated
    pub events: Vec<DoseEvent>,
    pub events_state: LoadState,
}

/// State transitions.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    SubjectsRequested,
    SubjectsLoaded(Vec<Subject>),
    SubjectsFailed(String),
    SubjectSelected(String),
    SelectionCleared,
    EventsLoaded { subject_id: String, events: Vec<Event> },
    EventsFailed { subject_id: String, message: String },
    /// A subject row was inserted or updated
    SubjectChanged(Subject),
    /// An event row was inserted or updated
    EventChanged(Event),
}

impl DashboardState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one action.
    pub fn reduce(&mut self, action: Action) {
        match action {
            Action::SubjectsRequested => {
                self.subjects_state = LoadState::Loading;
            }
            Action::SubjectsLoaded(subjects) => {
                self.subjects = subjects;
                self.subjects_state = LoadState::Loaded;
            }
            Action::SubjectsFailed(message) => {
                self.subjects.clear();
                self.subjects_state = LoadState::Failed(message);
            }
            Action::SubjectSelected(subject_id) => {
                self.selected = Some(subject_id);
                self.events.clear();
                self.events_state = LoadState::Loading;
            }
            Action::SelectionCleared => {
                self.selected = None;
                self.events.clear();
                self.events_state = LoadState::Idle;
            }
            Action::EventsLoaded { subject_id, events } => {
                if self.is_selected(&subject_id) {
                    self.events = reconstruct_newest_first(events);
                    self.events_state = LoadState::Loaded;
                }
            }
            Action::EventsFailed { subject_id, message } => {
                if self.is_selected(&subject_id) {
                    self.events.clear();
                    self.events_state = LoadState::Failed(message);
                }
            }
            Action::SubjectChanged(subject) => self.merge_subject(subject),
            Action::EventChanged(event) => {
                if self.is_selected(&event.subject_id) {
                    self.merge_event(event);
                }
            }
        }
    }

    pub fn is_selected(&self, subject_id: &str) -> bool {
        self.selected.as_deref() == Some(subject_id)
    }

    /// The selected subject's record, if it is in the list.
    pub fn selected_subject(&self) -> Option<&Subject> {
        let selected = self.selected.as_deref()?;
        self.subjects.iter().find(|s| s.subject_id == selected)
    }

    fn merge_subject(&mut self, subject: Subject) {
        match self
            .subjects
            .iter_mut()
            .find(|s| s.subject_id == subject.subject_id)
        {
            Some(existing) => *existing = subject,
            None => self.subjects.push(subject),
        }
    }

    /// Replace the event with the same (subject, timestamp) key or prepend it,
    /// then recompute every dose size.
    fn merge_event(&mut self, event: Event) {
        let mut events: Vec<Event> = self.events.drain(..).map(|d| d.event).collect();
        let key = event.content_key();
        match events.iter_mut().find(|e| e.content_key() == key) {
            Some(existing) => *existing = event,
            None => events.insert(0, event),
        }
        debug!(events = events.len(), "merged event change");
        self.events = reconstruct_newest_first(events);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn subject(id: &str, score: f64) -> Subject {
        Subject {
            row_id: None,
            subject_id: id.into(),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            age: None,
            sex: String::new(),
            race: String::new(),
            weight: String::new(),
            height: String::new(),
            prescription: Default::default(),
            dosing_windows: Vec::new(),
            adherence_score: score,
            adherence_percent: crate::derive::adherence_percent(score),
            pill_weight: None,
        }
    }

    fn event(subject_id: &str, at: &str, pills: i64) -> Event {
        let ts = NaiveDateTime::parse_from_str(at, "%Y-%m-%d %H:%M").unwrap();
        Event {
            row_id: None,
            subject_id: subject_id.into(),
            date: Some(ts.date()),
            time: Some(ts.time()),
            timestamp: Some(ts),
            pill_count: Some(pills),
            grams: None,
            adherence_score: None,
            anomaly_code: 0,
        }
    }

    fn selected_state() -> DashboardState {
        let mut state = DashboardState::new();
        state.reduce(Action::SubjectSelected("S-1".into()));
        state.reduce(Action::EventsLoaded {
            subject_id: "S-1".into(),
            events: vec![
                event("S-1", "2025-03-01 21:00", 28),
                event("S-1", "2025-03-01 09:00", 30),
            ],
        });
        state
    }

    #[test]
    fn test_subject_load_lifecycle() {
        let mut state = DashboardState::new();
        state.reduce(Action::SubjectsRequested);
        assert_eq!(state.subjects_state, LoadState::Loading);

        state.reduce(Action::SubjectsLoaded(vec![subject("S-1", 0.5)]));
        assert_eq!(state.subjects_state, LoadState::Loaded);

        state.reduce(Action::SubjectsFailed("offline".into()));
        assert!(state.subjects.is_empty());
        assert!(state.subjects_state.is_failed());
    }

    #[test]
    fn test_events_loaded_newest_first() {
        let state = selected_state();
        assert_eq!(state.events_state, LoadState::Loaded);
        assert_eq!(state.events[0].event.pill_count, Some(28));
        assert_eq!(state.events[0].dose_size, 2);
        assert_eq!(state.events[1].dose_size, 0);
    }

    #[test]
    fn test_stale_events_ignored() {
        let mut state = selected_state();
        state.reduce(Action::EventsLoaded {
            subject_id: "S-2".into(),
            events: vec![event("S-2", "2025-03-01 09:00", 10)],
        });
        assert_eq!(state.events.len(), 2);

        state.reduce(Action::EventsFailed {
            subject_id: "S-2".into(),
            message: "timeout".into(),
        });
        assert_eq!(state.events_state, LoadState::Loaded);
    }

    #[test]
    fn test_event_change_prepends_and_recomputes() {
        let mut state = selected_state();
        state.reduce(Action::EventChanged(event("S-1", "2025-03-02 09:00", 26)));

        assert_eq!(state.events.len(), 3);
        assert_eq!(state.events[0].event.pill_count, Some(26));
        assert_eq!(state.events[0].dose_size, 2);
    }

    #[test]
    fn test_event_change_replaces_same_key() {
        let mut state = selected_state();
        let mut amended = event("S-1", "2025-03-01 21:00", 27);
        amended.anomaly_code = 3;
        state.reduce(Action::EventChanged(amended));

        assert_eq!(state.events.len(), 2);
        assert_eq!(state.events[0].event.anomaly_code, 3);
        assert_eq!(state.events[0].dose_size, 3);
    }

    #[test]
    fn test_event_change_other_subject_ignored() {
        let mut state = selected_state();
        state.reduce(Action::EventChanged(event("S-2", "2025-03-02 09:00", 5)));
        assert_eq!(state.events.len(), 2);
    }

    #[test]
    fn test_subject_change_merge() {
        let mut state = DashboardState::new();
        state.reduce(Action::SubjectsLoaded(vec![subject("S-1", 0.5)]));
        state.reduce(Action::SubjectChanged(subject("S-1", 0.9)));
        state.reduce(Action::SubjectChanged(subject("S-2", 0.1)));

        assert_eq!(state.subjects.len(), 2);
        assert_eq!(state.subjects[0].adherence_percent, 90);
        assert_eq!(state.subjects[1].subject_id, "S-2");
    }

    #[test]
    fn test_clear_selection() {
        let mut state = selected_state();
        state.reduce(Action::SelectionCleared);
        assert!(state.selected.is_none());
        assert!(state.events.is_empty());
        assert_eq!(state.events_state, LoadState::Idle);
    }
}
