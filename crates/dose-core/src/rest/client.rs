//! Blocking PostgREST client.

use std::sync::{Mutex, MutexGuard};

use reqwest::blocking::{Client, RequestBuilder, Response};
use tracing::{debug, info};

use super::{PostgrestQuery, SnapshotDiff, RETURN_REPRESENTATION};
use crate::backend::{
    Backend, BackendError, BackendResult, ChangeHub, Subscription, Topic,
};
use crate::config::Config;
use crate::models::{NewSubject, RawEventRow, RawSubjectRow};

/// [`Backend`] over the hosted PostgREST service.
///
/// The service has no push channel here, so change notifications are
/// produced by [`Backend::poll_changes`]: every subscribed topic is
/// re-fetched and diffed against the previous snapshot.
pub struct RestBackend {
    http: Client,
    base_url: String,
    api_key: String,
    event_limit: usize,
    hub: ChangeHub,
    diff: Mutex<SnapshotDiff>,
}

impl RestBackend {
    pub fn new(config: &Config) -> BackendResult<Self> {
        let http = Client::builder()
            .build()
            .map_err(|e| BackendError::Http(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.backend_url.clone(),
            api_key: config.backend_key.clone(),
            event_limit: config.event_limit,
            hub: ChangeHub::new(),
            diff: Mutex::new(SnapshotDiff::new()),
        })
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
    }

    fn get<T: serde::de::DeserializeOwned>(&self, query: &PostgrestQuery) -> BackendResult<T> {
        let url = query.url(&self.base_url);
        debug!(%url, "GET");
        let response = self
            .authorized(self.http.get(&url))
            .send()
            .map_err(|e| BackendError::Http(e.to_string()))?;
        decode(response)
    }

    fn diff(&self) -> MutexGuard<'_, SnapshotDiff> {
        self.diff.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn decode<T: serde::de::DeserializeOwned>(response: Response) -> BackendResult<T> {
    let status = response.status();
    let body = response
        .text()
        .map_err(|e| BackendError::Http(e.to_string()))?;
    if !status.is_success() {
        return Err(BackendError::Http(format!("{}: {}", status, body)));
    }
    Ok(serde_json::from_str(&body)?)
}

impl Backend for RestBackend {
    fn fetch_subjects(&self) -> BackendResult<Vec<RawSubjectRow>> {
        self.get(&PostgrestQuery::subjects())
    }

    fn insert_subject(&self, subject: &NewSubject) -> BackendResult<RawSubjectRow> {
        let url = PostgrestQuery::insert_subject().url(&self.base_url);
        let (prefer, representation) = RETURN_REPRESENTATION;
        let response = self
            .authorized(self.http.post(&url))
            .header(prefer, representation)
            .json(subject)
            .send()
            .map_err(|e| BackendError::Http(e.to_string()))?;

        let rows: Vec<RawSubjectRow> = decode(response)?;
        let row = rows.into_iter().next().ok_or(BackendError::EmptyInsert)?;
        info!(subject_id = %subject.subject_id, "subject inserted");
        Ok(row)
    }

    fn fetch_events(&self, subject_id: &str, limit: usize) -> BackendResult<Vec<RawEventRow>> {
        self.get(&PostgrestQuery::events(subject_id, limit))
    }

    fn subscribe_subjects(&self) -> BackendResult<Subscription> {
        let subscription = self.hub.subscribe(Topic::Subjects);
        let rows = self.fetch_subjects()?;
        self.diff().observe_subjects(&rows);
        Ok(subscription)
    }

    fn subscribe_events(&self, subject_id: &str) -> BackendResult<Subscription> {
        let subscription = self.hub.subscribe(Topic::events(subject_id));
        let rows = self.fetch_events(subject_id, self.event_limit)?;
        self.diff().observe_events(subject_id, &rows);
        Ok(subscription)
    }

    fn poll_changes(&self) -> BackendResult<usize> {
        let active = self.hub.active_topics();
        self.diff().retain_topics(&active);

        let mut delivered = 0;
        for topic in active {
            let changes = match &topic {
                Topic::Subjects => {
                    let rows = self.fetch_subjects()?;
                    self.diff().observe_subjects(&rows)
                }
                Topic::Events { subject_id } => {
                    let rows = self.fetch_events(subject_id, self.event_limit)?;
                    self.diff().observe_events(subject_id, &rows)
                }
            };
            for change in changes {
                delivered += self.hub.publish(change);
            }
        }
        Ok(delivered)
    }
}
