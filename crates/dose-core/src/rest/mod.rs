//! Hosted PostgREST backend.
//!
//! Query paths and snapshot diffing are always compiled so they can be
//! tested offline; the HTTP client itself needs the `remote` feature.

mod diff;

#[cfg(feature = "remote")]
mod client;

pub use diff::*;

#[cfg(feature = "remote")]
pub use client::*;

/// Relation holding subject rows.
pub const SUBJECTS_TABLE: &str = "subjects";

/// Relation holding event rows.
pub const EVENTS_TABLE: &str = "events";

/// Header asking PostgREST to echo inserted rows.
pub const RETURN_REPRESENTATION: (&str, &str) = ("Prefer", "return=representation");

/// Request path builder for the PostgREST REST dialect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostgrestQuery {
    table: String,
    params: Vec<(String, String)>,
}

impl PostgrestQuery {
    pub fn table(table: &str) -> Self {
        Self {
            table: table.to_string(),
            params: Vec::new(),
        }
    }

    /// `GET /subjects?select=*`
    pub fn subjects() -> Self {
        Self::table(SUBJECTS_TABLE).select("*")
    }

    /// `POST /subjects`, echoing the stored row back.
    pub fn insert_subject() -> Self {
        Self::table(SUBJECTS_TABLE)
    }

    /// A subject's newest events, date and time descending.
    pub fn events(subject_id: &str, limit: usize) -> Self {
        Self::table(EVENTS_TABLE)
            .select("*")
            .eq("subjectId", subject_id)
            .order("date.desc,time.desc")
            .limit(limit)
    }

    pub fn select(self, columns: &str) -> Self {
        self.param("select", columns)
    }

    pub fn eq(self, column: &str, value: &str) -> Self {
        self.param(column, &format!("eq.{}", value))
    }

    pub fn order(self, ordering: &str) -> Self {
        self.param("order", ordering)
    }

    pub fn limit(self, limit: usize) -> Self {
        self.param("limit", &limit.to_string())
    }

    fn param(mut self, key: &str, value: &str) -> Self {
        self.params.push((key.to_string(), value.to_string()));
        self
    }

    /// Path and query string relative to the REST root, values percent-encoded.
    pub fn path(&self) -> String {
        if self.params.is_empty() {
            return format!("/{}", self.table);
        }
        let query: Vec<String> = self
            .params
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), encode_value(v)))
            .collect();
        format!("/{}?{}", self.table, query.join("&"))
    }

    /// Full URL below `base`, e.g. `https://host/rest/v1`.
    pub fn url(&self, base: &str) -> String {
        format!("{}{}", base.trim_end_matches('/'), self.path())
    }
}

/// Percent-encode a parameter value, keeping PostgREST's operator syntax readable.
fn encode_value(value: &str) -> String {
    value
        .split(',')
        .map(|part| {
            part.split('.')
                .map(|piece| urlencoding::encode(piece).into_owned())
                .collect::<Vec<_>>()
                .join(".")
        })
        .collect::<Vec<_>>()
        .join(",")
}
