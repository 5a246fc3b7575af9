//! Process configuration.
//!
//! Two connection parameters are read once at start-up; either missing is
//! fatal. The event fetch limit is optional.

use thiserror::Error;

use crate::backend::DEFAULT_EVENT_LIMIT;

pub const BACKEND_URL_VAR: &str = "DOSE_BACKEND_URL";
pub const BACKEND_KEY_VAR: &str = "DOSE_BACKEND_KEY";
pub const EVENT_LIMIT_VAR: &str = "DOSE_EVENT_LIMIT";

/// Configuration errors.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing configuration: {0}")]
    Missing(&'static str),

    #[error("Invalid {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Hosted backend connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub backend_url: String,
    pub backend_key: String,
    pub event_limit: usize,
}

impl Config {
    /// Read configuration from the process environment.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read configuration through an arbitrary lookup.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &'static str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let backend_url = read(BACKEND_URL_VAR).ok_or(ConfigError::Missing(BACKEND_URL_VAR))?;
        if !(backend_url.starts_with("http://") || backend_url.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                name: BACKEND_URL_VAR,
                reason: format!("expected an http(s) URL, got {:?}", backend_url),
            });
        }

        let backend_key = read(BACKEND_KEY_VAR).ok_or(ConfigError::Missing(BACKEND_KEY_VAR))?;

        let event_limit = match read(EVENT_LIMIT_VAR) {
            None => DEFAULT_EVENT_LIMIT,
            Some(raw) => match raw.parse::<usize>() {
                Ok(limit) if limit > 0 => limit,
                _ => {
                    return Err(ConfigError::Invalid {
                        name: EVENT_LIMIT_VAR,
                        reason: format!("expected a positive integer, got {:?}", raw),
                    })
                }
            },
        };

        Ok(Self {
            backend_url,
            backend_key,
            event_limit,
        })
    }
}
