//! Ingestion tools for smart pill bottles.
//!
//! Turns scale readings into bottle events the way the bottle firmware's
//! companion scripts do. [`link`] drives a scale connection through the line
//! protocol in [`reading`]; readings are classified for dose size and timing,
//! scored against the day so far, and written by [`ReadingRecorder`].
//! [`simulate`] generates a synthetic cohort for demos and tests.

pub mod classifier;
pub mod link;
pub mod reading;
pub mod recorder;
pub mod scoring;
pub mod simulate;

pub use classifier::*;
pub use link::*;
pub use reading::*;
pub use recorder::*;
pub use scoring::*;
pub use simulate::*;

use dose_core::db::DbError;
use thiserror::Error;

/// Ingestion errors.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Non-numeric reading: {0:?}")]
    NonNumeric(String),

    #[error("Unknown subject: {0}")]
    UnknownSubject(String),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Scale link error: {0}")]
    Io(#[from] std::io::Error),
}

pub type IngestResult<T> = Result<T, IngestError>;
