//! Derived adherence data.
//!
//! Pipeline: Raw rows → Normalization → Dose reconstruction → Calendar / Histogram

mod calendar;
mod histogram;
mod normalizer;
mod reconstructor;

pub use calendar::*;
pub use histogram::*;
pub use normalizer::*;
pub use reconstructor::*;

pub(crate) use normalizer::value_as_string;

use thiserror::Error;

/// Doses per day assumed when a prescription does not say.
pub const DEFAULT_DOSES_PER_DAY: u32 = 2;

/// Derivation errors.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DeriveError {
    #[error("Invalid calendar month: {year}-{month}")]
    InvalidMonth { year: i32, month: u32 },
}

pub type DeriveResult<T> = Result<T, DeriveError>;
