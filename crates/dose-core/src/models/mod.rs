//! Domain models for the dose monitoring system.

mod event;
mod report;
mod rows;
mod subject;

pub use event::*;
pub use report::*;
pub use rows::*;
pub use subject::*;
