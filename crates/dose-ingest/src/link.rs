//! Scale link connections.
//!
//! A bottle connects over TCP and streams one weight per line until it hangs
//! up or goes quiet for the read timeout. Each complete line is tared and
//! recorded against the bottle's subject.

use std::io::{ErrorKind, Read};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{parse_reading, IngestError, IngestResult, LineBuffer, ReadingRecorder};

/// Address the bottles connect to.
pub const DEFAULT_LINK_ADDR: &str = "0.0.0.0:5005";

/// Idle time after which a connection is closed.
pub const DEFAULT_READ_TIMEOUT_SECS: u64 = 15;

const CHUNK_SIZE: usize = 1024;

/// Outcome of one connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkSummary {
    /// Readings written as events
    pub recorded: usize,
    /// Lines that were not a number
    pub rejected: usize,
}

/// Read `reader` to the end and record every reading for `subject_id`.
///
/// `clock` stamps each reading as it is recorded. A read timeout ends the
/// connection normally; bytes after the last newline are dropped.
pub fn drain_connection<R, C>(
    reader: &mut R,
    recorder: &mut ReadingRecorder<'_>,
    subject_id: &str,
    tare: f64,
    mut clock: C,
) -> IngestResult<LinkSummary>
where
    R: Read,
    C: FnMut() -> NaiveDateTime,
{
    let mut buffer = LineBuffer::new();
    let mut chunk = [0u8; CHUNK_SIZE];
    let mut summary = LinkSummary::default();

    loop {
        let n = match reader.read(&mut chunk) {
            Ok(0) => {
                debug!(subject_id, "scale link closed by peer");
                break;
            }
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                info!(subject_id, "scale link timed out");
                break;
            }
            Err(e) => return Err(e.into()),
        };

        for line in buffer.push(&chunk[..n]) {
            match parse_reading(&line, tare) {
                Ok(grams) => {
                    recorder.record(subject_id, grams, clock())?;
                    summary.recorded += 1;
                }
                Err(IngestError::NonNumeric(_)) => summary.rejected += 1,
                Err(e) => return Err(e),
            }
        }
    }

    if !buffer.pending().is_empty() {
        debug!(subject_id, pending = buffer.pending(), "dropping partial line");
    }
    Ok(summary)
}
