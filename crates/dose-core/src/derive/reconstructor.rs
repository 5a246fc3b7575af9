//! Dose-size reconstruction from consecutive pill-count readings.
//!
//! The bottle only reports how many pills are left; the number taken at each
//! event is the drop from the immediately preceding reading. A rise means the
//! bottle was refilled and counts as zero.

use std::cmp::{Ordering, Reverse};

use tracing::debug;

use crate::models::{DoseEvent, Event, PillCountPoint};

/// Chronological order with a deterministic tie-break.
///
/// Undated events sort first. Equal timestamps fall back to backend row id
/// (rows without one first), then to the higher pill count first, since
/// within one instant the fuller reading must have come earlier.
pub fn chronological_cmp(a: &Event, b: &Event) -> Ordering {
    a.timestamp
        .cmp(&b.timestamp)
        .then_with(|| a.row_id.cmp(&b.row_id))
        .then_with(|| {
            // Some(..) before None, larger counts before smaller
            let key = |e: &Event| (e.pill_count.is_none(), e.pill_count.map(Reverse));
            key(a).cmp(&key(b))
        })
}

/// Populate dose sizes for one subject's events. Output is ascending.
///
/// Always recomputes from scratch: an inserted or amended row changes the
/// predecessor of its neighbour.
pub fn reconstruct_dose_sizes(mut events: Vec<Event>) -> Vec<DoseEvent> {
    events.sort_by(chronological_cmp);

    let mut previous: Option<i64> = None;
    let reconstructed: Vec<DoseEvent> = events
        .into_iter()
        .map(|event| {
            let dose_size = match (previous, event.pill_count) {
                (Some(prev), Some(current)) => {
                    u32::try_from((prev - current).max(0)).unwrap_or(u32::MAX)
                }
                _ => 0,
            };
            previous = event.pill_count;
            DoseEvent { event, dose_size }
        })
        .collect();

    debug!(events = reconstructed.len(), "reconstructed dose sizes");
    reconstructed
}

/// Reconstruct and return newest first, the event-log order.
pub fn reconstruct_newest_first(events: Vec<Event>) -> Vec<DoseEvent> {
    let mut reconstructed = reconstruct_dose_sizes(events);
    reconstructed.reverse();
    reconstructed
}

/// Pill-count chart points in ascending time order.
pub fn pill_count_series<E: AsRef<Event>>(events: &[E]) -> Vec<PillCountPoint> {
    let mut sorted: Vec<&Event> = events.iter().map(|e| e.as_ref()).collect();
    sorted.sort_by(|a, b| chronological_cmp(a, b));

    sorted
        .into_iter()
        .filter_map(|e| match (e.timestamp, e.pill_count) {
            (Some(timestamp), Some(pill_count)) => Some(PillCountPoint {
                timestamp,
                pill_count,
            }),
            _ => None,
        })
        .collect()
}
