use std::collections::HashMap;
use std::hash::Hash;

use tracing::{debug, warn};
use types::{BookedClass, Hhmm, PlacementId, ResourceBooking};

use crate::pending::PendingDeletions;
use crate::time::{add_blocks, day_index, minutes_of, parse_time};

/// Half-open overlap. Intervals that only touch do not overlap.
pub fn spans_overlap(a_start: i32, a_end: i32, b_start: i32, b_end: i32) -> bool {
    a_start < b_end && a_end > b_start
}

/// Bookings of one resource that collide with `[start, start + blocks)` on `day`.
///
/// The class being moved (`exclude`) and anything already marked for deletion
/// are ignored. Booked entries with unreadable times never collide.
pub fn overlapping_bookings<'a>(
    records: &'a [ResourceBooking],
    day: usize,
    start: Hhmm,
    required_blocks: u32,
    exclude: Option<&PlacementId>,
    pending: &PendingDeletions,
) -> Vec<&'a BookedClass> {
    let cand_start = minutes_of(start);
    let cand_end = minutes_of(add_blocks(start, required_blocks as i32));

    records
        .iter()
        .filter(|r| day_index(&r.day_of_week) == Some(day))
        .flat_map(|r| r.classes.iter())
        .filter(|b| Some(&b.schedule_id) != exclude && !pending.contains(&b.schedule_id))
        .filter(|b| {
            let (Some(bs), Some(be)) = (parse_time(&b.start_time), parse_time(&b.end_time)) else {
                warn!(id = %b.schedule_id, start = %b.start_time, end = %b.end_time, "unreadable booking ignored");
                return false;
            };
            spans_overlap(cand_start, cand_end, minutes_of(bs), minutes_of(be))
        })
        .collect()
}

pub fn is_resource_free<K>(
    resource_id: &K,
    day: usize,
    start: Hhmm,
    required_blocks: u32,
    bookings: &HashMap<K, Vec<ResourceBooking>>,
    exclude: Option<&PlacementId>,
    pending: &PendingDeletions,
) -> bool
where
    K: Eq + Hash + std::fmt::Display,
{
    let Some(records) = bookings.get(resource_id) else {
        return true;
    };
    let hits = overlapping_bookings(records, day, start, required_blocks, exclude, pending);
    if let Some(first) = hits.first() {
        debug!(resource = %resource_id, day, %start, with = %first.schedule_id, "resource busy");
        return false;
    }
    true
}
