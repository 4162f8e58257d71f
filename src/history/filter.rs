//! Ordering, time window, resume cursor and limit over reconstructed events.

use crate::history::event::HistoricalEvent;
use crate::history::options::{HistoricalEventsOptions, SortDirection};

/// Order `events` by id in the requested direction, then apply, in turn,
/// the inclusive `[start_time, end_time]` window, the `after` cursor and
/// the limit.
pub fn apply_filters(events: &mut Vec<HistoricalEvent>, options: &HistoricalEventsOptions) {
    match options.sort_direction {
        SortDirection::Ascending => events.sort_by(|a, b| a.id.cmp(&b.id)),
        SortDirection::Descending => events.sort_by(|a, b| b.id.cmp(&a.id)),
    }

    if options.start_time.is_some() || options.end_time.is_some() {
        let start = options.start_time.unwrap_or(i64::MIN);
        let end = options.end_time.unwrap_or(i64::MAX);
        events.retain(|e| (start..=end).contains(&e.timestamp()));
    }

    if let Some(after) = options.after {
        match options.sort_direction {
            SortDirection::Ascending => events.retain(|e| e.id > after),
            SortDirection::Descending => events.retain(|e| e.id < after),
        }
    }

    if let Some(limit) = options.limit {
        events.truncate(limit);
    }
}
