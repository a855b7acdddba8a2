// File: ./src/pipeline/window.rs
use crate::model::Event;
use chrono::{DateTime, FixedOffset, TimeDelta};

/// Keeps events starting within `[now, now + horizon_days]`, both ends
/// inclusive, ordered by start instant.
///
/// Events whose `start_iso` does not parse are dropped. The sort is stable,
/// so events sharing an instant keep their incoming order. A horizon past
/// the end of the representable calendar leaves the upper end open.
pub fn filter_window(events: Vec<Event>, now: DateTime<FixedOffset>, horizon_days: u32) -> Vec<Event> {
    let end = TimeDelta::try_days(i64::from(horizon_days)).and_then(|d| now.checked_add_signed(d));

    let mut kept: Vec<(DateTime<FixedOffset>, Event)> = events
        .into_iter()
        .filter_map(|ev| ev.start().map(|start| (start, ev)))
        .filter(|(start, _)| *start >= now && end.is_none_or(|end| *start <= end))
        .collect();

    kept.sort_by_key(|(start, _)| *start);
    kept.into_iter().map(|(_, ev)| ev).collect()
}
