//! Slideshow timing: which interval applies to the current page, and how
//! timer ticks wrap around the ends of the document.

use std::time::Duration;

use tracing::warn;

use crate::registry::Key;
use crate::state::NavigationState;

/// Wait used when neither a fixed interval nor a covering table is set.
pub const DEFAULT_INTERVAL_SECS: u32 = 10;
/// Fixed interval substituted when the per-page table is too short.
pub const MISMATCH_INTERVAL_SECS: u32 = 15;
/// Granularity of the slideshow wait loop.
pub const TICK: Duration = Duration::from_millis(10);

/// Discards a per-page interval table that does not cover every page and
/// falls back to a fixed interval. Returns true when the table was dropped.
pub fn normalize_intervals(state: &mut NavigationState) -> bool {
    if state.intervals.is_empty() || state.intervals.len() >= state.num_pages {
        return false;
    }
    warn!(
        pages = state.num_pages,
        intervals = state.intervals.len(),
        "page count and slideshow intervals mismatch, using {}s for every page",
        MISMATCH_INTERVAL_SECS
    );
    state.intervals.clear();
    state.interval = MISMATCH_INTERVAL_SECS;
    true
}

/// Seconds to show the current page for.
pub fn interval_secs(state: &NavigationState) -> u32 {
    if state.interval != 0 {
        return state.interval;
    }
    if !state.intervals.is_empty() && state.intervals.len() >= state.num_pages {
        if let Some(&secs) = state.intervals.get(state.page) {
            return secs;
        }
    }
    DEFAULT_INTERVAL_SECS
}

pub fn interval_for(state: &NavigationState) -> Duration {
    Duration::from_secs(u64::from(interval_secs(state)))
}

/// Number of wait ticks for `duration`; zero-length waits still poll once.
pub fn tick_count(duration: Duration) -> u32 {
    let ticks = duration.as_millis() / TICK.as_millis();
    ticks.clamp(1, u128::from(u32::MAX)) as u32
}

/// Remaps advance on the last page to "first page" and back on the first
/// page to "last page" so the slideshow loops.
pub fn wrap_key(key: Key, state: &NavigationState) -> Key {
    if key == Key::ADVANCE && state.is_last_page() {
        Key::FIRST_PAGE
    } else if key == Key::BACK && state.is_first_page() {
        Key::LAST_PAGE
    } else {
        key
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(page: usize, num_pages: usize, interval: u32, intervals: &[u32]) -> NavigationState {
        NavigationState {
            page,
            num_pages,
            interval,
            intervals: intervals.to_vec(),
            ..NavigationState::default()
        }
    }

    #[test]
    fn covering_table_supplies_current_page_interval() {
        let mut nav = state(1, 3, 0, &[5, 7, 9]);
        assert!(!normalize_intervals(&mut nav));
        assert_eq!(interval_secs(&nav), 7);
        assert_eq!(interval_for(&nav), Duration::from_secs(7));
    }

    #[test]
    fn short_table_is_discarded_for_fixed_fifteen_seconds() {
        let mut nav = state(1, 3, 0, &[5, 7]);
        assert!(normalize_intervals(&mut nav));
        assert!(nav.intervals.is_empty());
        assert_eq!(nav.interval, MISMATCH_INTERVAL_SECS);
        assert_eq!(interval_secs(&nav), 15);
        assert!(nav.is_slideshow());
    }

    #[test]
    fn nothing_configured_defaults_to_ten_seconds() {
        let mut nav = state(0, 3, 0, &[]);
        assert!(!normalize_intervals(&mut nav));
        assert_eq!(interval_secs(&nav), DEFAULT_INTERVAL_SECS);
        assert!(!nav.is_slideshow());
    }

    #[test]
    fn fixed_interval_wins_over_table() {
        let nav = state(2, 3, 4, &[5, 7, 9]);
        assert_eq!(interval_secs(&nav), 4);
    }

    #[test]
    fn unchecked_short_table_falls_back_to_default() {
        let nav = state(2, 3, 0, &[5, 7]);
        assert_eq!(interval_secs(&nav), DEFAULT_INTERVAL_SECS);
    }

    #[test]
    fn advance_wraps_to_first_page_at_end() {
        let nav = state(4, 5, 3, &[]);
        assert_eq!(wrap_key(Key::ADVANCE, &nav), Key::FIRST_PAGE);
        assert_eq!(wrap_key(Key::BACK, &nav), Key::BACK);
    }

    #[test]
    fn back_wraps_to_last_page_at_start() {
        let nav = state(0, 5, 3, &[]);
        assert_eq!(wrap_key(Key::BACK, &nav), Key::LAST_PAGE);
        assert_eq!(wrap_key(Key::ADVANCE, &nav), Key::ADVANCE);
    }

    #[test]
    fn tick_count_polls_at_least_once() {
        assert_eq!(tick_count(Duration::ZERO), 1);
        assert_eq!(tick_count(Duration::from_secs(2)), 200);
    }
}
