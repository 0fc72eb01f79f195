use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::Notification;

/// Half-open window `[start, end)` of the newest-first log that has been materialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadedRange {
    pub start: usize,
    pub end: usize,
}

impl LoadedRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, start: usize, end: usize) -> bool {
        self.start <= start && end <= self.end
    }
}

/// One chunk handed back to the consumer.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub items: Vec<Notification>,
    pub start: usize,
    /// Length of the full log at the time of the call.
    pub total: usize,
    /// True when the window was already materialized and nothing was fetched.
    pub from_cache: bool,
}

impl Page {
    pub fn has_more(&self) -> bool {
        self.start + self.items.len() < self.total
    }
}

/// Tracks which parts of the log the consumer has paged in.
///
/// Ranges are index windows over the newest-first log. Materialized notifications are
/// keyed by their position counted from the oldest entry, which head insertion never
/// changes; ranges are shifted instead.
#[derive(Debug, Default)]
pub(crate) struct Paginator {
    ranges: Vec<LoadedRange>,
    displayed: BTreeMap<usize, Notification>,
    fetches: u64,
}

impl Paginator {
    /// Whether the union of loaded ranges covers `[start, end)`. Ranges are never merged.
    pub(crate) fn covers(&self, start: usize, end: usize) -> bool {
        if start >= end {
            return true;
        }
        if self.ranges.iter().any(|r| r.contains(start, end)) {
            return true;
        }
        let mut sorted: Vec<&LoadedRange> = self.ranges.iter().collect();
        sorted.sort_by_key(|r| r.start);
        let mut reached = start;
        for range in sorted {
            if range.start > reached {
                break;
            }
            reached = reached.max(range.end);
            if reached >= end {
                return true;
            }
        }
        false
    }

    pub(crate) fn record(&mut self, range: LoadedRange, materialized: Vec<(usize, Notification)>) {
        self.ranges.push(range);
        self.displayed.extend(materialized);
        self.fetches += 1;
    }

    pub(crate) fn displayed_at(&self, seq: usize) -> Option<&Notification> {
        self.displayed.get(&seq)
    }

    /// A notification was inserted at index 0: every loaded window moves down by one.
    pub(crate) fn on_prepend(&mut self) {
        for range in &mut self.ranges {
            range.start += 1;
            range.end += 1;
        }
    }

    pub(crate) fn mark_read(&mut self, seq: usize) {
        if let Some(notification) = self.displayed.get_mut(&seq) {
            notification.read = true;
        }
    }

    pub(crate) fn mark_all_read(&mut self) {
        for notification in self.displayed.values_mut() {
            notification.read = true;
        }
    }

    /// End of the furthest loaded window, i.e. where the next chunk starts.
    pub(crate) fn frontier(&self) -> usize {
        self.ranges.iter().map(|r| r.end).max().unwrap_or(0)
    }

    pub(crate) fn ranges(&self) -> &[LoadedRange] {
        &self.ranges
    }

    /// Materialized view, newest first.
    pub(crate) fn displayed(&self) -> Vec<Notification> {
        self.displayed.values().rev().cloned().collect()
    }

    pub(crate) fn fetches(&self) -> u64 {
        self.fetches
    }

    pub(crate) fn reset(&mut self) {
        self.ranges.clear();
        self.displayed.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paginator_with(ranges: &[(usize, usize)]) -> Paginator {
        let mut p = Paginator::default();
        for &(start, end) in ranges {
            p.record(LoadedRange::new(start, end), Vec::new());
        }
        p
    }

    #[test]
    fn test_single_range_coverage() {
        let p = paginator_with(&[(0, 10)]);
        assert!(p.covers(0, 10));
        assert!(p.covers(3, 7));
        assert!(!p.covers(5, 11));
    }

    #[test]
    fn test_adjacent_ranges_cover_union_without_merging() {
        let p = paginator_with(&[(10, 20), (0, 10)]);
        assert!(p.covers(5, 15));
        assert!(!p.covers(5, 25));
        assert_eq!(p.ranges().len(), 2);
    }

    #[test]
    fn test_gap_is_not_covered() {
        let p = paginator_with(&[(0, 5), (6, 10)]);
        assert!(!p.covers(0, 10));
        assert!(p.covers(6, 8));
    }

    #[test]
    fn test_empty_window_is_trivially_covered() {
        let p = Paginator::default();
        assert!(p.covers(4, 4));
        assert!(!p.covers(0, 1));
    }

    #[test]
    fn test_prepend_shifts_ranges() {
        let mut p = paginator_with(&[(0, 5)]);
        p.on_prepend();
        assert_eq!(p.ranges(), &[LoadedRange::new(1, 6)]);
        assert!(!p.covers(0, 5));
        assert_eq!(p.frontier(), 6);
    }

    #[test]
    fn test_page_has_more() {
        let page = Page {
            items: Vec::new(),
            start: 0,
            total: 3,
            from_cache: false,
        };
        assert!(page.has_more());
    }
}
