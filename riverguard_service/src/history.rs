//! Rolling depth history for the recent-trend chart.

use std::collections::VecDeque;

use crate::model::HistoryPoint;

/// Number of points kept for the chart.
pub const HISTORY_CAPACITY: usize = 20;

/// Bounded, arrival-ordered sequence of chart points.
///
/// Appending a point whose label matches the newest stored label is a
/// no-op, so repeated polls that land on the same displayed second do not
/// produce duplicate points.
#[derive(Debug, Clone)]
pub struct RollingHistory {
    points: VecDeque<HistoryPoint>,
    capacity: usize,
}

impl Default for RollingHistory {
    fn default() -> Self {
        Self::with_capacity(HISTORY_CAPACITY)
    }
}

impl RollingHistory {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            points: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Returns `true` if the point was stored.
    pub fn append(&mut self, label: impl Into<String>, value: f64) -> bool {
        let label = label.into();
        if self.last_label() == Some(label.as_str()) {
            return false;
        }
        self.points.push_back(HistoryPoint { label, value });
        if self.points.len() > self.capacity {
            self.points.pop_front();
        }
        true
    }

    pub fn last_label(&self) -> Option<&str> {
        self.points.back().map(|p| p.label.as_str())
    }

    pub fn snapshot(&self) -> Vec<HistoryPoint> {
        self.points.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label(i: usize) -> String {
        format!("12:00:{:02}", i)
    }

    #[test]
    fn test_new_history_is_empty() {
        let history = RollingHistory::default();
        assert!(history.is_empty());
        assert!(history.last_label().is_none());
    }

    #[test]
    fn test_appends_keep_arrival_order() {
        let mut history = RollingHistory::default();
        history.append("12:00:01", 10.0);
        history.append("12:00:04", 12.0);
        history.append("12:00:07", 11.0);

        let labels: Vec<_> = history.snapshot().into_iter().map(|p| p.label).collect();
        assert_eq!(labels, vec!["12:00:01", "12:00:04", "12:00:07"]);
    }

    #[test]
    fn test_repeated_label_is_ignored() {
        let mut history = RollingHistory::default();
        assert!(history.append("12:00:01", 10.0));
        assert!(!history.append("12:00:01", 99.0));
        assert_eq!(history.len(), 1);
        assert_eq!(history.snapshot()[0].value, 10.0, "first value for a label wins");
    }

    #[test]
    fn test_label_only_compared_against_newest_point() {
        let mut history = RollingHistory::default();
        history.append("12:00:01", 10.0);
        history.append("12:00:02", 11.0);
        assert!(history.append("12:00:01", 12.0), "older labels do not block an append");
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn test_overflow_evicts_oldest_first() {
        let mut history = RollingHistory::default();
        for i in 0..25 {
            history.append(label(i), i as f64);
        }

        let snapshot = history.snapshot();
        assert_eq!(snapshot.len(), HISTORY_CAPACITY);
        assert_eq!(snapshot.first().map(|p| p.value), Some(5.0));
        assert_eq!(snapshot.last().map(|p| p.value), Some(24.0));
        for pair in snapshot.windows(2) {
            assert!(pair[0].value < pair[1].value, "relative order must be preserved");
        }
    }

    #[test]
    fn test_each_append_evicts_at_most_one_point() {
        let mut history = RollingHistory::with_capacity(3);
        for i in 0..3 {
            history.append(label(i), i as f64);
        }
        history.append(label(3), 3.0);
        assert_eq!(history.len(), 3);
        assert_eq!(history.snapshot()[0].label, label(1));
    }

    #[test]
    fn test_duplicate_at_capacity_does_not_evict() {
        let mut history = RollingHistory::default();
        for i in 0..HISTORY_CAPACITY {
            history.append(label(i), i as f64);
        }
        let before = history.snapshot();
        history.append(label(HISTORY_CAPACITY - 1), 0.0);
        assert_eq!(history.snapshot(), before);
    }

    #[test]
    fn test_snapshot_does_not_mutate() {
        let mut history = RollingHistory::default();
        history.append("12:00:01", 10.0);
        let first = history.snapshot();
        let second = history.snapshot();
        assert_eq!(first, second);
        assert_eq!(history.len(), 1);
    }
}
