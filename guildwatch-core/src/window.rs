//! Sliding window event tracking.
//!
//! Each key owns a timestamp log in insertion order. Reads trim the expired
//! prefix before counting, so a log never holds more than
//! `rate × window` entries no matter how long a burst lasts.

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;

/// Per-key timestamped event log with expiry-on-read.
#[derive(Debug, Clone)]
pub struct SlidingWindowTracker<K> {
    logs: HashMap<K, VecDeque<u64>>,
}

impl<K> Default for SlidingWindowTracker<K> {
    fn default() -> Self {
        Self {
            logs: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash + Clone> SlidingWindowTracker<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event for `key`.
    ///
    /// Logs are kept non-decreasing: a timestamp older than the newest entry
    /// is recorded at the newest entry's time.
    pub fn record(&mut self, key: K, ts_ms: u64) {
        let log = self.logs.entry(key).or_default();
        let ts = log.back().map_or(ts_ms, |last| ts_ms.max(*last));
        log.push_back(ts);
    }

    /// Drop entries with `now - entry > window` and return what remains.
    ///
    /// A key whose log empties is forgotten entirely.
    pub fn count_within(&mut self, key: &K, window_ms: u64, now_ms: u64) -> usize {
        let Some(log) = self.logs.get_mut(key) else {
            return 0;
        };

        let count = trim_expired(log, window_ms, now_ms);
        if count == 0 {
            self.logs.remove(key);
        }
        count
    }

    /// Record at `ts_ms` and return the count within the window ending there.
    pub fn record_and_count(&mut self, key: K, ts_ms: u64, window_ms: u64) -> usize {
        self.record(key.clone(), ts_ms);
        self.count_within(&key, window_ms, ts_ms)
    }

    /// Forget one key. Returns whether anything was tracked.
    pub fn clear(&mut self, key: &K) -> bool {
        self.logs.remove(key).is_some()
    }

    /// Forget every key matching `predicate`. Returns how many were removed.
    pub fn clear_where<F>(&mut self, mut predicate: F) -> usize
    where
        F: FnMut(&K) -> bool,
    {
        let before = self.logs.len();
        self.logs.retain(|k, _| !predicate(k));
        before - self.logs.len()
    }

    pub fn clear_all(&mut self) {
        self.logs.clear();
    }

    /// Number of keys with a non-empty log (as of their last read).
    pub fn tracked_keys(&self) -> usize {
        self.logs.len()
    }

    /// Trim every log matching `predicate` to the window ending at `now_ms`
    /// and return how many still hold entries. Emptied logs are forgotten.
    pub fn live_where<F>(&mut self, window_ms: u64, now_ms: u64, mut predicate: F) -> usize
    where
        F: FnMut(&K) -> bool,
    {
        let mut live = 0;
        self.logs.retain(|k, log| {
            if !predicate(k) {
                return true;
            }
            let keep = trim_expired(log, window_ms, now_ms) > 0;
            live += usize::from(keep);
            keep
        });
        live
    }

    pub fn is_tracked(&self, key: &K) -> bool {
        self.logs.contains_key(key)
    }
}

fn trim_expired(log: &mut VecDeque<u64>, window_ms: u64, now_ms: u64) -> usize {
    while let Some(&oldest) = log.front() {
        if now_ms.saturating_sub(oldest) > window_ms {
            log.pop_front();
        } else {
            break;
        }
    }
    log.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    // ===========================================
    // Category B — Windowing
    // ===========================================

    const WINDOW: u64 = 10_000;

    #[test]
    fn test_count_unknown_key_is_zero() {
        let mut tracker: SlidingWindowTracker<u64> = SlidingWindowTracker::new();
        assert_eq!(tracker.count_within(&1, WINDOW, 0), 0);
    }

    #[test]
    fn test_count_within_window() {
        let mut tracker = SlidingWindowTracker::new();
        for ts in [1_000, 2_000, 3_000] {
            tracker.record(7u64, ts);
        }
        assert_eq!(tracker.count_within(&7, WINDOW, 3_000), 3);
    }

    #[test]
    fn test_entry_exactly_at_window_edge_is_kept() {
        let mut tracker = SlidingWindowTracker::new();
        tracker.record(1u64, 0);
        tracker.record(1u64, 5_000);

        // now - 0 == window: still inside [now - window, now]
        assert_eq!(tracker.count_within(&1, WINDOW, 10_000), 2);
        // one ms later it falls out
        assert_eq!(tracker.count_within(&1, WINDOW, 10_001), 1);
    }

    #[test]
    fn test_pruned_entries_stay_pruned() {
        let mut tracker = SlidingWindowTracker::new();
        tracker.record(1u64, 0);
        tracker.record(1u64, 8_000);

        assert_eq!(tracker.count_within(&1, WINDOW, 12_000), 1);
        // Asking about an earlier instant cannot resurrect the trimmed entry.
        assert_eq!(tracker.count_within(&1, WINDOW, 9_000), 1);
    }

    #[test]
    fn test_empty_log_forgets_key() {
        let mut tracker = SlidingWindowTracker::new();
        tracker.record(1u64, 0);
        assert!(tracker.is_tracked(&1));

        assert_eq!(tracker.count_within(&1, WINDOW, 60_000), 0);
        assert!(!tracker.is_tracked(&1));
        assert_eq!(tracker.tracked_keys(), 0);
    }

    #[test]
    fn test_live_where_skips_expired_unread_keys() {
        let mut tracker = SlidingWindowTracker::new();
        tracker.record((1u64, 10u64), 0);
        tracker.record((1u64, 11u64), 8_000);
        tracker.record((2u64, 10u64), 0);

        // (1, 10) expired but was never read back
        assert_eq!(tracker.tracked_keys(), 3);
        assert_eq!(tracker.live_where(WINDOW, 12_000, |(guild, _)| *guild == 1), 1);
        assert!(!tracker.is_tracked(&(1, 10)));
        // keys outside the predicate are left alone
        assert!(tracker.is_tracked(&(2, 10)));
        assert_eq!(tracker.tracked_keys(), 2);
    }

    #[test]
    fn test_out_of_order_timestamp_clamped() {
        let mut tracker = SlidingWindowTracker::new();
        tracker.record(1u64, 5_000);
        tracker.record(1u64, 1_000);

        // The late entry is held at 5_000, so both survive until 15_000.
        assert_eq!(tracker.count_within(&1, WINDOW, 15_000), 2);
        assert_eq!(tracker.count_within(&1, WINDOW, 15_001), 0);
    }

    #[test]
    fn test_record_and_count() {
        let mut tracker = SlidingWindowTracker::new();
        let counts: Vec<usize> = (0..5)
            .map(|i| tracker.record_and_count(3u64, i * 4_000, WINDOW))
            .collect();

        // t=0,4k,8k,12k,16k with a 10s window
        assert_eq!(counts, vec![1, 2, 3, 3, 3]);
    }

    #[test]
    fn test_keys_are_independent() {
        let mut tracker = SlidingWindowTracker::new();
        tracker.record("a", 0);
        tracker.record("a", 1);
        tracker.record("b", 2);

        assert_eq!(tracker.count_within(&"a", WINDOW, 2), 2);
        assert_eq!(tracker.count_within(&"b", WINDOW, 2), 1);
    }

    #[test]
    fn test_clear_and_clear_where() {
        let mut tracker = SlidingWindowTracker::new();
        tracker.record((1u64, 10u64), 0);
        tracker.record((1u64, 11u64), 0);
        tracker.record((2u64, 10u64), 0);

        assert!(tracker.clear(&(1, 10)));
        assert!(!tracker.clear(&(1, 10)));

        assert_eq!(tracker.clear_where(|(guild, _)| *guild == 1), 1);
        assert_eq!(tracker.tracked_keys(), 1);
        assert_eq!(tracker.live_where(WINDOW, 0, |(guild, _)| *guild == 2), 1);

        tracker.clear_all();
        assert_eq!(tracker.tracked_keys(), 0);
    }

    #[test]
    fn test_burst_stays_bounded() {
        let mut tracker = SlidingWindowTracker::new();
        let mut max_seen = 0;
        // 100 events per second for a minute
        for i in 0..6_000u64 {
            let count = tracker.record_and_count(1u64, i * 10, WINDOW);
            max_seen = max_seen.max(count);
        }
        assert_eq!(max_seen, 1_001);
    }

    #[test]
    fn test_count_matches_brute_force_for_interleavings() {
        let stamps = [0u64, 1, 1, 400, 2_000, 9_999, 10_000, 10_001, 15_000, 30_000];
        let instants = [0u64, 5, 9_999, 10_000, 10_001, 10_002, 20_000, 40_000];

        for split in 0..stamps.len() {
            let mut tracker = SlidingWindowTracker::new();
            let mut recorded: Vec<u64> = Vec::new();
            for (i, &ts) in stamps.iter().enumerate() {
                tracker.record(0u8, ts);
                recorded.push(ts);
                if i == split {
                    // interleave a read mid-stream
                    tracker.count_within(&0, WINDOW, ts);
                }
            }
            let mut last_seen = *stamps.last().unwrap_or(&0);
            for &instant in &instants {
                let now = instant.max(last_seen);
                last_seen = now;
                let expected = recorded
                    .iter()
                    .filter(|&&ts| ts + WINDOW >= now && ts <= now)
                    .count();
                assert_eq!(tracker.count_within(&0, WINDOW, now), expected, "split={split} now={now}");
            }
        }
    }
}
