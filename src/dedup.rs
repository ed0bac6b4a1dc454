//! Duplicate suppression for snapshot streams
//!
//! The filter remembers the fingerprint of the last snapshot it let through
//! and rejects candidates with identical content. It knows nothing about
//! where a candidate came from; the sync agent funnels every source through
//! one instance.

use crate::snapshot::{Fingerprint, StateSnapshot};

/// Last-emitted-content filter
#[derive(Debug, Default)]
pub struct DedupFilter {
    last: Option<Fingerprint>,
    emitted: u64,
    suppressed: u64,
}

impl DedupFilter {
    /// Create an empty filter; the first candidate always passes
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide whether `candidate` should be emitted
    ///
    /// Returns `true` when nothing has been emitted yet or the content
    /// differs from the last emission, and records `candidate` as the new
    /// last emission. Returns `false` without touching state otherwise.
    pub fn should_emit(&mut self, candidate: &StateSnapshot) -> bool {
        if self.last.as_ref() == Some(candidate.fingerprint()) {
            self.suppressed += 1;
            return false;
        }

        self.last = Some(candidate.fingerprint().clone());
        self.emitted += 1;
        true
    }

    /// Forget the last emission
    pub fn reset(&mut self) {
        self.last = None;
    }

    /// Fingerprint of the last emitted snapshot
    pub fn last_fingerprint(&self) -> Option<&Fingerprint> {
        self.last.as_ref()
    }

    /// Number of candidates let through
    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    /// Number of candidates rejected as duplicates
    pub fn suppressed(&self) -> u64 {
        self.suppressed
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn snap(score: &str) -> StateSnapshot {
        StateSnapshot::from_value(json!({ "score": score })).unwrap()
    }

    #[test]
    fn test_first_candidate_emits() {
        let mut filter = DedupFilter::new();
        assert!(filter.last_fingerprint().is_none());
        assert!(filter.should_emit(&snap("0-0")));
        assert!(filter.last_fingerprint().is_some());
    }

    #[test]
    fn test_run_of_identical_emits_once() {
        let mut filter = DedupFilter::new();

        // Independently constructed, same content
        let results: Vec<bool> = (0..5).map(|_| filter.should_emit(&snap("1-0"))).collect();

        assert_eq!(results, vec![true, false, false, false, false]);
        assert_eq!(filter.emitted(), 1);
        assert_eq!(filter.suppressed(), 4);
    }

    #[test]
    fn test_change_then_revert_emits_each_time() {
        let mut filter = DedupFilter::new();

        assert!(filter.should_emit(&snap("1-0")));
        assert!(filter.should_emit(&snap("1-1")));
        // Reverting to earlier content is still a change from the last emission
        assert!(filter.should_emit(&snap("1-0")));
        assert!(!filter.should_emit(&snap("1-0")));
    }

    #[test]
    fn test_rejection_keeps_state() {
        let mut filter = DedupFilter::new();
        let first = snap("2-1");

        filter.should_emit(&first);
        filter.should_emit(&snap("2-1"));

        assert_eq!(filter.last_fingerprint(), Some(first.fingerprint()));
    }

    #[test]
    fn test_reset_reopens_filter() {
        let mut filter = DedupFilter::new();

        assert!(filter.should_emit(&snap("3-3")));
        filter.reset();
        assert!(filter.should_emit(&snap("3-3")));
    }
}
