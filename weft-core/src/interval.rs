//! Half-open time intervals and the algebra the config builder needs
//!
//! An [`Interval`] is `[begin, end)`: the begin is inclusive, the end is
//! exclusive. Adjacent intervals `[a, b)` and `[b, c)` therefore touch without
//! overlapping, which is what lets the annotation applier split an instance
//! into pieces that cover it exactly.

use core::fmt;
use serde::{Deserialize, Serialize};

use crate::time::{to_iso, TimeKey};

/// A time interval `[begin, end)` in epoch millis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Interval {
    /// Inclusive start
    pub begin: TimeKey,
    /// Exclusive end
    pub end: TimeKey,
}

impl Interval {
    /// Create an interval, or `None` when `end <= begin`
    pub fn new(begin: TimeKey, end: TimeKey) -> Option<Self> {
        if end <= begin {
            None
        } else {
            Some(Self { begin, end })
        }
    }

    /// True when the interval holds no instant
    pub fn is_empty(&self) -> bool {
        self.end <= self.begin
    }

    /// Check if `key` falls inside the interval
    pub fn contains(&self, key: TimeKey) -> bool {
        self.begin <= key && key < self.end
    }

    /// Length in millis
    pub fn duration(&self) -> i64 {
        self.end.saturating_sub(self.begin).max(0)
    }

    /// Check whether two intervals share at least one instant
    pub fn overlaps(&self, other: &Interval) -> bool {
        self.begin < other.end && other.begin < self.end
    }

    /// Shared part of both intervals
    pub fn intersection(&self, other: &Interval) -> Option<Interval> {
        Interval::new(self.begin.max(other.begin), self.end.min(other.end))
    }

    /// Parts of `self` not covered by `other`, in ascending order
    ///
    /// Yields zero, one or two intervals. Disjoint inputs give back `self`.
    pub fn difference(&self, other: &Interval) -> Vec<Interval> {
        if !self.overlaps(other) {
            return vec![*self];
        }

        let mut pieces = Vec::with_capacity(2);
        if let Some(left) = Interval::new(self.begin, other.begin) {
            pieces.push(left);
        }
        if let Some(right) = Interval::new(other.end, self.end) {
            pieces.push(right);
        }
        pieces
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", to_iso(self.begin), to_iso(self.end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn iv(begin: i64, end: i64) -> Interval {
        Interval::new(begin, end).unwrap()
    }

    #[test]
    fn rejects_degenerate() {
        assert!(Interval::new(10, 10).is_none());
        assert!(Interval::new(10, 5).is_none());
        assert!(Interval::new(5, 10).is_some());
    }

    #[test]
    fn half_open_overlap() {
        assert!(iv(0, 10).overlaps(&iv(5, 15)));
        assert!(!iv(0, 10).overlaps(&iv(10, 20)));
        assert!(iv(0, 10).contains(0));
        assert!(!iv(0, 10).contains(10));
    }

    #[test]
    fn intersection_cases() {
        assert_eq!(iv(0, 100).intersection(&iv(20, 40)), Some(iv(20, 40)));
        assert_eq!(iv(0, 30).intersection(&iv(20, 40)), Some(iv(20, 30)));
        assert_eq!(iv(0, 20).intersection(&iv(20, 40)), None);
    }

    #[test]
    fn difference_cases() {
        assert_eq!(iv(0, 100).difference(&iv(20, 40)), vec![iv(0, 20), iv(40, 100)]);
        assert_eq!(iv(0, 100).difference(&iv(0, 40)), vec![iv(40, 100)]);
        assert_eq!(iv(0, 100).difference(&iv(-10, 140)), vec![]);
        assert_eq!(iv(0, 10).difference(&iv(20, 40)), vec![iv(0, 10)]);
    }

    proptest! {
        #[test]
        fn difference_and_intersection_rebuild_the_interval(
            a in -1000i64..1000, alen in 1i64..500,
            b in -1000i64..1000, blen in 1i64..500,
        ) {
            let inst = iv(a, a + alen);
            let ann = iv(b, b + blen);

            let mut pieces = inst.difference(&ann);
            if inst.overlaps(&ann) {
                pieces.extend(inst.intersection(&ann));
            }
            pieces.sort_by_key(|p| p.begin);

            prop_assert_eq!(pieces[0].begin, inst.begin);
            prop_assert_eq!(pieces[pieces.len() - 1].end, inst.end);
            for pair in pieces.windows(2) {
                prop_assert_eq!(pair[0].end, pair[1].begin);
            }
            let total: i64 = pieces.iter().map(Interval::duration).sum();
            prop_assert_eq!(total, inst.duration());
        }
    }
}
