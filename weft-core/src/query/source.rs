//! Per-datastream pagination cursor

use serde::Serialize;

use super::fetch::LowerBound;
use crate::time::TimeKey;

/// Pagination state of one datastream inside a merge query
///
/// - `last_key == None`: no key seen in the current page, query inclusively
///   from the window start
/// - `last_key == Some(k)`: resume strictly after `k`
/// - `last_count == Some(0)`: the last page was empty or failed, the source
///   is done for this run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Source {
    /// Datastream id
    pub id: String,
    /// Ordinal, used as the slot index by dense formats
    pub index: usize,
    last_key: Option<TimeKey>,
    last_count: Option<usize>,
}

impl Source {
    /// Fresh cursor that has not been polled yet
    pub fn new(id: impl Into<String>, index: usize) -> Self {
        Self {
            id: id.into(),
            index,
            last_key: None,
            last_count: None,
        }
    }

    /// Most recent key absorbed from this source
    pub fn last_key(&self) -> Option<TimeKey> {
        self.last_key
    }

    /// Records absorbed from the latest page, `None` before the first poll
    pub fn last_count(&self) -> Option<usize> {
        self.last_count
    }

    /// True once a poll produced nothing or failed
    pub fn is_exhausted(&self) -> bool {
        self.last_count == Some(0)
    }

    /// Whether this source should be polled in the next round
    ///
    /// A source that already ran past `min_key` waits for the others to catch
    /// up; this keeps fast sources from racing ahead and bounds buffering.
    pub fn is_eligible(&self, min_key: Option<TimeKey>) -> bool {
        if self.is_exhausted() {
            return false;
        }
        match (min_key, self.last_key) {
            (Some(min), Some(key)) => key <= min,
            _ => true,
        }
    }

    /// Lower bound for the next page
    pub fn lower_bound(&self, begins_at: TimeKey) -> LowerBound {
        match self.last_key {
            Some(key) => LowerBound::Exclusive(key),
            None => LowerBound::Inclusive(begins_at),
        }
    }

    /// A page arrived; counts restart from zero
    pub(crate) fn start_page(&mut self) {
        self.last_count = Some(0);
        self.last_key = None;
    }

    /// One record at `key` was absorbed
    pub(crate) fn advance(&mut self, key: TimeKey) {
        self.last_count = Some(self.last_count.unwrap_or(0) + 1);
        self.last_key = Some(key);
    }

    /// The fetch failed; the source drops out of the run
    pub(crate) fn fail(&mut self) {
        self.start_page();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_source_is_eligible_and_inclusive() {
        let source = Source::new("a", 0);
        assert!(source.is_eligible(None));
        assert!(source.is_eligible(Some(10)));
        assert_eq!(source.lower_bound(5), LowerBound::Inclusive(5));
    }

    #[test]
    fn source_ahead_of_min_key_waits() {
        let mut source = Source::new("a", 0);
        source.start_page();
        source.advance(10);
        source.advance(20);

        assert_eq!(source.last_count(), Some(2));
        assert!(!source.is_eligible(Some(15)));
        assert!(source.is_eligible(Some(20)));
        assert!(source.is_eligible(None));
        assert_eq!(source.lower_bound(0), LowerBound::Exclusive(20));
    }

    #[test]
    fn empty_page_or_failure_exhausts() {
        let mut source = Source::new("a", 0);
        source.start_page();
        assert!(source.is_exhausted());
        assert!(!source.is_eligible(None));

        let mut source = Source::new("b", 1);
        source.start_page();
        source.advance(3);
        source.fail();
        assert!(source.is_exhausted());
        assert_eq!(source.last_key(), None);
    }
}
