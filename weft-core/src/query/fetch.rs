//! The `find` collaborator seam
//!
//! A merge query knows nothing about where datapoints live. It asks a
//! [`Find`] implementation for one page per source per round:
//!
//! ```text
//! datastream_id = "ds1"
//! time          > last_key        (or >= begins_at on the first page)
//! time          < ends_before
//! limit         = page size, ascending by time
//! ```
//!
//! A page may come back whole ([`Page::Batch`]) or as a feed of records
//! ([`Page::Feed`]); the engine handles both the same way. Failures are one
//! terminal [`FetchError`] per call. Retrying is the implementation's
//! business, never the engine's.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;

use super::record::Datapoint;
use crate::errors::FetchError;
use crate::time::TimeKey;

/// Lower bound of a page request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LowerBound {
    /// `time >= key`, used for the first page of a source
    Inclusive(TimeKey),
    /// `time > key`, used to resume after the last absorbed key
    Exclusive(TimeKey),
}

impl LowerBound {
    /// Key the bound is anchored at
    pub fn key(&self) -> TimeKey {
        match self {
            LowerBound::Inclusive(key) | LowerBound::Exclusive(key) => *key,
        }
    }

    /// Check whether `key` satisfies this bound
    pub fn admits(&self, key: TimeKey) -> bool {
        match self {
            LowerBound::Inclusive(bound) => key >= *bound,
            LowerBound::Exclusive(bound) => key > *bound,
        }
    }
}

/// One page request for one datastream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FindRequest {
    /// Datastream to read
    pub datastream_id: String,
    /// Inclusive or exclusive lower bound
    pub lower: LowerBound,
    /// Exclusive upper bound
    pub ends_before: TimeKey,
    /// Maximum records in the page
    pub limit: usize,
}

impl FindRequest {
    /// Check whether `key` falls inside the requested window
    pub fn admits(&self, key: TimeKey) -> bool {
        self.lower.admits(key) && key < self.ends_before
    }
}

/// Incrementally delivered page
pub type Feed = BoxStream<'static, Result<Datapoint, FetchError>>;

/// Result of a successful `find`
pub enum Page {
    /// Whole page at once
    Batch(Vec<Datapoint>),
    /// Records delivered one at a time; an `Err` item ends the page
    Feed(Feed),
}

impl core::fmt::Debug for Page {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Page::Batch(records) => f.debug_tuple("Batch").field(&records.len()).finish(),
            Page::Feed(_) => f.write_str("Feed(..)"),
        }
    }
}

/// Page source for merge queries
#[async_trait]
pub trait Find: Send + Sync {
    /// Fetch one page, time ascending, at most `request.limit` records
    async fn find(&self, request: FindRequest) -> Result<Page, FetchError>;
}

#[async_trait]
impl<T: Find + ?Sized> Find for Arc<T> {
    async fn find(&self, request: FindRequest) -> Result<Page, FetchError> {
        (**self).find(request).await
    }
}

#[async_trait]
impl<T: Find + ?Sized> Find for Box<T> {
    async fn find(&self, request: FindRequest) -> Result<Page, FetchError> {
        (**self).find(request).await
    }
}
