//! In-memory `find` for testing and replay
//!
//! This module provides a [`Find`] implementation backed by per-datastream
//! vectors. It is useful for:
//! - Unit and integration testing of merge queries
//! - Replaying recorded datapoints
//! - Simulating slow, failing or feed-style sources
//!
//! ## Example
//!
//! ```rust
//! use weft_core::query::{Datapoint, MemoryFind};
//!
//! let find = MemoryFind::new()
//!     .with_datapoints("ds1", vec![Datapoint::scalar(1000, 21.5), Datapoint::scalar(2000, 21.7)])
//!     .with_datapoints("ds2", vec![Datapoint::scalar(1000, 80.0)]);
//!
//! assert_eq!(find.calls(), 0);
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};

use super::fetch::{Find, FindRequest, Page};
use super::record::Datapoint;
use crate::errors::FetchError;

/// How pages are handed back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Delivery {
    /// Whole pages as [`Page::Batch`]
    #[default]
    Batch,
    /// Record-by-record as [`Page::Feed`]
    Feed,
}

/// Memory-backed page source
#[derive(Debug, Default)]
pub struct MemoryFind {
    /// Datapoints per datastream id, kept sorted by `lt`
    data: HashMap<String, Vec<Datapoint>>,
    /// Page delivery mode
    delivery: Delivery,
    /// Ids whose `find` always fails
    failing: HashSet<String>,
    /// Ids whose feed fails after this many records
    failing_feeds: HashMap<String, usize>,
    /// Total `find` calls
    calls: AtomicUsize,
    /// Every request seen, in call order
    requests: Mutex<Vec<FindRequest>>,
}

impl MemoryFind {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Add datapoints for one datastream
    pub fn with_datapoints(mut self, id: impl Into<String>, datapoints: Vec<Datapoint>) -> Self {
        let stored = self.data.entry(id.into()).or_default();
        stored.extend(datapoints);
        stored.sort_by_key(|dp| dp.lt);
        self
    }

    /// Choose batch or feed delivery
    pub fn with_delivery(mut self, delivery: Delivery) -> Self {
        self.delivery = delivery;
        self
    }

    /// Make every `find` for `id` fail
    pub fn failing(mut self, id: impl Into<String>) -> Self {
        self.failing.insert(id.into());
        self
    }

    /// Make every feed for `id` fail after `after` records
    pub fn failing_feed(mut self, id: impl Into<String>, after: usize) -> Self {
        self.failing_feeds.insert(id.into(), after);
        self
    }

    /// Number of `find` calls so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }

    /// Requests seen so far
    pub fn requests(&self) -> Vec<FindRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    fn page(&self, request: &FindRequest) -> Vec<Datapoint> {
        self.data
            .get(&request.datastream_id)
            .map(|datapoints| {
                datapoints
                    .iter()
                    .filter(|dp| request.admits(dp.lt))
                    .take(request.limit)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl Find for MemoryFind {
    async fn find(&self, request: FindRequest) -> Result<Page, FetchError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        if self.failing.contains(&request.datastream_id) {
            return Err(FetchError::Transport(format!(
                "{} is unavailable",
                request.datastream_id
            )));
        }

        let page = self.page(&request);

        if let Some(&after) = self.failing_feeds.get(&request.datastream_id) {
            let id = request.datastream_id.clone();
            let records = page.into_iter().take(after).map(Ok);
            let failure = stream::once(async move { Err(FetchError::Feed(format!("{} feed dropped", id))) });
            return Ok(Page::Feed(stream::iter(records).chain(failure).boxed()));
        }

        Ok(match self.delivery {
            Delivery::Batch => Page::Batch(page),
            Delivery::Feed => Page::Feed(stream::iter(page.into_iter().map(Ok)).boxed()),
        })
    }
}
