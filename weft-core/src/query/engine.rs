//! Pull-driven merge of N paginated datastreams
//!
//! Each call to [`MergeQuery::next`] either hands out an item that is already
//! safe to emit or runs one more fetch round:
//!
//! ```text
//! eligible = sources with last_count != 0 and last_key <= min_key
//!    │
//!    ├── chunks of `concurrency` (0 = all at once), each fully drained
//!    │      └── page records → pending[lt] → format slot
//!    │
//!    ├── min_key = min(last_key) over sources that still have one
//!    └── release pending items with lt <= min_key (all of them if none)
//! ```
//!
//! Buffered items never outlive the round that makes them safe, so memory is
//! bounded by `limit` records per source plus the items at or below the
//! slowest source's position.

use std::collections::{BTreeMap, VecDeque};

use futures::future::{self, join_all};
use futures::stream::{self, BoxStream, Stream, StreamExt};
use log::{debug, error, trace, warn};

use super::fetch::{Find, FindRequest, Page};
use super::format::{Format, SlotFormatter};
use super::record::{Datapoint, MergedItem};
use super::source::Source;
use super::QueryOptions;
use crate::errors::{FetchError, QueryResult};
use crate::time::TimeKey;

type TaggedFeed = BoxStream<'static, (usize, Result<Datapoint, FetchError>)>;

/// Counters for one merge query run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct QueryStats {
    /// Fetch rounds started
    pub rounds: usize,
    /// `find` calls issued
    pub fetches: usize,
    /// Records absorbed into merged items
    pub records: usize,
    /// Merged items handed out
    pub emitted: usize,
    /// Fetches or feeds that ended in an error
    pub failures: usize,
    /// Records outside their page window that were ignored
    pub dropped: usize,
}

/// Lazy, time-ordered merge over one page source per datastream
///
/// ## Example
///
/// ```rust
/// use weft_core::query::{Datapoint, MemoryFind, MergeQuery, QueryOptions};
///
/// # futures::executor::block_on(async {
/// let find = MemoryFind::new()
///     .with_datapoints("a", vec![Datapoint::scalar(1, 1.0), Datapoint::scalar(3, 3.0)])
///     .with_datapoints("b", vec![Datapoint::scalar(2, 20.0), Datapoint::scalar(3, 30.0)]);
///
/// let options = QueryOptions::new(0, 10, ["a", "b"]);
/// let mut query = MergeQuery::new(find, &options).unwrap();
///
/// let mut keys = Vec::new();
/// while let Some(item) = query.next().await {
///     keys.push(item.lt);
/// }
/// assert_eq!(keys, vec![1, 2, 3]);
/// # });
/// ```
pub struct MergeQuery<F> {
    find: F,
    sources: Vec<Source>,
    format: Format,
    formatter: Box<dyn SlotFormatter>,
    begins_at: TimeKey,
    ends_before: TimeKey,
    limit: usize,
    concurrency: usize,
    max_rounds: Option<usize>,
    /// Partially merged items by key
    pending: BTreeMap<TimeKey, MergedItem>,
    /// Items released for emission, ascending
    ready: VecDeque<MergedItem>,
    /// Highest key ever released
    released_through: Option<TimeKey>,
    min_key: Option<TimeKey>,
    finished: bool,
    stats: QueryStats,
}

impl<F: Find> MergeQuery<F> {
    /// Set up a query; nothing is fetched until the first [`next`](Self::next)
    pub fn new(find: F, options: &QueryOptions) -> QueryResult<Self> {
        options.validate()?;

        let sources: Vec<Source> = options
            .datastream_ids
            .iter()
            .enumerate()
            .map(|(index, id)| Source::new(id.clone(), index))
            .collect();

        Ok(Self {
            find,
            formatter: options.format.formatter(sources.len()),
            sources,
            format: options.format,
            begins_at: options.begins_at,
            ends_before: options.ends_before,
            limit: options.limit.max(1),
            concurrency: options.concurrency,
            max_rounds: options.max_rounds,
            pending: BTreeMap::new(),
            ready: VecDeque::new(),
            released_through: None,
            min_key: None,
            finished: false,
            stats: QueryStats::default(),
        })
    }

    /// Next merged item in ascending key order, `None` once the run is over
    pub async fn next(&mut self) -> Option<MergedItem> {
        loop {
            if let Some(item) = self.ready.pop_front() {
                self.stats.emitted += 1;
                return Some(item);
            }
            if self.finished {
                return None;
            }
            self.round().await;
        }
    }

    /// Turn the query into a [`Stream`] of merged items
    pub fn into_stream(self) -> impl Stream<Item = MergedItem> {
        stream::unfold(self, |mut query| async move {
            let item = query.next().await?;
            Some((item, query))
        })
    }

    /// Source cursors in ordinal order
    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    /// Output format of this query
    pub fn format(&self) -> Format {
        self.format
    }

    /// Counters so far
    pub fn stats(&self) -> &QueryStats {
        &self.stats
    }

    /// True once no further rounds will run
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    async fn round(&mut self) {
        let eligible: Vec<usize> = self
            .sources
            .iter()
            .filter(|source| source.is_eligible(self.min_key))
            .map(|source| source.index)
            .collect();

        if eligible.is_empty() {
            self.finish();
            return;
        }

        if let Some(max_rounds) = self.max_rounds {
            if self.stats.rounds >= max_rounds {
                warn!(
                    "Stopping merge after {} rounds with {} sources still eligible",
                    self.stats.rounds,
                    eligible.len()
                );
                self.finish();
                return;
            }
        }

        self.stats.rounds += 1;
        trace!(
            "Round {}: polling {} of {} sources",
            self.stats.rounds,
            eligible.len(),
            self.sources.len()
        );

        let chunk_size = match self.concurrency {
            0 => eligible.len(),
            n => n,
        };
        for chunk in eligible.chunks(chunk_size) {
            self.poll_batch(chunk).await;
        }

        self.min_key = self.sources.iter().filter_map(Source::last_key).min();
        self.release();

        debug!(
            "Round {} settled: min_key {:?}, {} ready, {} pending",
            self.stats.rounds,
            self.min_key,
            self.ready.len(),
            self.pending.len()
        );
    }

    /// Fetch one page for each source in `chunk` and drain every page
    async fn poll_batch(&mut self, chunk: &[usize]) {
        let requests: Vec<FindRequest> = chunk
            .iter()
            .map(|&index| {
                let source = &self.sources[index];
                FindRequest {
                    datastream_id: source.id.clone(),
                    lower: source.lower_bound(self.begins_at),
                    ends_before: self.ends_before,
                    limit: self.limit,
                }
            })
            .collect();

        self.stats.fetches += requests.len();
        let find = &self.find;
        let results = join_all(requests.iter().cloned().map(|request| find.find(request))).await;

        let mut feeds: Vec<TaggedFeed> = Vec::with_capacity(results.len());
        for (position, result) in results.into_iter().enumerate() {
            let index = chunk[position];
            match result {
                Ok(page) => {
                    self.sources[index].start_page();
                    feeds.push(tagged(position, page));
                }
                Err(err) => self.fail(index, &err),
            }
        }

        let mut dropped = vec![0usize; chunk.len()];
        let mut failed = vec![false; chunk.len()];
        let mut records = stream::select_all(feeds);
        while let Some((position, record)) = records.next().await {
            let index = chunk[position];
            match record {
                Ok(datapoint) => {
                    if !self.absorb(index, &requests[position], datapoint) {
                        dropped[position] += 1;
                    }
                }
                Err(err) => {
                    failed[position] = true;
                    self.fail(index, &err);
                }
            }
        }

        // The cursor only moves on absorbed records, so refetching would
        // return the same page again.
        for (position, &index) in chunk.iter().enumerate() {
            let source = &self.sources[index];
            if dropped[position] > 0 && !failed[position] && source.is_exhausted() {
                warn!(
                    "Stopping {}: all {} record(s) of its page were outside the requested window",
                    source.id, dropped[position]
                );
            }
        }
    }

    /// Place one record into the pending item for its key
    ///
    /// Returns false when the record was dropped.
    fn absorb(&mut self, index: usize, request: &FindRequest, datapoint: Datapoint) -> bool {
        let Datapoint { lt, o, t, fields } = datapoint;

        let already_released = self.released_through.is_some_and(|through| lt <= through);
        if !request.admits(lt) || already_released {
            warn!(
                "Ignoring datapoint at {} from {} outside the requested window",
                lt, request.datastream_id
            );
            self.stats.dropped += 1;
            return false;
        }

        let formatter = &self.formatter;
        let item = self.pending.entry(lt).or_insert_with(|| MergedItem {
            lt,
            o,
            t,
            payload: formatter.new_payload(),
        });
        formatter.set_slot(&mut item.payload, &self.sources[index], fields);

        self.sources[index].advance(lt);
        self.stats.records += 1;
        true
    }

    fn fail(&mut self, index: usize, err: &FetchError) {
        let source = &mut self.sources[index];
        error!("Fetching datapoints for {} failed: {}", source.id, err);
        source.fail();
        self.stats.failures += 1;
    }

    /// Move every pending item at or below `min_key` to the ready queue
    fn release(&mut self) {
        let released = match self.min_key {
            None => std::mem::take(&mut self.pending),
            Some(min_key) => {
                let rest = match min_key.checked_add(1) {
                    Some(next) => self.pending.split_off(&next),
                    None => BTreeMap::new(),
                };
                std::mem::replace(&mut self.pending, rest)
            }
        };

        if let Some(&last) = released.keys().next_back() {
            self.released_through = Some(last);
        }
        self.ready.extend(released.into_values());
    }

    fn finish(&mut self) {
        self.min_key = None;
        self.release();
        self.finished = true;
        debug!(
            "Merge finished after {} rounds: {} records from {} fetches",
            self.stats.rounds, self.stats.records, self.stats.fetches
        );
    }
}

/// Tag every record of a page with its position in the batch
///
/// A feed ends at its first error.
fn tagged(position: usize, page: Page) -> TaggedFeed {
    match page {
        Page::Batch(records) => {
            stream::iter(records.into_iter().map(move |record| (position, Ok(record)))).boxed()
        }
        Page::Feed(feed) => feed
            .scan(false, |failed, record| {
                if *failed {
                    return future::ready(None);
                }
                *failed = record.is_err();
                future::ready(Some(record))
            })
            .map(move |record| (position, record))
            .boxed(),
    }
}
