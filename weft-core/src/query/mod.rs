//! Merged multi-datastream queries
//!
//! A merge query reads one paginated, time-ordered page source per
//! datastream and yields a single ascending sequence of [`MergedItem`]s, one
//! per distinct time key, each with a slot for every datastream.
//!
//! ## Module Organization
//!
//! - `fetch` - the [`Find`] seam and page requests
//! - `source` - per-datastream pagination cursor
//! - `format` - `d` / `da` / `va` slot adapters
//! - `record` - datapoints in, merged items out
//! - `engine` - the [`MergeQuery`] driver
//! - `memory` - in-memory [`Find`] for tests and replay
//!
//! ## Example
//!
//! ```rust
//! use weft_core::query::{Format, QueryOptions};
//!
//! let options = QueryOptions::from_json(r#"{
//!     "begins_at": "2020-01-01T00:00:00Z",
//!     "ends_before": "2020-01-02T00:00:00Z",
//!     "datastream_ids": ["ds-temp", "ds-rh"],
//!     "column_names": ["Temperature", "Humidity"]
//! }"#).unwrap();
//!
//! assert_eq!(options.format, Format::Va);
//! assert_eq!(options.limit, 2016);
//! ```

pub mod engine;
pub mod fetch;
pub mod format;
pub mod memory;
pub mod record;
pub mod source;

pub use engine::{MergeQuery, QueryStats};
pub use fetch::{Feed, Find, FindRequest, LowerBound, Page};
pub use format::{Format, SlotFormatter};
pub use memory::{Delivery, MemoryFind};
pub use record::{Datapoint, MergedItem, Payload};
pub use source::Source;

use serde::{Deserialize, Serialize};

use crate::errors::{QueryError, QueryResult};
use crate::time::{self, TimeKey};

/// Default page size per source
pub const DEFAULT_LIMIT: usize = 2016;

/// Default number of sources fetched at once
pub const DEFAULT_CONCURRENCY: usize = 1;

fn default_limit() -> usize {
    DEFAULT_LIMIT
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

/// Options of one merge query, as found in an export job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryOptions {
    /// Inclusive window start
    #[serde(with = "time::iso")]
    pub begins_at: TimeKey,
    /// Exclusive window end
    #[serde(with = "time::iso")]
    pub ends_before: TimeKey,
    /// Datastreams to merge, in slot order
    pub datastream_ids: Vec<String>,
    /// Optional display names, matched to `datastream_ids` by position
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub column_names: Vec<String>,
    /// Slot adapter
    #[serde(default)]
    pub format: Format,
    /// Page size per source
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Sources fetched at once; `0` fetches all of them together
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Stop after this many fetch rounds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_rounds: Option<usize>,
}

impl QueryOptions {
    /// Options for `[begins_at, ends_before)` over `ids` with defaults
    pub fn new<I, S>(begins_at: TimeKey, ends_before: TimeKey, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            begins_at,
            ends_before,
            datastream_ids: ids.into_iter().map(Into::into).collect(),
            column_names: Vec::new(),
            format: Format::default(),
            limit: DEFAULT_LIMIT,
            concurrency: DEFAULT_CONCURRENCY,
            max_rounds: None,
        }
    }

    /// Decode options from a JSON document
    pub fn from_json(json: &str) -> QueryResult<Self> {
        let options: Self =
            serde_json::from_str(json).map_err(|e| QueryError::InvalidOptions(e.to_string()))?;
        options.validate()?;
        Ok(options)
    }

    /// Decode options from an already parsed JSON value
    pub fn from_value(value: serde_json::Value) -> QueryResult<Self> {
        let options: Self =
            serde_json::from_value(value).map_err(|e| QueryError::InvalidOptions(e.to_string()))?;
        options.validate()?;
        Ok(options)
    }

    /// Set display names
    pub fn with_column_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.column_names = names.into_iter().map(Into::into).collect();
        self
    }

    /// Set the slot adapter
    pub fn with_format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    /// Set the page size
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Set how many sources are fetched at once
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Cap the number of fetch rounds
    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = Some(max_rounds);
        self
    }

    /// Reject an empty window
    pub fn validate(&self) -> QueryResult<()> {
        if self.begins_at >= self.ends_before {
            return Err(QueryError::EmptyWindow {
                begins_at: self.begins_at,
                ends_before: self.ends_before,
            });
        }
        Ok(())
    }

    /// Column title for slot `index`: its display name, else the datastream id
    pub fn column_name(&self, index: usize) -> Option<&str> {
        match self.column_names.get(index) {
            Some(name) if !name.is_empty() => Some(name.as_str()),
            _ => self.datastream_ids.get(index).map(String::as_str),
        }
    }
}
