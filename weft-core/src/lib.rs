//! Core engine for weft
//!
//! Presents environmental datapoints, stored per datastream, as one
//! time-aligned multi-column series, and builds the per-datastream config
//! lists that annotations overlay.
//!
//! Two pieces do the heavy lifting:
//! - [`MergeQuery`] merges N paginated, time-ordered sources into one ordered
//!   stream without buffering unbounded history
//! - [`config::build_datapoints_config`] collapses dated config documents into
//!   a non-overlapping list and composes annotation actions onto it
//!
//! ```no_run
//! use weft_core::{MergeQuery, QueryOptions};
//! use weft_core::query::MemoryFind;
//!
//! # async fn run() -> Result<(), weft_core::QueryError> {
//! let options = QueryOptions::new(0, 86_400_000, ["ds-temp", "ds-rh"]);
//! let mut query = MergeQuery::new(MemoryFind::new(), &options)?;
//!
//! while let Some(item) = query.next().await {
//!     println!("{} {:?}", item.lt, item.payload);
//! }
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod errors;
#[cfg(feature = "export")]
pub mod export;
pub mod interval;
pub mod query;
pub mod time;

// Public API
pub use errors::{BuildError, BuildResult, FetchError, QueryError, QueryResult};
#[cfg(feature = "export")]
pub use errors::ExportError;
#[cfg(feature = "export")]
pub use export::{export_query, CsvExporter};
pub use interval::Interval;
pub use query::{Datapoint, Find, FindRequest, Format, MergeQuery, MergedItem, Page, QueryOptions};
pub use time::TimeKey;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_exists() {
        assert!(!VERSION.is_empty());
    }
}
