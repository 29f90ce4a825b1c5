//! Error Types for Merge Queries and Config Builds
//!
//! ## Design Philosophy
//!
//! Errors in weft fall into two groups, and neither group is allowed to
//! corrupt the ordering of a merged query or the non-overlap of a config list:
//!
//! 1. **Construction-time**: a bad format name or a malformed options document.
//!    These are returned before any fetching starts.
//!
//! 2. **Per-unit**: one datastream's fetch failing. These are isolated by the
//!    merge engine: logged, the source drops out, the merge continues.
//!
//! Degenerate config intervals and disjoint annotations are not errors at all.
//!
//! ## Error Handling Strategy
//!
//! ```rust
//! use weft_core::{Format, QueryError};
//!
//! match "csv".parse::<Format>() {
//!     Ok(format) => println!("using {:?}", format),
//!     Err(QueryError::UnknownFormat(name)) => eprintln!("bad format {}", name),
//!     Err(e) => eprintln!("{}", e),
//! }
//! ```

use thiserror::Error;

/// Result type for merge query construction
pub type QueryResult<T> = Result<T, QueryError>;

/// Result type for config builds
pub type BuildResult<T> = Result<T, BuildError>;

/// Errors raised while setting up a merge query
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    /// Format adapter name is not one of `d`, `da`, `va`
    #[error("Unknown query format '{0}'")]
    UnknownFormat(String),

    /// Options document could not be decoded
    #[error("Invalid query options: {0}")]
    InvalidOptions(String),

    /// Lower bound is not before the upper bound
    #[error("Empty query window: begins_at {begins_at} >= ends_before {ends_before}")]
    EmptyWindow {
        /// Inclusive lower bound in epoch millis
        begins_at: i64,
        /// Exclusive upper bound in epoch millis
        ends_before: i64,
    },
}

/// Terminal error of a single `find` call
///
/// The merge engine never retries on these; wrap the collaborator in a
/// retrying `find` when retries are wanted.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    /// Network or transport failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// Remote side answered with an error status
    #[error("Server error {status}: {message}")]
    Status {
        /// HTTP-like status code
        status: u16,
        /// Body or reason text
        message: String,
    },

    /// Response could not be decoded into datapoints
    #[error("Decode error: {0}")]
    Decode(String),

    /// Feed ended with an error after delivering some records
    #[error("Feed error: {0}")]
    Feed(String),
}

/// Errors raised by the datapoints config build
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BuildError {
    /// Config builds only apply to sensor datastreams
    #[error("Datastream source_type must be sensor, got {0:?}")]
    NotSensor(Option<String>),

    /// A config or annotation document has the wrong shape
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
}

impl From<serde_json::Error> for BuildError {
    fn from(err: serde_json::Error) -> Self {
        BuildError::InvalidDocument(err.to_string())
    }
}

/// Errors raised while writing merged items out
#[cfg(feature = "export")]
#[derive(Error, Debug)]
pub enum ExportError {
    /// Only scalar (`va`) items map onto CSV columns
    #[error("Unsupported payload '{0}' for CSV export")]
    UnsupportedPayload(&'static str),

    /// Underlying CSV writer failed
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Underlying I/O failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
