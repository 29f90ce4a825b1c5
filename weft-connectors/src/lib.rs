//! Web API Connectors for weft
//!
//! ## Overview
//!
//! The core engine only knows the [`weft_core::Find`] seam. This crate
//! provides the collaborators that sit behind it when datapoints and
//! datastream metadata live in the web API:
//!
//! - [`http::WebApiFind`] pages datapoints with `GET /datapoints`
//! - [`retry::RetryingFind`] retries any `Find` with backoff and jitter
//! - [`metadata::MetadataClient`] reads datastreams and annotations and
//!   patches built configs back
//!
//! ## Retry Logic
//!
//! The merge engine treats every fetch error as terminal for that source.
//! Wrap the collaborator when transient failures should be absorbed:
//!
//! ```text
//! delay(attempt) = min(base * factor^attempt, max_delay) + random(0..jitter)
//! ```
//!
//! ## Authentication
//!
//! A static access token is sent verbatim in the `Authorization` header.
//! Obtaining or refreshing it is the caller's business.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use weft_connectors::http::{WebApiConfig, WebApiFind};
//! use weft_connectors::retry::{RetryConfig, RetryingFind};
//! use weft_core::{MergeQuery, QueryOptions};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = WebApiConfig::from_env()?;
//! let find = RetryingFind::new(WebApiFind::new(config)?, RetryConfig::default());
//!
//! let options = QueryOptions::new(0, 86_400_000, ["ds-temp", "ds-rh"]);
//! let mut query = MergeQuery::new(find, &options)?;
//! while let Some(item) = query.next().await {
//!     println!("{}", serde_json::to_string(&item)?);
//! }
//! # Ok(())
//! # }
//! ```

#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "http")]
pub mod metadata;

pub mod retry;

#[cfg(feature = "http")]
pub use http::{WebApiConfig, WebApiFind};
#[cfg(feature = "http")]
pub use metadata::MetadataClient;
pub use retry::{RetryConfig, RetryingFind};

use thiserror::Error;
use weft_core::FetchError;

/// Errors talking to the web API
#[derive(Debug, Error)]
pub enum HttpError {
    /// Network or request error
    #[error("Request failed: {0}")]
    Request(String),

    /// Server returned error status
    #[error("Server error {status}: {message}")]
    ServerError {
        /// HTTP status code
        status: u16,
        /// Response body
        message: String,
    },

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Building the datapoints config failed
    #[error("Build error: {0}")]
    Build(#[from] weft_core::BuildError),
}

impl From<HttpError> for FetchError {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::Request(msg) => FetchError::Transport(msg),
            HttpError::ServerError { status, message } => FetchError::Status { status, message },
            HttpError::Serialization(msg) => FetchError::Decode(msg),
            other => FetchError::Transport(other.to_string()),
        }
    }
}

/// Request counters common to the connectors
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FetchStats {
    /// Requests answered successfully
    pub requests_ok: u64,
    /// Requests that failed
    pub requests_failed: u64,
    /// Retries issued after a failure
    pub retries: u64,
    /// Datapoints received
    pub datapoints: u64,
    /// Last error message
    pub last_error: Option<String>,
}

impl FetchStats {
    pub(crate) fn record_error(&mut self, err: &impl std::fmt::Display) {
        self.requests_failed += 1;
        self.last_error = Some(err.to_string());
    }
}
