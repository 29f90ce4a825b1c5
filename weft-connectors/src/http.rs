//! Web API client and datapoints `find`
//!
//! ## Overview
//!
//! Datapoints and datastream metadata are served by a JSON web API. This
//! module holds the blocking `ureq` client shared by every connector and the
//! [`WebApiFind`] collaborator that pages datapoints for merge queries:
//!
//! ```text
//! GET {base}/datapoints?datastream_id=ds1
//!                      &time[$gte]=2020-01-01T00:00:00.000Z   (time[$gt] when resuming)
//!                      &time[$lt]=2020-01-02T00:00:00.000Z
//!                      &time_local=true&t_int=true
//!                      &$limit=2016&$sort[time]=1
//! ```
//!
//! The response body is `{"data": [...]}`; each record carries `lt` as epoch
//! millis or an ISO-8601 string.
//!
//! ## Blocking Calls
//!
//! `ureq` is synchronous. Every call runs on `tokio::task::spawn_blocking`,
//! so connectors must be driven from inside a tokio runtime.
//!
//! ## Example Usage
//!
//! ```rust
//! use weft_connectors::http::{WebApiConfig, WebApiFind};
//!
//! let config = WebApiConfig::new("https://api.example.com")
//!     .access_token("secret")
//!     .timeout_secs(90);
//!
//! let find = WebApiFind::new(config).unwrap();
//! assert_eq!(find.stats().requests_ok, 0);
//! ```

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use serde_json::Value;
use weft_core::query::{Datapoint, Find, FindRequest, LowerBound, Page};
use weft_core::time::{parse_iso, to_iso};
use weft_core::FetchError;

use crate::{FetchStats, HttpError};

/// Environment variable holding the API base URL
pub const URL_ENV: &str = "WEB_API_URL";

/// Environment variable holding the access token
pub const TOKEN_ENV: &str = "WEB_API_ACCESS_TOKEN";

/// Web API configuration
#[derive(Debug, Clone)]
pub struct WebApiConfig {
    /// Base URL for the API
    pub base_url: String,
    /// Sent verbatim as the `Authorization` header
    pub access_token: Option<String>,
    /// Request timeout
    pub timeout: Duration,
    /// User agent string
    pub user_agent: String,
}

impl WebApiConfig {
    /// Create new configuration with base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            access_token: None,
            timeout: Duration::from_secs(30),
            user_agent: format!("weft/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Read `WEB_API_URL` and the optional `WEB_API_ACCESS_TOKEN`
    pub fn from_env() -> Result<Self, HttpError> {
        let base_url = std::env::var(URL_ENV)
            .map_err(|_| HttpError::Config(format!("{} is not set", URL_ENV)))?;

        let mut config = Self::new(base_url);
        config.access_token = std::env::var(TOKEN_ENV).ok().filter(|t| !t.is_empty());
        Ok(config)
    }

    /// Set the access token
    pub fn access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Set request timeout in seconds
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    /// Set the user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = agent.into();
        self
    }

    /// Absolute URL of `path`
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Blocking JSON client shared by the connectors
#[derive(Clone)]
pub struct WebApi {
    config: Arc<WebApiConfig>,
    agent: ureq::Agent,
}

impl WebApi {
    /// Create a client; the base URL must be http(s)
    pub fn new(config: WebApiConfig) -> Result<Self, HttpError> {
        if !config.base_url.starts_with("http://") && !config.base_url.starts_with("https://") {
            return Err(HttpError::Config("Base URL must start with http:// or https://".into()));
        }

        let agent = ureq::AgentBuilder::new()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build();

        Ok(Self {
            config: Arc::new(config),
            agent,
        })
    }

    /// Client configuration
    pub fn config(&self) -> &WebApiConfig {
        &self.config
    }

    /// `GET path?query`
    pub async fn get(&self, path: &str, query: Vec<(String, String)>) -> Result<Value, HttpError> {
        let request = self.request("GET", path, &query);
        run_blocking(move || call(request, None)).await
    }

    /// `PATCH path?query` with a JSON body
    pub async fn patch(
        &self,
        path: &str,
        query: Vec<(String, String)>,
        body: Value,
    ) -> Result<Value, HttpError> {
        let request = self.request("PATCH", path, &query);
        run_blocking(move || call(request, Some(body))).await
    }

    fn request(&self, method: &str, path: &str, query: &[(String, String)]) -> ureq::Request {
        let mut request = self
            .agent
            .request(method, &self.config.url(path))
            .set("Accept", "application/json");

        if let Some(token) = &self.config.access_token {
            request = request.set("Authorization", token);
        }
        for (key, value) in query {
            request = request.query(key, value);
        }
        request
    }
}

async fn run_blocking<T, F>(job: F) -> Result<T, HttpError>
where
    F: FnOnce() -> Result<T, HttpError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(job)
        .await
        .map_err(|e| HttpError::Request(format!("blocking task failed: {}", e)))?
}

fn call(request: ureq::Request, body: Option<Value>) -> Result<Value, HttpError> {
    let response = match body {
        Some(body) => request.send_json(body),
        None => request.call(),
    };

    match response {
        Ok(resp) => {
            let text = resp
                .into_string()
                .map_err(|e| HttpError::Request(e.to_string()))?;
            if text.is_empty() {
                return Ok(Value::Null);
            }
            serde_json::from_str(&text).map_err(|e| HttpError::Serialization(e.to_string()))
        }
        Err(ureq::Error::Status(status, resp)) => Err(HttpError::ServerError {
            status,
            message: resp.into_string().unwrap_or_default(),
        }),
        Err(ureq::Error::Transport(e)) => Err(HttpError::Request(e.to_string())),
    }
}

/// Query pairs for one datapoints page
pub fn datapoints_query(request: &FindRequest) -> Vec<(String, String)> {
    let lower = match request.lower {
        LowerBound::Inclusive(key) => ("time[$gte]", to_iso(key)),
        LowerBound::Exclusive(key) => ("time[$gt]", to_iso(key)),
    };

    [
        ("datastream_id", request.datastream_id.clone()),
        lower,
        ("time[$lt]", to_iso(request.ends_before)),
        ("time_local", "true".to_string()),
        ("t_int", "true".to_string()),
        ("$limit", request.limit.to_string()),
        ("$sort[time]", "1".to_string()),
    ]
    .into_iter()
    .map(|(key, value)| (key.to_string(), value))
    .collect()
}

/// Decode the `data` array of a datapoints response
pub fn decode_datapoints(body: Value) -> Result<Vec<Datapoint>, HttpError> {
    let Value::Object(mut body) = body else {
        return Err(HttpError::Serialization("response is not an object".into()));
    };
    let records = match body.remove("data") {
        Some(Value::Array(records)) => records,
        Some(Value::Null) | None => Vec::new(),
        Some(_) => return Err(HttpError::Serialization("'data' is not an array".into())),
    };

    records
        .into_iter()
        .map(|mut record| {
            if let Some(Value::String(lt)) = record.get("lt") {
                let key = parse_iso(lt)
                    .ok_or_else(|| HttpError::Serialization(format!("invalid lt '{}'", lt)))?;
                record["lt"] = Value::from(key);
            }
            serde_json::from_value(record).map_err(|e| HttpError::Serialization(e.to_string()))
        })
        .collect()
}

/// [`Find`] backed by `GET /datapoints`
pub struct WebApiFind {
    api: WebApi,
    stats: Mutex<FetchStats>,
}

impl WebApiFind {
    /// Create a collaborator with its own client
    pub fn new(config: WebApiConfig) -> Result<Self, HttpError> {
        Ok(Self::with_api(WebApi::new(config)?))
    }

    /// Share an existing client
    pub fn with_api(api: WebApi) -> Self {
        Self {
            api,
            stats: Mutex::new(FetchStats::default()),
        }
    }

    /// Request counters
    pub fn stats(&self) -> FetchStats {
        self.stats
            .lock()
            .map(|stats| stats.clone())
            .unwrap_or_default()
    }

    async fn fetch(&self, request: &FindRequest) -> Result<Vec<Datapoint>, HttpError> {
        let body = self.api.get("datapoints", datapoints_query(request)).await?;
        decode_datapoints(body)
    }
}

#[async_trait]
impl Find for WebApiFind {
    async fn find(&self, request: FindRequest) -> Result<Page, FetchError> {
        debug!(
            "Querying source {} using bound {:?}.",
            request.datastream_id, request.lower
        );

        let result = self.fetch(&request).await;
        if let Ok(mut stats) = self.stats.lock() {
            match &result {
                Ok(records) => {
                    stats.requests_ok += 1;
                    stats.datapoints += records.len() as u64;
                }
                Err(err) => stats.record_error(err),
            }
        }

        Ok(Page::Batch(result?))
    }
}
