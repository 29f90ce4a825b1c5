//! Datastream metadata and config build round trip
//!
//! ```text
//! GET   /datastreams/{id}                      → Datastream
//! GET   /annotations?is_enabled=true&state=approved
//!                   &$or[0][station_ids]=…&$or[1][datastream_ids]=…
//!                   &$limit=2000&$sort[_id]=1  → {"data": [...]}
//! PATCH /datastreams/{id}?source_type=sensor   ← {"$set": {...built config}}
//! ```

use log::info;
use serde_json::Value;
use weft_core::config::{build_datapoints_config, BuiltConfig, Datastream, SENSOR_SOURCE_TYPE};

use crate::http::{WebApi, WebApiConfig};
use crate::HttpError;

/// Most annotations fetched for one build
pub const ANNOTATION_LIMIT: usize = 2000;

/// Client for the datastream and annotation services
#[derive(Clone)]
pub struct MetadataClient {
    api: WebApi,
}

impl MetadataClient {
    /// Create a client with its own connection
    pub fn new(config: WebApiConfig) -> Result<Self, HttpError> {
        Ok(Self::with_api(WebApi::new(config)?))
    }

    /// Share an existing client
    pub fn with_api(api: WebApi) -> Self {
        Self { api }
    }

    /// Fetch one datastream document
    pub async fn get_datastream(&self, id: &str) -> Result<Datastream, HttpError> {
        let body = self.api.get(&datastream_path(id), Vec::new()).await?;
        serde_json::from_value(body).map_err(|e| HttpError::Serialization(e.to_string()))
    }

    /// Enabled, approved annotations touching the datastream or its station
    pub async fn find_annotations(&self, datastream: &Datastream) -> Result<Vec<Value>, HttpError> {
        let body = self
            .api
            .get("annotations", annotations_query(datastream))
            .await?;

        match body.get("data") {
            Some(Value::Array(docs)) => Ok(docs.clone()),
            Some(Value::Null) | None => Ok(Vec::new()),
            Some(_) => Err(HttpError::Serialization("'data' is not an array".into())),
        }
    }

    /// Store a built config on the datastream
    pub async fn patch_built_config(&self, id: &str, built: &BuiltConfig) -> Result<(), HttpError> {
        let query = vec![("source_type".to_string(), SENSOR_SOURCE_TYPE.to_string())];
        self.api
            .patch(&datastream_path(id), query, built.to_patch())
            .await?;
        Ok(())
    }

    /// Fetch, build and patch the datapoints config of one datastream
    pub async fn build_and_patch(&self, id: &str) -> Result<BuiltConfig, HttpError> {
        let datastream = self.get_datastream(id).await?;
        let annotations = self.find_annotations(&datastream).await?;
        let built = build_datapoints_config(&datastream, annotations)?;

        info!("Patching datastream {}.", datastream.id);
        self.patch_built_config(&datastream.id, &built).await?;
        Ok(built)
    }
}

/// Path of one datastream, with the id percent-encoded as a single segment
pub fn datastream_path(id: &str) -> String {
    format!("datastreams/{}", urlencoding::encode(id))
}

/// Query pairs selecting the annotations that apply to `datastream`
pub fn annotations_query(datastream: &Datastream) -> Vec<(String, String)> {
    let mut pairs = vec![
        ("is_enabled".to_string(), "true".to_string()),
        ("state".to_string(), "approved".to_string()),
    ];

    let mut clause = 0;
    if let Some(station_id) = &datastream.station_id {
        pairs.push((format!("$or[{}][station_ids]", clause), station_id.clone()));
        clause += 1;
    }
    pairs.push((format!("$or[{}][datastream_ids]", clause), datastream.id.clone()));

    pairs.push(("$limit".to_string(), ANNOTATION_LIMIT.to_string()));
    pairs.push(("$sort[_id]".to_string(), "1".to_string()));
    pairs
}
