//! Full datapoints config build for one datastream
//!
//! ```text
//! datapoints_config ─► create_refs ─► preprocess ─► apply_annotations ─► merged_doc
//!                          │                              ▲
//!                          └─► datapoints_config_refd     └── annotation docs
//! ```
//!
//! Builds for different datastreams are independent. Builds for the same
//! datastream must be serialized by the caller.

use log::info;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::annotation::Annotation;
use super::apply::apply_annotations;
use super::preprocess::preprocess;
use super::refs::create_refs;
use super::Document;
use crate::errors::{BuildError, BuildResult};

/// Only datastreams of this source type carry a datapoints config
pub const SENSOR_SOURCE_TYPE: &str = "sensor";

/// The parts of a datastream record the build reads
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Datastream {
    /// Datastream id
    #[serde(rename = "_id")]
    pub id: String,
    /// Owning station, used to find station-wide annotations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub station_id: Option<String>,
    /// Must be `sensor` for a build
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_type: Option<String>,
    /// Attribute map used for `@{path}` tokens
    #[serde(default)]
    pub attributes: Map<String, Value>,
    /// Raw, possibly overlapping config documents
    #[serde(default)]
    pub datapoints_config: Vec<Value>,
}

/// Output of a build, written back onto the datastream
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuiltConfig {
    /// Non-overlapping, begin-ascending serialized instances
    pub datapoints_config_built: Vec<Document>,
    /// Hoisted `connection`/`params`/`path` entries indexed by `ref`
    pub datapoints_config_refd: Vec<Document>,
}

impl BuiltConfig {
    /// Patch body that sets both built fields on the datastream
    pub fn to_patch(&self) -> Value {
        json!({
            "$set": {
                "datapoints_config_built": self.datapoints_config_built,
                "datapoints_config_refd": self.datapoints_config_refd,
            }
        })
    }
}

/// Build the datapoints config of `datastream` under `annotation_docs`
pub fn build_datapoints_config(
    datastream: &Datastream,
    annotation_docs: Vec<Value>,
) -> BuildResult<BuiltConfig> {
    if datastream.source_type.as_deref() != Some(SENSOR_SOURCE_TYPE) {
        return Err(BuildError::NotSensor(datastream.source_type.clone()));
    }

    let mut annotations = Vec::new();
    for (index, doc) in annotation_docs.into_iter().enumerate() {
        match doc {
            Value::Object(doc) => annotations.extend(Annotation::expand(doc)),
            _ => {
                return Err(BuildError::InvalidDocument(format!(
                    "annotation[{}] is not an object",
                    index
                )))
            }
        }
    }

    info!("Processing ({}) annotation intervals.", annotations.len());

    let (config, refd) = create_refs(datastream.datapoints_config.clone())?;
    let config = preprocess(config);
    let config = apply_annotations(config, &annotations);

    info!(
        "Built {} config instance(s) for datastream {}.",
        config.len(),
        datastream.id
    );

    Ok(BuiltConfig {
        datapoints_config_built: config
            .iter()
            .map(|inst| inst.merged_doc(&datastream.attributes))
            .collect(),
        datapoints_config_refd: refd,
    })
}
