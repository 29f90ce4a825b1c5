//! Annotation-driven datapoints config builder
//!
//! A sensor datastream carries a list of dated config documents describing
//! how its datapoints are fetched and processed. Annotations, approved
//! elsewhere, overlay that list for a time range with actions: relabel
//! attributes, append an expression, exclude, or flag.
//!
//! ## Module Organization
//!
//! - `actions` - the action set and its composition rules
//! - `instance` - one config version over a half-open interval
//! - `annotation` - one annotation interval
//! - `preprocess` - raw documents to a non-overlapping stack
//! - `apply` - overlay annotations onto the stack
//! - `refs` - hoist connection details into a side table
//! - `build` - the whole pipeline for one datastream
//!
//! ## Example
//!
//! ```rust
//! use serde_json::json;
//! use weft_core::config::{build_datapoints_config, Datastream};
//!
//! let datastream: Datastream = serde_json::from_value(json!({
//!     "_id": "ds1",
//!     "source_type": "sensor",
//!     "datapoints_config": [
//!         {"begins_at": "2020-01-01T00:00:00Z", "ends_before": "2021-01-01T00:00:00Z"}
//!     ]
//! })).unwrap();
//!
//! let annotation = json!({
//!     "_id": "ann1",
//!     "actions": [{"exclude": true}],
//!     "intervals": [{"begins_at": "2020-03-01T00:00:00Z", "ends_before": "2020-04-01T00:00:00Z"}]
//! });
//!
//! let built = build_datapoints_config(&datastream, vec![annotation]).unwrap();
//! assert_eq!(built.datapoints_config_built.len(), 3);
//! ```

pub mod actions;
pub mod annotation;
pub mod apply;
pub mod build;
pub mod instance;
pub mod preprocess;
pub mod refs;

/// A JSON object as stored in the metadata API
pub type Document = serde_json::Map<String, serde_json::Value>;

pub use actions::Actions;
pub use annotation::Annotation;
pub use apply::{apply_annotation, apply_annotations, sort_by_begin};
pub use build::{build_datapoints_config, BuiltConfig, Datastream, SENSOR_SOURCE_TYPE};
pub use instance::ConfigInstance;
pub use preprocess::{collapse, preprocess};
pub use refs::create_refs;
