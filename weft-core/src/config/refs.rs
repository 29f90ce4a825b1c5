//! Hoist connection details out of config documents
//!
//! The built config is stored next to a side table of the `connection`,
//! `params` and `path` values each raw document carried. Every document gets
//! a `ref` ordinal into that table, so instances split by annotations keep
//! pointing at the same entry.

use serde_json::{Map, Value};

use super::Document;
use crate::errors::{BuildError, BuildResult};

/// Keys moved from a config document into the refs table
pub const REF_KEYS: [&str; 3] = ["connection", "params", "path"];

/// Split raw config documents into stripped documents and their refs table
///
/// Returns `(config, refd)`, where `config[i]["ref"] == i` and `refd[i]` holds
/// whichever of the hoisted keys document `i` had.
pub fn create_refs(docs: Vec<Value>) -> BuildResult<(Vec<Document>, Vec<Document>)> {
    let mut config = Vec::with_capacity(docs.len());
    let mut refd = Vec::with_capacity(docs.len());

    for (index, doc) in docs.into_iter().enumerate() {
        let Value::Object(mut doc) = doc else {
            return Err(BuildError::InvalidDocument(format!(
                "datapoints_config[{}] is not an object",
                index
            )));
        };

        let mut entry = Map::new();
        for key in REF_KEYS {
            if let Some(value) = doc.remove(key) {
                if !value.is_null() {
                    entry.insert(key.to_string(), value);
                }
            }
        }

        doc.insert("ref".into(), Value::from(refd.len()));
        refd.push(entry);
        config.push(doc);
    }

    Ok((config, refd))
}
