//! Datapoints in, merged items out

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::time::TimeKey;

/// One datapoint as delivered by a `find` collaborator
///
/// `lt` is the merge key. `o` and `t` are passed through onto the merged
/// item; every other field goes to the format adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Datapoint {
    /// Local time key in epoch millis
    pub lt: TimeKey,
    /// Origin/offset passthrough
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub o: Option<Value>,
    /// Secondary time passthrough
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t: Option<Value>,
    /// Remaining fields (`v`, `q`, ...)
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Datapoint {
    /// Datapoint carrying a single scalar `v`
    pub fn scalar(lt: TimeKey, v: impl Into<Value>) -> Self {
        let mut fields = Map::new();
        fields.insert("v".into(), v.into());
        Self { lt, o: None, t: None, fields }
    }
}

/// Per-source slots of a merged item, shaped by the query format
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Payload {
    /// Sparse map of datastream id to record
    D(BTreeMap<String, Map<String, Value>>),
    /// Dense array of records indexed by source ordinal, default `{}`
    Da(Vec<Map<String, Value>>),
    /// Dense array of `v` scalars indexed by source ordinal, default `null`
    Va(Vec<Value>),
}

impl Payload {
    /// Short format name of this payload
    pub fn name(&self) -> &'static str {
        match self {
            Payload::D(_) => "d",
            Payload::Da(_) => "da",
            Payload::Va(_) => "va",
        }
    }
}

/// All sources' datapoints at one time key
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedItem {
    /// Shared time key
    pub lt: TimeKey,
    /// Origin/offset of the first datapoint seen at this key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub o: Option<Value>,
    /// Secondary time of the first datapoint seen at this key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub t: Option<Value>,
    /// Source slots
    #[serde(flatten)]
    pub payload: Payload,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn datapoint_splits_passthrough_fields() {
        let dp: Datapoint = serde_json::from_value(json!({
            "lt": 1000, "o": -28800, "t": 1028800, "v": 21.5, "q": 1
        }))
        .unwrap();

        assert_eq!(dp.lt, 1000);
        assert_eq!(dp.o, Some(json!(-28800)));
        assert_eq!(dp.t, Some(json!(1028800)));
        assert_eq!(Value::Object(dp.fields), json!({"v": 21.5, "q": 1}));
    }

    #[test]
    fn merged_item_serializes_flat() {
        let item = MergedItem {
            lt: 1000,
            o: None,
            t: Some(json!(1000)),
            payload: Payload::Va(vec![json!(1.5), Value::Null]),
        };

        assert_eq!(
            serde_json::to_value(&item).unwrap(),
            json!({"lt": 1000, "t": 1000, "va": [1.5, null]})
        );
    }
}
