//! Format adapters placing each source's record into its slot
//!
//! | Name | Payload                        | Missing source    |
//! |------|--------------------------------|-------------------|
//! | `d`  | map of datastream id to record | key absent        |
//! | `da` | array of records by ordinal    | `{}`              |
//! | `va` | array of `v` values by ordinal | `null`            |
//!
//! The format is chosen once per query; an unknown name is rejected before
//! any fetching starts.

use core::fmt;
use core::str::FromStr;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::record::Payload;
use super::source::Source;
use crate::errors::QueryError;

/// Query output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Format {
    /// Sparse map by datastream id
    D,
    /// Dense array of records
    Da,
    /// Dense array of scalar values
    #[default]
    Va,
}

impl Format {
    /// Short name as used in query options
    pub fn name(self) -> &'static str {
        match self {
            Format::D => "d",
            Format::Da => "da",
            Format::Va => "va",
        }
    }

    /// Adapter for a query over `len` sources
    pub fn formatter(self, len: usize) -> Box<dyn SlotFormatter> {
        match self {
            Format::D => Box::new(SparseById),
            Format::Da => Box::new(DenseRecords { len }),
            Format::Va => Box::new(DenseValues { len }),
        }
    }
}

impl FromStr for Format {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "d" => Ok(Format::D),
            "da" => Ok(Format::Da),
            "va" => Ok(Format::Va),
            other => Err(QueryError::UnknownFormat(other.to_string())),
        }
    }
}

impl TryFrom<String> for Format {
    type Error = QueryError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Format> for String {
    fn from(format: Format) -> Self {
        format.name().to_string()
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Strategy that shapes merged item payloads
pub trait SlotFormatter: Send + Sync {
    /// Payload with every slot at its default
    fn new_payload(&self) -> Payload;

    /// Put `data` into the slot belonging to `source`
    fn set_slot(&self, payload: &mut Payload, source: &Source, data: Map<String, Value>);
}

/// `d` adapter
#[derive(Debug, Clone, Copy)]
pub struct SparseById;

impl SlotFormatter for SparseById {
    fn new_payload(&self) -> Payload {
        Payload::D(BTreeMap::new())
    }

    fn set_slot(&self, payload: &mut Payload, source: &Source, data: Map<String, Value>) {
        if let Payload::D(slots) = payload {
            slots.insert(source.id.clone(), data);
        }
    }
}

/// `da` adapter
#[derive(Debug, Clone, Copy)]
pub struct DenseRecords {
    len: usize,
}

impl SlotFormatter for DenseRecords {
    fn new_payload(&self) -> Payload {
        Payload::Da(vec![Map::new(); self.len])
    }

    fn set_slot(&self, payload: &mut Payload, source: &Source, data: Map<String, Value>) {
        if let Payload::Da(slots) = payload {
            if let Some(slot) = slots.get_mut(source.index) {
                *slot = data;
            }
        }
    }
}

/// `va` adapter
#[derive(Debug, Clone, Copy)]
pub struct DenseValues {
    len: usize,
}

impl SlotFormatter for DenseValues {
    fn new_payload(&self) -> Payload {
        Payload::Va(vec![Value::Null; self.len])
    }

    fn set_slot(&self, payload: &mut Payload, source: &Source, mut data: Map<String, Value>) {
        if let Payload::Va(slots) = payload {
            if let Some(slot) = slots.get_mut(source.index) {
                *slot = data.remove("v").unwrap_or(Value::Null);
            }
        }
    }
}
