//! Common fixtures for weft-core integration tests
//!
//! This module provides:
//! - Datapoint series generators with diurnal patterns and gaps
//! - Datastream and annotation document fixtures
//! - Helpers to drain merge queries

#![allow(dead_code)]

use serde_json::{json, Value};
use weft_core::config::Datastream;
use weft_core::query::{Datapoint, Find, MergeQuery, MergedItem, Payload};
use weft_core::TimeKey;

/// 2020-01-01T00:00:00Z
pub const JAN_1_2020: TimeKey = 1_577_836_800_000;

/// One minute in millis
pub const MINUTE: TimeKey = 60_000;

/// One hour in millis
pub const HOUR: TimeKey = 60 * MINUTE;

/// Deterministic LCG so fixtures stay reproducible
pub struct TestRng(u64);

impl TestRng {
    pub fn new(seed: u64) -> Self {
        Self(seed)
    }

    pub fn next_u32(&mut self) -> u32 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (self.0 >> 33) as u32
    }

    /// Uniform in `[0, 1)`
    pub fn next_f64(&mut self) -> f64 {
        self.next_u32() as f64 / (u32::MAX as f64 + 1.0)
    }
}

/// Temperature-like series every `step` millis with a daily cycle
///
/// Each sample is skipped with probability `gap_rate`.
pub fn diurnal_series(
    start: TimeKey,
    count: usize,
    step: TimeKey,
    base: f64,
    gap_rate: f64,
    rng: &mut TestRng,
) -> Vec<Datapoint> {
    (0..count as i64)
        .map(|i| start + i * step)
        .filter(|_| rng.next_f64() >= gap_rate)
        .map(|lt| {
            let hour = ((lt / HOUR) % 24) as f64;
            let swing = (hour / 24.0 * std::f64::consts::TAU).sin() * 5.0;
            let v = ((base + swing) * 100.0).round() / 100.0;
            let mut dp = Datapoint::scalar(lt, v);
            dp.o = Some(json!(-28800));
            dp
        })
        .collect()
}

/// Sensor datastream with the given raw config list
pub fn sensor_datastream(id: &str, config: Value) -> Datastream {
    serde_json::from_value(json!({
        "_id": id,
        "station_id": "station-1",
        "source_type": "sensor",
        "attributes": {
            "height": 2,
            "unit": {"scale": 0.1}
        },
        "datapoints_config": config,
    }))
    .unwrap()
}

/// Annotation document over one or more `[begins_at, ends_before)` pairs
pub fn annotation(id: &str, actions: Value, intervals: &[(Option<&str>, Option<&str>)]) -> Value {
    let intervals: Vec<Value> = intervals
        .iter()
        .map(|(begins_at, ends_before)| {
            let mut interval = serde_json::Map::new();
            if let Some(b) = begins_at {
                interval.insert("begins_at".into(), json!(b));
            }
            if let Some(e) = ends_before {
                interval.insert("ends_before".into(), json!(e));
            }
            Value::Object(interval)
        })
        .collect();

    json!({
        "_id": id,
        "actions": actions,
        "intervals": intervals,
    })
}

/// Drain a query into a vector
pub async fn drain<F: Find>(mut query: MergeQuery<F>) -> Vec<MergedItem> {
    let mut items = Vec::new();
    while let Some(item) = query.next().await {
        items.push(item);
    }
    items
}

/// `va` slots of an item
pub fn va(item: &MergedItem) -> &[Value] {
    match &item.payload {
        Payload::Va(values) => values,
        other => panic!("expected va payload, got {}", other.name()),
    }
}
