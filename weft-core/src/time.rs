//! Time keys and ISO-8601 handling
//!
//! All times in weft are UTC epoch milliseconds. Documents carry ISO-8601
//! strings; they are parsed once, eagerly, when a value object is built.
//!
//! Open-ended bounds resolve to two sentinels that stay inside the range the
//! datapoint store accepts, rather than `i64::MIN`/`i64::MAX`.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};

/// Timestamp in milliseconds since the Unix epoch (UTC)
pub type TimeKey = i64;

/// Lower sentinel for missing `begins_at`: 1800-02-02T00:00:00Z
pub const MIN_TIME: TimeKey = -5_361_897_600_000;

/// Upper sentinel for missing `ends_before`: 2200-02-02T00:00:00Z
pub const MAX_TIME: TimeKey = 7_260_883_200_000;

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
];

/// Parse an ISO-8601 string into epoch millis
///
/// Strings without an offset are read as UTC. Date-only strings resolve to
/// midnight UTC.
pub fn parse_iso(s: &str) -> Option<TimeKey> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis());
    }

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc().timestamp_millis());
        }
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().timestamp_millis())
}

/// Parse an optional ISO-8601 value, falling back on absence or bad input
pub fn parse_iso_or(value: Option<&serde_json::Value>, fallback: TimeKey) -> TimeKey {
    value
        .and_then(|v| v.as_str())
        .and_then(parse_iso)
        .unwrap_or(fallback)
}

fn to_datetime(key: TimeKey) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(key)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Render epoch millis as `YYYY-MM-DDTHH:MM:SS.sssZ`
pub fn to_iso(key: TimeKey) -> String {
    to_datetime(key).to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Render epoch millis as `YYYY-MM-DD HH:MM:SS` for tabular export
pub fn to_column_time(key: TimeKey) -> String {
    to_datetime(key).format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Serde adapter reading and writing a [`TimeKey`] as an ISO-8601 string
pub mod iso {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::{parse_iso, to_iso, TimeKey};

    /// Write as `YYYY-MM-DDTHH:MM:SS.sssZ`
    pub fn serialize<S: Serializer>(key: &TimeKey, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&to_iso(*key))
    }

    /// Read any ISO-8601 shape [`parse_iso`] accepts
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<TimeKey, D::Error> {
        let s = String::deserialize(deserializer)?;
        parse_iso(&s).ok_or_else(|| D::Error::custom(format!("invalid ISO-8601 time '{}'", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sentinels_match_their_dates() {
        assert_eq!(parse_iso("1800-02-02T00:00:00Z"), Some(MIN_TIME));
        assert_eq!(parse_iso("2200-02-02T00:00:00Z"), Some(MAX_TIME));
    }

    #[test]
    fn parses_common_iso_shapes() {
        let expected = 1_577_836_800_000;
        assert_eq!(parse_iso("2020-01-01T00:00:00Z"), Some(expected));
        assert_eq!(parse_iso("2020-01-01T00:00:00.000Z"), Some(expected));
        assert_eq!(parse_iso("2020-01-01T00:00:00"), Some(expected));
        assert_eq!(parse_iso("2020-01-01"), Some(expected));
        assert_eq!(parse_iso("2020-01-01T08:00:00+08:00"), Some(expected));
    }

    #[test]
    fn invalid_values_fall_back() {
        assert_eq!(parse_iso("yesterday"), None);
        assert_eq!(parse_iso_or(Some(&json!("nope")), MIN_TIME), MIN_TIME);
        assert_eq!(parse_iso_or(Some(&json!(42)), MAX_TIME), MAX_TIME);
        assert_eq!(parse_iso_or(None, MAX_TIME), MAX_TIME);
    }

    #[test]
    fn renders_iso_and_column_time() {
        assert_eq!(to_iso(1_577_836_800_000), "2020-01-01T00:00:00.000Z");
        assert_eq!(to_column_time(1_577_836_861_500), "2020-01-01 00:01:01");
    }
}
