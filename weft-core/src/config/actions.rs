//! Config instance actions and how annotations compose onto them
//!
//! An annotation document lists its actions as an array of single-purpose
//! entries:
//!
//! ```json
//! [{"attrib": {"qc": "suspect"}}, {"evaluate": "v = v * 2"}, {"exclude": true}, {"flag": ["F"]}]
//! ```
//!
//! The entries are folded once into an [`Actions`] value, which is then
//! composed onto every config instance the annotation intersects.

use serde_json::{Map, Value};

/// Separator placed between concatenated `evaluate` expressions
pub const EXPRESSION_SEPARATOR: &str = ";";

/// The action set carried by one config instance
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Actions {
    /// Attribute overrides; later writers win per key
    pub attrib: Option<Map<String, Value>>,
    /// Expression applied to each datapoint, opaque to the builder
    pub evaluate: Option<String>,
    /// Exclude datapoints in the interval
    pub exclude: Option<bool>,
    /// Flags attached to datapoints in the interval
    pub flag: Option<Vec<Value>>,
    /// Keys the builder does not interpret, carried through untouched
    pub other: Map<String, Value>,
}

impl Actions {
    /// Read the initial actions object of a raw config document
    ///
    /// Values of the wrong shape for a known key are kept in `other` so they
    /// survive serialization unchanged.
    pub fn from_object(object: &Map<String, Value>) -> Self {
        let mut actions = Actions::default();

        for (key, value) in object {
            match (key.as_str(), value) {
                ("attrib", Value::Object(map)) => actions.attrib = Some(map.clone()),
                ("evaluate", Value::String(expr)) => actions.evaluate = Some(expr.clone()),
                ("exclude", Value::Bool(flag)) => actions.exclude = Some(*flag),
                ("flag", Value::Array(flags)) => actions.flag = Some(flags.clone()),
                _ => {
                    actions.other.insert(key.clone(), value.clone());
                }
            }
        }

        actions
    }

    /// Fold the action entries of one annotation document into a single set
    pub fn fold(entries: &[Value]) -> Self {
        let mut actions = Actions::default();
        let mut expressions: Vec<&str> = Vec::new();

        for entry in entries.iter().filter_map(Value::as_object) {
            if let Some(Value::Object(attrib)) = entry.get("attrib") {
                actions
                    .attrib
                    .get_or_insert_with(Map::new)
                    .extend(attrib.iter().map(|(k, v)| (k.clone(), v.clone())));
            }

            match entry.get("evaluate") {
                Some(Value::String(expr)) if !expr.is_empty() => expressions.push(expr),
                _ => {}
            }

            if entry.get("exclude") == Some(&Value::Bool(true)) {
                actions.exclude = Some(true);
            }

            if let Some(Value::Array(flags)) = entry.get("flag") {
                actions
                    .flag
                    .get_or_insert_with(Vec::new)
                    .extend(flags.iter().cloned());
            }
        }

        if !expressions.is_empty() {
            actions.evaluate = Some(expressions.join(EXPRESSION_SEPARATOR));
        }

        actions
    }

    /// Compose an overlay onto these actions
    ///
    /// - `attrib`: shallow merge, overlay wins
    /// - `evaluate`: `existing;overlay`
    /// - `exclude`: stays set once set
    /// - `flag`: `existing ++ overlay`
    pub fn compose(&mut self, overlay: &Actions) {
        if let Some(attrib) = &overlay.attrib {
            self.attrib
                .get_or_insert_with(Map::new)
                .extend(attrib.iter().map(|(k, v)| (k.clone(), v.clone())));
        }

        if let Some(expr) = &overlay.evaluate {
            self.evaluate = Some(match self.evaluate.take() {
                Some(existing) => format!("{}{}{}", existing, EXPRESSION_SEPARATOR, expr),
                None => expr.clone(),
            });
        }

        if overlay.exclude == Some(true) {
            self.exclude = Some(true);
        }

        if let Some(flags) = &overlay.flag {
            self.flag
                .get_or_insert_with(Vec::new)
                .extend(flags.iter().cloned());
        }
    }

    /// True when no action key is present
    pub fn is_empty(&self) -> bool {
        self.attrib.is_none()
            && self.evaluate.is_none()
            && self.exclude.is_none()
            && self.flag.is_none()
            && self.other.is_empty()
    }

    /// Serialize to the `actions` object of an output document
    pub fn to_object(&self) -> Map<String, Value> {
        let mut object = self.other.clone();

        if let Some(attrib) = &self.attrib {
            object.insert("attrib".into(), Value::Object(attrib.clone()));
        }
        if let Some(expr) = &self.evaluate {
            object.insert("evaluate".into(), Value::String(expr.clone()));
        }
        if let Some(exclude) = self.exclude {
            object.insert("exclude".into(), Value::Bool(exclude));
        }
        if let Some(flags) = &self.flag {
            object.insert("flag".into(), Value::Array(flags.clone()));
        }

        object
    }
}
