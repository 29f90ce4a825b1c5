//! Time-scoped config instances
//!
//! A [`ConfigInstance`] is one version of a datastream's datapoints config,
//! valid over a half-open interval. Instances are values: narrowing or
//! annotating one produces a new instance and leaves the original alone. The
//! underlying document is shared between clones since it is never written.

use std::sync::Arc;

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde_json::{Map, Value};

use super::actions::Actions;
use super::annotation::Annotation;
use super::Document;
use crate::interval::Interval;
use crate::time::{parse_iso_or, to_iso, MAX_TIME, MIN_TIME};

lazy_static! {
    /// `@{dotted.path}` tokens inside evaluate expressions
    static ref TOKEN: Regex = Regex::new(r"@\{([.\w]+)\}").unwrap();
}

/// One config version scoped to `[begins_at, ends_before)`
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigInstance {
    doc: Arc<Document>,
    interval: Interval,
    actions: Actions,
    annotation_ids: Vec<Value>,
}

impl ConfigInstance {
    /// Build an instance from a raw config document
    ///
    /// Initial actions come from the document's `actions`, either an array of
    /// entries folded like an annotation's or a single object. Returns `None`
    /// when the resolved interval is empty or inverted.
    pub fn from_doc(doc: Document) -> Option<Self> {
        let begin = parse_iso_or(doc.get("begins_at"), MIN_TIME);
        let end = parse_iso_or(doc.get("ends_before"), MAX_TIME);
        let interval = Interval::new(begin, end)?;

        let actions = match doc.get("actions") {
            Some(Value::Array(entries)) => Actions::fold(entries),
            Some(Value::Object(object)) => Actions::from_object(object),
            _ => Actions::default(),
        };

        Some(Self {
            doc: Arc::new(doc),
            interval,
            actions,
            annotation_ids: Vec::new(),
        })
    }

    /// Source document
    pub fn doc(&self) -> &Document {
        &self.doc
    }

    /// Interval this instance is effective for
    pub fn interval(&self) -> Interval {
        self.interval
    }

    /// Current action set
    pub fn actions(&self) -> &Actions {
        &self.actions
    }

    /// Ids of the annotations composed onto this instance, in order
    pub fn annotation_ids(&self) -> &[Value] {
        &self.annotation_ids
    }

    /// Copy of this instance narrowed to `interval`
    pub fn with_interval(&self, interval: Interval) -> Self {
        Self {
            doc: Arc::clone(&self.doc),
            interval,
            actions: self.actions.clone(),
            annotation_ids: self.annotation_ids.clone(),
        }
    }

    /// Compose an annotation's actions onto this instance
    pub fn annotated(mut self, annotation: &Annotation) -> Self {
        self.actions.compose(annotation.actions());
        self.annotation_ids.push(annotation.id());
        self
    }

    /// Serialize to an output config document
    ///
    /// `attributes` are the owning datastream's attributes; together with this
    /// instance's `attrib` action they resolve `@{path}` tokens in `evaluate`.
    pub fn merged_doc(&self, attributes: &Map<String, Value>) -> Document {
        let mut out = (*self.doc).clone();
        out.insert("begins_at".into(), Value::String(to_iso(self.interval.begin)));
        out.insert("ends_before".into(), Value::String(to_iso(self.interval.end)));

        if !self.actions.is_empty() {
            let mut actions = self.actions.clone();
            if let Some(expr) = &actions.evaluate {
                let mut scope = attributes.clone();
                if let Some(attrib) = &actions.attrib {
                    scope.extend(attrib.iter().map(|(k, v)| (k.clone(), v.clone())));
                }
                actions.evaluate = Some(substitute_tokens(expr, &scope));
            }
            out.insert("actions".into(), Value::Object(actions.to_object()));
        }

        if !self.annotation_ids.is_empty() {
            out.insert("annotation_ids".into(), Value::Array(self.annotation_ids.clone()));
        }

        out
    }
}

/// Replace `@{dotted.path}` tokens with values looked up in `scope`
///
/// Unresolved paths render as `null`.
pub fn substitute_tokens(expr: &str, scope: &Map<String, Value>) -> String {
    TOKEN
        .replace_all(expr, |caps: &Captures| {
            let value = lookup_path(scope, &caps[1]).unwrap_or(&Value::Null);
            match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            }
        })
        .into_owned()
}

fn lookup_path<'a>(scope: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.').filter(|s| !s.is_empty());
    let mut current = scope.get(segments.next()?)?;

    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }

    Some(current)
}
