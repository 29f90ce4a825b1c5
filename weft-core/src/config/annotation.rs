//! Annotation intervals
//!
//! One annotation document can carry several `intervals`; each one becomes
//! its own [`Annotation`] sharing the parent document. A document without
//! `intervals` covers all time.

use std::sync::Arc;

use serde_json::{Map, Value};

use super::actions::Actions;
use super::Document;
use crate::interval::Interval;
use crate::time::{parse_iso_or, MAX_TIME, MIN_TIME};

/// One time-scoped overlay derived from an annotation document
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    doc: Arc<Document>,
    interval: Interval,
    actions: Actions,
    has_actions: bool,
}

impl Annotation {
    /// Build an annotation for one interval document of `doc`
    ///
    /// Missing or unparseable bounds resolve to the open-ended sentinels.
    /// Returns `None` for an interval that holds no time.
    pub fn new(doc: Arc<Document>, interval_doc: &Map<String, Value>) -> Option<Self> {
        let begin = parse_iso_or(interval_doc.get("begins_at"), MIN_TIME);
        let end = parse_iso_or(interval_doc.get("ends_before"), MAX_TIME);
        let interval = Interval::new(begin, end)?;

        let entries = doc
            .get("actions")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[]);

        Some(Self {
            actions: Actions::fold(entries),
            has_actions: !entries.is_empty(),
            interval,
            doc,
        })
    }

    /// Expand an annotation document into one annotation per interval
    pub fn expand(doc: Document) -> Vec<Annotation> {
        let doc = Arc::new(doc);

        match doc.get("intervals") {
            Some(Value::Array(intervals)) => intervals
                .iter()
                .filter_map(Value::as_object)
                .filter_map(|interval_doc| Annotation::new(Arc::clone(&doc), interval_doc))
                .collect(),
            _ => Annotation::new(Arc::clone(&doc), &Map::new())
                .into_iter()
                .collect(),
        }
    }

    /// Identifier recorded in `annotation_ids` of touched instances
    pub fn id(&self) -> Value {
        self.doc.get("_id").cloned().unwrap_or(Value::Null)
    }

    /// Source document
    pub fn doc(&self) -> &Document {
        &self.doc
    }

    /// Time range this annotation covers
    pub fn interval(&self) -> Interval {
        self.interval
    }

    /// Folded actions of the source document
    pub fn actions(&self) -> &Actions {
        &self.actions
    }

    /// True when the source document lists at least one action entry
    pub fn has_actions(&self) -> bool {
        self.has_actions
    }
}
