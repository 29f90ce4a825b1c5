//! Overlay annotations onto a non-overlapping config list
//!
//! Each instance an annotation touches is split at the annotation's
//! boundaries: the pieces outside the annotation keep the instance's actions,
//! the piece inside gets the annotation's actions composed on top.
//!
//! ```text
//! config:      [0 ---------------------------- 100)
//! annotation:           [20 ---- 40)  exclude
//! result:      [0 - 20) [20 ---- 40)  [40 ---- 100)
//!                        exclude, ids=[ann]
//! ```

use log::debug;

use super::annotation::Annotation;
use super::instance::ConfigInstance;

/// Apply one annotation to a config list
///
/// Instances the annotation does not overlap are passed through unchanged.
/// The returned list is non-overlapping but not re-sorted; callers sort by
/// begin before applying the next annotation.
pub fn apply_annotation(annotation: &Annotation, config: &[ConfigInstance]) -> Vec<ConfigInstance> {
    let overlay = annotation.interval();
    let mut out = Vec::with_capacity(config.len() + 2);

    for inst in config {
        let current = inst.interval();

        if !overlay.overlaps(&current) {
            out.push(inst.clone());
            continue;
        }

        out.extend(current.difference(&overlay).into_iter().map(|piece| inst.with_interval(piece)));

        if let Some(shared) = current.intersection(&overlay) {
            out.push(inst.with_interval(shared).annotated(annotation));
        }
    }

    out
}

/// Stable sort of a config list by begin time
pub fn sort_by_begin(config: &mut [ConfigInstance]) {
    config.sort_by_key(|inst| inst.interval().begin);
}

/// Apply a set of annotations in ascending begin order
///
/// Annotations without any action entry are skipped. Ties on begin keep the
/// order they were given in.
pub fn apply_annotations(
    mut config: Vec<ConfigInstance>,
    annotations: &[Annotation],
) -> Vec<ConfigInstance> {
    let mut ordered: Vec<&Annotation> = annotations.iter().filter(|a| a.has_actions()).collect();
    ordered.sort_by_key(|a| a.interval().begin);

    debug!(
        "Applying {} of {} annotation interval(s).",
        ordered.len(),
        annotations.len()
    );

    for annotation in ordered {
        config = apply_annotation(annotation, &config);
        sort_by_begin(&mut config);
    }

    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Document;
    use crate::interval::Interval;
    use crate::time::to_iso;
    use proptest::prelude::*;
    use serde_json::{json, Value};

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    fn base(begin: i64, end: i64) -> ConfigInstance {
        ConfigInstance::from_doc(doc(json!({
            "begins_at": to_iso(begin),
            "ends_before": to_iso(end),
        })))
        .unwrap()
    }

    fn annotation(id: &str, begin: i64, end: i64, actions: Value) -> Annotation {
        Annotation::expand(doc(json!({
            "_id": id,
            "actions": actions,
            "intervals": [{"begins_at": to_iso(begin), "ends_before": to_iso(end)}],
        })))
        .pop()
        .unwrap()
    }

    fn spans(config: &[ConfigInstance]) -> Vec<(i64, i64)> {
        config
            .iter()
            .map(|inst| (inst.interval().begin, inst.interval().end))
            .collect()
    }

    #[test]
    fn exclude_in_the_middle() {
        let ann = annotation("ann", 20, 40, json!([{"exclude": true}]));
        let mut config = apply_annotation(&ann, &[base(0, 100)]);
        sort_by_begin(&mut config);

        assert_eq!(spans(&config), vec![(0, 20), (20, 40), (40, 100)]);
        assert_eq!(config[1].actions().exclude, Some(true));
        assert_eq!(config[1].annotation_ids(), &[json!("ann")]);
        assert!(config[0].actions().is_empty());
        assert!(config[2].annotation_ids().is_empty());
    }

    #[test]
    fn disjoint_annotation_is_a_no_op() {
        let config = vec![base(0, 10), base(10, 20)];
        let ann = annotation("far", 50, 60, json!([{"exclude": true}]));
        assert_eq!(apply_annotation(&ann, &config), config);
    }

    #[test]
    fn spanning_annotation_touches_every_instance() {
        let config = vec![base(0, 10), base(10, 20), base(20, 30)];
        let ann = annotation("wide", 5, 25, json!([{"flag": ["F"]}]));
        let mut out = apply_annotation(&ann, &config);
        sort_by_begin(&mut out);

        assert_eq!(
            spans(&out),
            vec![(0, 5), (5, 10), (10, 20), (20, 25), (25, 30)]
        );
        let flagged: Vec<bool> = out.iter().map(|i| i.actions().flag.is_some()).collect();
        assert_eq!(flagged, vec![false, true, true, true, false]);
    }

    #[test]
    fn annotations_compose_in_begin_order() {
        let later = annotation("later", 30, 60, json!([{"evaluate": "b"}]));
        let earlier = annotation("earlier", 10, 50, json!([{"evaluate": "a"}]));
        let config = apply_annotations(vec![base(0, 100)], &[later, earlier]);

        assert_eq!(
            spans(&config),
            vec![(0, 10), (10, 30), (30, 50), (50, 60), (60, 100)]
        );
        assert_eq!(config[2].actions().evaluate.as_deref(), Some("a;b"));
        assert_eq!(config[2].annotation_ids(), &[json!("earlier"), json!("later")]);
        assert_eq!(config[3].actions().evaluate.as_deref(), Some("b"));
    }

    #[test]
    fn annotations_without_actions_are_skipped() {
        let idle = annotation("idle", 10, 20, json!([]));
        let config = apply_annotations(vec![base(0, 100)], &[idle]);
        assert_eq!(spans(&config), vec![(0, 100)]);
    }

    #[test]
    fn pieces_cover_the_original_exactly() {
        let inst = base(0, 100);
        let ann = annotation("edge", 0, 30, json!([{"exclude": true}]));
        let mut out = apply_annotation(&ann, &[inst.clone()]);
        sort_by_begin(&mut out);

        assert_eq!(out.first().map(|i| i.interval().begin), Some(0));
        assert_eq!(out.last().map(|i| i.interval().end), Some(100));
        let total: i64 = out.iter().map(|i| i.interval().duration()).sum();
        assert_eq!(total, Interval::new(0, 100).unwrap().duration());
    }

    /// Coverage with touching spans joined
    fn union(mut spans: Vec<(i64, i64)>) -> Vec<(i64, i64)> {
        spans.sort();
        let mut out: Vec<(i64, i64)> = Vec::new();
        for (begin, end) in spans {
            match out.last_mut() {
                Some(last) if begin <= last.1 => last.1 = last.1.max(end),
                _ => out.push((begin, end)),
            }
        }
        out
    }

    fn action(kind: u8) -> Value {
        match kind {
            0 => json!([{"exclude": true}]),
            1 => json!([{"flag": ["F"]}]),
            2 => json!([{"evaluate": "v = v + 1"}]),
            _ => json!([{"attrib": {"qc": "suspect"}}]),
        }
    }

    proptest! {
        #[test]
        fn annotated_list_stays_sorted_disjoint_and_covering(
            layout in prop::collection::vec((0i64..20, 1i64..30), 0..6),
            overlays in prop::collection::vec((0i64..200, 1i64..80, 0u8..4), 0..6),
        ) {
            let mut cursor = 0;
            let config: Vec<ConfigInstance> = layout
                .iter()
                .map(|(gap, len)| {
                    let begin = cursor + gap;
                    cursor = begin + len;
                    base(begin, cursor)
                })
                .collect();
            let annotations: Vec<Annotation> = overlays
                .iter()
                .enumerate()
                .map(|(i, (begin, len, kind))| annotation(&format!("n{}", i), *begin, begin + len, action(*kind)))
                .collect();

            let out = apply_annotations(config.clone(), &annotations);

            for pair in out.windows(2) {
                prop_assert!(pair[0].interval().begin <= pair[1].interval().begin);
                prop_assert!(pair[0].interval().end <= pair[1].interval().begin);
            }
            prop_assert_eq!(union(spans(&out)), union(spans(&config)));

            let total: i64 = out.iter().map(|i| i.interval().duration()).sum();
            let expected: i64 = config.iter().map(|i| i.interval().duration()).sum();
            prop_assert_eq!(total, expected);
        }
    }
}
