//! Collapse raw config documents into a non-overlapping stack
//!
//! ## Algorithm
//!
//! Instances are sorted by begin (stable, so declaration order breaks ties)
//! and swept once against the top of an output stack:
//!
//! ```text
//! inst begins at/after top end      -> push            (disjoint)
//! inst ends at/before top end       -> drop inst       (shadowed by top)
//! inst begins where top begins      -> pop top, push   (inst replaces top)
//! otherwise                         -> cut top at inst begin, push
//! ```
//!
//! The result is begin-ascending and pairwise non-overlapping. Feeding the
//! result back in returns it unchanged.

use log::trace;

use super::instance::ConfigInstance;
use super::Document;
use crate::interval::Interval;

/// Build the base config stack from raw documents
///
/// Documents whose interval is empty or inverted never take effect and are
/// dropped without error.
pub fn preprocess<I>(docs: I) -> Vec<ConfigInstance>
where
    I: IntoIterator<Item = Document>,
{
    collapse(docs.into_iter().filter_map(ConfigInstance::from_doc).collect())
}

/// Sweep already-built instances into a non-overlapping stack
pub fn collapse(mut instances: Vec<ConfigInstance>) -> Vec<ConfigInstance> {
    instances.sort_by_key(|inst| inst.interval().begin);

    let mut stack: Vec<ConfigInstance> = Vec::with_capacity(instances.len());

    for inst in instances {
        let current = inst.interval();

        let Some(top) = stack.last_mut() else {
            stack.push(inst);
            continue;
        };
        let top_interval = top.interval();

        if current.begin >= top_interval.end {
            stack.push(inst);
        } else if current.end <= top_interval.end {
            trace!("Dropping config instance {} shadowed by {}.", current, top_interval);
        } else if current.begin == top_interval.begin {
            stack.pop();
            stack.push(inst);
        } else {
            // Sorted input guarantees top begins strictly before inst here
            if let Some(cut) = Interval::new(top_interval.begin, current.begin) {
                *top = top.with_interval(cut);
            }
            stack.push(inst);
        }
    }

    stack
}
