//! Backtracking search over the decode forest.

use tracing::trace;

use crate::isa::bits::{BitCursor, BitExtractor};
use crate::isa::model::FieldId;

use super::FieldCachePolicy;
use super::fields::FieldTable;
use super::forest::{DecodeForest, NodeId};

/// Counters gathered during one search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchStats {
    pub tests: usize,
    pub extractions: usize,
    pub backtracks: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchOutcome {
    pub instruction: Option<usize>,
    pub stats: MatchStats,
}

pub struct Matcher<'a> {
    forest: &'a DecodeForest,
    fields: &'a FieldTable,
    policy: FieldCachePolicy,
}

impl<'a> Matcher<'a> {
    pub fn new(forest: &'a DecodeForest, fields: &'a FieldTable, policy: FieldCachePolicy) -> Self {
        Self {
            forest,
            fields,
            policy,
        }
    }

    /// Walks the forest against `buffer`, returning the first instruction whose chain matches
    /// and which `accept` approves. A rejected candidate, a failed extraction or an exhausted
    /// sibling list all resume the search from the next alternative, popping enclosing levels
    /// as needed.
    pub fn find<E, A>(
        &self,
        extractor: &E,
        buffer: &[u8],
        cursor: &mut BitCursor,
        mut accept: A,
    ) -> MatchOutcome
    where
        E: BitExtractor + ?Sized,
        A: FnMut(usize, &mut BitCursor) -> bool,
    {
        let mut stats = MatchStats::default();
        let mut path: Vec<NodeId> = Vec::with_capacity(self.forest.max_depth());
        let mut held: Option<(FieldId, i64)> = None;
        let mut current = self.forest.root();

        loop {
            let Some(id) = current else {
                let Some(parent) = path.pop() else {
                    return MatchOutcome {
                        instruction: None,
                        stats,
                    };
                };
                stats.backtracks += 1;
                trace!(depth = path.len(), "decode level exhausted, backtracking");
                current = self.forest.node(parent).sibling;
                continue;
            };

            let node = self.forest.node(id);
            stats.tests += 1;
            let value = match held {
                Some((field, value))
                    if field == node.field && self.policy == FieldCachePolicy::AcrossSiblings =>
                {
                    Some(value)
                }
                _ => {
                    stats.extractions += 1;
                    let value = self.extract(extractor, buffer, cursor, node.field);
                    held = value.map(|value| (node.field, value));
                    value
                }
            };

            if value == Some(node.value) {
                if let Some(instruction) = node.found
                    && accept(instruction, cursor)
                {
                    return MatchOutcome {
                        instruction: Some(instruction),
                        stats,
                    };
                }
                if let Some(child) = node.child {
                    path.push(id);
                    current = Some(child);
                    held = None;
                    continue;
                }
            }
            current = node.sibling;
        }
    }

    fn extract<E>(
        &self,
        extractor: &E,
        buffer: &[u8],
        cursor: &mut BitCursor,
        id: FieldId,
    ) -> Option<i64>
    where
        E: BitExtractor + ?Sized,
    {
        let field = self.fields.get(id)?;
        match extractor.extract(buffer, cursor, field.first_bit, field.size, field.is_signed()) {
            Ok(value) => Some(value),
            Err(err) => {
                trace!(field = %field.name, %err, "field unavailable, treating test as a miss");
                None
            }
        }
    }
}
