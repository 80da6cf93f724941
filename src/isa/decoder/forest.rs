//! Decode forest: one `field == value` test per node, stored in a flat arena.
//!
//! Nodes at the same chain position are linked through `sibling`; a chain that continues past a
//! node descends through `child`. The head of the root sibling list is the forest root. Node
//! order reflects insertion order; no attempt is made to pick a cheaper test order.

use std::fmt::Write;

use crate::isa::model::{FieldId, Instruction};

use super::fields::FieldTable;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

impl NodeId {
    fn from_index(index: usize) -> Self {
        Self(index as u32)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeNode {
    pub field: FieldId,
    pub value: i64,
    /// Index of the instruction whose chain terminates here.
    pub found: Option<usize>,
    pub child: Option<NodeId>,
    pub sibling: Option<NodeId>,
}

impl DecodeNode {
    fn new(field: FieldId, value: i64) -> Self {
        Self {
            field,
            value,
            found: None,
            child: None,
            sibling: None,
        }
    }
}

/// Result of inserting one chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Insertion {
    /// Instruction previously terminating at the same node, replaced by this one.
    pub replaced: Option<usize>,
    /// Instruction terminating on this chain's path before its last test; the new chain can
    /// never be reached.
    pub shadowed_by: Option<usize>,
    /// The new terminal sits above an existing subtree; this is the first instruction it hides.
    pub shadows: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertError {
    EmptyChain,
    /// Another instruction already terminates at the same node.
    Conflict { existing: usize },
}

#[derive(Debug, Clone, Default)]
pub struct DecodeForest {
    nodes: Vec<DecodeNode>,
    root: Option<NodeId>,
    max_depth: usize,
}

impl DecodeForest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &DecodeNode {
        &self.nodes[id.index()]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Longest chain inserted so far, in levels.
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Iterates a sibling list starting at `head`.
    pub fn siblings(&self, head: Option<NodeId>) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(head, move |id| self.node(*id).sibling)
    }

    /// Inserts `chain` for the instruction at `instruction`. With `replace` unset, a second
    /// instruction landing on an occupied terminal is rejected and the node keeps its owner.
    /// Shadowing in either direction is only reported; the caller decides whether it is fatal.
    pub fn insert(
        &mut self,
        instruction: usize,
        chain: &[(FieldId, i64)],
        replace: bool,
    ) -> Result<Insertion, InsertError> {
        let Some(last) = chain.len().checked_sub(1) else {
            return Err(InsertError::EmptyChain);
        };
        let mut report = Insertion::default();
        let mut parent: Option<NodeId> = None;
        for (depth, &(field, value)) in chain.iter().enumerate() {
            let node = self.find_or_append(parent, field, value);
            let slot = &mut self.nodes[node.index()];
            if depth == last {
                if let Some(existing) = slot.found {
                    if !replace {
                        return Err(InsertError::Conflict { existing });
                    }
                    report.replaced = Some(existing);
                }
                slot.found = Some(instruction);
                let below = slot.child;
                report.shadows = self.first_terminal(below);
            } else if let Some(existing) = slot.found
                && report.shadowed_by.is_none()
            {
                report.shadowed_by = Some(existing);
            }
            parent = Some(node);
        }
        self.max_depth = self.max_depth.max(chain.len());
        Ok(report)
    }

    /// First instruction found in a depth-first walk of the subtree headed by `head`.
    fn first_terminal(&self, head: Option<NodeId>) -> Option<usize> {
        let mut stack = vec![head];
        while let Some(cursor) = stack.pop() {
            let Some(id) = cursor else {
                continue;
            };
            let node = self.node(id);
            if node.found.is_some() {
                return node.found;
            }
            stack.push(node.sibling);
            stack.push(node.child);
        }
        None
    }

    fn find_or_append(&mut self, parent: Option<NodeId>, field: FieldId, value: i64) -> NodeId {
        let head = match parent {
            Some(parent) => self.node(parent).child,
            None => self.root,
        };
        let mut tail = None;
        for id in self.siblings(head) {
            let node = self.node(id);
            if node.field == field && node.value == value {
                return id;
            }
            tail = Some(id);
        }
        let id = NodeId::from_index(self.nodes.len());
        self.nodes.push(DecodeNode::new(field, value));
        match (tail, parent) {
            (Some(tail), _) => self.nodes[tail.index()].sibling = Some(id),
            (None, Some(parent)) => self.nodes[parent.index()].child = Some(id),
            (None, None) => self.root = Some(id),
        }
        id
    }

    /// Renders the forest one test per line, indenting four spaces per level.
    pub fn render(&self, fields: &FieldTable, instructions: &[Instruction]) -> String {
        let mut out = String::new();
        let mut stack = vec![(self.root, 0usize)];
        while let Some((cursor, level)) = stack.pop() {
            let Some(id) = cursor else {
                continue;
            };
            let node = self.node(id);
            let name = fields
                .get(node.field)
                .map(|field| field.name.as_str())
                .unwrap_or("?");
            let _ = write!(out, "{:indent$}{name} == {}", "", node.value, indent = level * 4);
            if let Some(index) = node.found {
                let _ = write!(out, " -> {}", instructions[index].name);
            }
            out.push('\n');
            // Sibling pushed first so the subtree prints before it.
            stack.push((node.sibling, level));
            stack.push((node.child, level + 1));
        }
        out
    }
}
