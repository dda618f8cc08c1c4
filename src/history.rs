/// Navigation history for one exploration session.
///
/// The stack holds the single materialized root→current path through the
/// (implicitly infinite) topic tree. Sibling branches not taken are
/// discarded from the stack — their content stays in the cache by key, so
/// re-selecting one later is instant and reuses the same course instance.
///
/// Each entry remembers which action was taken from it (`selected`) so the
/// UI can re-highlight that choice when the user navigates back.
use std::sync::Arc;

use crate::course::{Course, Selection};

// ── HistoryNode ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct HistoryNode {
    /// Normalized topic key (cache identity)
    pub key: String,
    /// The prompt text that originated this node, as sent to the generator
    pub prompt: String,
    pub course: Arc<Course>,
    /// Action taken from this node, set once while it is topmost and never
    /// changed after a child is pushed above it. None = nothing taken yet.
    pub selected: Option<Selection>,
}

impl HistoryNode {
    pub fn new(key: String, prompt: String, course: Arc<Course>) -> Self {
        Self { key, prompt, course, selected: None }
    }
}

// ── HistoryStack ──────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct HistoryStack {
    nodes: Vec<HistoryNode>,
}

impl HistoryStack {
    /// The current node, if any.
    pub fn top(&self) -> Option<&HistoryNode> {
        self.nodes.last()
    }

    /// Append a node as the new top (descending into a child topic).
    pub fn push(&mut self, node: HistoryNode) {
        self.nodes.push(node);
    }

    /// Remove the top node and return a reference to the new top.
    /// No-op (returns None) when the stack has one entry or less — the root
    /// has no parent to return to.
    pub fn pop_to_parent(&mut self) -> Option<&HistoryNode> {
        if self.nodes.len() <= 1 {
            return None;
        }
        self.nodes.pop();
        self.nodes.last()
    }

    /// Record which action was taken from the current top node.
    /// Must be called before the child node is pushed, since pushing
    /// changes which node is "top".
    pub fn annotate_top(&mut self, selection: Selection) {
        if let Some(top) = self.nodes.last_mut() {
            top.selected = Some(selection);
        }
    }

    /// Drop everything and start over from a single root node.
    pub fn reset(&mut self, root: HistoryNode) {
        self.nodes.clear();
        self.nodes.push(root);
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All nodes, root first (for diagnostics and the breadcrumb line).
    pub fn nodes(&self) -> &[HistoryNode] {
        &self.nodes
    }
}
