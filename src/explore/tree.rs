//! Arena-backed tree of explored call paths.
//!
//! Index 0 is an invisible root. Every other node carries the [`CallPath`]
//! that leads to it, plus a parent back-reference so navigation never has
//! to search the tree.

use crate::graph::model::CallPath;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TreeNodeId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Highlight {
    Normal,
    Dimmed,
    Match,
}

#[derive(Debug, Clone)]
pub struct TreeNode {
    pub label: String,
    /// `None` only on the invisible root.
    pub payload: Option<CallPath>,
    pub children: Vec<TreeNodeId>,
    pub parent: Option<TreeNodeId>,
    pub expanded: bool,
    pub selectable: bool,
    pub highlight: Highlight,
}

impl TreeNode {
    fn new(label: String, payload: Option<CallPath>, parent: Option<TreeNodeId>) -> Self {
        Self {
            label,
            payload,
            children: Vec::new(),
            parent,
            expanded: true,
            selectable: true,
            highlight: Highlight::Normal,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// One visible row. `lineage[i]` tells whether the ancestor at depth `i`
/// (the row itself for the last entry) is the last of its siblings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeRow {
    pub id: TreeNodeId,
    pub lineage: Vec<bool>,
}

impl TreeRow {
    pub fn depth(&self) -> usize {
        self.lineage.len()
    }
}

#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<TreeNode>,
    current: Option<TreeNodeId>,
}

impl Tree {
    pub fn new(root_label: impl Into<String>) -> Self {
        Self {
            nodes: vec![TreeNode::new(root_label.into(), None, None)],
            current: None,
        }
    }

    pub fn root(&self) -> TreeNodeId {
        TreeNodeId(0)
    }

    /// Drop every node except the root.
    pub fn clear(&mut self) {
        self.nodes.truncate(1);
        self.nodes[0].children.clear();
        self.current = None;
    }

    pub fn add_child(
        &mut self,
        parent: TreeNodeId,
        label: impl Into<String>,
        payload: CallPath,
    ) -> TreeNodeId {
        let id = TreeNodeId(self.nodes.len());
        self.nodes
            .push(TreeNode::new(label.into(), Some(payload), Some(parent)));
        self.nodes[parent.0].children.push(id);
        id
    }

    pub fn node(&self, id: TreeNodeId) -> &TreeNode {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: TreeNodeId) -> &mut TreeNode {
        &mut self.nodes[id.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn children(&self, id: TreeNodeId) -> &[TreeNodeId] {
        &self.nodes[id.0].children
    }

    pub fn parent(&self, id: TreeNodeId) -> Option<TreeNodeId> {
        self.nodes[id.0].parent
    }

    pub fn current(&self) -> Option<TreeNodeId> {
        self.current
    }

    pub fn set_current(&mut self, id: Option<TreeNodeId>) {
        self.current = id;
    }

    pub fn set_expanded(&mut self, id: TreeNodeId, expanded: bool) {
        self.nodes[id.0].expanded = expanded;
    }

    /// Pre-order walk. Returning `false` from `visit` skips that node's children.
    pub fn walk(&self, mut visit: impl FnMut(TreeNodeId, &TreeNode) -> bool) {
        let mut stack = vec![self.root()];
        while let Some(id) = stack.pop() {
            let node = self.node(id);
            if visit(id, node) {
                stack.extend(node.children.iter().rev().copied());
            }
        }
    }

    /// Every node below `id`, in pre-order.
    pub fn descendants(&self, id: TreeNodeId) -> Vec<TreeNodeId> {
        let mut out = Vec::new();
        let mut stack = self.children(id).iter().rev().copied().collect::<Vec<_>>();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev().copied());
        }
        out
    }

    /// Rows a tree view shows: the root is hidden, collapsed subtrees are skipped.
    pub fn visible_rows(&self) -> Vec<TreeRow> {
        let mut rows = Vec::new();
        self.collect_rows(self.root(), &mut Vec::new(), &mut rows);
        rows
    }

    fn collect_rows(&self, id: TreeNodeId, lineage: &mut Vec<bool>, rows: &mut Vec<TreeRow>) {
        let node = self.node(id);
        if id != self.root() && !node.expanded {
            return;
        }
        let count = node.children.len();
        for (idx, child) in node.children.iter().enumerate() {
            lineage.push(idx + 1 == count);
            rows.push(TreeRow {
                id: *child,
                lineage: lineage.clone(),
            });
            self.collect_rows(*child, lineage, rows);
            lineage.pop();
        }
    }

    /// Next selectable visible row after `from` (or the first one).
    pub fn next_row(&self, from: Option<TreeNodeId>) -> Option<TreeNodeId> {
        let rows = self.visible_rows();
        let start = match from.and_then(|id| rows.iter().position(|r| r.id == id)) {
            Some(pos) => pos + 1,
            None => 0,
        };
        rows[start.min(rows.len())..]
            .iter()
            .map(|r| r.id)
            .find(|id| self.node(*id).selectable)
    }

    /// Previous selectable visible row before `from` (or the last one).
    pub fn prev_row(&self, from: Option<TreeNodeId>) -> Option<TreeNodeId> {
        let rows = self.visible_rows();
        let end = match from.and_then(|id| rows.iter().position(|r| r.id == id)) {
            Some(pos) => pos,
            None => rows.len(),
        };
        rows[..end]
            .iter()
            .rev()
            .map(|r| r.id)
            .find(|id| self.node(*id).selectable)
    }
}
