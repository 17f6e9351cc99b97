//! Needle search over the call graph and over the rendered tree.
//!
//! Two separate notions of "match" exist and are kept apart on purpose:
//! [`MatchPolicy::ExactName`] drives [`mark_matches`], whose result gates tree
//! expansion, while [`MatchPolicy::SummaryText`] drives
//! [`highlight_text_matches`], which only recolors an already built tree.

use std::collections::HashSet;

use anyhow::{Result, anyhow};
use tracing::{info, warn};

use crate::explore::context::path_summary;
use crate::explore::tree::{Highlight, Tree, TreeNodeId};
use crate::explore::{NoiseFilter, SeenSet};
use crate::graph::model::{CallGraph, CallPath, Edge, NodeId};

/// Nodes lying on some path from a root to a name match.
pub type MatchSet = HashSet<NodeId>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPolicy {
    /// The last callee's bare name equals the needle.
    ExactName,
    /// The path's one-line-per-edge summary contains the needle.
    SummaryText,
}

impl MatchPolicy {
    pub fn matches(self, graph: &CallGraph, path: &[Edge], needle: &str) -> bool {
        match self {
            Self::ExactName => path
                .last()
                .and_then(|e| graph.get(e.callee))
                .is_some_and(|n| n.name == needle),
            Self::SummaryText => path_summary(graph, path, false, 0).contains(needle),
        }
    }
}

struct Marker<'a> {
    graph: &'a CallGraph,
    noise: &'a NoiseFilter,
    needle: &'a str,
    matches: MatchSet,
    seen: SeenSet,
    path: CallPath,
    visited: usize,
}

impl Marker<'_> {
    /// True when some callee reachable from `node` matches.
    fn visit(&mut self, node: NodeId) -> Result<bool> {
        self.visited += 1;
        let outgoing = self
            .graph
            .get(node)
            .map(|n| n.outgoing.as_slice())
            .ok_or_else(|| anyhow!("node {:?} is not in the call graph", node))?;

        let mut any = false;
        for edge in outgoing {
            if self.noise.skips(self.graph, edge.callee) {
                continue;
            }
            self.path.push(*edge);
            let direct = MatchPolicy::ExactName.matches(self.graph, &self.path, self.needle);
            let result = if direct {
                Ok(true)
            } else if self.seen.insert(edge.callee) {
                let below = self.visit(edge.callee);
                self.seen.remove(&edge.callee);
                below
            } else {
                Ok(false)
            };
            self.path.pop();

            if result? {
                self.matches.insert(edge.callee);
                any = true;
            }
        }
        Ok(any)
    }
}

/// Collect every node that leads from one of `roots` to a callee named `needle`.
///
/// Explores the whole reachable graph (minus noise), one path at a time.
pub fn mark_matches(
    graph: &CallGraph,
    roots: &[NodeId],
    needle: &str,
    noise: &NoiseFilter,
) -> MatchSet {
    let mut marker = Marker {
        graph,
        noise,
        needle,
        matches: MatchSet::new(),
        seen: SeenSet::new(),
        path: Vec::new(),
        visited: 0,
    };

    for &root in roots {
        marker.seen.clear();
        marker.seen.insert(root);
        marker.path.clear();
        marker.path.push(Edge::synthetic(root));

        let self_match = MatchPolicy::ExactName.matches(graph, &marker.path, needle);
        match marker.visit(root) {
            Ok(below) => {
                if self_match || below {
                    marker.matches.insert(root);
                }
            }
            Err(err) => {
                warn!(root = graph.display(root), "error marking matches: {err:#}");
                if self_match {
                    marker.matches.insert(root);
                }
            }
        }
    }

    info!(
        needle,
        matches = marker.matches.len(),
        visited = marker.visited,
        "marked matching nodes"
    );
    marker.matches
}

/// Reset every node's color and selectability.
pub fn clear_formatting(tree: &mut Tree, selectable: bool) {
    let mut ids = Vec::new();
    tree.walk(|id, _| {
        ids.push(id);
        true
    });
    for id in ids {
        let node = tree.node_mut(id);
        node.selectable = selectable;
        node.highlight = if selectable {
            Highlight::Normal
        } else {
            Highlight::Dimmed
        };
    }
}

/// Nodes whose summary contains `needle`, together with their descendants and
/// the ancestors leading to them.
pub fn text_matches(tree: &Tree, graph: &CallGraph, id: TreeNodeId, needle: &str) -> Vec<TreeNodeId> {
    let node = tree.node(id);
    let this_matches = node
        .payload
        .as_ref()
        .is_some_and(|path| MatchPolicy::SummaryText.matches(graph, path, needle));

    if this_matches {
        let mut out = vec![id];
        out.extend(tree.descendants(id));
        return out;
    }

    let below = node
        .children
        .iter()
        .flat_map(|child| text_matches(tree, graph, *child, needle))
        .collect::<Vec<_>>();
    if below.is_empty() {
        return below;
    }
    let mut out = Vec::with_capacity(below.len() + 1);
    // The invisible root never counts as a match of its own.
    if node.payload.is_some() {
        out.push(id);
    }
    out.extend(below);
    out
}

/// Dim the tree and light up nodes matching `needle` as free text.
///
/// Focus moves to the first match. With no matches the tree is left fully
/// selectable. Returns the highlighted nodes.
pub fn highlight_text_matches(tree: &mut Tree, graph: &CallGraph, needle: &str) -> Vec<TreeNodeId> {
    let matches = text_matches(tree, graph, tree.root(), needle);
    if matches.is_empty() {
        clear_formatting(tree, true);
        return matches;
    }
    clear_formatting(tree, false);
    for id in &matches {
        let node = tree.node_mut(*id);
        node.highlight = Highlight::Match;
        node.selectable = true;
    }
    tree.set_current(matches.first().copied());
    matches
}
