//! Lazy, path-sensitive tree construction.

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info, warn};

use crate::explore::search::MatchSet;
use crate::explore::tree::{Tree, TreeNodeId};
use crate::explore::{NoiseFilter, SeenSet};
use crate::graph::model::{CallGraph, CallPath, Edge, NodeId};

/// Suffix on labels of nodes that sit exactly on the depth bound.
pub const TRUNCATED_SUFFIX: &str = " ...";

/// How far an expansion may go.
#[derive(Debug, Clone, Copy)]
pub enum ExpansionPolicy<'a> {
    /// No search: stop once a path holds `bound` edges.
    DepthBounded(usize),
    /// Search active: no depth limit, only callees in `matches` are followed.
    /// `bound` is still used to mark labels.
    MatchGated { bound: usize, matches: &'a MatchSet },
}

impl ExpansionPolicy<'_> {
    fn bound(&self) -> usize {
        match *self {
            Self::DepthBounded(bound) | Self::MatchGated { bound, .. } => bound,
        }
    }

    fn follows(&self, path: &CallPath, callee: NodeId) -> bool {
        match *self {
            Self::DepthBounded(bound) => path.len() < bound,
            Self::MatchGated { matches, .. } => matches.contains(&callee),
        }
    }
}

pub struct TreeBuilder<'g> {
    graph: &'g CallGraph,
    noise: &'g NoiseFilter,
}

impl<'g> TreeBuilder<'g> {
    pub fn new(graph: &'g CallGraph, noise: &'g NoiseFilter) -> Self {
        Self { graph, noise }
    }

    /// Add one tree node under `parent` for every followed callee of `node`, recursively.
    ///
    /// `path` is pushed and popped in place; each tree node gets its own copy.
    pub fn expand(
        &self,
        tree: &mut Tree,
        node: NodeId,
        parent: TreeNodeId,
        path: &mut CallPath,
        seen: &mut SeenSet,
        policy: ExpansionPolicy<'_>,
    ) -> Result<()> {
        let outgoing = self
            .graph
            .get(node)
            .map(|n| n.outgoing.as_slice())
            .ok_or_else(|| anyhow!("node {:?} is not in the call graph", node))?;

        for edge in outgoing {
            if !policy.follows(path, edge.callee) {
                continue;
            }
            if self.noise.skips(self.graph, edge.callee) {
                continue;
            }
            let callee = self
                .graph
                .get(edge.callee)
                .with_context(|| format!("edge from {:?} points outside the graph", node))?;

            path.push(*edge);
            let mut label = callee.display.clone();
            if path.len() == policy.bound() {
                label.push_str(TRUNCATED_SUFFIX);
            }
            let child = tree.add_child(parent, label, path.clone());

            if seen.insert(edge.callee) {
                let result = self.expand(tree, edge.callee, child, path, seen, policy);
                seen.remove(&edge.callee);
                result?;
            }
            path.pop();
        }
        Ok(())
    }

    /// Replace the whole tree with one subtree per root.
    ///
    /// With `matches` set, only roots in the match set are kept and expansion is
    /// match-gated; otherwise every root is expanded `step` calls deep.
    pub fn rebuild(
        &self,
        tree: &mut Tree,
        roots: &[NodeId],
        step: usize,
        matches: Option<&MatchSet>,
    ) -> usize {
        tree.clear();
        // One extra slot for the synthetic edge at the head of every path.
        let bound = step + 1;
        let policy = match matches {
            Some(matches) => ExpansionPolicy::MatchGated { bound, matches },
            None => ExpansionPolicy::DepthBounded(bound),
        };

        let mut added = 0;
        for &root in roots {
            if let Some(matches) = matches
                && !matches.contains(&root)
            {
                continue;
            }
            let mut path = vec![Edge::synthetic(root)];
            let root_node = tree.add_child(tree.root(), self.graph.display(root), path.clone());
            let mut seen = SeenSet::from([root]);
            debug!(root = self.graph.display(root), "expanding callees of root");
            if let Err(err) = self.expand(tree, root, root_node, &mut path, &mut seen, policy) {
                warn!(root = self.graph.display(root), "error expanding root: {err:#}");
            }
            added += 1;
        }
        info!(roots = added, tree_nodes = tree.len(), "tree rebuilt");
        added
    }

    /// Grow the tree below a leaf by another `step` calls.
    ///
    /// Always depth-bounded, even while a search is active. Returns the number
    /// of direct children added.
    pub fn deepen(&self, tree: &mut Tree, leaf: TreeNodeId, step: usize) -> Result<usize> {
        let mut path = tree
            .node(leaf)
            .payload
            .clone()
            .context("cannot deepen a node without a call path")?;
        let last = path.last().context("call path is empty")?.callee;
        let mut seen = path.iter().map(|e| e.callee).collect::<SeenSet>();
        let bound = path.len() + step;

        let before = tree.children(leaf).len();
        self.expand(
            tree,
            last,
            leaf,
            &mut path,
            &mut seen,
            ExpansionPolicy::DepthBounded(bound),
        )?;
        let added = tree.children(leaf).len() - before;
        if added > 0 {
            let node = tree.node_mut(leaf);
            if let Some(trimmed) = node.label.strip_suffix(TRUNCATED_SUFFIX) {
                node.label = trimmed.to_string();
            }
        }
        Ok(added)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::explore::search::mark_matches;
    use crate::graph::model::fixture::GraphFixture;

    fn keep_all() -> NoiseFilter {
        NoiseFilter {
            include: true,
            prefixes: Vec::new(),
        }
    }

    fn labels(tree: &Tree, id: TreeNodeId) -> Vec<String> {
        tree.children(id)
            .iter()
            .map(|c| tree.node(*c).label.clone())
            .collect()
    }

    fn find_child(tree: &Tree, parent: TreeNodeId, label: &str) -> TreeNodeId {
        *tree
            .children(parent)
            .iter()
            .find(|c| tree.node(**c).label.trim_end_matches(TRUNCATED_SUFFIX) == label)
            .unwrap_or_else(|| panic!("no child labeled {label}"))
    }

    #[test]
    fn cycle_does_not_revisit_node_on_same_path() {
        let mut fx = GraphFixture::new();
        let a = fx.node("a");
        let b = fx.node("b");
        let c = fx.node("c");
        let d = fx.node("d");
        fx.call(a, b);
        fx.call(b, c);
        fx.call(c, a);
        fx.call(a, d);
        let noise = keep_all();
        let builder = TreeBuilder::new(&fx.graph, &noise);

        let mut tree = Tree::new("Functions");
        builder.rebuild(&mut tree, &[a], 100, None);

        let root_a = tree.children(tree.root())[0];
        let tb = find_child(&tree, root_a, "app::b");
        let tc = find_child(&tree, tb, "app::c");
        // c -> a is shown once, but a is already on the path so it is not expanded again.
        let ta = find_child(&tree, tc, "app::a");
        assert!(tree.children(ta).is_empty());
        // The sibling branch is untouched.
        let td = find_child(&tree, root_a, "app::d");
        assert!(tree.children(td).is_empty());
    }

    #[test]
    fn depth_bound_limits_path_length_and_marks_truncation() {
        let mut fx = GraphFixture::new();
        let chain = (0..8).map(|i| fx.node(&format!("f{i}"))).collect::<Vec<_>>();
        for pair in chain.windows(2) {
            fx.call(pair[0], pair[1]);
        }
        let noise = keep_all();
        let builder = TreeBuilder::new(&fx.graph, &noise);
        let mut tree = Tree::new("Functions");
        let step = 3;
        builder.rebuild(&mut tree, &[chain[0]], step, None);

        let bound = step + 1;
        let mut deepest = 0;
        tree.walk(|_, node| {
            if let Some(path) = &node.payload {
                assert!(path.len() <= bound);
                if path.len() == bound {
                    assert!(node.label.ends_with(TRUNCATED_SUFFIX), "{}", node.label);
                } else {
                    assert!(!node.label.ends_with(TRUNCATED_SUFFIX));
                }
                deepest = deepest.max(path.len());
            }
            true
        });
        assert_eq!(deepest, bound);
    }

    #[test]
    fn payload_ends_at_represented_node() {
        let mut fx = GraphFixture::new();
        let main = fx.node("main");
        let helper = fx.node("helper");
        fx.call(main, helper);
        let noise = keep_all();
        let builder = TreeBuilder::new(&fx.graph, &noise);
        let mut tree = Tree::new("Functions");
        builder.rebuild(&mut tree, &[main], 4, None);

        let root = tree.children(tree.root())[0];
        let child = tree.children(root)[0];
        let path = tree.node(child).payload.as_ref().unwrap();
        assert_eq!(path.len(), 2);
        assert_eq!(path[0].caller, None);
        assert_eq!(path[1].callee, helper);
    }

    #[test]
    fn shared_callee_gets_one_node_per_path() {
        let mut fx = GraphFixture::new();
        let main = fx.node("main");
        let left = fx.node("left");
        let right = fx.node("right");
        let shared = fx.node("shared");
        fx.call(main, left);
        fx.call(main, right);
        fx.call(left, shared);
        fx.call(right, shared);
        let noise = keep_all();
        let builder = TreeBuilder::new(&fx.graph, &noise);
        let mut tree = Tree::new("Functions");
        builder.rebuild(&mut tree, &[main], 4, None);

        let mut count = 0;
        tree.walk(|_, node| {
            if node.label == "app::shared" {
                count += 1;
            }
            true
        });
        assert_eq!(count, 2);
    }

    #[test]
    fn noise_callees_are_skipped_unless_included() {
        let mut fx = GraphFixture::new();
        let main = fx.node("main");
        let len = fx.node_in("len", "<external>", Some("<std>"));
        fx.call(main, len);
        let mut noise = NoiseFilter {
            include: false,
            prefixes: vec!["<std>".to_string()],
        };

        let mut tree = Tree::new("Functions");
        TreeBuilder::new(&fx.graph, &noise).rebuild(&mut tree, &[main], 4, None);
        let root = tree.children(tree.root())[0];
        assert!(tree.children(root).is_empty());

        noise.include = true;
        TreeBuilder::new(&fx.graph, &noise).rebuild(&mut tree, &[main], 4, None);
        let root = tree.children(tree.root())[0];
        assert_eq!(labels(&tree, root), vec!["<external>::len"]);
    }

    #[test]
    fn search_prunes_to_matching_branch() {
        let mut fx = GraphFixture::new();
        let main = fx.node("main");
        let helper_a = fx.node("helperA");
        let helper_b = fx.node("helperB");
        let target = fx.node("target");
        let other = fx.node("other");
        fx.call(main, helper_a);
        fx.call(helper_a, target);
        fx.call(main, helper_b);
        let noise = keep_all();
        let roots = vec![main, other];
        let matches = mark_matches(&fx.graph, &roots, "target", &noise);

        let builder = TreeBuilder::new(&fx.graph, &noise);
        let mut tree = Tree::new("Functions");
        let added = builder.rebuild(&mut tree, &roots, 4, Some(&matches));
        assert_eq!(added, 1, "roots without a match are dropped");

        let root = tree.children(tree.root())[0];
        assert_eq!(labels(&tree, root), vec!["app::helperA"]);
        let a = tree.children(root)[0];
        assert_eq!(labels(&tree, a), vec!["app::target"]);
    }

    #[test]
    fn search_ignores_depth_bound() {
        let mut fx = GraphFixture::new();
        let chain = (0..10).map(|i| fx.node(&format!("f{i}"))).collect::<Vec<_>>();
        for pair in chain.windows(2) {
            fx.call(pair[0], pair[1]);
        }
        let noise = keep_all();
        let matches = mark_matches(&fx.graph, &chain[..1], "f9", &noise);
        let mut tree = Tree::new("Functions");
        TreeBuilder::new(&fx.graph, &noise).rebuild(&mut tree, &chain[..1], 2, Some(&matches));

        let mut deepest = 0;
        tree.walk(|_, node| {
            if let Some(path) = &node.payload {
                deepest = deepest.max(path.len());
            }
            true
        });
        assert_eq!(deepest, 10);
    }

    #[test]
    fn rebuild_is_idempotent() {
        let mut fx = GraphFixture::new();
        let main = fx.node("main");
        let a = fx.node("a");
        let b = fx.node("b");
        fx.call(main, a);
        fx.call(a, b);
        fx.call(b, a);
        fx.call(main, b);
        let noise = keep_all();
        let builder = TreeBuilder::new(&fx.graph, &noise);

        let snapshot = |tree: &Tree| {
            let mut out = Vec::new();
            tree.walk(|_, node| {
                out.push((
                    node.label.clone(),
                    node.payload.as_ref().map(|p| p.len()).unwrap_or(0),
                ));
                true
            });
            out
        };

        let mut tree = Tree::new("Functions");
        builder.rebuild(&mut tree, &[main], 4, None);
        let first = snapshot(&tree);
        builder.rebuild(&mut tree, &[main], 4, None);
        assert_eq!(first, snapshot(&tree));

        let matches = mark_matches(&fx.graph, &[main], "b", &noise);
        builder.rebuild(&mut tree, &[main], 4, Some(&matches));
        let first = snapshot(&tree);
        builder.rebuild(&mut tree, &[main], 4, Some(&matches));
        assert_eq!(first, snapshot(&tree));
    }

    #[test]
    fn deepen_grows_a_truncated_leaf() {
        let mut fx = GraphFixture::new();
        let chain = (0..6).map(|i| fx.node(&format!("f{i}"))).collect::<Vec<_>>();
        for pair in chain.windows(2) {
            fx.call(pair[0], pair[1]);
        }
        let noise = keep_all();
        let builder = TreeBuilder::new(&fx.graph, &noise);
        let mut tree = Tree::new("Functions");
        builder.rebuild(&mut tree, &chain[..1], 2, None);

        let mut leaf = tree.children(tree.root())[0];
        while let Some(next) = tree.children(leaf).first() {
            leaf = *next;
        }
        assert_eq!(tree.node(leaf).payload.as_ref().unwrap().len(), 3);
        assert!(tree.node(leaf).label.ends_with(TRUNCATED_SUFFIX));

        let added = builder.deepen(&mut tree, leaf, 2).unwrap();
        assert_eq!(added, 1);
        assert_eq!(tree.node(leaf).label, "app::f2");
        let mut deepest = leaf;
        while let Some(next) = tree.children(deepest).first() {
            deepest = *next;
        }
        assert_eq!(tree.node(deepest).payload.as_ref().unwrap().len(), 5);
        assert!(tree.node(deepest).label.ends_with(TRUNCATED_SUFFIX));
    }

    #[test]
    fn deepen_does_not_reenter_nodes_on_the_path() {
        let mut fx = GraphFixture::new();
        let a = fx.node("a");
        let b = fx.node("b");
        fx.call(a, b);
        fx.call(b, a);
        let noise = keep_all();
        let builder = TreeBuilder::new(&fx.graph, &noise);
        let mut tree = Tree::new("Functions");
        builder.rebuild(&mut tree, &[a], 1, None);

        let ta = tree.children(tree.root())[0];
        let tb = tree.children(ta)[0];
        assert!(tree.children(tb).is_empty());

        builder.deepen(&mut tree, tb, 4).unwrap();
        // b -> a appears, but a is on the path so it stays a leaf.
        let again = tree.children(tb)[0];
        assert_eq!(tree.node(again).label, "app::a");
        assert!(tree.children(again).is_empty());
    }

    #[test]
    fn unknown_root_does_not_stop_the_others() {
        let mut fx = GraphFixture::new();
        let a = fx.node("a");
        let a_child = fx.node("a_child");
        let b = fx.node("b");
        let b_child = fx.node("b_child");
        fx.call(a, a_child);
        fx.call(b, b_child);
        let noise = keep_all();
        let builder = TreeBuilder::new(&fx.graph, &noise);
        let mut tree = Tree::new("Functions");

        let roots = [a, NodeId(999), b];
        assert_eq!(builder.rebuild(&mut tree, &roots, 4, None), 3);

        let top = tree.children(tree.root()).to_vec();
        assert_eq!(labels(&tree, tree.root()), vec!["app::a", "?", "app::b"]);
        assert_eq!(labels(&tree, top[0]), vec!["app::a_child"]);
        assert!(tree.children(top[1]).is_empty());
        assert_eq!(labels(&tree, top[2]), vec!["app::b_child"]);
    }

    #[test]
    fn deepen_rejects_the_invisible_root() {
        let fx = GraphFixture::new();
        let noise = keep_all();
        let builder = TreeBuilder::new(&fx.graph, &noise);
        let mut tree = Tree::new("Functions");
        let root = tree.root();
        assert!(builder.deepen(&mut tree, root, 4).is_err());
    }
}
