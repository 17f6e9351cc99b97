//! Turning a call graph into an explorable tree: expansion, search, navigation.

pub mod builder;
pub mod context;
pub mod nav;
pub mod search;
pub mod tree;

use std::collections::HashSet;

use crate::config::Config;
use crate::graph::model::{CallGraph, NodeId};

/// Nodes on the current DFS stack. Entries are removed on backtrack, so a node
/// can appear many times in the tree but only once per path.
pub type SeenSet = HashSet<NodeId>;

/// Decides whether a callee counts as standard-library noise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoiseFilter {
    /// `true` keeps noise callees, `false` drops them.
    pub include: bool,
    pub prefixes: Vec<String>,
}

impl NoiseFilter {
    pub fn from_config(config: &Config) -> Self {
        Self {
            include: config.include_noise,
            prefixes: config.noise_prefixes.clone(),
        }
    }

    /// True when `callee` should be skipped.
    pub fn skips(&self, graph: &CallGraph, callee: NodeId) -> bool {
        if self.include {
            return false;
        }
        let file = graph.file_of(callee).to_string_lossy();
        self.prefixes.iter().any(|p| file.starts_with(p.as_str()))
    }
}
