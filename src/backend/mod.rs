//! Producing the call graph the explorer works on.

pub mod discover;
pub mod rust;

use std::collections::BTreeSet;

use anyhow::Result;
use tracing::{info, warn};

use crate::graph::model::CallGraph;

/// A non-fatal problem in one analyzed package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageDiagnostic {
    pub package: String,
    pub message: String,
}

#[derive(Debug)]
pub struct LoadedGraph {
    pub graph: CallGraph,
    /// Packages named on the command line; roots are drawn from these only.
    pub requested_packages: BTreeSet<String>,
    pub diagnostics: Vec<PackageDiagnostic>,
}

/// Something that can turn package names or paths into a call graph.
///
/// `Err` means nothing usable could be produced. Partial failures belong in
/// [`LoadedGraph::diagnostics`].
pub trait GraphBackend {
    fn load(&self, targets: &[String]) -> Result<LoadedGraph>;
}

/// Run `backend` and log whatever it reported along the way.
pub fn load_graph(backend: &dyn GraphBackend, targets: &[String]) -> Result<LoadedGraph> {
    let loaded = backend.load(targets)?;
    if !loaded.diagnostics.is_empty() {
        warn!(count = loaded.diagnostics.len(), "some packages reported errors");
        for diag in &loaded.diagnostics {
            warn!(package = %diag.package, "{}", diag.message);
        }
    }
    if loaded.graph.is_empty() {
        warn!(targets = ?targets, "no functions found");
    }
    info!(
        nodes = loaded.graph.len(),
        packages = ?loaded.requested_packages,
        "call graph loaded"
    );
    Ok(loaded)
}
