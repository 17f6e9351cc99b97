use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

/// Name of package initializers; they are never offered as roots.
pub const INIT_NAME: &str = "init";

/// Index of a node inside a [`CallGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// Interned source file inside a [`CallGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub file: FileId,
    /// 1-based line number. `0` means unknown.
    pub line: usize,
}

/// Where a call happens: its position and the function containing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallSite {
    pub position: Position,
    pub enclosing: NodeId,
}

/// A single call from `caller` to `callee`.
///
/// The synthetic edge that starts every [`CallPath`] has no caller and no site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub caller: Option<NodeId>,
    pub callee: NodeId,
    pub site: Option<CallSite>,
}

impl Edge {
    /// Zero-length edge pointing at a root node.
    pub fn synthetic(root: NodeId) -> Self {
        Self {
            caller: None,
            callee: root,
            site: None,
        }
    }

    /// Call-site position, falling back to the callee's declaration.
    pub fn position(&self, graph: &CallGraph) -> Option<Position> {
        match self.site {
            Some(site) => Some(site.position),
            None => graph.get(self.callee).map(|n| n.decl),
        }
    }

    /// The function the call is written in, if the edge has a real site.
    pub fn from_function(&self) -> Option<NodeId> {
        self.site.map(|s| s.enclosing)
    }
}

/// Ordered edges from a synthetic root edge down to the node of interest.
pub type CallPath = Vec<Edge>;

/// A callable unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    /// Bare function name, compared against search needles.
    pub name: String,
    /// Qualified name shown in labels and summaries.
    pub display: String,
    pub package: String,
    pub decl: Position,
    pub outgoing: Vec<Edge>,
    pub incoming: Vec<Edge>,
}

/// Immutable call graph handed to the explorer by a backend.
#[derive(Debug, Default, Clone)]
pub struct CallGraph {
    nodes: Vec<Node>,
    files: Vec<PathBuf>,
    file_ids: HashMap<PathBuf, FileId>,
}

impl CallGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern_file(&mut self, path: impl Into<PathBuf>) -> FileId {
        let path = path.into();
        if let Some(id) = self.file_ids.get(&path) {
            return *id;
        }
        let id = FileId(self.files.len());
        self.files.push(path.clone());
        self.file_ids.insert(path, id);
        id
    }

    pub fn add_node(
        &mut self,
        name: impl Into<String>,
        display: impl Into<String>,
        package: impl Into<String>,
        decl: Position,
    ) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            name: name.into(),
            display: display.into(),
            package: package.into(),
            decl,
            outgoing: Vec::new(),
            incoming: Vec::new(),
        });
        id
    }

    /// Record a call from `caller` to `callee`, optionally at `site`.
    ///
    /// Both ids must have been returned by [`CallGraph::add_node`].
    pub fn add_call(&mut self, caller: NodeId, callee: NodeId, site: Option<Position>) {
        let edge = Edge {
            caller: Some(caller),
            callee,
            site: site.map(|position| CallSite {
                position,
                enclosing: caller,
            }),
        };
        self.nodes[caller.0].outgoing.push(edge);
        self.nodes[callee.0].incoming.push(edge);
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().enumerate().map(|(idx, n)| (NodeId(idx), n))
    }

    pub fn outgoing(&self, id: NodeId) -> &[Edge] {
        self.get(id).map(|n| n.outgoing.as_slice()).unwrap_or(&[])
    }

    pub fn incoming(&self, id: NodeId) -> &[Edge] {
        self.get(id).map(|n| n.incoming.as_slice()).unwrap_or(&[])
    }

    pub fn file(&self, id: FileId) -> &Path {
        self.files
            .get(id.0)
            .map(PathBuf::as_path)
            .unwrap_or_else(|| Path::new(""))
    }

    /// Declaring file of a node.
    pub fn file_of(&self, id: NodeId) -> &Path {
        match self.get(id) {
            Some(node) => self.file(node.decl.file),
            None => Path::new(""),
        }
    }

    /// Display name, or a placeholder for an unknown id.
    pub fn display(&self, id: NodeId) -> &str {
        self.get(id).map(|n| n.display.as_str()).unwrap_or("?")
    }

    /// First node whose display name equals `display`.
    #[cfg(test)]
    pub fn find(&self, display: &str) -> Option<NodeId> {
        self.nodes().find(|(_, n)| n.display == display).map(|(id, _)| id)
    }

    /// Entry points: no callers, not an initializer, declared in a requested package.
    ///
    /// Sorted by display name so the tree order is stable between runs.
    pub fn roots(&self, requested: &BTreeSet<String>) -> Vec<NodeId> {
        let mut roots = self
            .nodes()
            .filter(|(id, _)| self.incoming(*id).is_empty())
            .filter(|(_, n)| n.name != INIT_NAME)
            .filter(|(_, n)| requested.contains(&n.package))
            .map(|(id, _)| id)
            .collect::<Vec<_>>();
        roots.sort_by(|a, b| self.display(*a).cmp(self.display(*b)).then(a.cmp(b)));
        roots
    }
}
