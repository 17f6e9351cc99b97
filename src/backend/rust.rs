//! Call graph extraction from Rust sources with `syn`.
//!
//! Resolution is by name only. Free functions resolve by identifier, paths
//! like `Type::f` by `(Type, f)`, and method calls by method name across all
//! impls, preferring the caller's own package. Anything that resolves to
//! nothing becomes an external node declared in [`STD_FILE`] or
//! [`EXTERNAL_FILE`], which the default noise prefixes hide.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use syn::punctuated::Punctuated;
use syn::visit::{self, Visit};
use syn::{Attribute, Expr, ImplItem, Item, Token, TraitItem, Type};
use tracing::debug;

use super::discover::{Package, discover};
use super::{GraphBackend, LoadedGraph, PackageDiagnostic};
use crate::graph::model::{CallGraph, FileId, NodeId, Position};

/// Pseudo-file for standard library callees.
pub const STD_FILE: &str = "<std>";
/// Pseudo-file for callees from dependencies or unknown crates.
pub const EXTERNAL_FILE: &str = "<external>";
pub const EXTERNAL_PACKAGE: &str = "<external>";

const STD_ROOTS: &[&str] = &["std", "core", "alloc"];

/// Prelude and common std types whose associated functions count as std.
const STD_TYPES: &[&str] = &[
    "Arc", "BTreeMap", "BTreeSet", "Box", "Cell", "Cow", "Duration", "HashMap", "HashSet",
    "Instant", "Mutex", "Option", "Path", "PathBuf", "Rc", "RefCell", "Result", "RwLock",
    "String", "Vec", "VecDeque",
];

#[derive(Debug, Default, Clone, Copy)]
pub struct RustSourceBackend;

impl GraphBackend for RustSourceBackend {
    fn load(&self, targets: &[String]) -> Result<LoadedGraph> {
        let mut packages: Vec<Package> = Vec::new();
        for target in targets {
            for pkg in discover(Path::new(target))? {
                match packages.iter_mut().find(|p| p.dir == pkg.dir) {
                    Some(existing) => {
                        existing.sources.extend(pkg.sources);
                        existing.sources.sort();
                        existing.sources.dedup();
                    }
                    None => packages.push(pkg),
                }
            }
        }
        Ok(analyze(&packages))
    }
}

/// Parse and link every source of `packages`. Unreadable or unparsable files
/// are reported as diagnostics and left out.
pub fn analyze(packages: &[Package]) -> LoadedGraph {
    let mut graph = CallGraph::new();
    let mut diagnostics = Vec::new();
    let mut parsed = Vec::new();

    for pkg in packages {
        for source in &pkg.sources {
            match parse_source(source) {
                Ok(ast) => parsed.push(ParsedFile {
                    package: pkg.name.clone(),
                    file: graph.intern_file(source),
                    module: module_path(&pkg.dir, source),
                    ast,
                }),
                Err(err) => diagnostics.push(PackageDiagnostic {
                    package: pkg.name.clone(),
                    message: format!("{err:#}"),
                }),
            }
        }
    }

    // Files below a `#[cfg(test)]` module are test code.
    let mut test_modules = Vec::new();
    for file in &parsed {
        let mut module = file.module.clone();
        out_of_line_test_modules(&file.package, &file.ast.items, &mut module, &mut test_modules);
    }
    parsed.retain(|file| {
        !test_modules
            .iter()
            .any(|(package, module)| *package == file.package && file.module.starts_with(module))
    });

    let mut index = Index::default();
    let mut bodies = Vec::new();
    for file in &parsed {
        let mut module = file.module.clone();
        index.collect(&mut graph, file, &file.ast.items, &mut module, &mut bodies);
    }
    debug!(functions = bodies.len(), files = parsed.len(), "indexed sources");

    let mut linker = Linker {
        index: &index,
        externals: HashMap::new(),
    };
    for body in &bodies {
        linker.link(&mut graph, body);
    }

    LoadedGraph {
        graph,
        requested_packages: packages.iter().map(|p| p.name.clone()).collect(),
        diagnostics,
    }
}

fn parse_source(path: &Path) -> Result<syn::File> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    syn::parse_file(&text).map_err(|err| {
        let at = err.span().start();
        anyhow!("{}:{}:{}: {err}", path.display(), at.line, at.column + 1)
    })
}

/// Module path of `source` inside its package: `src/net/client.rs` is
/// `net::client`, while `lib.rs`, `main.rs` and `mod.rs` add no segment.
fn module_path(package_dir: &Path, source: &Path) -> Vec<String> {
    let rel = source.strip_prefix(package_dir).unwrap_or(source);
    let mut parts = rel
        .with_extension("")
        .components()
        .filter_map(|c| c.as_os_str().to_str().map(str::to_string))
        .collect::<Vec<_>>();
    if parts.first().is_some_and(|p| p == "src") {
        parts.remove(0);
    }
    if parts
        .last()
        .is_some_and(|p| matches!(p.as_str(), "lib" | "main" | "mod"))
    {
        parts.pop();
    }
    parts
}

struct ParsedFile {
    package: String,
    file: FileId,
    module: Vec<String>,
    ast: syn::File,
}

/// A function with a body, waiting to have its calls linked.
struct Body<'a> {
    id: NodeId,
    /// Impl self type or trait name for methods.
    owner: Option<String>,
    package: &'a str,
    file: FileId,
    block: &'a syn::Block,
}

#[derive(Default)]
struct Index {
    free: HashMap<String, Vec<NodeId>>,
    assoc: HashMap<(String, String), Vec<NodeId>>,
    methods: HashMap<String, Vec<NodeId>>,
}

impl Index {
    fn collect<'a>(
        &mut self,
        graph: &mut CallGraph,
        file: &'a ParsedFile,
        items: &'a [Item],
        module: &mut Vec<String>,
        bodies: &mut Vec<Body<'a>>,
    ) {
        for item in items {
            match item {
                Item::Fn(func) if is_test_only(&func.attrs) => {}
                Item::Fn(func) => {
                    let id = declare(graph, file, module, None, &func.sig.ident);
                    self.free
                        .entry(func.sig.ident.to_string())
                        .or_default()
                        .push(id);
                    bodies.push(Body {
                        id,
                        owner: None,
                        package: &file.package,
                        file: file.file,
                        block: &func.block,
                    });
                }
                Item::Impl(imp) if is_test_only(&imp.attrs) => {}
                Item::Impl(imp) => {
                    let Some(owner) = type_name(&imp.self_ty) else {
                        continue;
                    };
                    for impl_item in &imp.items {
                        if let ImplItem::Fn(method) = impl_item
                            && !is_test_only(&method.attrs)
                        {
                            let id = declare(graph, file, module, Some(&owner), &method.sig.ident);
                            self.method(&owner, &method.sig.ident.to_string(), id);
                            bodies.push(Body {
                                id,
                                owner: Some(owner.clone()),
                                package: &file.package,
                                file: file.file,
                                block: &method.block,
                            });
                        }
                    }
                }
                Item::Trait(tr) => {
                    let owner = tr.ident.to_string();
                    for trait_item in &tr.items {
                        if let TraitItem::Fn(method) = trait_item
                            && let Some(block) = &method.default
                        {
                            let id = declare(graph, file, module, Some(&owner), &method.sig.ident);
                            self.method(&owner, &method.sig.ident.to_string(), id);
                            bodies.push(Body {
                                id,
                                owner: Some(owner.clone()),
                                package: &file.package,
                                file: file.file,
                                block,
                            });
                        }
                    }
                }
                Item::Mod(m) => {
                    if let Some((_, content)) = &m.content
                        && !is_test_only(&m.attrs)
                    {
                        module.push(m.ident.to_string());
                        self.collect(graph, file, content, module, bodies);
                        module.pop();
                    }
                }
                _ => {}
            }
        }
    }

    fn method(&mut self, owner: &str, name: &str, id: NodeId) {
        self.assoc
            .entry((owner.to_string(), name.to_string()))
            .or_default()
            .push(id);
        self.methods.entry(name.to_string()).or_default().push(id);
    }
}

fn out_of_line_test_modules(
    package: &str,
    items: &[Item],
    module: &mut Vec<String>,
    found: &mut Vec<(String, Vec<String>)>,
) {
    for item in items {
        let Item::Mod(m) = item else {
            continue;
        };
        module.push(m.ident.to_string());
        if is_test_only(&m.attrs) {
            found.push((package.to_string(), module.clone()));
        } else if let Some((_, content)) = &m.content {
            out_of_line_test_modules(package, content, module, found);
        }
        module.pop();
    }
}

/// `#[test]`, `#[tokio::test]` and friends, or `#[cfg(test)]`.
fn is_test_only(attrs: &[Attribute]) -> bool {
    attrs.iter().any(|attr| {
        let path = attr.path();
        if path.is_ident("cfg") {
            return attr
                .parse_args::<syn::Ident>()
                .is_ok_and(|ident| ident == "test");
        }
        path.segments.last().is_some_and(|seg| seg.ident == "test")
    })
}

fn declare(
    graph: &mut CallGraph,
    file: &ParsedFile,
    module: &[String],
    owner: Option<&str>,
    ident: &syn::Ident,
) -> NodeId {
    let name = ident.to_string();
    let mut display = vec![file.package.as_str()];
    display.extend(module.iter().map(String::as_str));
    display.extend(owner);
    display.push(&name);
    let display = display.join("::");
    let decl = Position {
        file: file.file,
        line: ident.span().start().line,
    };
    graph.add_node(name.clone(), display, file.package.clone(), decl)
}

fn type_name(ty: &Type) -> Option<String> {
    match ty {
        Type::Path(tp) => tp.path.segments.last().map(|s| s.ident.to_string()),
        Type::Reference(r) => type_name(&r.elem),
        _ => None,
    }
}

fn starts_uppercase(name: &str) -> bool {
    name.chars().next().is_some_and(char::is_uppercase)
}

enum Callee {
    Path(Vec<String>),
    Method { name: String, on_self: bool },
}

/// Call expressions in one function body, with the line of the callee token.
#[derive(Default)]
struct CallCollector {
    calls: Vec<(Callee, usize)>,
}

impl<'ast> Visit<'ast> for CallCollector {
    fn visit_expr_call(&mut self, call: &'ast syn::ExprCall) {
        if let Expr::Path(func) = &*call.func
            && let Some(last) = func.path.segments.last()
        {
            let segments = func
                .path
                .segments
                .iter()
                .map(|s| s.ident.to_string())
                .collect();
            self.calls
                .push((Callee::Path(segments), last.ident.span().start().line));
        }
        visit::visit_expr_call(self, call);
    }

    // Receiver first, so `Parser::new().run()` records `new` before `run`.
    fn visit_expr_method_call(&mut self, call: &'ast syn::ExprMethodCall) {
        visit::visit_expr_method_call(self, call);
        let on_self = matches!(&*call.receiver, Expr::Path(p) if p.path.is_ident("self"));
        self.calls.push((
            Callee::Method {
                name: call.method.to_string(),
                on_self,
            },
            call.method.span().start().line,
        ));
    }

    // Comma-separated macro arguments (`println!`, `assert_eq!`, `format!`)
    // are plain expressions; anything else is opaque.
    fn visit_macro(&mut self, mac: &'ast syn::Macro) {
        if let Ok(args) = mac.parse_body_with(Punctuated::<Expr, Token![,]>::parse_terminated) {
            for arg in &args {
                self.visit_expr(arg);
            }
        }
    }

    // Nested items are separate functions.
    fn visit_item(&mut self, _item: &'ast Item) {}
}

struct Linker<'i> {
    index: &'i Index,
    externals: HashMap<String, NodeId>,
}

impl Linker<'_> {
    fn link(&mut self, graph: &mut CallGraph, body: &Body) {
        let mut collector = CallCollector::default();
        collector.visit_block(body.block);

        let mut seen = HashSet::new();
        for (callee, line) in &collector.calls {
            for target in self.resolve(graph, body, callee) {
                if seen.insert((target, *line)) {
                    let site = Position {
                        file: body.file,
                        line: *line,
                    };
                    graph.add_call(body.id, target, Some(site));
                }
            }
        }
    }

    fn resolve(&mut self, graph: &mut CallGraph, body: &Body, callee: &Callee) -> Vec<NodeId> {
        match callee {
            Callee::Path(segments) => self.resolve_path(graph, body, segments),
            Callee::Method { name, on_self } => self.resolve_method(graph, body, name, *on_self),
        }
    }

    fn resolve_path(&mut self, graph: &mut CallGraph, body: &Body, segments: &[String]) -> Vec<NodeId> {
        let Some((name, qualifiers)) = segments.split_last() else {
            return Vec::new();
        };
        // Tuple structs and enum variants.
        if starts_uppercase(name) {
            return Vec::new();
        }
        let display = segments.join("::");
        let from_std = STD_ROOTS.contains(&segments[0].as_str());

        if let Some(qualifier) = qualifiers.last() {
            let owner = if qualifier == "Self" {
                body.owner.clone()
            } else {
                Some(qualifier.clone())
            };
            if let Some(owner) = owner
                && let Some(ids) = self.index.assoc.get(&(owner, name.clone()))
            {
                return ids.clone();
            }
            if from_std || STD_TYPES.contains(&qualifier.as_str()) {
                return vec![self.external(graph, &display, name, STD_FILE)];
            }
            if starts_uppercase(qualifier) {
                return vec![self.external(graph, &display, name, EXTERNAL_FILE)];
            }
        }

        match self.index.free.get(name) {
            Some(ids) => prefer_package(graph, ids, body.package),
            None => vec![self.external(graph, &display, name, EXTERNAL_FILE)],
        }
    }

    fn resolve_method(
        &mut self,
        graph: &mut CallGraph,
        body: &Body,
        name: &str,
        on_self: bool,
    ) -> Vec<NodeId> {
        if on_self
            && let Some(owner) = &body.owner
            && let Some(ids) = self.index.assoc.get(&(owner.clone(), name.to_string()))
        {
            return ids.clone();
        }
        match self.index.methods.get(name) {
            Some(ids) => prefer_package(graph, ids, body.package),
            None => vec![self.external(graph, &format!(".{name}()"), name, STD_FILE)],
        }
    }

    /// One shared node per distinct external callee.
    fn external(&mut self, graph: &mut CallGraph, display: &str, name: &str, file: &str) -> NodeId {
        if let Some(id) = self.externals.get(display) {
            return *id;
        }
        let file = graph.intern_file(file);
        let id = graph.add_node(name, display, EXTERNAL_PACKAGE, Position { file, line: 0 });
        self.externals.insert(display.to_string(), id);
        id
    }
}

fn prefer_package(graph: &CallGraph, ids: &[NodeId], package: &str) -> Vec<NodeId> {
    let local = ids
        .iter()
        .copied()
        .filter(|id| graph.get(*id).is_some_and(|n| n.package == package))
        .collect::<Vec<_>>();
    if local.is_empty() { ids.to_vec() } else { local }
}
