//! Source excerpts and human-readable call path summaries for the detail pane.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::debug;

use crate::graph::model::{CallGraph, Edge};

/// Prefix of the line a context excerpt is centred on.
pub const TARGET_MARK: char = '▶';

/// Lines `[line - radius, line + radius]` of `file`, numbered, target line marked.
///
/// Returns a placeholder instead of an error when the file cannot be read up
/// to `line`. A file that ends after the target line just gives a shorter window.
pub fn file_context(file: &Path, line: usize, radius: usize) -> String {
    let placeholder = || format!("<no context for {}:{}>", file.display(), line);

    if line == 0 {
        return placeholder();
    }
    let handle = match File::open(file) {
        Ok(handle) => handle,
        Err(err) => {
            debug!(file = %file.display(), "cannot open for context: {err}");
            return placeholder();
        }
    };

    let start = line.saturating_sub(radius).max(1);
    let end = line + radius;
    let mut out = String::new();
    for (idx, text) in BufReader::new(handle).lines().enumerate() {
        let number = idx + 1;
        if number > end {
            break;
        }
        let text = match text {
            Ok(text) => text,
            Err(err) => {
                debug!(file = %file.display(), line = number, "read failed: {err}");
                if number <= line {
                    return placeholder();
                }
                break;
            }
        };
        if number < start {
            continue;
        }
        let mark = if number == line { TARGET_MARK } else { ' ' };
        out.push_str(&format!("{mark}{number:>5}  {text}\n"));
    }

    let reached_target = out.lines().any(|l| l.starts_with(TARGET_MARK));
    if !reached_target {
        return placeholder();
    }
    out
}

/// One line describing a single call.
pub fn edge_line(graph: &CallGraph, edge: &Edge) -> String {
    let caller = edge
        .from_function()
        .map(|id| graph.display(id))
        .unwrap_or("(none)");
    let callee = graph.display(edge.callee);
    match edge.position(graph) {
        Some(pos) => format!(
            "{caller} -> {callee} ({}:{})",
            graph.file(pos.file).display(),
            pos.line
        ),
        None => format!("{caller} -> {callee}"),
    }
}

/// Every edge of `path` on its own line, separated by blank lines, optionally
/// followed by `radius` lines of source context.
pub fn path_summary(graph: &CallGraph, path: &[Edge], include_context: bool, radius: usize) -> String {
    let mut blocks = Vec::with_capacity(path.len());
    for edge in path {
        let mut block = edge_line(graph, edge);
        if include_context && let Some(pos) = edge.position(graph) {
            block.push('\n');
            block.push_str(&file_context(graph.file(pos.file), pos.line, radius));
        }
        blocks.push(block);
    }
    blocks.join("\n\n")
}
