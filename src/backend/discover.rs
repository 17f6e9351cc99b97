//! Finding Cargo packages and their Rust sources under a requested path.
//!
//! Uses the `ignore` crate for gitignore-aware walking. `target/` and `.git/`
//! are always skipped. Each `.rs` file belongs to the innermost package whose
//! directory contains it, and only files under that package's `src/` count.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use ignore::WalkBuilder;

use crate::workspace;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    /// Crate name with `-` normalized to `_`.
    pub name: String,
    pub dir: PathBuf,
    pub sources: Vec<PathBuf>,
}

/// All packages with sources under `target`.
///
/// A path inside a package (say `crate/src/`) resolves to the enclosing
/// package, restricted to the sources under that path.
pub fn discover(target: &Path) -> Result<Vec<Package>> {
    if !target.exists() {
        bail!("{} does not exist", target.display());
    }

    let mut manifests = Vec::new();
    let mut sources = Vec::new();
    for result in walker(target).build() {
        let entry = result.with_context(|| format!("error walking {}", target.display()))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if path.file_name().is_some_and(|n| n == "Cargo.toml") {
            manifests.push(path.to_path_buf());
        } else if path.extension().is_some_and(|ext| ext == "rs") {
            sources.push(path.to_path_buf());
        }
    }

    let mut packages = Vec::new();
    for manifest in manifests {
        if let Some(name) = package_name(&manifest)? {
            let dir = manifest.parent().unwrap_or(target).to_path_buf();
            packages.push(Package {
                name,
                dir,
                sources: Vec::new(),
            });
        }
    }

    if packages.is_empty() {
        let start = if target.is_dir() {
            target.to_path_buf()
        } else {
            target.parent().unwrap_or(target).to_path_buf()
        };
        let Some(dir) = workspace::enclosing_package_dir(&start) else {
            bail!("no Cargo package found at or above {}", target.display());
        };
        let Some(name) = package_name(&dir.join("Cargo.toml"))? else {
            bail!("{} is a workspace manifest without a package", dir.display());
        };
        packages.push(Package {
            name,
            dir,
            sources: Vec::new(),
        });
    }

    // Innermost package wins: longer directories are tried first.
    packages.sort_by(|a, b| b.dir.components().count().cmp(&a.dir.components().count()));
    // Tests, benches, examples and build scripts live outside `src/` and are left out.
    for source in sources {
        if let Some(pkg) = packages.iter_mut().find(|p| source.starts_with(&p.dir))
            && source.starts_with(pkg.dir.join("src"))
        {
            pkg.sources.push(source);
        }
    }

    packages.retain(|p| !p.sources.is_empty());
    for pkg in &mut packages {
        pkg.sources.sort();
    }
    packages.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(packages)
}

fn walker(target: &Path) -> WalkBuilder {
    let mut builder = WalkBuilder::new(target);
    builder
        .hidden(true)
        .git_ignore(true)
        .git_global(false)
        .git_exclude(false)
        .require_git(false)
        .filter_entry(|entry| {
            let name = entry.file_name();
            name != "target" && name != ".git"
        });
    builder
}

/// `[package].name` of a manifest, `None` for a pure workspace manifest.
fn package_name(manifest: &Path) -> Result<Option<String>> {
    let text = fs::read_to_string(manifest)
        .with_context(|| format!("reading {}", manifest.display()))?;
    let table: toml::Table = text
        .parse()
        .with_context(|| format!("malformed manifest {}", manifest.display()))?;
    let name = table
        .get("package")
        .and_then(|p| p.get("name"))
        .and_then(|n| n.as_str())
        .map(|n| n.replace('-', "_"));
    Ok(name)
}
