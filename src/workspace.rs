//! Locating the analysis root and the files callview keeps next to it.

use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "callview.conf";
pub const LOG_FILE: &str = "callview.log";

/// Walk upward from `start` to the nearest directory holding a `Cargo.toml`.
///
/// Falls back to `start` itself outside of any Cargo project.
pub fn find_root_from(start: &Path) -> PathBuf {
    let mut dir = start;
    loop {
        if dir.join("Cargo.toml").is_file() {
            return dir.to_path_buf();
        }
        match dir.parent() {
            Some(parent) => dir = parent,
            None => return start.to_path_buf(),
        }
    }
}

/// Nearest manifest directory at or above `start`, if there is one.
pub fn enclosing_package_dir(start: &Path) -> Option<PathBuf> {
    let root = find_root_from(start);
    root.join("Cargo.toml").is_file().then_some(root)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

/// The diagnostic log lives in the working directory.
pub fn log_path(cwd: &Path) -> PathBuf {
    cwd.join(LOG_FILE)
}
