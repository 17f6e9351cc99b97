//! `callview.conf`: line-oriented `key: value` settings with `#` comments.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use tracing::warn;

/// Which matching policy the search field drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    /// Exact callee name; prunes the tree to matching branches.
    Name,
    /// Free text over path summaries; highlights within the bounded tree.
    Text,
}

impl SearchMode {
    pub fn label(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Text => "text",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Self::Name => Self::Text,
            Self::Text => Self::Name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Show callees declared under a noise prefix.
    pub include_noise: bool,
    /// Declaring-file prefixes treated as standard-library noise.
    pub noise_prefixes: Vec<String>,
    /// How many calls deep each expansion goes.
    pub expand_step: usize,
    /// Lines of source shown on each side of a call site.
    pub context_lines: usize,
    pub search_mode: SearchMode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            include_noise: false,
            noise_prefixes: vec!["<std>".to_string(), "<external>".to_string()],
            expand_step: 4,
            context_lines: 2,
            search_mode: SearchMode::Name,
        }
    }
}

/// Read the config at `path`, or the defaults when the file does not exist.
pub fn load(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    parse(&content).with_context(|| format!("invalid config {}", path.display()))
}

pub fn parse(input: &str) -> Result<Config> {
    let mut config = Config::default();
    for (idx, raw) in input.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            bail!("line {}: expected `key: value`, got {:?}", idx + 1, line);
        };
        let value = value.trim();
        match key.trim() {
            "include_noise" => config.include_noise = parse_bool(value, idx)?,
            "noise_prefixes" => {
                config.noise_prefixes = value
                    .split(',')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(ToString::to_string)
                    .collect();
            }
            "expand_step" => config.expand_step = parse_count(value, idx)?,
            "context_lines" => {
                config.context_lines = value
                    .parse()
                    .with_context(|| format!("line {}: not a number: {value:?}", idx + 1))?;
            }
            "search_mode" => {
                config.search_mode = match value {
                    "name" => SearchMode::Name,
                    "text" => SearchMode::Text,
                    other => bail!("line {}: search_mode must be name or text, got {other:?}", idx + 1),
                };
            }
            other => warn!(key = other, "ignoring unknown config key"),
        }
    }
    Ok(config)
}

pub fn serialize(config: &Config) -> String {
    format!(
        "\
# callview configuration
# Edit manually or press ctrl-o inside callview

# Show calls into files under the noise prefixes below
include_noise: {}

# Comma-separated declaring-file prefixes treated as standard library noise
noise_prefixes: {}

# How many calls deep the tree expands at a time
expand_step: {}

# Lines of source shown around each call site
context_lines: {}

# Search field behavior: name (prune to callers of an exact name) | text (highlight)
search_mode: {}
",
        config.include_noise,
        config.noise_prefixes.join(", "),
        config.expand_step,
        config.context_lines,
        config.search_mode.label(),
    )
}

fn parse_bool(value: &str, idx: usize) -> Result<bool> {
    match value {
        "true" | "yes" | "on" => Ok(true),
        "false" | "no" | "off" => Ok(false),
        other => bail!("line {}: expected true or false, got {other:?}", idx + 1),
    }
}

fn parse_count(value: &str, idx: usize) -> Result<usize> {
    let n: usize = value
        .parse()
        .with_context(|| format!("line {}: not a number: {value:?}", idx + 1))?;
    if n == 0 {
        bail!("line {}: must be at least 1", idx + 1);
    }
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn empty_input_gives_defaults() {
        assert_eq!(parse("").unwrap(), Config::default());
        assert_eq!(parse("# only a comment\n\n").unwrap(), Config::default());
    }

    #[test]
    fn parses_every_key() {
        let cfg = parse(
            "include_noise: true\nnoise_prefixes: /usr/lib, <std>\nexpand_step: 6\ncontext_lines: 0\nsearch_mode: text\n",
        )
        .unwrap();
        assert!(cfg.include_noise);
        assert_eq!(cfg.noise_prefixes, vec!["/usr/lib", "<std>"]);
        assert_eq!(cfg.expand_step, 6);
        assert_eq!(cfg.context_lines, 0);
        assert_eq!(cfg.search_mode, SearchMode::Text);
    }

    #[test]
    fn unknown_keys_are_ignored() {
        assert_eq!(parse("colour: blue\n").unwrap(), Config::default());
    }

    #[test]
    fn malformed_values_are_errors() {
        assert!(parse("include_noise: maybe").is_err());
        assert!(parse("expand_step: 0").is_err());
        assert!(parse("expand_step: lots").is_err());
        assert!(parse("search_mode: fuzzy").is_err());
        assert!(parse("no separator here").is_err());
    }

    #[test]
    fn serialize_round_trips() {
        let cfg = Config {
            include_noise: true,
            noise_prefixes: vec!["<std>".to_string()],
            expand_step: 2,
            context_lines: 5,
            search_mode: SearchMode::Text,
        };
        assert_eq!(parse(&serialize(&cfg)).unwrap(), cfg);
    }

    #[test]
    fn load_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let cfg = load(&dir.path().join("callview.conf")).unwrap();
        assert_eq!(cfg, Config::default());
    }
}
