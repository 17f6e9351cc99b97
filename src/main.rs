mod backend;
mod config;
mod explore;
mod graph;
mod logging;
mod tui;
mod workspace;

use std::env;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use crate::backend::rust::RustSourceBackend;

#[derive(Parser)]
#[command(
    name = "callview",
    version,
    about = "Browse the call graph of Rust packages from their entry points down"
)]
struct Cli {
    /// Package directories or paths inside a package to analyze
    #[arg(value_name = "PACKAGES", default_value = ".")]
    packages: Vec<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let cwd = env::current_dir().context("cannot determine the working directory")?;
    logging::init(&workspace::log_path(&cwd))?;

    let root = workspace::find_root_from(&cwd);
    let config_path = workspace::config_path(&root);
    let config = config::load(&config_path)?;
    info!(packages = ?cli.packages, config = %config_path.display(), "starting");

    let loaded = backend::load_graph(&RustSourceBackend, &cli.packages)?;
    tui::app::run(loaded, config, config_path)
}
