mod cli;
mod config;
mod detect;
mod logger;
mod orchestrator;
mod parser;
mod resolver;
mod supervisor;
mod watcher;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::debug;

use cli::Cli;
use config::ReloadConfig;
use detect::detect_entry;
use orchestrator::{Orchestrator, WatchOptions, run_directly};
use resolver::resolve_dependencies;
use supervisor::ProcessSupervisor;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    logger::init_logger(cli.verbose, cli.quiet);

    let cwd = std::env::current_dir().context("cannot read the current directory")?;
    let mut config = ReloadConfig::load(&cwd);
    if let Some(ms) = cli.debounce {
        config.debounce_ms = ms;
    }
    if cli.no_prune {
        config.prune_unreferenced = false;
    }
    debug!(?config, "effective configuration");

    let command = cli.command_line();
    let entry = match &cli.config {
        Some(path) => Some(cwd.join(path)),
        None => detect_entry(&command, &cwd, &config.commands, &config.config_names)
            .map(|detection| detection.config_file),
    };

    if cli.list_deps {
        let Some(entry) = entry else {
            bail!("no configuration file: pass --config or a recognized build command");
        };
        list_deps(&entry, cli.json)?;
        return Ok(ExitCode::SUCCESS);
    }

    let supervisor = ProcessSupervisor::new(command)
        .with_shell(config.shell.clone())
        .with_kill_timeout(config.kill_timeout());

    match entry {
        Some(entry) => {
            let options = WatchOptions {
                debounce: config.debounce(),
                prune: config.prune_unreferenced,
            };
            Orchestrator::start(&entry, supervisor, options)?.run().await
        }
        None => run_directly(supervisor).await,
    }
}

fn list_deps(entry: &Path, json: bool) -> Result<()> {
    let graph = resolve_dependencies(entry)
        .with_context(|| format!("failed to resolve dependencies of {}", entry.display()))?;
    debug!("dependency tree:\n{graph}");
    let files: Vec<PathBuf> = graph.files().into_iter().collect();

    if json {
        let output = serde_json::json!({
            "entry": graph.entry(),
            "files": files,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        for file in &files {
            println!("{}", file.display());
        }
    }
    Ok(())
}
