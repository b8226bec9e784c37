use std::path::PathBuf;

use clap::Parser;

/// Auto reload a build tool when its configuration changes.
///
/// wc-reload finds the tool's configuration file, follows every local file it imports or
/// requires, and restarts the command whenever any of them change or disappear.
///
/// Examples:
///   wc-reload npm start
///   wc-reload webpack-dev-server --config dev.js
#[derive(Parser, Debug)]
#[command(
    name = "wc-reload",
    version,
    about,
    long_about = None,
)]
pub struct Cli {
    /// Entry configuration file. Skips build-tool detection.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Quiet period after the last file notification, in milliseconds.
    #[arg(long, value_name = "MS")]
    pub debounce: Option<u64>,

    /// Keep watching files that drop out of the dependency graph.
    #[arg(long)]
    pub no_prune: bool,

    /// Print the resolved dependency set of the entry file and exit.
    #[arg(long)]
    pub list_deps: bool,

    /// With --list-deps, print JSON instead of one path per line.
    #[arg(long)]
    pub json: bool,

    /// Debug logging.
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Errors only.
    #[arg(short, long)]
    pub quiet: bool,

    /// The command to run and restart. Everything from the first non-option word on is
    /// passed through verbatim.
    #[arg(
        trailing_var_arg = true,
        allow_hyphen_values = true,
        value_name = "COMMAND",
        required_unless_present = "list_deps"
    )]
    pub command: Vec<String>,
}

impl Cli {
    pub fn command_line(&self) -> String {
        self.command.join(" ")
    }
}
