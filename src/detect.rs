use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};

/// A recognized build-tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    /// Absolute path of the tool's configuration file: the entry of dependency resolution.
    pub config_file: PathBuf,
    /// The command line to supervise.
    pub command: String,
}

/// Package managers whose first argument names a `package.json` script.
const PACKAGE_MANAGERS: &[&str] = &["npm", "yarn", "pnpm"];

/// How many directories upward `package.json` is searched for.
const PACKAGE_JSON_DEPTH: usize = 3;

#[derive(Debug, Deserialize, Default)]
struct PackageJson {
    #[serde(default)]
    scripts: HashMap<String, String>,
}

fn config_flag() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"--config[= ](\S+)").expect("invalid --config regex"))
}

/// Decide whether `command` runs one of `commands` and find its configuration file.
///
/// A package-manager invocation (`npm start`, `npm run dev`, `yarn dev`) is replaced by
/// the body of that script from the nearest `package.json` before matching. The config
/// file comes from a `--config` flag in the matched text, else from the first of
/// `default_names` that exists in `cwd`.
///
/// Returns `None` when the command is not a recognized build-tool invocation or its
/// config file does not exist; both cases are logged as warnings.
pub fn detect_entry(
    command: &str,
    cwd: &Path,
    commands: &[String],
    default_names: &[String],
) -> Option<Detection> {
    let inspected = match script_name(command) {
        Some(script) => {
            let body = read_script(cwd, script)?;
            debug!(script, body = %body, "inspecting package script");
            body
        }
        None => command.to_owned(),
    };

    if !starts_with_known_command(&inspected, commands) {
        warn!(command = %inspected, "not a recognized build tool invocation");
        return None;
    }

    let candidates: Vec<String> = match config_flag().captures(&inspected) {
        Some(caps) => vec![caps[1].trim_matches(['"', '\'']).to_owned()],
        None => default_names.to_vec(),
    };

    for candidate in &candidates {
        let path = cwd.join(candidate);
        if path.is_file() {
            return Some(Detection {
                config_file: path,
                command: command.to_owned(),
            });
        }
    }

    warn!(candidates = ?candidates, "build tool config file doesn't exist in the current directory");
    None
}

/// `npm start` -> `start`, `npm run dev` -> `dev`, `yarn run-script build` -> `build`.
fn script_name(command: &str) -> Option<&str> {
    let mut words = command.split_whitespace();
    let manager = words.next()?;
    if !PACKAGE_MANAGERS.contains(&manager) {
        return None;
    }
    match words.next()? {
        "run" | "run-script" => words.next(),
        script => Some(script),
    }
}

fn read_script(cwd: &Path, script: &str) -> Option<String> {
    for dir in cwd.ancestors().take(PACKAGE_JSON_DEPTH) {
        let manifest = dir.join("package.json");
        let Ok(contents) = std::fs::read_to_string(&manifest) else {
            continue;
        };
        return match serde_json::from_str::<PackageJson>(&contents) {
            Ok(mut pkg) => {
                let body = pkg.scripts.remove(script);
                if body.is_none() {
                    warn!(script, manifest = %manifest.display(), "script not found in package.json");
                }
                body
            }
            Err(err) => {
                warn!(manifest = %manifest.display(), error = %err, "failed to parse package.json");
                None
            }
        };
    }
    warn!(cwd = %cwd.display(), "no package.json found");
    None
}

fn starts_with_known_command(text: &str, commands: &[String]) -> bool {
    let mut words = text.split_whitespace();
    let Some(mut first) = words.next() else {
        return false;
    };
    if first == "npx" {
        match words.next() {
            Some(word) => first = word,
            None => return false,
        }
    }
    commands.iter().any(|c| c == first)
}
