use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::supervisor::DEFAULT_KILL_TIMEOUT;
use crate::watcher::DEFAULT_DEBOUNCE;

pub const CONFIG_FILE_NAME: &str = "wc-reload.toml";

/// Configuration loaded from `wc-reload.toml` in the working directory.
///
/// Every key is optional; CLI flags override whatever is set here.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ReloadConfig {
    /// Quiet period after the last raw file notification, in milliseconds.
    pub debounce_ms: u64,
    /// Upper bound on killing the old process tree during a restart, in milliseconds.
    pub kill_timeout_ms: u64,
    /// Stop watching files that drop out of the dependency graph after a re-resolution.
    pub prune_unreferenced: bool,
    /// Shell used to run the command. Defaults to `sh` (`cmd` on Windows).
    pub shell: Option<String>,
    /// Command names recognized as build-tool invocations.
    pub commands: Vec<String>,
    /// Config file names probed, in order, when the command has no `--config` flag.
    pub config_names: Vec<String>,
}

impl Default for ReloadConfig {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE.as_millis() as u64,
            kill_timeout_ms: DEFAULT_KILL_TIMEOUT.as_millis() as u64,
            prune_unreferenced: true,
            shell: None,
            commands: ["webpack", "webpack-dev-server", "webpack-cli"]
                .map(String::from)
                .to_vec(),
            config_names: [
                "webpack.config.js",
                "webpackfile.js",
                "webpack.config.mjs",
                "webpack.config.cjs",
                "webpack.config.ts",
            ]
            .map(String::from)
            .to_vec(),
        }
    }
}

impl ReloadConfig {
    /// Load configuration from `wc-reload.toml` in the given directory.
    ///
    /// Returns the default configuration if the file does not exist or cannot be parsed.
    pub fn load(dir: &Path) -> Self {
        let config_path = dir.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(&config_path) {
            Ok(contents) => match toml::from_str::<Self>(&contents) {
                Ok(config) => config,
                Err(err) => {
                    warn!("failed to parse {CONFIG_FILE_NAME}: {err}. Using defaults.");
                    Self::default()
                }
            },
            Err(err) => {
                warn!("failed to read {CONFIG_FILE_NAME}: {err}. Using defaults.");
                Self::default()
            }
        }
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn kill_timeout(&self) -> Duration {
        Duration::from_millis(self.kill_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ReloadConfig::load(dir.path());
        assert_eq!(config, ReloadConfig::default());
        assert_eq!(config.debounce(), Duration::from_millis(500));
        assert!(config.prune_unreferenced);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "debounce_ms = 250\nprune_unreferenced = false\ncommands = [\"rspack\"]\n",
        )
        .unwrap();

        let config = ReloadConfig::load(dir.path());
        assert_eq!(config.debounce_ms, 250);
        assert!(!config.prune_unreferenced);
        assert_eq!(config.commands, vec!["rspack"]);
        assert_eq!(config.kill_timeout_ms, 5000);
        assert_eq!(config.config_names, ReloadConfig::default().config_names);
    }

    #[test]
    fn test_invalid_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE_NAME), "debounce_ms = \"soon\"").unwrap();
        assert_eq!(ReloadConfig::load(dir.path()), ReloadConfig::default());
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE_NAME), "debounce = 10").unwrap();
        assert_eq!(ReloadConfig::load(dir.path()), ReloadConfig::default());
    }
}
