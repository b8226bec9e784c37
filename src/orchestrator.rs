use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::{ExitCode, ExitStatus};
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, error, info, warn};

use crate::resolver::resolve_dependencies;
use crate::supervisor::ProcessSupervisor;
use crate::watcher::{FileWatcher, WatchEvent};

/// Knobs for the control loop that are not owned by the supervisor.
#[derive(Debug, Clone, Copy)]
pub struct WatchOptions {
    pub debounce: Duration,
    /// Drop watch entries that no longer appear in the dependency set.
    pub prune: bool,
}

/// What one change cycle did.
#[derive(Debug, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Dependencies re-resolved and the process restarted.
    Restarted { files: BTreeSet<PathBuf> },
    /// Re-resolution failed; the previous process keeps running.
    Skipped,
}

/// Wires the resolver, the watcher and the supervisor into one control loop.
pub struct Orchestrator {
    entry: PathBuf,
    watcher: FileWatcher,
    supervisor: ProcessSupervisor,
    prune: bool,
}

impl Orchestrator {
    /// Resolve the entry's dependencies, watch them and start the process.
    ///
    /// # Errors
    /// Any resolution error, a watch that cannot be set up on the entry file, or a spawn
    /// failure. Nothing is left running in that case.
    pub fn start(
        entry: &Path,
        supervisor: ProcessSupervisor,
        options: WatchOptions,
    ) -> Result<Self> {
        let graph = resolve_dependencies(entry)
            .with_context(|| format!("failed to resolve dependencies of {}", entry.display()))?;
        info!(
            entry = %graph.entry().display(),
            files = graph.files().len(),
            "watching configuration dependencies"
        );
        Self::launch(graph.entry().to_path_buf(), graph.files(), supervisor, options)
    }

    /// Watch `files` and spawn the process. Only the entry's watch is mandatory.
    fn launch(
        entry: PathBuf,
        files: BTreeSet<PathBuf>,
        mut supervisor: ProcessSupervisor,
        options: WatchOptions,
    ) -> Result<Self> {
        let mut watcher = FileWatcher::new(files, options.debounce)?;
        if let Some(failure) = watcher.start().into_iter().find(|f| f.path == entry) {
            return Err(failure
                .error
                .context(format!("cannot watch entry file {}", entry.display())));
        }
        watcher.on_event(|event| match event {
            WatchEvent::Changed(path) => info!(path = %path.display(), "changed"),
            WatchEvent::Removed(path) => warn!(path = %path.display(), "removed"),
        });

        supervisor.on_failed(|status| error!(%status, "command failed"));
        supervisor.start()?;
        info!(pid = ?supervisor.pid(), command = %supervisor.command(), "started");

        Ok(Self {
            entry,
            watcher,
            supervisor,
            prune: options.prune,
        })
    }

    /// Run until Ctrl-C (exit 0) or until the command fails on its own (exit 1).
    ///
    /// # Errors
    /// Only when a restart cannot spawn the replacement process.
    pub async fn run(mut self) -> Result<ExitCode> {
        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                event = self.watcher.next_event() => match event {
                    Some(event) => {
                        self.handle_event(event).await?;
                    }
                    None => break,
                },
                status = self.supervisor.next_failure() => {
                    error!(%status, command = %self.supervisor.command(), "giving up");
                    break;
                }
                _ = &mut shutdown => {
                    info!("interrupted, shutting down");
                    break;
                }
            }
        }

        let code = if self.supervisor.failed() {
            ExitCode::FAILURE
        } else {
            ExitCode::SUCCESS
        };
        self.shutdown().await;
        Ok(code)
    }

    /// Re-resolve after a watcher event and restart on success.
    ///
    /// # Errors
    /// Only when the replacement process cannot be spawned.
    pub async fn handle_event(&mut self, event: WatchEvent) -> Result<CycleOutcome> {
        debug!(trigger = %event.path().display(), "re-resolving dependencies");

        let graph = match resolve_dependencies(&self.entry) {
            Ok(graph) => graph,
            Err(err) => {
                warn!(path = %err.path().display(), "{err}");
                warn!("dependency resolution failed, keeping the current process running");
                return Ok(CycleOutcome::Skipped);
            }
        };

        let files = graph.files();
        self.watcher.add(files.iter().cloned());
        if self.prune {
            self.watcher.retain(&files);
        }
        debug!(watched = self.watcher.watched_paths().len(), "watch set updated");

        self.supervisor.restart().await?;
        info!(
            restarts = self.supervisor.restarts(),
            pid = ?self.supervisor.pid(),
            "restarted"
        );
        Ok(CycleOutcome::Restarted { files })
    }

    pub async fn shutdown(&mut self) {
        self.watcher.close();
        self.supervisor.stop().await;
        debug!(state = ?self.supervisor.state(), "stopped");
    }
}

/// Run a command that is not a recognized build-tool invocation: no watching, the exit
/// code of the child becomes ours.
///
/// # Errors
/// When the command cannot be spawned.
pub async fn run_directly(mut supervisor: ProcessSupervisor) -> Result<ExitCode> {
    info!(command = %supervisor.command(), "run command directly");
    supervisor.start()?;

    tokio::select! {
        status = supervisor.wait_exit() => {
            Ok(status.map_or(ExitCode::FAILURE, |s| ExitCode::from(exit_code(s))))
        }
        _ = tokio::signal::ctrl_c() => {
            supervisor.stop().await;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// The child's exit code, or 1 when it was killed by a signal or the code does not fit.
fn exit_code(status: ExitStatus) -> u8 {
    status
        .code()
        .and_then(|code| u8::try_from(code).ok())
        .unwrap_or(1)
}
