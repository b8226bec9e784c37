pub mod kill;

use std::io;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use kill::{kill_tree, shell_command};

/// Default bound on how long termination of the old process tree may take.
pub const DEFAULT_KILL_TIMEOUT: Duration = Duration::from_secs(5);

/// Lifecycle of the supervised command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// Never started.
    Idle,
    Starting,
    Running,
    /// The outgoing child's exit notification is detached and its tree is being killed.
    Restarting,
    /// The child exited on its own. Stays here until the next `restart()`.
    Exited,
}

/// The live child: its pid and the receiving end of the exit notification sent by the
/// task that owns the `Child` handle.
struct SupervisedProcess {
    pid: u32,
    exit_rx: oneshot::Receiver<io::Result<ExitStatus>>,
}

type FailureListener = Box<dyn FnMut(&ExitStatus) + Send>;

/// Owns zero or one running child for a shell command line.
///
/// A restart takes the outgoing child's exit receiver before killing it, so the exit of a
/// process the supervisor terminated can never be reported as a failure.
pub struct ProcessSupervisor {
    command: String,
    shell: Option<String>,
    kill_timeout: Duration,
    state: ProcessState,
    current: Option<SupervisedProcess>,
    failed: bool,
    restarts: u64,
    failure_listeners: Vec<FailureListener>,
}

impl ProcessSupervisor {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            shell: None,
            kill_timeout: DEFAULT_KILL_TIMEOUT,
            state: ProcessState::Idle,
            current: None,
            failed: false,
            restarts: 0,
            failure_listeners: Vec::new(),
        }
    }

    /// Run the command through `shell` instead of the platform default (`sh` / `cmd`).
    pub fn with_shell(mut self, shell: Option<String>) -> Self {
        self.shell = shell;
        self
    }

    pub fn with_kill_timeout(mut self, timeout: Duration) -> Self {
        self.kill_timeout = timeout;
        self
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    /// Set once a child exits with a failure the supervisor did not cause; cleared by
    /// `restart()`.
    pub fn failed(&self) -> bool {
        self.failed
    }

    /// Number of completed restarts.
    pub fn restarts(&self) -> u64 {
        self.restarts
    }

    /// Pid of the running child, if any.
    pub fn pid(&self) -> Option<u32> {
        self.current.as_ref().map(|c| c.pid)
    }

    /// Register a callback fired once per unrequested failing exit of the current child.
    pub fn on_failed(&mut self, listener: impl FnMut(&ExitStatus) + Send + 'static) {
        self.failure_listeners.push(Box::new(listener));
    }

    /// Spawn the command with inherited standard streams.
    ///
    /// # Errors
    /// Fails when the shell cannot be spawned.
    pub fn start(&mut self) -> Result<()> {
        self.state = ProcessState::Starting;

        let mut command = shell_command(self.shell.as_deref(), &self.command);
        command
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        let mut child = command
            .spawn()
            .with_context(|| format!("failed to spawn `{}`", self.command))?;
        let pid = child
            .id()
            .context("spawned child has no pid")?;

        let (exit_tx, exit_rx) = oneshot::channel();
        tokio::spawn(async move {
            let status = child.wait().await;
            // Receiver gone means the exit was detached by a restart.
            let _ = exit_tx.send(status);
        });

        debug!(pid, command = %self.command, "started");
        self.current = Some(SupervisedProcess { pid, exit_rx });
        self.state = ProcessState::Running;
        Ok(())
    }

    /// Terminate the current process tree, if any, then start a fresh child.
    ///
    /// The old child is fully gone (or the kill timeout elapsed) before the new one is
    /// spawned. A failing kill is logged and the new child starts anyway.
    ///
    /// # Errors
    /// Fails only when the replacement cannot be spawned.
    pub async fn restart(&mut self) -> Result<()> {
        self.state = ProcessState::Restarting;
        // Taking the receiver detaches the old exit notification.
        if let Some(old) = self.current.take() {
            self.terminate(old).await;
        }
        self.failed = false;
        self.start()?;
        self.restarts += 1;
        debug!(restart = self.restarts, command = %self.command, "restarted");
        Ok(())
    }

    /// Kill the current process tree without starting a replacement.
    pub async fn stop(&mut self) {
        if let Some(old) = self.current.take() {
            self.state = ProcessState::Restarting;
            self.terminate(old).await;
        }
        self.state = ProcessState::Exited;
    }

    async fn terminate(&self, mut old: SupervisedProcess) {
        // A reaped pid may already belong to an unrelated process, and any orphans it left
        // were reparented, so there is nothing left to signal by that pid.
        if old.exit_rx.try_recv().is_ok() {
            debug!(pid = old.pid, "old process already exited, nothing to kill");
            return;
        }

        if let Err(err) = kill_tree(old.pid, self.kill_timeout).await {
            warn!(pid = old.pid, error = %format!("{err:#}"), "failed to kill process tree");
        }

        match tokio::time::timeout(self.kill_timeout, &mut old.exit_rx).await {
            Ok(Ok(Ok(status))) => debug!(pid = old.pid, %status, "old process exited"),
            Ok(Ok(Err(err))) => warn!(pid = old.pid, error = %err, "failed to wait for old process"),
            Ok(Err(_)) => debug!(pid = old.pid, "exit watcher already gone"),
            Err(_) => warn!(
                pid = old.pid,
                timeout_ms = self.kill_timeout.as_millis() as u64,
                "old process did not exit in time, starting replacement anyway"
            ),
        }
    }

    /// Wait for the current child to exit on its own and return its status.
    ///
    /// Returns `None` when there is no child to wait for. Cancel safe.
    pub async fn wait_exit(&mut self) -> Option<ExitStatus> {
        let current = self.current.as_mut()?;
        let result = (&mut current.exit_rx).await;
        let pid = current.pid;
        self.current = None;
        self.state = ProcessState::Exited;

        match result {
            Ok(Ok(status)) => Some(status),
            Ok(Err(err)) => {
                warn!(pid, error = %err, "failed to wait for child");
                None
            }
            Err(_) => None,
        }
    }

    /// Wait until the current child fails: exits with a non-zero code or by signal
    /// without having been terminated by the supervisor.
    ///
    /// A clean exit is logged and waiting continues; with no child the future stays
    /// pending until dropped. Marks the supervisor as failed and fires the failure
    /// listeners before returning. Cancel safe.
    pub async fn next_failure(&mut self) -> ExitStatus {
        loop {
            if self.current.is_none() {
                return std::future::pending().await;
            }
            let Some(status) = self.wait_exit().await else {
                continue;
            };
            if status.success() {
                info!(command = %self.command, "process exited cleanly, waiting for changes");
                continue;
            }

            self.failed = true;
            for listener in &mut self.failure_listeners {
                listener(&status);
            }
            return status;
        }
    }
}
