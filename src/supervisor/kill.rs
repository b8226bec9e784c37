#[cfg(unix)]
use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tokio::process::Command;

/// Forcefully terminate the process tree rooted at `pid`.
///
/// The child shares our process group so it keeps the terminal's foreground. On Unix the
/// tree is therefore found by parent pid from a `ps` snapshot and every member is sent
/// SIGKILL in one go. On Windows `taskkill /T` walks the tree itself.
/// The whole operation is bounded by `timeout` so a wedged kill never blocks a restart.
pub async fn kill_tree(pid: u32, timeout: Duration) -> Result<()> {
    tokio::time::timeout(timeout, kill_tree_inner(pid))
        .await
        .with_context(|| format!("killing process tree {pid} timed out"))?
}

#[cfg(unix)]
async fn kill_tree_inner(pid: u32) -> Result<()> {
    let table = process_table().await?;
    let tree = descendants(pid, &table);

    let mut command = Command::new("kill");
    command.arg("-KILL").arg("--");
    command.args(tree.iter().map(u32::to_string));
    run_quiet(command, pid).await
}

#[cfg(windows)]
async fn kill_tree_inner(pid: u32) -> Result<()> {
    let mut command = Command::new("taskkill");
    command.args(["/T", "/F", "/PID", &pid.to_string()]);
    run_quiet(command, pid).await
}

async fn run_quiet(mut command: Command, pid: u32) -> Result<()> {
    let status = command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .status()
        .await
        .with_context(|| format!("failed to run kill for process tree {pid}"))?;

    if !status.success() {
        bail!("kill for process tree {pid} exited with {status}");
    }
    Ok(())
}

/// Parent pid -> child pids for every process on the system.
#[cfg(unix)]
async fn process_table() -> Result<HashMap<u32, Vec<u32>>> {
    let output = Command::new("ps")
        .args(["-A", "-o", "pid=", "-o", "ppid="])
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .context("failed to run ps")?;
    if !output.status.success() {
        bail!("ps exited with {}", output.status);
    }
    Ok(parse_process_table(&String::from_utf8_lossy(&output.stdout)))
}

#[cfg(unix)]
fn parse_process_table(text: &str) -> HashMap<u32, Vec<u32>> {
    let mut children: HashMap<u32, Vec<u32>> = HashMap::new();
    for line in text.lines() {
        let mut fields = line.split_whitespace();
        if let (Some(pid), Some(ppid)) = (fields.next(), fields.next())
            && let (Ok(pid), Ok(ppid)) = (pid.parse::<u32>(), ppid.parse::<u32>())
        {
            children.entry(ppid).or_default().push(pid);
        }
    }
    children
}

/// `root` followed by all of its descendants, parents before children.
#[cfg(unix)]
fn descendants(root: u32, children: &HashMap<u32, Vec<u32>>) -> Vec<u32> {
    let mut tree = vec![root];
    let mut next = 0;
    while next < tree.len() {
        if let Some(kids) = children.get(&tree[next]) {
            for &kid in kids {
                if !tree.contains(&kid) {
                    tree.push(kid);
                }
            }
        }
        next += 1;
    }
    tree
}

/// Build the command that runs `command_line` through the platform shell.
///
/// The child stays in our process group and session, so it can read from and
/// reconfigure the terminal exactly as if it had been started directly.
pub fn shell_command(shell: Option<&str>, command_line: &str) -> Command {
    #[cfg(unix)]
    {
        let mut command = Command::new(shell.unwrap_or("sh"));
        command.arg("-c").arg(command_line);
        command
    }
    #[cfg(windows)]
    {
        let mut command = Command::new(shell.unwrap_or("cmd"));
        command.arg("/C").arg(command_line);
        command
    }
}
