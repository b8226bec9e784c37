//! Integration tests for the `wc-reload` binary.
//!
//! Every test builds a throwaway JavaScript project in a temp directory and runs the compiled
//! binary there. `CARGO_BIN_EXE_wc-reload` is set by Cargo during `cargo test`.
//!
//! Watch-and-restart cycles are covered by the orchestrator's unit tests; here the binary is
//! only driven through paths that terminate on their own: `--list-deps`, startup failures and
//! commands that exit.
#![cfg(unix)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_wc-reload"))
}

/// A project with `main.js -> util.js -> helpers.js` and a package import in `util.js`.
fn project() -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();
    fs::write(root.join("main.js"), "const util = require('./util.js');\n").unwrap();
    fs::write(
        root.join("util.js"),
        "const _ = require('lodash');\nconst h = require('./helpers.js');\n",
    )
    .unwrap();
    fs::write(root.join("helpers.js"), "module.exports = {};\n").unwrap();
    (dir, root)
}

fn run(dir: &Path, args: &[&str]) -> Output {
    Command::new(binary())
        .args(args)
        .current_dir(dir)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to invoke wc-reload binary")
}

/// Run wc-reload in `dir` and assert it exits successfully.
/// Returns stdout as a String.
fn run_success(dir: &Path, args: &[&str]) -> String {
    let out = run(dir, args);
    let stdout = String::from_utf8_lossy(&out.stdout).to_string();
    let stderr = String::from_utf8_lossy(&out.stderr).to_string();
    assert!(
        out.status.success(),
        "command {:?} failed with status {:?}\nstdout: {}\nstderr: {}",
        args,
        out.status,
        stdout,
        stderr
    );
    stdout
}

/// Run wc-reload in `dir` and assert it exits with a non-zero status.
/// Returns (exit code, stderr).
fn run_failure(dir: &Path, args: &[&str]) -> (Option<i32>, String) {
    let out = run(dir, args);
    let stdout = String::from_utf8_lossy(&out.stdout).to_string();
    let stderr = String::from_utf8_lossy(&out.stderr).to_string();
    assert!(
        !out.status.success(),
        "command {:?} expected to fail but exited successfully\nstdout: {}\nstderr: {}",
        args,
        stdout,
        stderr
    );
    (out.status.code(), stderr)
}

// ---------------------------------------------------------------------------
// Dependency listing
// ---------------------------------------------------------------------------

#[test]
fn test_list_deps_json() {
    let (_dir, root) = project();
    let stdout = run_success(&root, &["--config", "main.js", "--list-deps", "--json"]);
    let parsed: serde_json::Value =
        serde_json::from_str(&stdout).expect("--list-deps --json output is not valid JSON");

    assert_eq!(parsed["entry"], root.join("main.js").to_str().unwrap());
    let mut files: Vec<&str> = parsed["files"]
        .as_array()
        .expect("JSON missing 'files' array")
        .iter()
        .map(|f| f.as_str().unwrap())
        .collect();
    files.sort_unstable();

    let mut expected: Vec<PathBuf> = ["helpers.js", "main.js", "util.js"]
        .iter()
        .map(|f| root.join(f))
        .collect();
    expected.sort();
    let expected: Vec<&str> = expected.iter().map(|p| p.to_str().unwrap()).collect();
    assert_eq!(files, expected);
}

#[test]
fn test_list_deps_plain_lists_one_path_per_line() {
    let (_dir, root) = project();
    let stdout = run_success(&root, &["--config", "main.js", "--list-deps"]);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 3, "stdout: {stdout}");
    assert!(lines.iter().all(|l| !l.contains("lodash")));
}

#[test]
fn test_list_deps_detects_entry_from_command() {
    let (_dir, root) = project();
    fs::write(root.join("webpack.config.js"), "module.exports = require('./main');\n").unwrap();
    let stdout = run_success(&root, &["--list-deps", "webpack", "--watch"]);
    assert_eq!(stdout.lines().count(), 4, "stdout: {stdout}");
}

#[test]
fn test_list_deps_without_entry_fails() {
    let (_dir, root) = project();
    let (_, stderr) = run_failure(&root, &["--list-deps"]);
    assert!(stderr.contains("no configuration file"), "stderr: {stderr}");
}

#[test]
fn test_syntax_error_reports_file_and_line() {
    let (_dir, root) = project();
    fs::write(root.join("a.js"), "require('./b');\n").unwrap();
    fs::write(root.join("b.js"), "module.exports = {\n  mode: 'development',,\n};\n").unwrap();

    let (_, stderr) = run_failure(&root, &["--config", "a.js", "--list-deps"]);
    assert!(stderr.contains("b.js:2:"), "stderr: {stderr}");
}

// ---------------------------------------------------------------------------
// Running commands
// ---------------------------------------------------------------------------

#[test]
fn test_startup_syntax_error_does_not_run_command() {
    let (_dir, root) = project();
    fs::write(root.join("util.js"), "require('./helpers.js'\n").unwrap();

    let (_, stderr) = run_failure(&root, &["--config", "main.js", "touch", "ran"]);
    assert!(stderr.contains("util.js:1:"), "stderr: {stderr}");
    assert!(!root.join("ran").exists(), "command must not start");
}

#[test]
fn test_unrecognized_command_runs_directly() {
    let (_dir, root) = project();
    run_success(&root, &["touch", "ran"]);
    assert!(root.join("ran").exists());
}

#[test]
fn test_unrecognized_command_exit_code_is_propagated() {
    let (_dir, root) = project();
    let (code, _) = run_failure(&root, &["exit", "5"]);
    assert_eq!(code, Some(5));
}

#[test]
fn test_watched_command_failing_on_its_own_exits_non_zero() {
    let (_dir, root) = project();
    let (code, stderr) = run_failure(&root, &["--config", "main.js", "false"]);
    assert_eq!(code, Some(1));
    assert!(stderr.contains("command failed"), "stderr: {stderr}");
}

#[test]
fn test_config_file_adds_recognized_commands() {
    let (_dir, root) = project();
    fs::write(root.join("webpack.config.js"), "require('./main.js');\n").unwrap();
    fs::write(root.join("wc-reload.toml"), "commands = [\"false\"]\n").unwrap();

    // `false` is now a build tool: it is watched, and its failure ends the session.
    let (code, stderr) = run_failure(&root, &["false"]);
    assert_eq!(code, Some(1));
    assert!(stderr.contains("watching configuration dependencies"), "stderr: {stderr}");
}

// ---------------------------------------------------------------------------
// Terminal
// ---------------------------------------------------------------------------

/// True when util-linux `script` is available to give the binary a pseudo-terminal.
fn has_script() -> bool {
    Command::new("script")
        .arg("--version")
        .output()
        .is_ok_and(|out| out.status.success())
}

#[test]
fn test_child_reads_from_controlling_terminal() {
    if !has_script() {
        eprintln!("skipping: `script` not available");
        return;
    }
    use std::io::Write;
    use std::process::Stdio;
    use std::time::{Duration, Instant};

    let (_dir, root) = project();
    let out_file = root.join("out.txt");
    let inner = format!(
        "'{}' --config main.js 'read x; echo GOT:$x > out.txt; sleep 30'",
        binary().display()
    );

    let mut session = Command::new("script")
        .args(["-qec", &inner, "/dev/null"])
        .current_dir(&root)
        .env_remove("RUST_LOG")
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("failed to start script");
    let mut stdin = session.stdin.take().unwrap();

    // Give wc-reload time to resolve and spawn before typing.
    std::thread::sleep(Duration::from_millis(500));
    stdin.write_all(b"hello\n").unwrap();
    stdin.flush().unwrap();

    let deadline = Instant::now() + Duration::from_secs(10);
    let mut got = String::new();
    while Instant::now() < deadline {
        got = fs::read_to_string(&out_file).unwrap_or_default();
        if got.contains("GOT:") {
            break;
        }
        std::thread::sleep(Duration::from_millis(50));
    }

    // Closing the pty hangs up the whole session.
    let _ = session.kill();
    let _ = session.wait();
    assert_eq!(got.trim(), "GOT:hello");
}
