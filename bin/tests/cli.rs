//! End-to-end CLI tests that spawn the real binary.
//!
//! Network-dependent commands point at a closed loopback port so they
//! fail fast and deterministically.

use std::path::Path;
use std::process::{Command, Output, Stdio};

use tempfile::TempDir;

// Nothing listens here; connections are refused immediately.
const DEAD_BACKEND: &str = "http://127.0.0.1:59987";

struct CliResult {
    success: bool,
    exit_code: Option<i32>,
    stdout: String,
    stderr: String,
}

impl From<Output> for CliResult {
    fn from(output: Output) -> Self {
        Self {
            success: output.status.success(),
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        }
    }
}

/// Run the binary with a scrubbed environment so ambient `CONFAB_*`
/// variables and a stray `confab.yaml` cannot leak into assertions.
fn run_confab(workdir: &Path, args: &[&str]) -> CliResult {
    let output = Command::new(env!("CARGO_BIN_EXE_confab"))
        .args(args)
        .current_dir(workdir)
        .env_remove("CONFAB_CONFIG")
        .env_remove("CONFAB_BACKEND_URL")
        .env_remove("CONFAB_STREAMING")
        .env_remove("CONFAB_STREAM_TIMEOUT_SECS")
        .env_remove("CONFAB_POLL_SECS")
        .env_remove("CONFAB_SHOW_THINKING")
        .env_remove("CONFAB_MAX_ENTRIES")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .expect("binary should spawn");
    CliResult::from(output)
}

#[test]
fn test_help_lists_commands() {
    let dir = TempDir::new().expect("tempdir");
    let result = run_confab(dir.path(), &["--help"]);
    assert!(result.success);
    for command in ["chat", "send", "history", "reset", "status", "sessions"] {
        assert!(
            result.stdout.contains(command),
            "help missing {command}: {}",
            result.stdout
        );
    }
}

#[test]
fn test_version_prints_binary_name() {
    let dir = TempDir::new().expect("tempdir");
    let result = run_confab(dir.path(), &["--version"]);
    assert!(result.success);
    assert!(result.stdout.contains("confab"));
}

#[test]
fn test_status_succeeds_with_unreachable_backend() {
    let dir = TempDir::new().expect("tempdir");
    let result = run_confab(dir.path(), &["--backend-url", DEAD_BACKEND, "status"]);
    assert!(result.success, "stderr: {}", result.stderr);
    assert!(result.stdout.contains(DEAD_BACKEND));
    assert!(
        result.stdout.contains("unreachable"),
        "stdout: {}",
        result.stdout
    );
}

#[test]
fn test_status_reads_config_file() {
    let dir = TempDir::new().expect("tempdir");
    let config_path = dir.path().join("custom.yaml");
    std::fs::write(
        &config_path,
        concat!(
            "backend:\n",
            "  base_url: \"http://127.0.0.1:59986\"\n",
            "streaming:\n",
            "  enabled: false\n",
            "polling:\n",
            "  interval_secs: 0\n",
        ),
    )
    .expect("write config");

    let result = run_confab(
        dir.path(),
        &["--config", config_path.to_str().expect("utf-8 path"), "status"],
    );
    assert!(result.success, "stderr: {}", result.stderr);
    assert!(result.stdout.contains("http://127.0.0.1:59986"));
    assert!(result.stdout.contains("Streaming:      disabled"));
    assert!(result.stdout.contains("Polling:        disabled"));
}

#[test]
fn test_history_fails_cleanly_without_backend() {
    let dir = TempDir::new().expect("tempdir");
    let result = run_confab(dir.path(), &["--backend-url", DEAD_BACKEND, "history"]);
    assert!(!result.success);
    assert_eq!(result.exit_code, Some(1));
    assert!(
        result.stderr.contains("Error:"),
        "stderr: {}",
        result.stderr
    );
}

#[test]
fn test_send_requires_message_argument() {
    let dir = TempDir::new().expect("tempdir");
    let result = run_confab(dir.path(), &["send"]);
    assert!(!result.success);
    assert!(
        result.stderr.contains("--message") || result.stderr.contains("required"),
        "stderr: {}",
        result.stderr
    );
}

#[test]
fn test_missing_config_file_is_an_error() {
    let dir = TempDir::new().expect("tempdir");
    let result = run_confab(
        dir.path(),
        &["--config", "does-not-exist.yaml", "status"],
    );
    assert!(!result.success);
    assert_eq!(result.exit_code, Some(1));
    assert!(
        result.stderr.contains("Error:"),
        "stderr: {}",
        result.stderr
    );
}
