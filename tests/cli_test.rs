//! Integration tests for the `betabuild` binary.
//!
//! Only commands that need neither network access nor a Go toolchain are
//! exercised here.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn get_betabuild_binary() -> PathBuf {
    let mut path = std::env::current_exe().expect("Failed to locate current test exe");
    path.pop();
    path.pop();
    if cfg!(windows) {
        path.join("betabuild.exe")
    } else {
        path.join("betabuild")
    }
}

fn run_betabuild(dir: &Path, args: &[&str]) -> Option<Output> {
    let bin = get_betabuild_binary();
    if !bin.exists() {
        eprintln!("Skipping: betabuild binary not found at {:?}", bin);
        return None;
    }

    Some(
        Command::new(bin)
            .current_dir(dir)
            .args(args)
            .env("NO_COLOR", "1")
            .env_remove("BETABUILD_CONFIG")
            .env_remove("BETABUILD_OUTPUT_DIR")
            .env_remove("BETABUILD_CHECKOUT")
            .env_remove("BETABUILD_URL")
            .env_remove("BETABUILD_WORKERS")
            .output()
            .expect("Failed to execute betabuild"),
    )
}

fn write_config(dir: &Path) {
    let config = format!(
        r#"[repository]
checkout = "{checkout}"

[output]
dir = "{output}"

[state]
marker = "{marker}"
"#,
        checkout = dir.join("restic.git").display(),
        output = dir.join("www").display(),
        marker = dir.join("commit.current").display(),
    );
    fs::write(dir.join("betabuild.toml"), config).expect("Failed to write betabuild.toml");
}

#[test]
fn test_targets_lists_matrix() {
    let dir = tempfile::tempdir().unwrap();
    write_config(dir.path());
    let Some(output) = run_betabuild(dir.path(), &["targets", "--version", "v0.9.6"]) else {
        return;
    };

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("openbsd"));
    assert!(stdout.contains("restic_v0.9.6_windows_amd64.exe"));
    assert!(stdout.contains("restic-v0.9.6"));
}

#[test]
fn test_status_json_before_first_run() {
    let dir = tempfile::tempdir().unwrap();
    write_config(dir.path());
    let Some(output) = run_betabuild(dir.path(), &["status", "--json"]) else {
        return;
    };

    assert!(output.status.success());
    let status: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(status["checkout_exists"], false);
    assert_eq!(status["marker"], "");
    assert_eq!(status["runs"].as_array().map(Vec::len), Some(0));
}

#[test]
fn test_invalid_config_exits_non_zero() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("betabuild.toml"),
        "[schedule]\npoll_interval_secs = 30\nretry_delay_secs = 300\n",
    )
    .unwrap();
    let Some(output) = run_betabuild(dir.path(), &["targets"]) else {
        return;
    };

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("retry_delay_secs"));
}

#[test]
fn test_build_without_checkout_fails() {
    let dir = tempfile::tempdir().unwrap();
    write_config(dir.path());
    let Some(output) = run_betabuild(dir.path(), &["build", "--version", "v1.0.0"]) else {
        return;
    };

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("No checkout"));
    assert!(!dir.path().join("www").exists());
}

#[test]
fn test_zero_workers_override_rejected() {
    let dir = tempfile::tempdir().unwrap();
    write_config(dir.path());
    let Some(output) = run_betabuild(dir.path(), &["--workers", "0", "status"]) else {
        return;
    };

    assert!(!output.status.success());
}
