//! Integration tests for where the CLI sends its logs.
//!
//! Command output owns stdout; logs go to stderr unless a file is requested.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

const MANIFEST: &str = r#"
[[plugin]]
id = "collect"
order = 0.0

[[plugin.create]]
id = "X"

[[plugin]]
id = "validate"
order = 1.0
instance_enabled = true
"#;

fn pubflow(temp_dir: &TempDir, args: &[&str]) -> Output {
    let home = temp_dir.path().join("home");
    let config_home = temp_dir.path().join("config");
    let workspace = temp_dir.path().join("ws");
    fs::create_dir_all(&home).unwrap();
    fs::create_dir_all(&config_home).unwrap();
    fs::create_dir_all(&workspace).unwrap();
    fs::write(workspace.join("pipeline.toml"), MANIFEST).unwrap();

    Command::new(env!("CARGO_BIN_EXE_pubflow"))
        .env("HOME", home.as_os_str())
        .env("XDG_CONFIG_HOME", config_home.as_os_str())
        .env_remove("PUBFLOW_LOG")
        .env_remove("PUBFLOW_LOG_FORMAT")
        .env_remove("PUBFLOW_LOG_OUTPUT")
        .arg("--workspace")
        .arg(&workspace)
        .args(args)
        .output()
        .unwrap()
}

fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap_or_default()
}

#[test]
fn test_default_logging_goes_to_stderr() {
    let temp_dir = TempDir::new().unwrap();
    let output = pubflow(&temp_dir, &["plan", "--manifest", "pipeline.toml"]);

    assert!(
        output.status.success(),
        "pubflow plan should succeed: stderr={:?}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stdout.contains("group 0 (collect)"), "stdout: {}", stdout);
    assert!(!stdout.contains("Pubflow CLI starting"));
    assert!(stderr.contains("Pubflow CLI starting"), "stderr: {}", stderr);
}

#[test]
fn test_file_output_keeps_stderr_quiet() {
    let temp_dir = TempDir::new().unwrap();
    let log_path = temp_dir.path().join("logs").join("pubflow.log");
    let output = pubflow(
        &temp_dir,
        &[
            "--log-output",
            "file",
            "--log-file",
            log_path.to_str().unwrap(),
            "run",
            "--manifest",
            "pipeline.toml",
        ],
    );

    assert!(output.status.success());
    assert!(log_path.exists(), "log file should exist at {}", log_path.display());
    let content = read(&log_path);
    assert!(content.contains("Pubflow CLI starting"), "log: {}", content);
    assert!(content.contains("Run finished"));
    assert!(!String::from_utf8_lossy(&output.stderr).contains("Pubflow CLI starting"));
    assert!(String::from_utf8_lossy(&output.stdout).contains("ok   validate @ X"));
}

#[test]
fn test_json_file_logging_is_one_object_per_line() {
    let temp_dir = TempDir::new().unwrap();
    let log_path = temp_dir.path().join("pubflow.jsonl");
    let output = pubflow(
        &temp_dir,
        &[
            "--log-format",
            "json",
            "--log-output",
            "file",
            "--log-file",
            log_path.to_str().unwrap(),
            "plan",
            "--manifest",
            "pipeline.toml",
        ],
    );

    assert!(output.status.success());
    let content = read(&log_path);
    assert!(!content.is_empty());
    for line in content.lines() {
        let value: serde_json::Value = serde_json::from_str(line)
            .unwrap_or_else(|e| panic!("not json ({}): {}", e, line));
        assert!(value.get("level").is_some());
    }
}

#[test]
fn test_unknown_log_output_fails_fast() {
    let temp_dir = TempDir::new().unwrap();
    let output = pubflow(
        &temp_dir,
        &["--log-output", "syslog", "plan", "--manifest", "pipeline.toml"],
    );

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Failed to initialize logging"));
}
