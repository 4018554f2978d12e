//! CLI integration tests that need no remote service.

use std::path::PathBuf;
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

const OFFLINE_OVERRIDES: &str = r#"{"remote":{"apiBaseUrl":"http://127.0.0.1:9"}}"#;

fn cli() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_insight"));
    scrub_scoped_env(&mut command);
    command
}

fn scrub_scoped_env(command: &mut Command) {
    for (key, _) in std::env::vars() {
        if key.starts_with("INSIGHT_") {
            command.env_remove(key);
        }
    }
}

fn temp_repo(label: &str) -> std::io::Result<PathBuf> {
    let unique = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("insight-cli-{label}-{unique}"));
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

#[test]
fn cli_version_flag_runs() -> std::io::Result<()> {
    let output = cli().arg("--version").output()?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(output.status.success(), "--version failed: {stderr}");
    assert!(stdout.starts_with("insight "));
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
    Ok(())
}

#[test]
fn cli_version_command_json() -> std::io::Result<()> {
    let output = cli().args(["--output", "json", "version"]).output()?;
    assert!(output.status.success());

    let value: serde_json::Value =
        serde_json::from_slice(&output.stdout).map_err(std::io::Error::other)?;
    assert_eq!(value.get("status").and_then(|v| v.as_str()), Some("ok"));
    assert_eq!(
        value.get("version").and_then(|v| v.as_str()),
        Some(env!("CARGO_PKG_VERSION"))
    );
    Ok(())
}

#[test]
fn cli_status_reports_uninitialized() -> std::io::Result<()> {
    let root = temp_repo("status")?;
    let output = cli()
        .arg("status")
        .arg(&root)
        .args(["--overrides-json", OFFLINE_OVERRIDES])
        .output()?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(output.status.success(), "status failed: {stderr}");
    assert!(stdout.starts_with("status: uninitialized\n"));
    assert!(stdout.contains(".insight"));
    Ok(())
}

#[test]
fn cli_status_reports_corrupted_marker() -> std::io::Result<()> {
    let root = temp_repo("status-corrupted")?;
    std::fs::create_dir_all(root.join(".insight"))?;
    std::fs::write(root.join(".insight").join("state.json"), "not json")?;

    let output = cli()
        .args(["--output", "json", "status"])
        .arg(&root)
        .args(["--overrides-json", OFFLINE_OVERRIDES])
        .output()?;
    assert!(output.status.success());

    let value: serde_json::Value =
        serde_json::from_slice(&output.stdout).map_err(std::io::Error::other)?;
    assert_eq!(
        value
            .get("repository")
            .and_then(|repository| repository.get("state"))
            .and_then(|state| state.as_str()),
        Some("corrupted")
    );
    Ok(())
}

#[test]
fn cli_query_without_marker_is_invalid_input() -> std::io::Result<()> {
    let root = temp_repo("query")?;
    let output = cli()
        .args(["query", "find main", "--path"])
        .arg(&root)
        .args(["--overrides-json", OFFLINE_OVERRIDES])
        .output()?;
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert_eq!(output.status.code(), Some(2));
    assert!(stdout.contains("status: error"));
    assert!(stdout.contains("code: repository:not_initialized"));
    Ok(())
}

#[test]
fn cli_uninitialize_without_marker_is_invalid_input() -> std::io::Result<()> {
    let root = temp_repo("uninitialize")?;
    let output = cli()
        .args(["--agent", "uninitialize"])
        .arg(&root)
        .args(["--overrides-json", OFFLINE_OVERRIDES])
        .output()?;

    assert_eq!(output.status.code(), Some(2));
    let value: serde_json::Value =
        serde_json::from_slice(&output.stdout).map_err(std::io::Error::other)?;
    assert_eq!(value.get("type").and_then(|v| v.as_str()), Some("error"));
    assert_eq!(
        value
            .get("error")
            .and_then(|error| error.get("code"))
            .and_then(|code| code.as_str()),
        Some("repository:not_initialized")
    );
    assert!(output.stderr.is_empty());
    Ok(())
}

#[test]
fn cli_initialize_missing_root_is_invalid_input() -> std::io::Result<()> {
    let root = std::env::temp_dir().join("insight-cli-definitely-missing-root");
    let output = cli()
        .arg("initialize")
        .arg(&root)
        .args(["--overrides-json", OFFLINE_OVERRIDES])
        .output()?;
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert_eq!(output.status.code(), Some(2));
    assert!(stdout.contains("code: scan:root_not_found"));
    assert!(!root.join(".insight").exists());
    Ok(())
}

#[test]
fn cli_query_requires_text() -> std::io::Result<()> {
    let output = cli().arg("query").output()?;
    assert!(!output.status.success());
    Ok(())
}
