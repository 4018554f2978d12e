//! End-to-end config loading through the CLI: files, overrides and env.

use std::path::PathBuf;
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn write_config(name: &str, contents: &str) -> std::io::Result<PathBuf> {
    let unique = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("insight-e2e-config-{unique}"));
    std::fs::create_dir_all(&dir)?;
    let path = dir.join(name);
    std::fs::write(&path, contents)?;
    Ok(path)
}

fn insight(args: &[&str], env: &[(&str, &str)]) -> std::io::Result<Output> {
    let mut command = Command::new(env!("CARGO_BIN_EXE_insight"));
    for (key, _) in std::env::vars() {
        if key.starts_with("INSIGHT_") {
            command.env_remove(key);
        }
    }
    command.args(args).envs(env.iter().copied()).output()
}

fn show_json(
    args: &[&str],
    env: &[(&str, &str)],
) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    let mut full = vec!["--output", "json", "config", "show"];
    full.extend_from_slice(args);
    let output = insight(&full, env)?;
    if !output.status.success() {
        let stdout = String::from_utf8_lossy(&output.stdout);
        return Err(format!("config show failed: {stdout}").into());
    }
    let value: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    Ok(value["effectiveConfig"].clone())
}

#[test]
fn defaults_are_reported_without_a_file() -> TestResult {
    let config = show_json(&[], &[])?;
    assert_eq!(config["version"], 1);
    assert_eq!(config["remote"]["apiBaseUrl"], "http://127.0.0.1:8000");
    assert_eq!(config["sync"]["maxBatchBytes"], 10 * 1024 * 1024);
    assert_eq!(config["sync"]["ignoreFileName"], ".insightignore");
    Ok(())
}

#[test]
fn toml_file_then_overrides_then_env() -> TestResult {
    let path = write_config(
        "insight.toml",
        "version = 1\n\n\
         [remote]\napiBaseUrl = \"https://index.example.com\"\ntimeoutMs = 5000\n\n\
         [sync]\nmaxBatchBytes = 4096\n",
    )?;
    let path = path.to_string_lossy().into_owned();

    let from_file = show_json(&["--config", &path], &[])?;
    assert_eq!(from_file["remote"]["apiBaseUrl"], "https://index.example.com");
    assert_eq!(from_file["sync"]["maxBatchBytes"], 4096);

    let overridden = show_json(
        &["--config", &path, "--overrides-json", r#"{"sync":{"maxBatchBytes":8192}}"#],
        &[("INSIGHT_REMOTE_TIMEOUT_MS", "7000")],
    )?;
    assert_eq!(overridden["sync"]["maxBatchBytes"], 8192);
    assert_eq!(overridden["remote"]["timeoutMs"], 7000);
    Ok(())
}

#[test]
fn json_file_is_accepted() -> TestResult {
    let path = write_config(
        "insight.json",
        r#"{"version":1,"state":{"storage":"custom:/var/lib/insight"}}"#,
    )?;
    let output = insight(&["config", "check", "--config", &path.to_string_lossy()], &[])?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "config check failed: {stdout}");
    assert!(stdout.starts_with("status: ok\nconfig: ok\n"));
    Ok(())
}

#[test]
fn text_show_renders_toml() -> TestResult {
    let output = insight(&["--no-progress", "config", "show"], &[])?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success());
    assert!(stdout.contains("[remote]"));
    assert!(stdout.contains("[state]"));
    assert!(output.stderr.is_empty());
    Ok(())
}

#[test]
fn unknown_fields_are_rejected() -> TestResult {
    let path = write_config("insight.json", r#"{"version":1,"remote":{"apiKey":"x"}}"#)?;
    let output = insight(&["config", "check", "--config", &path.to_string_lossy()], &[])?;
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stdout).contains("status: error"));
    Ok(())
}

#[test]
fn out_of_range_env_value_is_rejected() -> TestResult {
    let output = insight(
        &["--output", "json", "config", "check"],
        &[("INSIGHT_SYNC_MAX_BATCH_BYTES", "0")],
    )?;
    assert_eq!(output.status.code(), Some(2));
    let value: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(value["status"], "error");
    assert_eq!(value["error"]["kind"], "EXPECTED");
    Ok(())
}

#[test]
fn invalid_overrides_json_is_rejected() -> TestResult {
    let output = insight(&["config", "check", "--overrides-json", "{not json"], &[])?;
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stdout).contains("status: error"));
    Ok(())
}
