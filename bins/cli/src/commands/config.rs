//! Config command handlers.

use crate::error::{CliError, ExitCode};
use crate::format::OutputMode;
use crate::{CliOutput, format_error_output, log_info, to_json_line, to_pretty_json};
use insight_infra::{load_effective_config_json, load_effective_config_toml};
use std::collections::BTreeMap;
use std::path::Path;

/// Validate config loading, merging, env overrides and normalization.
pub fn run_config_check(
    mode: OutputMode,
    env: &BTreeMap<String, String>,
    path: Option<&Path>,
    overrides_json: Option<&str>,
) -> Result<CliOutput, CliError> {
    if let Err(error) = load_effective_config_json(env, path, overrides_json) {
        return Ok(format_error_output(mode, &error));
    }

    let mut stderr = String::new();
    log_info(&mut stderr, "config check completed", mode.no_progress);
    let config_path = path.map(|value| value.to_string_lossy().to_string());
    let stdout = if mode.is_ndjson() {
        to_json_line(&serde_json::json!({
            "type": "summary",
            "status": "ok",
            "kind": "config",
            "configPath": config_path,
        }))?
    } else if mode.is_json() {
        to_pretty_json(&serde_json::json!({
            "status": "ok",
            "configPath": config_path,
        }))?
    } else {
        config_path.map_or_else(
            || "status: ok\nconfig: ok\n".to_owned(),
            |path| format!("status: ok\nconfig: ok\npath: {path}\n"),
        )
    };

    Ok(CliOutput {
        stdout,
        stderr,
        exit_code: ExitCode::Ok,
    })
}

/// Show the effective config: TOML for text output, JSON otherwise.
pub fn run_config_show(
    mode: OutputMode,
    env: &BTreeMap<String, String>,
    path: Option<&Path>,
    overrides_json: Option<&str>,
) -> Result<CliOutput, CliError> {
    let stdout = if mode.is_json() || mode.is_ndjson() {
        let config_json = match load_effective_config_json(env, path, overrides_json) {
            Ok(config) => config,
            Err(error) => return Ok(format_error_output(mode, &error)),
        };
        let config_value: serde_json::Value = serde_json::from_str(config_json.trim())?;
        let payload = serde_json::json!({
            "status": "ok",
            "configPath": path.map(|value| value.to_string_lossy().to_string()),
            "effectiveConfig": config_value,
        });
        if mode.is_ndjson() {
            let mut payload = payload;
            if let serde_json::Value::Object(map) = &mut payload {
                map.insert("type".to_owned(), "summary".into());
                map.insert("kind".to_owned(), "config".into());
            }
            to_json_line(&payload)?
        } else {
            to_pretty_json(&payload)?
        }
    } else {
        match load_effective_config_toml(env, path, overrides_json) {
            Ok(config) => config,
            Err(error) => return Ok(format_error_output(mode, &error)),
        }
    };

    let mut stderr = String::new();
    log_info(&mut stderr, "config show completed", mode.no_progress);
    Ok(CliOutput {
        stdout,
        stderr,
        exit_code: ExitCode::Ok,
    })
}
