//! Status command handler.

use crate::error::{CliError, ExitCode};
use crate::format::OutputMode;
use crate::{CliOutput, format_error_output, to_json_line, to_pretty_json};
use insight_infra::{LocalStatus, read_status_local};
use std::path::Path;

/// Run the status command.
pub fn run_status(
    mode: OutputMode,
    config_path: Option<&Path>,
    overrides_json: Option<&str>,
    root: &Path,
) -> Result<CliOutput, CliError> {
    match read_status_local(config_path, overrides_json, root) {
        Ok(status) => format_status_output(mode, &status),
        Err(error) => Ok(format_error_output(mode, &error)),
    }
}

fn format_status_output(mode: OutputMode, status: &LocalStatus) -> Result<CliOutput, CliError> {
    let stdout = if mode.is_ndjson() {
        let mut payload = status_json(status);
        if let serde_json::Value::Object(map) = &mut payload {
            map.insert("type".to_owned(), "summary".into());
        }
        to_json_line(&payload)?
    } else if mode.is_json() {
        to_pretty_json(&status_json(status))?
    } else {
        format_status_text(status)
    };

    Ok(CliOutput {
        stdout,
        stderr: String::new(),
        exit_code: ExitCode::Ok,
    })
}

fn status_json(status: &LocalStatus) -> serde_json::Value {
    serde_json::json!({
        "status": "ok",
        "kind": "status",
        "root": status.root.to_string_lossy(),
        "markerDir": status.marker_dir.to_string_lossy(),
        "repository": {
            "state": status.status.status,
            "repositoryId": status.status.repository_id.as_ref().map(|id| id.as_str()),
            "trackedFiles": status.status.tracked_files,
            "reason": status.status.reason,
        },
    })
}

fn format_status_text(status: &LocalStatus) -> String {
    let mut out = String::new();
    out.push_str("status: ");
    out.push_str(status.status.status);
    out.push('\n');
    out.push_str("root: ");
    out.push_str(&status.root.to_string_lossy());
    out.push('\n');
    out.push_str("markerDir: ");
    out.push_str(&status.marker_dir.to_string_lossy());
    out.push('\n');
    if let Some(repository_id) = status.status.repository_id.as_ref() {
        out.push_str("repositoryId: ");
        out.push_str(repository_id.as_str());
        out.push('\n');
        out.push_str("trackedFiles: ");
        out.push_str(&status.status.tracked_files.to_string());
        out.push('\n');
    }
    if let Some(reason) = status.status.reason.as_deref() {
        out.push_str("reason: ");
        out.push_str(reason);
        out.push('\n');
    }
    out
}
