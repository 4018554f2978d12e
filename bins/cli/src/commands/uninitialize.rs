//! Uninitialize command handler.

use crate::error::{CliError, ExitCode};
use crate::format::OutputMode;
use crate::{CliOutput, format_error_output, to_json_line, to_pretty_json};
use insight_infra::run_uninitialize_local;
use std::path::Path;

/// Run the uninitialize command. Only the local marker is removed.
pub fn run_uninitialize(
    mode: OutputMode,
    config_path: Option<&Path>,
    overrides_json: Option<&str>,
    root: &Path,
) -> Result<CliOutput, CliError> {
    let output = match run_uninitialize_local(config_path, overrides_json, root) {
        Ok(output) => output,
        Err(error) => return Ok(format_error_output(mode, &error)),
    };

    let stdout = if mode.is_ndjson() {
        to_json_line(&serde_json::json!({
            "type": "summary",
            "status": "ok",
            "kind": "uninitialize",
            "root": root.to_string_lossy(),
            "wasCorrupted": output.was_corrupted,
        }))?
    } else if mode.is_json() {
        to_pretty_json(&serde_json::json!({
            "status": "ok",
            "root": root.to_string_lossy(),
            "wasCorrupted": output.was_corrupted,
        }))?
    } else if output.was_corrupted {
        format!(
            "Removed corrupted insight marker from {}\n",
            root.display()
        )
    } else {
        format!("Uninitialized insight repository in {}\n", root.display())
    };

    Ok(CliOutput {
        stdout,
        stderr: String::new(),
        exit_code: ExitCode::Ok,
    })
}
