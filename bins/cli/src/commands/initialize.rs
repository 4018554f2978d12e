//! Initialize command handler.

use crate::error::{CliError, ExitCode};
use crate::format::OutputMode;
use crate::{CliOutput, format_error_output, log_warning, to_json_line, to_pretty_json};
use insight_app::{InitializeRepositoryOutput, ReinitializeRepositoryOutput, SyncOutcome};
use insight_infra::run_sync_local;
use std::path::Path;

/// Run the initialize command: a first upload, or a delta sync when the
/// repository already carries a marker.
pub fn run_initialize(
    mode: OutputMode,
    config_path: Option<&Path>,
    overrides_json: Option<&str>,
    root: &Path,
) -> Result<CliOutput, CliError> {
    match run_sync_local(config_path, overrides_json, root) {
        Ok(outcome) => format_initialize_output(mode, root, &outcome),
        Err(error) => Ok(format_error_output(mode, &error)),
    }
}

fn format_initialize_output(
    mode: OutputMode,
    root: &Path,
    outcome: &SyncOutcome,
) -> Result<CliOutput, CliError> {
    let payload = summary_json(root, outcome);
    let stdout = if mode.is_ndjson() {
        let mut payload = payload;
        if let serde_json::Value::Object(map) = &mut payload {
            map.insert("type".to_owned(), "summary".into());
        }
        to_json_line(&payload)?
    } else if mode.is_json() {
        to_pretty_json(&payload)?
    } else {
        format_initialize_text(root, outcome)
    };

    let mut stderr = String::new();
    let warnings = match outcome {
        SyncOutcome::Initialized(output) => &output.warnings,
        SyncOutcome::Reinitialized(output) => &output.warnings,
    };
    for warning in warnings {
        log_warning(
            &mut stderr,
            &format!(
                "skipped {} ({}): {}",
                warning.path,
                warning.kind.as_str(),
                warning.detail
            ),
            mode.no_progress,
        );
    }

    Ok(CliOutput {
        stdout,
        stderr,
        exit_code: ExitCode::Ok,
    })
}

fn summary_json(root: &Path, outcome: &SyncOutcome) -> serde_json::Value {
    match outcome {
        SyncOutcome::Initialized(InitializeRepositoryOutput {
            repository_id,
            files,
            batches,
            bytes,
            warnings,
        }) => serde_json::json!({
            "status": "ok",
            "kind": "initialize",
            "root": root.to_string_lossy(),
            "repositoryId": repository_id.as_str(),
            "files": files,
            "batches": batches,
            "bytes": bytes,
            "warnings": warnings.len(),
        }),
        SyncOutcome::Reinitialized(ReinitializeRepositoryOutput {
            repository_id,
            added,
            updated,
            deleted,
            batches,
            bytes,
            warnings,
        }) => serde_json::json!({
            "status": "ok",
            "kind": "reinitialize",
            "root": root.to_string_lossy(),
            "repositoryId": repository_id.as_str(),
            "added": added,
            "updated": updated,
            "deleted": deleted,
            "batches": batches,
            "bytes": bytes,
            "warnings": warnings.len(),
        }),
    }
}

fn format_initialize_text(root: &Path, outcome: &SyncOutcome) -> String {
    match outcome {
        SyncOutcome::Initialized(_) => {
            format!("Initialized insight repository in {}\n", root.display())
        },
        SyncOutcome::Reinitialized(_) => "Reinitialized existing insight repository.\n".to_owned(),
    }
}
