//! Version command handler.

use crate::CliOutput;
use crate::error::{CliError, ExitCode};
use crate::format::OutputMode;
use crate::{to_json_line, to_pretty_json};
use insight_app::app_crate_version;
use insight_infra::infra_crate_version;

const BIN_NAME: &str = env!("CARGO_BIN_NAME");
const CLI_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Run the version command.
pub fn run_version(mode: OutputMode) -> Result<CliOutput, CliError> {
    let payload = serde_json::json!({
        "status": "ok",
        "name": BIN_NAME,
        "version": CLI_VERSION,
        "appVersion": app_crate_version(),
        "infraVersion": infra_crate_version(),
    });

    let stdout = if mode.is_ndjson() {
        let mut payload = payload;
        if let serde_json::Value::Object(map) = &mut payload {
            map.insert("type".to_owned(), "summary".into());
            map.insert("kind".to_owned(), "version".into());
        }
        to_json_line(&payload)?
    } else if mode.is_json() {
        to_pretty_json(&payload)?
    } else {
        format!("{BIN_NAME} {CLI_VERSION}\n")
    };

    Ok(CliOutput {
        stdout,
        stderr: String::new(),
        exit_code: ExitCode::Ok,
    })
}
