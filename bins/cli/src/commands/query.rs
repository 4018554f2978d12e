//! Query command handler.

use crate::error::{CliError, ExitCode};
use crate::format::OutputMode;
use crate::{CliOutput, format_error_output, to_json_line, to_pretty_json};
use insight_app::QueryRepositoryOutput;
use insight_domain::QueryMatch;
use insight_infra::run_query_local;
use std::path::Path;

/// Inputs for query command execution.
pub struct QueryCommandInput<'a> {
    pub config_path: Option<&'a Path>,
    pub overrides_json: Option<&'a str>,
    pub root: &'a Path,
    pub query: &'a str,
}

/// Run the query command.
pub fn run_query(mode: OutputMode, input: &QueryCommandInput<'_>) -> Result<CliOutput, CliError> {
    match run_query_local(input.config_path, input.overrides_json, input.root, input.query) {
        Ok(output) => format_query_output(mode, &output),
        Err(error) => Ok(format_error_output(mode, &error)),
    }
}

fn format_query_output(
    mode: OutputMode,
    output: &QueryRepositoryOutput,
) -> Result<CliOutput, CliError> {
    let stdout = if mode.is_ndjson() {
        format_query_ndjson(output)?
    } else if mode.is_json() {
        to_pretty_json(&serde_json::json!({
            "status": "ok",
            "repositoryId": output.repository_id.as_str(),
            "matches": output.matches.iter().map(match_json).collect::<Vec<_>>(),
        }))?
    } else {
        format_query_text(&output.matches)
    };

    Ok(CliOutput {
        stdout,
        stderr: String::new(),
        exit_code: ExitCode::Ok,
    })
}

fn match_json(found: &QueryMatch) -> serde_json::Value {
    serde_json::json!({
        "path": found.path.as_ref(),
        "startLine": found.span.start_line(),
        "endLine": found.span.end_line(),
        "content": found.content.as_ref(),
    })
}

fn format_query_ndjson(output: &QueryRepositoryOutput) -> Result<String, CliError> {
    let mut out = String::new();
    for found in &output.matches {
        let mut payload = match_json(found);
        if let serde_json::Value::Object(map) = &mut payload {
            map.insert("type".to_owned(), "match".into());
        }
        out.push_str(&to_json_line(&payload)?);
    }
    out.push_str(&to_json_line(&serde_json::json!({
        "type": "summary",
        "status": "ok",
        "kind": "query",
        "repositoryId": output.repository_id.as_str(),
        "count": output.matches.len(),
    }))?);
    Ok(out)
}

fn format_query_text(matches: &[QueryMatch]) -> String {
    let mut out = match matches.len() {
        0 => "0 matches found\n".to_owned(),
        1 => "1 match found in the following file:\n".to_owned(),
        count => format!("{count} matches found in the following files:\n"),
    };
    for (index, found) in matches.iter().enumerate() {
        if index > 0 {
            out.push('\n');
        }
        out.push_str(&found.path);
        out.push_str("\n\t");
        out.push_str(&found.span.to_string());
        out.push_str(": ");
        out.push_str(&found.content);
        out.push('\n');
    }
    out
}
