//! CLI binary entrypoint.

mod commands;
mod error;
mod format;

use clap::{Args, Parser, Subcommand};
use commands::{
    QueryCommandInput, run_config_check, run_config_show, run_initialize, run_query, run_status,
    run_uninitialize, run_version,
};
use error::{CliError, ExitCode};
use format::{OutputArgs, OutputMode};
use insight_shared::{ErrorEnvelope, redact_if_secret};
use std::collections::BTreeMap;
use std::io::{self, Read, Write};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "insight",
    version,
    about = "Sync a local repository with a remote code index",
    long_about = None
)]
struct Cli {
    #[command(flatten)]
    output: OutputArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Args)]
struct ConfigArgs {
    /// Optional config file path (JSON/TOML).
    #[arg(long)]
    config: Option<PathBuf>,
    /// Optional JSON overrides (partial config).
    #[arg(long)]
    overrides_json: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Upload a repository, or sync changes when it is already initialized.
    Initialize {
        /// Repository root (defaults to current directory).
        path: Option<PathBuf>,
        #[command(flatten)]
        config: ConfigArgs,
    },
    /// Query the remote index of an initialized repository.
    Query {
        /// Query text.
        #[arg(required_unless_present = "stdin")]
        query: Option<String>,
        /// Read the query text from stdin.
        #[arg(long, conflicts_with = "query")]
        stdin: bool,
        /// Repository root (defaults to current directory).
        #[arg(long)]
        path: Option<PathBuf>,
        #[command(flatten)]
        config: ConfigArgs,
    },
    /// Remove the local marker. The remote index is left untouched.
    Uninitialize {
        /// Repository root (defaults to current directory).
        path: Option<PathBuf>,
        #[command(flatten)]
        config: ConfigArgs,
    },
    /// Report the local marker state.
    Status {
        /// Repository root (defaults to current directory).
        path: Option<PathBuf>,
        #[command(flatten)]
        config: ConfigArgs,
    },
    /// Config-related commands.
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Show version details.
    Version,
}

#[derive(Debug, Subcommand)]
enum ConfigCommands {
    /// Validate config loading, merging, and normalization.
    Check {
        #[command(flatten)]
        config: ConfigArgs,
    },
    /// Show the effective config after applying overrides.
    Show {
        #[command(flatten)]
        config: ConfigArgs,
    },
}

pub(crate) struct CliOutput {
    stdout: String,
    stderr: String,
    exit_code: ExitCode,
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    let mode = OutputMode::from_args(&cli.output);

    match run(&cli.command, mode) {
        Ok(output) => match write_output(&output) {
            Ok(()) => std::process::ExitCode::from(output.exit_code.as_u8()),
            Err(error) => exit_with_error(&error),
        },
        Err(error) => exit_with_error(&error),
    }
}

fn exit_with_error(error: &CliError) -> std::process::ExitCode {
    let _ = writeln!(io::stderr(), "error: {error}");
    std::process::ExitCode::from(error.exit_code().as_u8())
}

fn run(command: &Commands, mode: OutputMode) -> Result<CliOutput, CliError> {
    match command {
        Commands::Initialize { path, config } => run_initialize(
            mode,
            config.config.as_deref(),
            config.overrides_json.as_deref(),
            &resolve_root(path.as_ref())?,
        ),
        Commands::Query {
            query,
            stdin,
            path,
            config,
        } => {
            let query = resolve_query(*stdin, query.as_deref())?;
            let root = resolve_root(path.as_ref())?;
            run_query(
                mode,
                &QueryCommandInput {
                    config_path: config.config.as_deref(),
                    overrides_json: config.overrides_json.as_deref(),
                    root: &root,
                    query: &query,
                },
            )
        },
        Commands::Uninitialize { path, config } => run_uninitialize(
            mode,
            config.config.as_deref(),
            config.overrides_json.as_deref(),
            &resolve_root(path.as_ref())?,
        ),
        Commands::Status { path, config } => run_status(
            mode,
            config.config.as_deref(),
            config.overrides_json.as_deref(),
            &resolve_root(path.as_ref())?,
        ),
        Commands::Config { command } => {
            let env = collect_scoped_env("INSIGHT_");
            match command {
                ConfigCommands::Check { config } => run_config_check(
                    mode,
                    &env,
                    config.config.as_deref(),
                    config.overrides_json.as_deref(),
                ),
                ConfigCommands::Show { config } => run_config_show(
                    mode,
                    &env,
                    config.config.as_deref(),
                    config.overrides_json.as_deref(),
                ),
            }
        },
        Commands::Version => run_version(mode),
    }
}

pub(crate) fn format_error_output(mode: OutputMode, error: &ErrorEnvelope) -> CliOutput {
    let payload = error_json(error);
    let mut stderr = String::new();
    log_info(&mut stderr, "command failed", mode.no_progress);
    let stdout = if mode.is_ndjson() {
        let payload = serde_json::json!({
            "type": "error",
            "status": "error",
            "error": payload,
        });
        // This is a CLI boundary, so JSON serialization errors are internal.
        to_json_line(&payload).unwrap_or_else(|_| {
            "{\"type\":\"error\",\"status\":\"error\",\"error\":{\"code\":\"core:internal\",\"message\":\"internal error\",\"kind\":\"INVARIANT\"}}\n".to_owned()
        })
    } else if mode.is_json() {
        let payload = serde_json::json!({
            "status": "error",
            "error": payload,
        });
        to_pretty_json(&payload).unwrap_or_else(|_| {
            "{\"status\":\"error\",\"error\":{\"code\":\"core:internal\",\"message\":\"internal error\",\"kind\":\"INVARIANT\"}}\n".to_owned()
        })
    } else {
        format_error_text(error)
    };
    CliOutput {
        stdout,
        stderr,
        exit_code: ExitCode::for_error(error),
    }
}

fn error_json(error: &ErrorEnvelope) -> serde_json::Value {
    let meta: serde_json::Map<String, serde_json::Value> = error
        .metadata
        .iter()
        .map(|(key, value)| (key.clone(), redact_if_secret(key, value).into()))
        .collect();
    let mut payload = serde_json::json!({
        "code": error.code.to_string(),
        "message": error.message,
        "kind": error.kind.as_label(),
        "retriable": error.class.is_retriable(),
    });
    if !meta.is_empty()
        && let serde_json::Value::Object(map) = &mut payload
    {
        map.insert("meta".to_owned(), serde_json::Value::Object(meta));
    }
    payload
}

fn format_error_text(error: &ErrorEnvelope) -> String {
    let mut out = String::new();
    out.push_str("status: error\n");
    out.push_str("code: ");
    out.push_str(&error.code.to_string());
    out.push('\n');
    out.push_str("message: ");
    out.push_str(&error.message);
    out.push('\n');
    out.push_str("kind: ");
    out.push_str(error.kind.as_label());
    out.push('\n');
    if !error.metadata.is_empty() {
        out.push_str("meta:\n");
        for (key, value) in &error.metadata {
            out.push_str("  ");
            out.push_str(key);
            out.push_str(": ");
            out.push_str(&redact_if_secret(key, value));
            out.push('\n');
        }
    }
    out
}

fn resolve_root(path: Option<&PathBuf>) -> Result<PathBuf, CliError> {
    match path {
        Some(value) => Ok(value.clone()),
        None => Ok(std::env::current_dir()?),
    }
}

fn resolve_query(from_stdin: bool, query: Option<&str>) -> Result<String, CliError> {
    if from_stdin {
        return read_stdin_query();
    }
    query
        .map(str::to_owned)
        .ok_or_else(|| CliError::InvalidInput("missing QUERY or --stdin".to_owned()))
}

fn read_stdin_query() -> Result<String, CliError> {
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    let trimmed = buf.trim();
    if trimmed.is_empty() {
        return Err(CliError::InvalidInput("stdin query is empty".to_owned()));
    }
    Ok(trimmed.to_owned())
}

pub(crate) fn log_info(stderr: &mut String, message: &str, no_progress: bool) {
    if no_progress {
        return;
    }
    stderr.push_str("info: ");
    stderr.push_str(message);
    stderr.push('\n');
}

pub(crate) fn log_warning(stderr: &mut String, message: &str, no_progress: bool) {
    if no_progress {
        return;
    }
    stderr.push_str("warning: ");
    stderr.push_str(message);
    stderr.push('\n');
}

pub(crate) fn to_json_line(payload: &serde_json::Value) -> Result<String, CliError> {
    let mut out = serde_json::to_string(payload)?;
    out.push('\n');
    Ok(out)
}

pub(crate) fn to_pretty_json(payload: &serde_json::Value) -> Result<String, CliError> {
    let mut out = serde_json::to_string_pretty(payload)?;
    out.push('\n');
    Ok(out)
}

fn write_output(output: &CliOutput) -> Result<(), CliError> {
    let mut stdout = io::stdout();
    stdout.write_all(output.stdout.as_bytes())?;
    if !output.stderr.is_empty() {
        let mut stderr = io::stderr();
        stderr.write_all(output.stderr.as_bytes())?;
        stderr.flush()?;
    }
    Ok(())
}

fn collect_scoped_env(prefix: &str) -> BTreeMap<String, String> {
    std::env::vars()
        .filter(|(key, _)| key.starts_with(prefix))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use insight_shared::ErrorCode;

    #[test]
    fn version_flag_is_supported() {
        let result = Cli::command().try_get_matches_from(["insight", "--version"]);
        let is_version = matches!(
            result,
            Err(error) if error.kind() == clap::error::ErrorKind::DisplayVersion
        );
        assert!(is_version, "expected clap to render version");
    }

    #[test]
    fn query_takes_positional_text_and_path() -> Result<(), Box<dyn std::error::Error>> {
        let cli =
            Cli::try_parse_from(["insight", "query", "where is main", "--path", "/tmp/repo"])?;
        let Commands::Query {
            query, stdin, path, ..
        } = cli.command
        else {
            return Err("expected query command".into());
        };
        assert_eq!(query.as_deref(), Some("where is main"));
        assert!(!stdin);
        assert_eq!(path, Some(PathBuf::from("/tmp/repo")));
        Ok(())
    }

    #[test]
    fn query_requires_text_or_stdin() {
        assert!(Cli::try_parse_from(["insight", "query"]).is_err());
        assert!(Cli::try_parse_from(["insight", "query", "--stdin"]).is_ok());
        assert!(Cli::try_parse_from(["insight", "query", "text", "--stdin"]).is_err());
    }

    #[test]
    fn initialize_accepts_optional_path_and_config() -> Result<(), Box<dyn std::error::Error>> {
        let cli = Cli::try_parse_from([
            "insight",
            "--output",
            "json",
            "initialize",
            "/tmp/repo",
            "--config",
            "/tmp/insight.toml",
        ])?;
        assert_eq!(cli.output.output, Some(format::OutputFormat::Json));
        let Commands::Initialize { path, config } = cli.command else {
            return Err("expected initialize command".into());
        };
        assert_eq!(path, Some(PathBuf::from("/tmp/repo")));
        assert_eq!(config.config, Some(PathBuf::from("/tmp/insight.toml")));
        Ok(())
    }

    #[test]
    fn error_formatting_redacts_sensitive_meta_keys() {
        let error = ErrorEnvelope::expected(ErrorCode::new("remote", "request_failed"), "bad")
            .with_metadata("sessionId", "abc123")
            .with_metadata("operation", "query");
        let text = format_error_text(&error);
        assert!(text.contains("code: remote:request_failed\n"));
        assert!(text.contains("operation: query"));
        assert!(!text.contains("abc123"));

        let payload = error_json(&error);
        assert_eq!(payload["meta"]["operation"], "query");
        assert_ne!(payload["meta"]["sessionId"], "abc123");
    }

    #[test]
    fn error_output_carries_exit_code() {
        let mode = OutputMode::from_args(&OutputArgs {
            output: None,
            agent: false,
            no_progress: true,
        });
        let error = ErrorEnvelope::expected(
            ErrorCode::new("repository", "not_initialized"),
            "not an insight repository",
        );
        let output = format_error_output(mode, &error);
        assert_eq!(output.exit_code, ExitCode::InvalidInput);
        assert!(output.stdout.starts_with("status: error\n"));
        assert!(output.stderr.is_empty());
    }

    #[test]
    fn resolve_root_defaults_to_current_dir() -> Result<(), CliError> {
        assert_eq!(resolve_root(None)?, std::env::current_dir()?);
        let explicit = PathBuf::from("/work/repo");
        assert_eq!(resolve_root(Some(&explicit))?, explicit);
        Ok(())
    }

    #[test]
    fn resolve_query_prefers_explicit_text() -> Result<(), CliError> {
        assert_eq!(resolve_query(false, Some("needle"))?, "needle");
        assert!(matches!(
            resolve_query(false, None),
            Err(CliError::InvalidInput(_))
        ));
        Ok(())
    }

    #[test]
    fn scoped_env_only_keeps_prefix() {
        let env = collect_scoped_env("INSIGHT_DEFINITELY_UNSET_PREFIX_");
        assert!(env.is_empty());
    }
}
