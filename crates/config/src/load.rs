//! Config loading helpers (env + file + overrides).
//!
//! The loader fixes the merge order and surfaces user-facing errors as
//! typed `ErrorEnvelope`s.

use crate::storage::StateStorageMode;
use crate::{InsightConfig, InsightEnv, ValidatedInsightConfig, apply_env_overrides};
use insight_shared::{ErrorClass, ErrorCode, ErrorEnvelope};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigFormat {
    Json,
    Toml,
}

/// Load the config from in-memory sources.
///
/// Precedence (highest wins):
/// - env overrides (`InsightEnv`)
/// - overrides JSON (partial config)
/// - config JSON
/// - defaults (`InsightConfig::default()`)
pub fn load_insight_config_from_sources(
    config_json: Option<&str>,
    overrides_json: Option<&str>,
    env: &InsightEnv,
) -> Result<ValidatedInsightConfig, ErrorEnvelope> {
    let config = match config_json {
        None => InsightConfig::default(),
        Some(input) => parse_config_unvalidated(input, ConfigFormat::Json)?,
    };
    merge_and_validate(config, overrides_json, env)
}

/// Load the config from an optional file path (`.json` or `.toml`).
pub fn load_insight_config_from_path(
    config_path: Option<&Path>,
    overrides_json: Option<&str>,
    env: &InsightEnv,
) -> Result<ValidatedInsightConfig, ErrorEnvelope> {
    let config = match config_path {
        None => InsightConfig::default(),
        Some(path) => {
            let format = detect_config_format(path)?;
            let config_text = read_config_file(path)?;
            parse_config_unvalidated(&config_text, format)?
        },
    };
    merge_and_validate(config, overrides_json, env)
}

/// Load the config from the process env and an optional file path.
pub fn load_insight_config_std_env(
    config_path: Option<&Path>,
    overrides_json: Option<&str>,
) -> Result<ValidatedInsightConfig, ErrorEnvelope> {
    let env = InsightEnv::from_std_env().map_err(ErrorEnvelope::from)?;
    load_insight_config_from_path(config_path, overrides_json, &env)
}

/// Serialize the config as pretty JSON (with trailing newline).
pub fn to_pretty_json(config: &InsightConfig) -> Result<String, ErrorEnvelope> {
    let mut output = serde_json::to_string_pretty(config).map_err(|error| {
        ErrorEnvelope::unexpected(
            ErrorCode::internal(),
            format!("failed to serialize config: {error}"),
            ErrorClass::NonRetriable,
        )
    })?;
    output.push('\n');
    Ok(output)
}

/// Serialize the config as pretty TOML (with trailing newline).
pub fn to_pretty_toml(config: &InsightConfig) -> Result<String, ErrorEnvelope> {
    let mut output = toml::to_string_pretty(config).map_err(|error| {
        ErrorEnvelope::unexpected(
            ErrorCode::new("config", "serialize_toml"),
            format!("failed to serialize config TOML: {error}"),
            ErrorClass::NonRetriable,
        )
    })?;
    output.push('\n');
    Ok(output)
}

fn merge_and_validate(
    mut config: InsightConfig,
    overrides_json: Option<&str>,
    env: &InsightEnv,
) -> Result<ValidatedInsightConfig, ErrorEnvelope> {
    if let Some(input) = overrides_json {
        let overrides = parse_overrides_json(input)?;
        apply_overrides(&mut config, overrides);
    }

    // env is applied last and also validates/normalizes the resulting config.
    apply_env_overrides(config, env)
}

fn parse_config_unvalidated(
    input: &str,
    format: ConfigFormat,
) -> Result<InsightConfig, ErrorEnvelope> {
    match format {
        ConfigFormat::Json => serde_json::from_str(input).map_err(|error| {
            ErrorEnvelope::expected(
                ErrorCode::new("config", "invalid_json"),
                format!("invalid config JSON: {error}"),
            )
            .with_metadata("source", "config")
        }),
        ConfigFormat::Toml => toml::from_str(input).map_err(|error| {
            ErrorEnvelope::expected(
                ErrorCode::new("config", "invalid_toml"),
                format!("invalid config TOML: {error}"),
            )
            .with_metadata("source", "config")
        }),
    }
}

fn parse_overrides_json(input: &str) -> Result<InsightConfigOverrides, ErrorEnvelope> {
    serde_json::from_str(input).map_err(|error| {
        ErrorEnvelope::expected(
            ErrorCode::new("config", "invalid_json"),
            format!("invalid overrides JSON: {error}"),
        )
        .with_metadata("source", "overrides")
    })
}

fn read_config_file(path: &Path) -> Result<String, ErrorEnvelope> {
    std::fs::read_to_string(path).map_err(|error| {
        let code = match error.kind() {
            std::io::ErrorKind::NotFound => ErrorCode::new("config", "config_file_not_found"),
            std::io::ErrorKind::PermissionDenied => {
                ErrorCode::new("config", "config_file_permission_denied")
            },
            _ => ErrorCode::new("config", "config_file_io"),
        };

        ErrorEnvelope::expected(code, format!("failed to read config file: {error}"))
            .with_metadata("path", path.to_string_lossy().to_string())
    })
}

fn detect_config_format(path: &Path) -> Result<ConfigFormat, ErrorEnvelope> {
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        None | Some("json") => Ok(ConfigFormat::Json),
        Some("toml") => Ok(ConfigFormat::Toml),
        Some(other) => Err(ErrorEnvelope::expected(
            ErrorCode::new("config", "unsupported_format"),
            "unsupported config format; use .json or .toml",
        )
        .with_metadata("extension", other.to_string())),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
struct InsightConfigOverrides {
    version: Option<u32>,
    remote: RemoteConfigOverrides,
    sync: SyncConfigOverrides,
    state: StateConfigOverrides,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
struct RemoteConfigOverrides {
    api_base_url: Option<Box<str>>,
    timeout_ms: Option<u64>,
    max_concurrent_requests: Option<u32>,
    validate_before_query: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
struct SyncConfigOverrides {
    max_batch_bytes: Option<u64>,
    max_scan_concurrency: Option<u32>,
    timestamp_tolerance_ms: Option<u64>,
    ignore_file_name: Option<Box<str>>,
    ignore_patterns: IgnorePatternsOverrides,
    operation_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
struct IgnorePatternsOverrides {
    directories: Option<Vec<Box<str>>>,
    files: Option<Vec<Box<str>>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
struct StateConfigOverrides {
    storage: Option<StateStorageMode>,
}

fn apply_overrides(config: &mut InsightConfig, overrides: InsightConfigOverrides) {
    if let Some(version) = overrides.version {
        config.version = version;
    }

    let remote = overrides.remote;
    set(&mut config.remote.api_base_url, remote.api_base_url);
    set(&mut config.remote.timeout_ms, remote.timeout_ms);
    if remote.max_concurrent_requests.is_some() {
        config.remote.max_concurrent_requests = remote.max_concurrent_requests;
    }
    set(
        &mut config.remote.validate_before_query,
        remote.validate_before_query,
    );

    let sync = overrides.sync;
    set(&mut config.sync.max_batch_bytes, sync.max_batch_bytes);
    set(&mut config.sync.max_scan_concurrency, sync.max_scan_concurrency);
    set(
        &mut config.sync.timestamp_tolerance_ms,
        sync.timestamp_tolerance_ms,
    );
    set(&mut config.sync.ignore_file_name, sync.ignore_file_name);
    set(
        &mut config.sync.ignore_patterns.directories,
        sync.ignore_patterns.directories,
    );
    set(
        &mut config.sync.ignore_patterns.files,
        sync.ignore_patterns.files,
    );
    if sync.operation_timeout_ms.is_some() {
        config.sync.operation_timeout_ms = sync.operation_timeout_ms;
    }

    set(&mut config.state.storage, overrides.state.storage);
}

fn set<T>(field: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *field = value;
    }
}
