//! Environment variable parsing and env-to-config merging.
//!
//! Env parsing is strict: a present but invalid value fails fast instead of
//! silently falling back to the file or default value.

use crate::schema::{InsightConfig, ValidatedInsightConfig};
use crate::storage::StateStorageMode;
use insight_shared::{ErrorCode, ErrorEnvelope, redact_if_secret};
use std::collections::BTreeMap;
use std::fmt;
use url::Url;

/// Env var: remote service base URL.
pub const ENV_API_BASE_URL: &str = "INSIGHT_API_BASE_URL";
/// Env var: per-request timeout in milliseconds.
pub const ENV_REMOTE_TIMEOUT_MS: &str = "INSIGHT_REMOTE_TIMEOUT_MS";
/// Env var: cap on concurrent batch requests.
pub const ENV_REMOTE_MAX_CONCURRENT_REQUESTS: &str = "INSIGHT_REMOTE_MAX_CONCURRENT_REQUESTS";
/// Env var: soft cap on one batch payload.
pub const ENV_SYNC_MAX_BATCH_BYTES: &str = "INSIGHT_SYNC_MAX_BATCH_BYTES";
/// Env var: filesystem tasks in flight during a scan.
pub const ENV_SYNC_MAX_SCAN_CONCURRENCY: &str = "INSIGHT_SYNC_MAX_SCAN_CONCURRENCY";
/// Env var: timestamp equality window in milliseconds.
pub const ENV_SYNC_TIMESTAMP_TOLERANCE_MS: &str = "INSIGHT_SYNC_TIMESTAMP_TOLERANCE_MS";
/// Env var: extra directory ignore rules as CSV.
pub const ENV_SYNC_IGNORE_DIRECTORIES: &str = "INSIGHT_SYNC_IGNORE_DIRECTORIES";
/// Env var: extra file ignore rules as CSV.
pub const ENV_SYNC_IGNORE_FILES: &str = "INSIGHT_SYNC_IGNORE_FILES";
/// Env var: marker storage mode (`project` | `custom:<dir>`).
pub const ENV_STATE_STORAGE: &str = "INSIGHT_STATE_STORAGE";

const ALL_ENV_VARS: &[&str] = &[
    ENV_API_BASE_URL,
    ENV_REMOTE_TIMEOUT_MS,
    ENV_REMOTE_MAX_CONCURRENT_REQUESTS,
    ENV_SYNC_MAX_BATCH_BYTES,
    ENV_SYNC_MAX_SCAN_CONCURRENCY,
    ENV_SYNC_TIMESTAMP_TOLERANCE_MS,
    ENV_SYNC_IGNORE_DIRECTORIES,
    ENV_SYNC_IGNORE_FILES,
    ENV_STATE_STORAGE,
];

const MAX_CSV_ITEMS: usize = 512;

/// Parsed env overrides. `None` means "not set".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InsightEnv {
    /// `INSIGHT_API_BASE_URL`.
    pub api_base_url: Option<Box<str>>,
    /// `INSIGHT_REMOTE_TIMEOUT_MS`.
    pub remote_timeout_ms: Option<u64>,
    /// `INSIGHT_REMOTE_MAX_CONCURRENT_REQUESTS`.
    pub remote_max_concurrent_requests: Option<u32>,
    /// `INSIGHT_SYNC_MAX_BATCH_BYTES`.
    pub sync_max_batch_bytes: Option<u64>,
    /// `INSIGHT_SYNC_MAX_SCAN_CONCURRENCY`.
    pub sync_max_scan_concurrency: Option<u32>,
    /// `INSIGHT_SYNC_TIMESTAMP_TOLERANCE_MS`.
    pub sync_timestamp_tolerance_ms: Option<u64>,
    /// `INSIGHT_SYNC_IGNORE_DIRECTORIES`.
    pub sync_ignore_directories: Option<Vec<Box<str>>>,
    /// `INSIGHT_SYNC_IGNORE_FILES`.
    pub sync_ignore_files: Option<Vec<Box<str>>>,
    /// `INSIGHT_STATE_STORAGE`.
    pub state_storage: Option<StateStorageMode>,
}

impl InsightEnv {
    /// Parse env overrides from a key/value map (useful for tests and fixtures).
    pub fn from_map(map: &BTreeMap<String, String>) -> Result<Self, EnvParseError> {
        Ok(Self {
            api_base_url: parse_optional_url_string(map, ENV_API_BASE_URL)?,
            remote_timeout_ms: parse_optional_u64(map, ENV_REMOTE_TIMEOUT_MS)?,
            remote_max_concurrent_requests: parse_optional_u32(
                map,
                ENV_REMOTE_MAX_CONCURRENT_REQUESTS,
            )?,
            sync_max_batch_bytes: parse_optional_u64(map, ENV_SYNC_MAX_BATCH_BYTES)?,
            sync_max_scan_concurrency: parse_optional_u32(map, ENV_SYNC_MAX_SCAN_CONCURRENCY)?,
            sync_timestamp_tolerance_ms: parse_optional_u64(map, ENV_SYNC_TIMESTAMP_TOLERANCE_MS)?,
            sync_ignore_directories: parse_optional_csv_patterns(map, ENV_SYNC_IGNORE_DIRECTORIES)?,
            sync_ignore_files: parse_optional_csv_patterns(map, ENV_SYNC_IGNORE_FILES)?,
            state_storage: parse_optional_storage(map, ENV_STATE_STORAGE)?,
        })
    }

    /// Parse env overrides from the current process environment.
    pub fn from_std_env() -> Result<Self, EnvParseError> {
        let mut map = BTreeMap::new();
        for name in ALL_ENV_VARS {
            if let Ok(value) = std::env::var(name) {
                map.insert((*name).to_string(), value);
            }
        }

        Self::from_map(&map)
    }
}

/// Apply env overrides to a base config (env wins over file/default values).
pub fn apply_env_overrides(
    base: InsightConfig,
    env: &InsightEnv,
) -> Result<ValidatedInsightConfig, ErrorEnvelope> {
    let mut config = base;

    if let Some(url) = &env.api_base_url {
        config.remote.api_base_url = url.clone();
    }
    if let Some(value) = env.remote_timeout_ms {
        config.remote.timeout_ms = value;
    }
    if env.remote_max_concurrent_requests.is_some() {
        config.remote.max_concurrent_requests = env.remote_max_concurrent_requests;
    }
    if let Some(value) = env.sync_max_batch_bytes {
        config.sync.max_batch_bytes = value;
    }
    if let Some(value) = env.sync_max_scan_concurrency {
        config.sync.max_scan_concurrency = value;
    }
    if let Some(value) = env.sync_timestamp_tolerance_ms {
        config.sync.timestamp_tolerance_ms = value;
    }
    if let Some(rules) = &env.sync_ignore_directories {
        config.sync.ignore_patterns.directories.clone_from(rules);
    }
    if let Some(rules) = &env.sync_ignore_files {
        config.sync.ignore_patterns.files.clone_from(rules);
    }
    if let Some(storage) = &env.state_storage {
        config.state.storage = storage.clone();
    }

    config.validate_and_normalize().map_err(Into::into)
}

/// Validation failures when parsing env variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvParseError {
    /// An env var was present but empty after trimming.
    EmptyValue {
        /// Env var name.
        var: &'static str,
    },
    /// Integer env var had an invalid value.
    InvalidInt {
        /// Env var name.
        var: &'static str,
        /// Raw input value.
        value: String,
    },
    /// URL env var had an invalid value.
    InvalidUrl {
        /// Env var name.
        var: &'static str,
        /// Raw input value.
        value: String,
    },
    /// Enum env var had an invalid value.
    InvalidEnum {
        /// Env var name.
        var: &'static str,
        /// Raw input value.
        value: String,
    },
    /// CSV list exceeds a safety limit.
    CsvTooLarge {
        /// Env var name.
        var: &'static str,
        /// Number of parsed items.
        len: usize,
        /// Maximum allowed.
        max: usize,
    },
}

impl EnvParseError {
    fn error_code(&self) -> ErrorCode {
        match self {
            Self::EmptyValue { .. } => ErrorCode::new("config", "empty_env_var"),
            Self::InvalidInt { .. } => ErrorCode::new("config", "invalid_env_int"),
            Self::InvalidUrl { .. } => ErrorCode::new("config", "invalid_env_url"),
            Self::InvalidEnum { .. } => ErrorCode::new("config", "invalid_env_enum"),
            Self::CsvTooLarge { .. } => ErrorCode::new("config", "invalid_env_csv"),
        }
    }
}

impl fmt::Display for EnvParseError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyValue { var } => write!(formatter, "{var} must be non-empty"),
            Self::InvalidInt { var, .. } => write!(formatter, "{var} must be an integer"),
            Self::InvalidUrl { var, .. } => write!(formatter, "{var} must be an http(s) URL"),
            Self::InvalidEnum { var, .. } => write!(formatter, "{var} has an unsupported value"),
            Self::CsvTooLarge { var, len, max } => {
                write!(formatter, "{var} is too large ({len} items, max {max})")
            },
        }
    }
}

impl std::error::Error for EnvParseError {}

impl From<EnvParseError> for ErrorEnvelope {
    fn from(error: EnvParseError) -> Self {
        let code = error.error_code();
        let message = error.to_string();
        let envelope = Self::expected(code, message);

        match error {
            EnvParseError::EmptyValue { var } => envelope.with_metadata("envVar", var),
            EnvParseError::InvalidInt { var, value }
            | EnvParseError::InvalidUrl { var, value }
            | EnvParseError::InvalidEnum { var, value } => envelope
                .with_metadata("envVar", var)
                .with_metadata("value", redact_if_secret(var, &value)),
            EnvParseError::CsvTooLarge { var, len, max } => envelope
                .with_metadata("envVar", var)
                .with_metadata("len", len.to_string())
                .with_metadata("max", max.to_string()),
        }
    }
}

fn non_empty<'a>(
    map: &'a BTreeMap<String, String>,
    var: &'static str,
) -> Result<Option<&'a str>, EnvParseError> {
    let Some(raw) = map.get(var) else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(EnvParseError::EmptyValue { var });
    }
    Ok(Some(trimmed))
}

fn parse_optional_u64(
    map: &BTreeMap<String, String>,
    var: &'static str,
) -> Result<Option<u64>, EnvParseError> {
    let Some(trimmed) = non_empty(map, var)? else {
        return Ok(None);
    };
    trimmed
        .parse::<u64>()
        .map(Some)
        .map_err(|_| EnvParseError::InvalidInt {
            var,
            value: trimmed.to_owned(),
        })
}

fn parse_optional_u32(
    map: &BTreeMap<String, String>,
    var: &'static str,
) -> Result<Option<u32>, EnvParseError> {
    let Some(trimmed) = non_empty(map, var)? else {
        return Ok(None);
    };
    trimmed
        .parse::<u32>()
        .map(Some)
        .map_err(|_| EnvParseError::InvalidInt {
            var,
            value: trimmed.to_owned(),
        })
}

fn parse_optional_url_string(
    map: &BTreeMap<String, String>,
    var: &'static str,
) -> Result<Option<Box<str>>, EnvParseError> {
    let Some(trimmed) = non_empty(map, var)? else {
        return Ok(None);
    };

    let parsed = Url::parse(trimmed).map_err(|_| EnvParseError::InvalidUrl {
        var,
        value: trimmed.to_owned(),
    })?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(EnvParseError::InvalidUrl {
            var,
            value: trimmed.to_owned(),
        });
    }

    Ok(Some(trimmed.trim_end_matches('/').into()))
}

fn parse_optional_storage(
    map: &BTreeMap<String, String>,
    var: &'static str,
) -> Result<Option<StateStorageMode>, EnvParseError> {
    let Some(trimmed) = non_empty(map, var)? else {
        return Ok(None);
    };
    StateStorageMode::parse(trimmed)
        .map(Some)
        .map_err(|_| EnvParseError::InvalidEnum {
            var,
            value: trimmed.to_owned(),
        })
}

fn parse_optional_csv_patterns(
    map: &BTreeMap<String, String>,
    var: &'static str,
) -> Result<Option<Vec<Box<str>>>, EnvParseError> {
    let Some(raw) = map.get(var) else {
        return Ok(None);
    };

    let items: Vec<Box<str>> = raw
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(Into::into)
        .collect();
    if items.len() > MAX_CSV_ITEMS {
        return Err(EnvParseError::CsvTooLarge {
            var,
            len: items.len(),
            max: MAX_CSV_ITEMS,
        });
    }
    Ok(Some(items))
}
