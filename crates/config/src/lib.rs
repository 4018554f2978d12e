//! # insight-config
//!
//! Configuration schema, validation, and loading for the insight CLI.
//! This crate depends on `domain` and `shared` only.

/// Environment variable parsing and merging.
pub mod env;
/// Config loading helpers (env + file + overrides).
pub mod load;
/// Configuration schema types and helpers.
pub mod schema;
/// Marker storage configuration.
pub mod storage;

pub use env::{EnvParseError, InsightEnv, apply_env_overrides};
pub use load::{
    load_insight_config_from_path, load_insight_config_from_sources, load_insight_config_std_env,
    to_pretty_json, to_pretty_toml,
};
pub use schema::{
    CURRENT_CONFIG_VERSION, ConfigSchemaError, DEFAULT_API_BASE_URL, DEFAULT_IGNORE_FILE_NAME,
    DEFAULT_MAX_BATCH_BYTES, IgnorePatternsConfig, InsightConfig, RemoteConfig, StateConfig,
    SyncConfig, ValidatedInsightConfig, parse_insight_config_json, parse_insight_config_toml,
};
pub use storage::{PROJECT_MARKER_DIR, StateStorageMode, StateStorageParseError};

/// Returns the config crate version.
#[must_use]
pub const fn config_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;
    use insight_domain::domain_crate_version;
    use insight_shared::shared_crate_version;

    #[test]
    fn config_crate_compiles() {
        let version = config_crate_version();
        assert!(!version.is_empty());
    }

    #[test]
    fn config_can_use_domain_and_shared() {
        assert!(!domain_crate_version().is_empty());
        assert!(!shared_crate_version().is_empty());
    }
}
