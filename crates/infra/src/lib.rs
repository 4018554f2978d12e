//! # insight-infra
//!
//! Infrastructure wiring and runtime composition.
//! This crate depends on `app`, `adapters`, `config`, and `shared`.

/// Local CLI orchestration helpers.
pub mod cli_local;
/// Config loading helpers used by CLI surfaces.
pub mod config_check;
/// Environment validation helpers used by CLI surfaces.
pub mod env_check;
/// Logger selection from the environment.
pub mod observability;
/// Runtime and cancellation wiring.
pub mod runtime;

pub use cli_local::{
    LocalStatus, read_status_local, run_query_local, run_sync_local, run_uninitialize_local,
};
pub use config_check::{
    load_effective_config, load_effective_config_json, load_effective_config_toml,
};
pub use env_check::{InfraError, InfraResult, validate_env_parsing};
pub use observability::{Observability, observability_from_env, scope_logger};
pub use runtime::run_async_with_ctx;

// Re-export redaction utilities for CLI boundary sanitization
pub use insight_shared::{is_secret_key, redact_if_secret};

/// Returns the infra crate version.
#[must_use]
pub const fn infra_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;
    use insight_adapters::adapters_crate_version;
    use insight_app::app_crate_version;
    use insight_config::config_crate_version;
    use insight_shared::shared_crate_version;

    fn workspace_deps() -> Vec<String> {
        let cargo_toml = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/Cargo.toml"));
        let mut deps = Vec::new();
        let mut in_deps = false;
        let mut in_dev_deps = false;

        for raw_line in cargo_toml.lines() {
            let line = raw_line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            if line.starts_with('[') {
                in_deps = line == "[dependencies]";
                in_dev_deps = line == "[dev-dependencies]";
                continue;
            }
            if !(in_deps || in_dev_deps) {
                continue;
            }
            if line.starts_with("insight-") {
                let key = line.split('=').next().unwrap_or("").trim();
                let name = key.split('.').next().unwrap_or("").trim();
                deps.push(name.to_string());
            }
        }

        deps
    }

    #[test]
    fn infra_depends_on_app_adapters_config() {
        let deps = workspace_deps();
        let required = ["insight-app", "insight-adapters", "insight-config"];

        for expected in required {
            assert!(
                deps.iter().any(|dep| dep == expected),
                "missing dependency: {expected}"
            );
        }
    }

    #[test]
    fn infra_crate_compiles() {
        let version = infra_crate_version();
        assert!(!version.is_empty());
    }

    #[test]
    fn infra_can_use_app_adapters_config_shared() {
        let app_version = app_crate_version();
        let adapters_version = adapters_crate_version();
        let config_version = config_crate_version();
        let shared_version = shared_crate_version();

        assert!(!app_version.is_empty());
        assert!(!adapters_version.is_empty());
        assert!(!config_version.is_empty());
        assert!(!shared_version.is_empty());
    }
}
