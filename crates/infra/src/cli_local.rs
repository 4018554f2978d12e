//! Local CLI orchestration helpers.

use crate::observability::{observability_from_env, scope_logger};
use crate::runtime::run_async_with_ctx;
use crate::InfraResult;
use insight_adapters::{
    HttpRemoteIndex, HttpRemoteIndexConfig, IgnoreFile, LocalTreeScanner, MarkerStateStore,
};
use insight_app::{
    DispatchOptions, QueryRepositoryDeps, QueryRepositoryInput, QueryRepositoryOutput,
    RepositoryStatusDeps, RepositoryStatusOutput, SyncDeps, SyncInput, SyncOutcome, SyncSettings,
    UninitializeRepositoryDeps, UninitializeRepositoryInput, UninitializeRepositoryOutput,
    query_repository, repository_status, sync_repository, uninitialize_repository,
};
use insight_config::{ValidatedInsightConfig, load_insight_config_std_env};
use insight_ports::{LoggerPort, RemoteIndexPort};
use insight_shared::{ErrorCode, ErrorEnvelope, RequestContext};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Marker status of a local repository, for CLI output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalStatus {
    /// Normalized repository root.
    pub root: PathBuf,
    /// Directory holding the marker.
    pub marker_dir: PathBuf,
    /// Marker state.
    pub status: RepositoryStatusOutput,
}

/// Initialize the repository at `root`, or reinitialize it when a marker
/// already exists.
pub fn run_sync_local(
    config_path: Option<&Path>,
    overrides_json: Option<&str>,
    root: &Path,
) -> InfraResult<SyncOutcome> {
    let config = load_insight_config_std_env(config_path, overrides_json)?;
    let root = normalize_root(root);
    let observability = observability_from_env();
    let ctx = RequestContext::new_request();
    let logger = scope_logger(observability.logger.as_ref(), &ctx);

    let deps = build_sync_deps(&config, &root, logger)?;
    let input = SyncInput {
        root,
        settings: sync_settings(&config)?,
    };
    run_async_with_ctx(ctx, config.operation_timeout(), move |ctx| async move {
        sync_repository(&ctx, &deps, input).await
    })
}

/// Query the remote index of the repository at `root`.
pub fn run_query_local(
    config_path: Option<&Path>,
    overrides_json: Option<&str>,
    root: &Path,
    query: &str,
) -> InfraResult<QueryRepositoryOutput> {
    let config = load_insight_config_std_env(config_path, overrides_json)?;
    let root = normalize_root(root);
    let observability = observability_from_env();
    let ctx = RequestContext::new_request();
    let logger = scope_logger(observability.logger.as_ref(), &ctx);

    let deps = QueryRepositoryDeps {
        remote: build_remote(&config)?,
        state: Arc::new(build_state_store(&config, &root)),
        logger,
    };
    let input = QueryRepositoryInput {
        root,
        query: query.into(),
        validate_repository_id: config.remote.validate_before_query,
    };
    run_async_with_ctx(ctx, config.operation_timeout(), move |ctx| async move {
        query_repository(&ctx, &deps, input).await
    })
}

/// Remove the local marker of the repository at `root`.
pub fn run_uninitialize_local(
    config_path: Option<&Path>,
    overrides_json: Option<&str>,
    root: &Path,
) -> InfraResult<UninitializeRepositoryOutput> {
    let config = load_insight_config_std_env(config_path, overrides_json)?;
    let root = normalize_root(root);
    let observability = observability_from_env();
    let ctx = RequestContext::new_request();
    let logger = scope_logger(observability.logger.as_ref(), &ctx);

    let deps = UninitializeRepositoryDeps {
        state: Arc::new(build_state_store(&config, &root)),
        logger,
    };
    let input = UninitializeRepositoryInput { root };
    run_async_with_ctx(ctx, config.operation_timeout(), move |ctx| async move {
        uninitialize_repository(&ctx, &deps, input).await
    })
}

/// Read the marker status of the repository at `root`.
pub fn read_status_local(
    config_path: Option<&Path>,
    overrides_json: Option<&str>,
    root: &Path,
) -> InfraResult<LocalStatus> {
    let config = load_insight_config_std_env(config_path, overrides_json)?;
    let root = normalize_root(root);
    let store = build_state_store(&config, &root);
    let marker_dir = store.marker_dir().to_path_buf();
    let deps = RepositoryStatusDeps {
        state: Arc::new(store),
    };

    let status = run_async_with_ctx(RequestContext::new_request(), None, move |ctx| async move {
        repository_status(&ctx, &deps).await
    })?;
    Ok(LocalStatus {
        root,
        marker_dir,
        status,
    })
}

fn build_sync_deps(
    config: &ValidatedInsightConfig,
    root: &Path,
    logger: Option<Arc<dyn LoggerPort>>,
) -> InfraResult<SyncDeps> {
    let concurrency =
        usize_from_u32(config.sync.max_scan_concurrency, "sync max scan concurrency")?;
    let mut scanner = LocalTreeScanner::new(concurrency);
    if let Some(logger) = logger.as_ref() {
        scanner = scanner.with_logger(Arc::clone(logger));
    }
    Ok(SyncDeps {
        scanner: Arc::new(scanner),
        ignore_rules: Arc::new(IgnoreFile::new(
            config.sync.ignore_file_name.clone(),
            config.ignore_rules(),
        )),
        remote: build_remote(config)?,
        state: Arc::new(build_state_store(config, root)),
        logger,
    })
}

fn build_remote(config: &ValidatedInsightConfig) -> InfraResult<Arc<dyn RemoteIndexPort>> {
    let remote = HttpRemoteIndex::new(&HttpRemoteIndexConfig::from_remote_config(&config.remote))?;
    Ok(Arc::new(remote))
}

fn build_state_store(config: &ValidatedInsightConfig, root: &Path) -> MarkerStateStore {
    MarkerStateStore::new(root.to_path_buf(), &config.state.storage)
}

fn sync_settings(config: &ValidatedInsightConfig) -> InfraResult<SyncSettings> {
    let max_concurrent_requests = config
        .remote
        .max_concurrent_requests
        .map(|value| usize_from_u32(value, "remote max concurrent requests"))
        .transpose()?
        .and_then(NonZeroUsize::new);
    Ok(SyncSettings {
        max_batch_bytes: config.sync.max_batch_bytes,
        dispatch: DispatchOptions {
            max_concurrent_requests,
        },
        timestamp_tolerance: config.timestamp_tolerance(),
    })
}

fn normalize_root(path: &Path) -> PathBuf {
    std::fs::canonicalize(path)
        .or_else(|_| std::path::absolute(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

fn usize_from_u32(value: u32, label: &str) -> InfraResult<usize> {
    usize::try_from(value).map_err(|_| {
        ErrorEnvelope::expected(
            ErrorCode::invalid_input(),
            format!("{label} exceeds platform limits"),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use insight_config::{InsightConfig, StateStorageMode};

    #[test]
    fn settings_follow_config() -> InfraResult<()> {
        let mut raw = InsightConfig::default();
        raw.remote.max_concurrent_requests = Some(3);
        raw.sync.max_batch_bytes = 4096;
        raw.sync.timestamp_tolerance_ms = 1500;
        let config = raw.validate_and_normalize()?;

        let settings = sync_settings(&config)?;
        assert_eq!(settings.max_batch_bytes, 4096);
        assert_eq!(
            settings.dispatch.max_concurrent_requests.map(NonZeroUsize::get),
            Some(3)
        );
        assert_eq!(settings.timestamp_tolerance.as_millis(), 1500);
        Ok(())
    }

    #[test]
    fn custom_storage_moves_the_marker() -> InfraResult<()> {
        let mut raw = InsightConfig::default();
        raw.state.storage = StateStorageMode::Custom(PathBuf::from("/var/lib/insight"));
        let config = raw.validate_and_normalize()?;

        let store = build_state_store(&config, Path::new("/work/repo"));
        assert!(store.marker_dir().starts_with("/var/lib/insight"));
        Ok(())
    }

    #[test]
    fn normalize_keeps_missing_paths_absolute() {
        let normalized = normalize_root(Path::new("definitely-missing-dir"));
        assert!(normalized.is_absolute());
    }
}
