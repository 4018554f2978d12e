//! Inputs and collaborators shared by the uploading use cases.

use crate::batch_planner::DEFAULT_MAX_BATCH_BYTES;
use crate::change_detector::TIMESTAMP_TOLERANCE;
use crate::dispatcher::{DispatchOptions, SyncDispatcher};
use insight_ports::{
    IgnoreRulesPort, LocalStatePort, LoggerPort, RemoteIndexPort, ScanOutput, ScanRequest,
    TreeScannerPort,
};
use insight_shared::{RequestContext, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Tuning applied to one sync session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSettings {
    /// Upper bound on the payload bytes of one batch.
    pub max_batch_bytes: u64,
    /// Dispatch fan-out.
    pub dispatch: DispatchOptions,
    /// Window within which modification times count as unchanged.
    pub timestamp_tolerance: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            max_batch_bytes: DEFAULT_MAX_BATCH_BYTES,
            dispatch: DispatchOptions::default(),
            timestamp_tolerance: TIMESTAMP_TOLERANCE,
        }
    }
}

/// Input payload for initialize, reinitialize and sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncInput {
    /// Repository root directory (absolute path).
    pub root: PathBuf,
    /// Session tuning.
    pub settings: SyncSettings,
}

impl SyncInput {
    /// Input with default settings.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            settings: SyncSettings::default(),
        }
    }
}

/// Dependencies required by the uploading use cases.
#[derive(Clone)]
pub struct SyncDeps {
    /// Directory walker.
    pub scanner: Arc<dyn TreeScannerPort>,
    /// Ignore-rule source.
    pub ignore_rules: Arc<dyn IgnoreRulesPort>,
    /// Remote index service.
    pub remote: Arc<dyn RemoteIndexPort>,
    /// Marker store bound to the repository root.
    pub state: Arc<dyn LocalStatePort>,
    /// Optional logger.
    pub logger: Option<Arc<dyn LoggerPort>>,
}

impl SyncDeps {
    pub(crate) async fn scan(&self, ctx: &RequestContext, root: &Path) -> Result<ScanOutput> {
        let rules = self.ignore_rules.load_rules(ctx, root.to_path_buf()).await?;
        ctx.ensure_not_cancelled("sync.scan")?;
        self.scanner
            .scan(
                ctx,
                ScanRequest {
                    root: root.to_path_buf(),
                    rules,
                },
            )
            .await
    }

    pub(crate) fn dispatcher(&self, settings: &SyncSettings) -> SyncDispatcher {
        SyncDispatcher::new(
            Arc::clone(&self.remote),
            settings.dispatch,
            self.logger.clone(),
        )
    }
}
