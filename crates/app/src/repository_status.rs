//! Marker inspection without network access.

use insight_domain::{MarkerStatus, RepositoryId};
use insight_ports::LocalStatePort;
use insight_shared::{RequestContext, Result};
use std::sync::Arc;

/// Dependencies required by status.
#[derive(Clone)]
pub struct RepositoryStatusDeps {
    /// Marker store bound to the repository root.
    pub state: Arc<dyn LocalStatePort>,
}

/// Output returned by status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryStatusOutput {
    /// `initialized`, `uninitialized` or `corrupted`.
    pub status: &'static str,
    /// Stored id, for initialized repositories.
    pub repository_id: Option<RepositoryId>,
    /// Files in the last synced snapshot.
    pub tracked_files: usize,
    /// Why the marker was rejected, for corrupted repositories.
    pub reason: Option<String>,
}

impl From<MarkerStatus> for RepositoryStatusOutput {
    fn from(status: MarkerStatus) -> Self {
        let label = status.label();
        match status {
            MarkerStatus::Uninitialized => Self {
                status: label,
                repository_id: None,
                tracked_files: 0,
                reason: None,
            },
            MarkerStatus::Valid(state) => Self {
                status: label,
                tracked_files: state.tracked_files(),
                repository_id: Some(state.repository_id),
                reason: None,
            },
            MarkerStatus::Corrupted { reason } => Self {
                status: label,
                repository_id: None,
                tracked_files: 0,
                reason: Some(reason),
            },
        }
    }
}

/// Report the marker state of the repository.
pub async fn repository_status(
    ctx: &RequestContext,
    deps: &RepositoryStatusDeps,
) -> Result<RepositoryStatusOutput> {
    ctx.ensure_not_cancelled("repository_status")?;
    Ok(deps.state.status(ctx).await?.into())
}
