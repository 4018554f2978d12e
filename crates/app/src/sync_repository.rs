//! Initialize or reinitialize, whichever the marker calls for.

use crate::initialize_repository::{InitializeRepositoryOutput, initialize_repository};
use crate::reinitialize_repository::{ReinitializeRepositoryOutput, reinitialize_repository};
use crate::session::{SyncDeps, SyncInput};
use insight_domain::MarkerStatus;
use insight_shared::{RequestContext, Result};

/// Which path a sync took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// No marker existed; the repository was uploaded in full.
    Initialized(InitializeRepositoryOutput),
    /// A marker existed; only changes were uploaded.
    Reinitialized(ReinitializeRepositoryOutput),
}

/// Sync the repository at `input.root`.
///
/// A corrupted marker takes the reinitialize path and surfaces
/// `state:corrupted` from there.
pub async fn sync_repository(
    ctx: &RequestContext,
    deps: &SyncDeps,
    input: SyncInput,
) -> Result<SyncOutcome> {
    match deps.state.status(ctx).await? {
        MarkerStatus::Uninitialized => initialize_repository(ctx, deps, input)
            .await
            .map(SyncOutcome::Initialized),
        MarkerStatus::Valid(_) | MarkerStatus::Corrupted { .. } => {
            reinitialize_repository(ctx, deps, input)
                .await
                .map(SyncOutcome::Reinitialized)
        },
    }
}
