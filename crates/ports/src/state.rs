//! Local repository state boundary contract.

use crate::BoxFuture;
use insight_domain::{ChangeSet, MarkerStatus, RepositoryId, RepositoryState, Snapshot};
use insight_shared::{RequestContext, Result};

/// Boundary contract for the marker bound to one repository root.
///
/// Lifecycle: uninitialized → `create` → valid → `update`* → `delete` →
/// uninitialized. Calls from the wrong state fail with
/// `repository:not_initialized` / `repository:already_initialized`; unreadable
/// markers fail with `state:corrupted`. Writes are atomic.
pub trait LocalStatePort: Send + Sync {
    /// Inspect the marker without failing on corruption.
    fn status(&self, ctx: &RequestContext) -> BoxFuture<'_, Result<MarkerStatus>>;

    /// Persist a new marker; fails if one already exists.
    fn create(&self, ctx: &RequestContext, state: RepositoryState) -> BoxFuture<'_, Result<()>>;

    /// Read the marker; fails if missing or corrupted.
    fn load(&self, ctx: &RequestContext) -> BoxFuture<'_, Result<RepositoryState>>;

    /// Apply an acknowledged change set and persist the result.
    fn update(
        &self,
        ctx: &RequestContext,
        changes: ChangeSet,
        new_timestamps: Snapshot,
    ) -> BoxFuture<'_, Result<RepositoryState>>;

    /// Remove the marker (valid or corrupted); fails if none exists.
    fn delete(&self, ctx: &RequestContext) -> BoxFuture<'_, Result<()>>;

    /// True iff a well-formed marker exists.
    fn is_valid(&self, ctx: &RequestContext) -> BoxFuture<'_, Result<bool>> {
        let status = self.status(ctx);
        Box::pin(async move { Ok(matches!(status.await?, MarkerStatus::Valid(_))) })
    }

    /// Stored repository id.
    fn repository_id(&self, ctx: &RequestContext) -> BoxFuture<'_, Result<RepositoryId>> {
        let state = self.load(ctx);
        Box::pin(async move { Ok(state.await?.repository_id) })
    }

    /// Last-synced snapshot.
    fn file_timestamps(&self, ctx: &RequestContext) -> BoxFuture<'_, Result<Snapshot>> {
        let state = self.load(ctx);
        Box::pin(async move { Ok(state.await?.file_timestamps) })
    }
}
