//! Drop the local marker.

use crate::operation_log::{OperationLog, insert, root_fields};
use insight_domain::MarkerStatus;
use insight_ports::{LocalStatePort, LogFields, LoggerPort};
use insight_shared::{RequestContext, Result};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

/// Input payload for uninitialize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UninitializeRepositoryInput {
    /// Repository root directory (absolute path).
    pub root: PathBuf,
}

/// Dependencies required by uninitialize.
#[derive(Clone)]
pub struct UninitializeRepositoryDeps {
    /// Marker store bound to the repository root.
    pub state: Arc<dyn LocalStatePort>,
    /// Optional logger.
    pub logger: Option<Arc<dyn LoggerPort>>,
}

/// Output returned by uninitialize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UninitializeRepositoryOutput {
    /// True when the removed marker could not be read.
    pub was_corrupted: bool,
}

/// Remove the marker, valid or corrupted. Local only: the remote index is not
/// notified.
pub async fn uninitialize_repository(
    ctx: &RequestContext,
    deps: &UninitializeRepositoryDeps,
    input: UninitializeRepositoryInput,
) -> Result<UninitializeRepositoryOutput> {
    let log = OperationLog::start(
        deps.logger.as_ref(),
        "uninitialize",
        "Uninitialize repository",
        root_fields(&input.root),
    );
    let result = run_uninitialize(ctx, deps).await;
    log.finish(result, |output| {
        let mut fields = LogFields::new();
        insert(&mut fields, "wasCorrupted", Value::Bool(output.was_corrupted));
        fields
    })
}

async fn run_uninitialize(
    ctx: &RequestContext,
    deps: &UninitializeRepositoryDeps,
) -> Result<UninitializeRepositoryOutput> {
    ctx.ensure_not_cancelled("uninitialize_repository.start")?;
    let was_corrupted = matches!(
        deps.state.status(ctx).await?,
        MarkerStatus::Corrupted { .. }
    );
    deps.state.delete(ctx).await?;
    Ok(UninitializeRepositoryOutput { was_corrupted })
}
