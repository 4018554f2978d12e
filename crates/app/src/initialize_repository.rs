//! First full upload of a repository.

use crate::batch_planner::{initialize_entries, new_session_id, plan_with_session};
use crate::operation_log::{OperationLog, insert, root_fields};
use crate::session::{SyncDeps, SyncInput};
use insight_domain::{Batch, RepositoryError, RepositoryId, RepositoryState};
use insight_ports::{LogFields, ScanWarning};
use insight_shared::{RequestContext, Result};
use serde_json::Value;

/// Output returned by initialize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitializeRepositoryOutput {
    /// Id assigned by the remote service.
    pub repository_id: RepositoryId,
    /// Files uploaded.
    pub files: usize,
    /// Batches sent.
    pub batches: usize,
    /// Payload bytes uploaded.
    pub bytes: u64,
    /// Entries the scanner skipped.
    pub warnings: Vec<ScanWarning>,
}

/// Scan, upload every file and persist the marker.
///
/// Fails with `repository:already_initialized` when a marker exists. The
/// marker is written only once every batch has been acknowledged.
pub async fn initialize_repository(
    ctx: &RequestContext,
    deps: &SyncDeps,
    input: SyncInput,
) -> Result<InitializeRepositoryOutput> {
    let log = OperationLog::start(
        deps.logger.as_ref(),
        "initialize",
        "Initialize repository",
        root_fields(&input.root),
    );
    let result = run_initialize(ctx, deps, &input).await;
    log.finish(result, log_fields_completed)
}

async fn run_initialize(
    ctx: &RequestContext,
    deps: &SyncDeps,
    input: &SyncInput,
) -> Result<InitializeRepositoryOutput> {
    ctx.ensure_not_cancelled("initialize_repository.start")?;

    if deps.state.status(ctx).await?.marker_exists() {
        return Err(RepositoryError::AlreadyInitialized {
            path: input.root.display().to_string(),
        }
        .into());
    }

    let scanned = deps.scan(ctx, &input.root).await?;
    let snapshot = scanned.tree.file_timestamps();
    let files = snapshot.len();

    let session_id = new_session_id()?;
    let mut batches = plan_with_session(
        initialize_entries(scanned.tree),
        input.settings.max_batch_bytes,
        &session_id,
    )?;
    if batches.is_empty() {
        // The remote assigns the id on receipt of a batch, even an empty one.
        batches.push(Batch::new(session_id, 1, 1, Vec::new())?);
    }

    let (repository_id, summary) = deps
        .dispatcher(&input.settings)
        .initialize(ctx, batches)
        .await?;

    ctx.ensure_not_cancelled("initialize_repository.persist")?;
    deps.state
        .create(ctx, RepositoryState::new(repository_id.clone(), snapshot))
        .await?;

    Ok(InitializeRepositoryOutput {
        repository_id,
        files,
        batches: summary.batches,
        bytes: summary.bytes,
        warnings: scanned.warnings,
    })
}

fn log_fields_completed(output: &InitializeRepositoryOutput) -> LogFields {
    let mut fields = LogFields::new();
    insert(
        &mut fields,
        "repositoryId",
        Value::String(output.repository_id.as_str().to_owned()),
    );
    insert(&mut fields, "files", Value::from(output.files));
    insert(&mut fields, "batches", Value::from(output.batches));
    insert(&mut fields, "bytes", Value::from(output.bytes));
    insert(&mut fields, "skipped", Value::from(output.warnings.len()));
    fields
}
