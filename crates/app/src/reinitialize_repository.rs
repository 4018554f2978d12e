//! Incremental upload of the files changed since the last sync.

use crate::batch_planner::{change_entries, plan};
use crate::change_detector::diff_with_unreadable;
use crate::dispatcher::DispatchSummary;
use crate::operation_log::{OperationLog, insert, root_fields};
use crate::session::{SyncDeps, SyncInput};
use insight_domain::{ChangeSet, DirectoryNode, RelativePath, RepositoryId, RepositoryState};
use insight_ports::{LogFields, ScanWarning, ScanWarningKind};
use insight_shared::{RequestContext, Result};
use serde_json::Value;

/// Output returned by reinitialize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReinitializeRepositoryOutput {
    /// Stored repository id.
    pub repository_id: RepositoryId,
    /// Added files count.
    pub added: usize,
    /// Updated files count.
    pub updated: usize,
    /// Deleted files count.
    pub deleted: usize,
    /// Batches sent; zero when nothing changed.
    pub batches: usize,
    /// Payload bytes uploaded.
    pub bytes: u64,
    /// Entries the scanner skipped.
    pub warnings: Vec<ScanWarning>,
}

/// Rescan, diff against the marker, upload the changes, then advance the
/// marker.
///
/// Nothing is sent when the diff is empty. On any failure the marker keeps
/// the last fully acknowledged snapshot.
pub async fn reinitialize_repository(
    ctx: &RequestContext,
    deps: &SyncDeps,
    input: SyncInput,
) -> Result<ReinitializeRepositoryOutput> {
    let log = OperationLog::start(
        deps.logger.as_ref(),
        "reinitialize",
        "Reinitialize repository",
        root_fields(&input.root),
    );
    let result = run_reinitialize(ctx, deps, &input).await;
    log.finish(result, log_fields_completed)
}

struct ReinitializePipeline<'a> {
    ctx: &'a RequestContext,
    deps: &'a SyncDeps,
    input: &'a SyncInput,
}

impl<'a> ReinitializePipeline<'a> {
    const fn new(ctx: &'a RequestContext, deps: &'a SyncDeps, input: &'a SyncInput) -> Self {
        Self { ctx, deps, input }
    }

    async fn load(self) -> Result<ReinitializeLoaded<'a>> {
        let state = self.deps.state.load(self.ctx).await?;
        Ok(ReinitializeLoaded {
            ctx: self.ctx,
            deps: self.deps,
            input: self.input,
            state,
        })
    }
}

struct ReinitializeLoaded<'a> {
    ctx: &'a RequestContext,
    deps: &'a SyncDeps,
    input: &'a SyncInput,
    state: RepositoryState,
}

impl<'a> ReinitializeLoaded<'a> {
    async fn detect(self) -> Result<ReinitializeDetected<'a>> {
        let scanned = self.deps.scan(self.ctx, &self.input.root).await?;
        let changes = diff_with_unreadable(
            &self.state.file_timestamps,
            &scanned.tree,
            self.input.settings.timestamp_tolerance,
            &unreadable_paths(&scanned.warnings),
        )?;
        Ok(ReinitializeDetected {
            ctx: self.ctx,
            deps: self.deps,
            input: self.input,
            repository_id: self.state.repository_id,
            changes,
            tree: scanned.tree,
            warnings: scanned.warnings,
        })
    }
}

struct ReinitializeDetected<'a> {
    ctx: &'a RequestContext,
    deps: &'a SyncDeps,
    input: &'a SyncInput,
    repository_id: RepositoryId,
    changes: ChangeSet,
    tree: DirectoryNode,
    warnings: Vec<ScanWarning>,
}

impl ReinitializeDetected<'_> {
    async fn upload(self) -> Result<ReinitializeUploaded> {
        let snapshot = self.tree.file_timestamps();
        let batches = plan(
            change_entries(&self.changes, self.tree)?,
            self.input.settings.max_batch_bytes,
        )?;
        let summary = self
            .deps
            .dispatcher(&self.input.settings)
            .reinitialize(self.ctx, &self.repository_id, batches)
            .await?;

        self.ctx
            .ensure_not_cancelled("reinitialize_repository.persist")?;
        let counts = Counts::of(&self.changes);
        self.deps
            .state
            .update(self.ctx, self.changes, snapshot)
            .await?;

        Ok(ReinitializeUploaded {
            repository_id: self.repository_id,
            counts,
            summary,
            warnings: self.warnings,
        })
    }

    fn unchanged(self) -> ReinitializeUploaded {
        ReinitializeUploaded {
            repository_id: self.repository_id,
            counts: Counts::default(),
            summary: DispatchSummary::default(),
            warnings: self.warnings,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Counts {
    added: usize,
    updated: usize,
    deleted: usize,
}

impl Counts {
    fn of(changes: &ChangeSet) -> Self {
        Self {
            added: changes.added().len(),
            updated: changes.updated().len(),
            deleted: changes.deleted().len(),
        }
    }
}

struct ReinitializeUploaded {
    repository_id: RepositoryId,
    counts: Counts,
    summary: DispatchSummary,
    warnings: Vec<ScanWarning>,
}

impl ReinitializeUploaded {
    fn output(self) -> ReinitializeRepositoryOutput {
        ReinitializeRepositoryOutput {
            repository_id: self.repository_id,
            added: self.counts.added,
            updated: self.counts.updated,
            deleted: self.counts.deleted,
            batches: self.summary.batches,
            bytes: self.summary.bytes,
            warnings: self.warnings,
        }
    }
}

async fn run_reinitialize(
    ctx: &RequestContext,
    deps: &SyncDeps,
    input: &SyncInput,
) -> Result<ReinitializeRepositoryOutput> {
    ctx.ensure_not_cancelled("reinitialize_repository.start")?;

    let detected = ReinitializePipeline::new(ctx, deps, input)
        .load()
        .await?
        .detect()
        .await?;
    if detected.changes.is_empty() {
        return Ok(detected.unchanged().output());
    }
    Ok(detected.upload().await?.output())
}

/// Paths that exist on disk but could not be read this scan.
fn unreadable_paths(warnings: &[ScanWarning]) -> Vec<RelativePath> {
    warnings
        .iter()
        .filter(|warning| warning.kind == ScanWarningKind::PermissionDenied)
        .filter_map(|warning| RelativePath::parse(&*warning.path).ok())
        .collect()
}

fn log_fields_completed(output: &ReinitializeRepositoryOutput) -> LogFields {
    let mut fields = LogFields::new();
    insert(
        &mut fields,
        "repositoryId",
        Value::String(output.repository_id.as_str().to_owned()),
    );
    insert(&mut fields, "added", Value::from(output.added));
    insert(&mut fields, "updated", Value::from(output.updated));
    insert(&mut fields, "deleted", Value::from(output.deleted));
    insert(&mut fields, "batches", Value::from(output.batches));
    insert(&mut fields, "bytes", Value::from(output.bytes));
    fields
}
