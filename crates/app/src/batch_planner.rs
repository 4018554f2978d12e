//! Split an ordered file payload into size-bounded upload batches.
//!
//! Files are never split. A batch is closed when adding the next file would
//! push it past the limit, so a single oversized file travels alone in a
//! batch of its own.

use insight_domain::{
    Batch, BatchEntry, ChangeSet, DirectoryNode, FileAction, FileRecord, RelativePath, SessionId,
};
use insight_shared::{ErrorCode, ErrorEnvelope, Result};
use std::collections::BTreeMap;

/// Default upper bound on the payload bytes of one batch (10 MiB).
pub const DEFAULT_MAX_BATCH_BYTES: u64 = 10 * 1024 * 1024;

/// Generate a fresh session id shared by every batch of one operation.
pub fn new_session_id() -> Result<SessionId> {
    Ok(SessionId::parse(uuid::Uuid::new_v4().simple().to_string())?)
}

/// Plan batches under a freshly generated session.
pub fn plan(entries: Vec<BatchEntry>, max_batch_bytes: u64) -> Result<Vec<Batch>> {
    plan_with_session(entries, max_batch_bytes, &new_session_id()?)
}

/// Plan batches under `session_id`, preserving entry order.
///
/// An empty payload yields no batches.
pub fn plan_with_session(
    entries: Vec<BatchEntry>,
    max_batch_bytes: u64,
    session_id: &SessionId,
) -> Result<Vec<Batch>> {
    if max_batch_bytes == 0 {
        return Err(ErrorEnvelope::expected(
            ErrorCode::invalid_input(),
            "max batch bytes must be greater than zero",
        ));
    }

    let groups = group_by_size(entries, max_batch_bytes);
    let total_batches = u32::try_from(groups.len()).map_err(|_| {
        ErrorEnvelope::expected(ErrorCode::invalid_input(), "too many batches for one session")
            .with_metadata("batches", groups.len().to_string())
    })?;

    let mut batches = Vec::with_capacity(groups.len());
    for (batch_number, group) in (1..=total_batches).zip(groups) {
        batches.push(Batch::new(
            session_id.clone(),
            batch_number,
            total_batches,
            group,
        )?);
    }
    Ok(batches)
}

fn group_by_size(entries: Vec<BatchEntry>, max_batch_bytes: u64) -> Vec<Vec<BatchEntry>> {
    let mut groups = Vec::new();
    let mut current: Vec<BatchEntry> = Vec::new();
    let mut current_bytes = 0u64;

    for entry in entries {
        let size = entry.size_bytes();
        if !current.is_empty() && current_bytes.saturating_add(size) > max_batch_bytes {
            groups.push(std::mem::take(&mut current));
            current_bytes = 0;
        }
        current_bytes = current_bytes.saturating_add(size);
        current.push(entry);
    }
    if !current.is_empty() {
        groups.push(current);
    }
    groups
}

/// Every file of a freshly scanned tree, as `add` entries in path order.
pub fn initialize_entries(tree: DirectoryNode) -> Vec<BatchEntry> {
    tree.into_files()
        .into_values()
        .map(|file| {
            let (path, content, _) = file.into_parts();
            BatchEntry::upload(path, content, FileAction::Add)
        })
        .collect()
}

/// Entries for a change set: contents for added and updated paths, tombstones
/// for deleted ones, all in path order.
pub fn change_entries(changes: &ChangeSet, tree: DirectoryNode) -> Result<Vec<BatchEntry>> {
    let mut files: BTreeMap<RelativePath, FileRecord> = tree.into_files();
    let mut entries = Vec::with_capacity(changes.len());

    for (path, action) in changes.actions() {
        if action == FileAction::Delete {
            entries.push(BatchEntry::tombstone(path.clone()));
            continue;
        }
        let Some(file) = files.remove(path) else {
            return Err(ErrorEnvelope::invariant(
                ErrorCode::internal(),
                "changed path missing from scanned tree",
            )
            .with_metadata("path", path.as_str()));
        };
        let (path, content, _) = file.into_parts();
        entries.push(BatchEntry::upload(path, content, action));
    }
    Ok(entries)
}
