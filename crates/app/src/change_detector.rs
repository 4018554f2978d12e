//! Classify paths into added / updated / deleted against the last snapshot.

use insight_domain::{ChangeSet, DirectoryNode, PrimitiveError, RelativePath, Snapshot};
use std::collections::BTreeSet;
use std::time::Duration;

/// Default window within which two modification times count as equal.
///
/// Zero: timestamps must match exactly at the resolution the filesystem
/// reports.
pub const TIMESTAMP_TOLERANCE: Duration = Duration::ZERO;

/// Diff `current` against `previous` using [`TIMESTAMP_TOLERANCE`].
pub fn diff(previous: &Snapshot, current: &DirectoryNode) -> Result<ChangeSet, PrimitiveError> {
    diff_with_tolerance(previous, current, TIMESTAMP_TOLERANCE)
}

/// Diff `current` against `previous`, treating times within `tolerance` as equal.
pub fn diff_with_tolerance(
    previous: &Snapshot,
    current: &DirectoryNode,
    tolerance: Duration,
) -> Result<ChangeSet, PrimitiveError> {
    diff_snapshots(previous, &current.file_timestamps(), tolerance)
}

/// Diff `current` against `previous`, keeping every path inside `unreadable`
/// out of the deleted bucket.
///
/// Entries the scanner could not read are still on disk, so their previous
/// timestamps stay in the snapshot until a later scan can see them.
pub fn diff_with_unreadable(
    previous: &Snapshot,
    current: &DirectoryNode,
    tolerance: Duration,
    unreadable: &[RelativePath],
) -> Result<ChangeSet, PrimitiveError> {
    let changes = diff_with_tolerance(previous, current, tolerance)?;
    if unreadable.is_empty() {
        return Ok(changes);
    }
    let deleted = changes
        .deleted()
        .iter()
        .filter(|path| !unreadable.iter().any(|skipped| path.is_within(skipped)))
        .cloned()
        .collect();
    ChangeSet::new(changes.added().clone(), changes.updated().clone(), deleted)
}

/// Diff two flattened snapshots.
pub fn diff_snapshots(
    previous: &Snapshot,
    current: &Snapshot,
    tolerance: Duration,
) -> Result<ChangeSet, PrimitiveError> {
    let mut added = BTreeSet::new();
    let mut updated = BTreeSet::new();
    for (path, timestamp) in current {
        match previous.get(path) {
            None => {
                added.insert(path.clone());
            },
            Some(before) if !before.matches_within(*timestamp, tolerance) => {
                updated.insert(path.clone());
            },
            Some(_) => {},
        }
    }
    let deleted = previous
        .keys()
        .filter(|path| !current.contains_key(*path))
        .cloned()
        .collect();

    ChangeSet::new(added, updated, deleted)
}
