//! Persisted repository state and its lifecycle.

use crate::changes::ChangeSet;
use crate::files::Timestamp;
use crate::primitives::{PrimitiveError, RelativePath, RepositoryId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Path → modification time as of the last acknowledged sync.
pub type Snapshot = BTreeMap<RelativePath, Timestamp>;

/// What the remote side has, as far as this machine knows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryState {
    /// Identifier assigned by the remote side.
    pub repository_id: RepositoryId,
    /// Last acknowledged modification time per tracked file.
    pub file_timestamps: Snapshot,
}

impl RepositoryState {
    /// State recorded right after a successful initialize.
    #[must_use]
    pub const fn new(repository_id: RepositoryId, file_timestamps: Snapshot) -> Self {
        Self {
            repository_id,
            file_timestamps,
        }
    }

    /// Fold an acknowledged change set into the snapshot.
    ///
    /// Added and updated paths take their time from `new_timestamps`; deleted
    /// paths are dropped. Nothing is modified when a timestamp is missing.
    pub fn apply(
        &mut self,
        changes: &ChangeSet,
        new_timestamps: &Snapshot,
    ) -> Result<(), PrimitiveError> {
        let mut upserts = Vec::with_capacity(changes.added().len() + changes.updated().len());
        for path in changes.added().iter().chain(changes.updated()) {
            let Some(timestamp) = new_timestamps.get(path) else {
                return Err(PrimitiveError::MissingTimestamp {
                    path: path.as_str().to_owned(),
                });
            };
            upserts.push((path.clone(), *timestamp));
        }

        self.file_timestamps.extend(upserts);
        for path in changes.deleted() {
            self.file_timestamps.remove(path);
        }
        Ok(())
    }

    /// Number of tracked files.
    #[must_use]
    pub fn tracked_files(&self) -> usize {
        self.file_timestamps.len()
    }
}

/// Observable state of the local marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkerStatus {
    /// No marker exists.
    Uninitialized,
    /// A well-formed marker exists.
    Valid(RepositoryState),
    /// A marker exists but cannot be read.
    Corrupted {
        /// Why the marker was rejected.
        reason: String,
    },
}

impl MarkerStatus {
    /// Stable label for output.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Valid(_) => "initialized",
            Self::Corrupted { .. } => "corrupted",
        }
    }

    /// Returns true when some marker (valid or not) exists on disk.
    #[must_use]
    pub const fn marker_exists(&self) -> bool {
        !matches!(self, Self::Uninitialized)
    }
}
