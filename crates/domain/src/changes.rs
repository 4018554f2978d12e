//! Change classification between a stored snapshot and a fresh scan.

use crate::primitives::{PrimitiveError, RelativePath};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// What the remote side must do with one path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileAction {
    /// New file.
    Add,
    /// Modified file.
    Update,
    /// Removed file (sent with empty content).
    Delete,
}

impl FileAction {
    /// Wire label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for FileAction {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Paths classified into added, updated, and deleted.
///
/// The three sets are pairwise disjoint; construction rejects overlaps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    added: BTreeSet<RelativePath>,
    updated: BTreeSet<RelativePath>,
    deleted: BTreeSet<RelativePath>,
}

impl ChangeSet {
    /// Build a change set from its three buckets.
    pub fn new(
        added: BTreeSet<RelativePath>,
        updated: BTreeSet<RelativePath>,
        deleted: BTreeSet<RelativePath>,
    ) -> Result<Self, PrimitiveError> {
        let overlap = added
            .intersection(&updated)
            .chain(added.intersection(&deleted))
            .chain(updated.intersection(&deleted))
            .next();
        if let Some(path) = overlap {
            return Err(PrimitiveError::OverlappingChange {
                path: path.as_str().to_owned(),
            });
        }

        Ok(Self {
            added,
            updated,
            deleted,
        })
    }

    /// Paths present now but not in the snapshot.
    #[must_use]
    pub const fn added(&self) -> &BTreeSet<RelativePath> {
        &self.added
    }

    /// Paths present in both with a different modification time.
    #[must_use]
    pub const fn updated(&self) -> &BTreeSet<RelativePath> {
        &self.updated
    }

    /// Paths in the snapshot that no longer exist.
    #[must_use]
    pub const fn deleted(&self) -> &BTreeSet<RelativePath> {
        &self.deleted
    }

    /// Returns true when nothing changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }

    /// Total number of changed paths.
    #[must_use]
    pub fn len(&self) -> usize {
        self.added.len() + self.updated.len() + self.deleted.len()
    }

    /// Action for a path, if it changed.
    #[must_use]
    pub fn action_for(&self, path: &RelativePath) -> Option<FileAction> {
        if self.added.contains(path) {
            Some(FileAction::Add)
        } else if self.updated.contains(path) {
            Some(FileAction::Update)
        } else if self.deleted.contains(path) {
            Some(FileAction::Delete)
        } else {
            None
        }
    }

    /// Every changed path with its action, sorted by path.
    #[must_use]
    pub fn actions(&self) -> Vec<(&RelativePath, FileAction)> {
        let mut out: Vec<_> = self
            .added
            .iter()
            .map(|path| (path, FileAction::Add))
            .chain(self.updated.iter().map(|path| (path, FileAction::Update)))
            .chain(self.deleted.iter().map(|path| (path, FileAction::Delete)))
            .collect();
        out.sort_by(|left, right| left.0.cmp(right.0));
        out
    }
}
