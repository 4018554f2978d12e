//! Upload batches: size-bounded chunks of one sync session.

use crate::changes::FileAction;
use crate::primitives::{PrimitiveError, RelativePath, SessionId};
use std::fmt;

/// Which remote operation a batch belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncOperation {
    /// First full upload.
    Initialize,
    /// Incremental upload of a change set.
    Reinitialize,
}

impl SyncOperation {
    /// Stable label used in logs and error metadata.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Initialize => "initialize",
            Self::Reinitialize => "reinitialize",
        }
    }
}

impl fmt::Display for SyncOperation {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// One file inside a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchEntry {
    /// Repository-relative path.
    pub path: RelativePath,
    /// File bytes; empty for deletions.
    pub content: Vec<u8>,
    /// Remote action.
    pub action: FileAction,
}

impl BatchEntry {
    /// Entry for a new or changed file.
    #[must_use]
    pub const fn upload(path: RelativePath, content: Vec<u8>, action: FileAction) -> Self {
        Self {
            path,
            content,
            action,
        }
    }

    /// Tombstone for a deleted file.
    #[must_use]
    pub const fn tombstone(path: RelativePath) -> Self {
        Self {
            path,
            content: Vec::new(),
            action: FileAction::Delete,
        }
    }

    /// Payload bytes this entry contributes.
    #[must_use]
    pub fn size_bytes(&self) -> u64 {
        self.content.len() as u64
    }
}

/// A network-sized chunk of a session's payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    session_id: SessionId,
    batch_number: u32,
    total_batches: u32,
    entries: Vec<BatchEntry>,
}

impl Batch {
    /// Stamp a batch; `batch_number` must lie in `1..=total_batches`.
    pub fn new(
        session_id: SessionId,
        batch_number: u32,
        total_batches: u32,
        entries: Vec<BatchEntry>,
    ) -> Result<Self, PrimitiveError> {
        if batch_number == 0 || batch_number > total_batches {
            return Err(PrimitiveError::InvalidBatchNumber {
                batch_number,
                total_batches,
            });
        }
        Ok(Self {
            session_id,
            batch_number,
            total_batches,
            entries,
        })
    }

    /// Session shared by every batch of the operation.
    #[must_use]
    pub const fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// 1-based ordinal.
    #[must_use]
    pub const fn batch_number(&self) -> u32 {
        self.batch_number
    }

    /// Number of batches in the session.
    #[must_use]
    pub const fn total_batches(&self) -> u32 {
        self.total_batches
    }

    /// Files in upload order.
    #[must_use]
    pub fn entries(&self) -> &[BatchEntry] {
        &self.entries
    }

    /// Take ownership of the entries.
    #[must_use]
    pub fn into_entries(self) -> Vec<BatchEntry> {
        self.entries
    }

    /// Sum of entry sizes.
    #[must_use]
    pub fn size_bytes(&self) -> u64 {
        self.entries.iter().map(BatchEntry::size_bytes).sum()
    }

    /// First path in the batch, used to point error reports at a file.
    #[must_use]
    pub fn first_path(&self) -> Option<&RelativePath> {
        self.entries.first().map(|entry| &entry.path)
    }

    /// Returns true when the batch carries no files.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_number_must_be_in_range() -> Result<(), PrimitiveError> {
        let session = SessionId::parse("s1")?;
        assert!(Batch::new(session.clone(), 0, 2, Vec::new()).is_err());
        assert!(Batch::new(session.clone(), 3, 2, Vec::new()).is_err());
        assert!(Batch::new(session, 2, 2, Vec::new()).is_ok());
        Ok(())
    }

    #[test]
    fn tombstones_are_empty_deletes() -> Result<(), PrimitiveError> {
        let entry = BatchEntry::tombstone(RelativePath::parse("gone.txt")?);
        assert_eq!(entry.action, FileAction::Delete);
        assert_eq!(entry.size_bytes(), 0);
        Ok(())
    }

    #[test]
    fn size_sums_entries() -> Result<(), PrimitiveError> {
        let batch = Batch::new(
            SessionId::parse("s1")?,
            1,
            1,
            vec![
                BatchEntry::upload(RelativePath::parse("a")?, vec![0; 5], FileAction::Add),
                BatchEntry::upload(RelativePath::parse("b")?, vec![0; 3], FileAction::Update),
            ],
        )?;
        assert_eq!(batch.size_bytes(), 8);
        assert_eq!(batch.first_path().map(RelativePath::as_str), Some("a"));
        Ok(())
    }
}
