//! Scanned file tree: timestamps, file records, and directory nodes.

use crate::primitives::{PrimitiveError, RelativePath};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Modification time in nanoseconds since the Unix epoch.
///
/// Stored at the full resolution the filesystem reports so that equality
/// between two scans of an untouched file is exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Build from raw nanoseconds.
    #[must_use]
    pub const fn from_nanos(nanos: i64) -> Self {
        Self(nanos)
    }

    /// Convert a filesystem time, saturating outside the `i64` nanosecond range.
    #[must_use]
    pub fn from_system_time(time: SystemTime) -> Self {
        let nanos = match time.duration_since(UNIX_EPOCH) {
            Ok(after) => i64::try_from(after.as_nanos()).unwrap_or(i64::MAX),
            Err(before) => i64::try_from(before.duration().as_nanos())
                .map_or(i64::MIN, |nanos| -nanos),
        };
        Self(nanos)
    }

    /// Raw nanoseconds.
    #[must_use]
    pub const fn as_nanos(self) -> i64 {
        self.0
    }

    /// Returns true when the two instants differ by at most `tolerance`.
    #[must_use]
    pub fn matches_within(self, other: Self, tolerance: Duration) -> bool {
        let difference = self.0.abs_diff(other.0);
        u128::from(difference) <= tolerance.as_nanos()
    }
}

/// Immutable snapshot of one file at scan time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    path: RelativePath,
    content: Vec<u8>,
    last_modified: Timestamp,
}

impl FileRecord {
    /// Build a record. The repository root is not a valid file path.
    pub fn new(
        path: RelativePath,
        content: Vec<u8>,
        last_modified: Timestamp,
    ) -> Result<Self, PrimitiveError> {
        if path.is_root() {
            return Err(PrimitiveError::InvalidRelativePath {
                input: String::new(),
                reason: "a file cannot be the repository root",
            });
        }
        Ok(Self {
            path,
            content,
            last_modified,
        })
    }

    /// Repository-relative path.
    #[must_use]
    pub const fn path(&self) -> &RelativePath {
        &self.path
    }

    /// File contents read at scan time.
    #[must_use]
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// Modification time at scan time.
    #[must_use]
    pub const fn last_modified(&self) -> Timestamp {
        self.last_modified
    }

    /// Content length in bytes.
    #[must_use]
    pub fn size_bytes(&self) -> u64 {
        self.content.len() as u64
    }

    /// Split into owned parts.
    #[must_use]
    pub fn into_parts(self) -> (RelativePath, Vec<u8>, Timestamp) {
        (self.path, self.content, self.last_modified)
    }
}

/// A directory in the scanned tree.
///
/// Files and children sit directly beneath `path`, are unique by path, and
/// are kept sorted by path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryNode {
    path: RelativePath,
    files: Vec<FileRecord>,
    children: Vec<Self>,
}

impl DirectoryNode {
    /// Assemble a node from entries produced by independent scan tasks.
    pub fn new(
        path: RelativePath,
        mut files: Vec<FileRecord>,
        mut children: Vec<Self>,
    ) -> Result<Self, PrimitiveError> {
        files.sort_by(|left, right| left.path.cmp(&right.path));
        children.sort_by(|left, right| left.path.cmp(&right.path));

        let mut seen = BTreeSet::new();
        let entries = files
            .iter()
            .map(FileRecord::path)
            .chain(children.iter().map(Self::path));
        for entry in entries {
            if entry.is_root() || entry.parent() != path {
                return Err(PrimitiveError::EntryOutsideNode {
                    node: path.as_str().to_owned(),
                    entry: entry.as_str().to_owned(),
                });
            }
            if !seen.insert(entry) {
                return Err(PrimitiveError::DuplicateEntry {
                    path: entry.as_str().to_owned(),
                });
            }
        }

        Ok(Self {
            path,
            files,
            children,
        })
    }

    /// An empty repository root.
    #[must_use]
    pub fn empty_root() -> Self {
        Self {
            path: RelativePath::root(),
            files: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Directory path (the root is empty).
    #[must_use]
    pub const fn path(&self) -> &RelativePath {
        &self.path
    }

    /// Files directly in this directory.
    #[must_use]
    pub fn files(&self) -> &[FileRecord] {
        &self.files
    }

    /// Subdirectories.
    #[must_use]
    pub fn children(&self) -> &[Self] {
        &self.children
    }

    /// Every file in the subtree, depth-first.
    pub fn iter_files(&self) -> impl Iterator<Item = &FileRecord> + '_ {
        let nested: Box<dyn Iterator<Item = &FileRecord> + '_> =
            Box::new(self.children.iter().flat_map(|child| child.iter_files()));
        self.files.iter().chain(nested)
    }

    /// Number of files in the subtree.
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.files.len() + self.children.iter().map(Self::file_count).sum::<usize>()
    }

    /// Total content bytes in the subtree.
    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.iter_files().map(FileRecord::size_bytes).sum()
    }

    /// Flatten the subtree into a path → modification time mapping.
    #[must_use]
    pub fn file_timestamps(&self) -> BTreeMap<RelativePath, Timestamp> {
        self.iter_files()
            .map(|file| (file.path.clone(), file.last_modified))
            .collect()
    }

    /// Consume the tree into its file records, keyed by path.
    #[must_use]
    pub fn into_files(self) -> BTreeMap<RelativePath, FileRecord> {
        let mut out = BTreeMap::new();
        self.drain_into(&mut out);
        out
    }

    fn drain_into(self, out: &mut BTreeMap<RelativePath, FileRecord>) {
        for file in self.files {
            out.insert(file.path.clone(), file);
        }
        for child in self.children {
            child.drain_into(out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(value: &str) -> Result<RelativePath, PrimitiveError> {
        RelativePath::parse(value)
    }

    fn file(value: &str, bytes: &[u8], nanos: i64) -> Result<FileRecord, PrimitiveError> {
        FileRecord::new(path(value)?, bytes.to_vec(), Timestamp::from_nanos(nanos))
    }

    #[test]
    fn node_sorts_entries_and_flattens() -> Result<(), PrimitiveError> {
        let src = DirectoryNode::new(
            path("src")?,
            vec![file("src/z.rs", b"z", 3)?, file("src/a.rs", b"aa", 2)?],
            Vec::new(),
        )?;
        let root = DirectoryNode::new(
            RelativePath::root(),
            vec![file("README.md", b"hello", 1)?],
            vec![src],
        )?;

        let names: Vec<&str> = root.iter_files().map(|file| file.path().as_str()).collect();
        assert_eq!(names, vec!["README.md", "src/a.rs", "src/z.rs"]);
        assert_eq!(root.file_count(), 3);
        assert_eq!(root.total_bytes(), 8);
        assert_eq!(
            root.file_timestamps().get(&path("src/a.rs")?),
            Some(&Timestamp::from_nanos(2))
        );
        Ok(())
    }

    #[test]
    fn node_rejects_entries_from_other_directories() -> Result<(), PrimitiveError> {
        let error = DirectoryNode::new(path("src")?, vec![file("lib/x.rs", b"", 0)?], Vec::new())
            .err();
        assert!(matches!(error, Some(PrimitiveError::EntryOutsideNode { .. })));
        Ok(())
    }

    #[test]
    fn node_rejects_duplicate_siblings() -> Result<(), PrimitiveError> {
        let error = DirectoryNode::new(
            RelativePath::root(),
            vec![file("a.txt", b"1", 0)?, file("a.txt", b"2", 1)?],
            Vec::new(),
        )
        .err();
        assert!(matches!(error, Some(PrimitiveError::DuplicateEntry { .. })));
        Ok(())
    }

    #[test]
    fn timestamps_compare_with_tolerance() {
        let base = Timestamp::from_nanos(1_000_000_000);
        let later = Timestamp::from_nanos(1_400_000_000);
        assert!(!base.matches_within(later, Duration::ZERO));
        assert!(base.matches_within(later, Duration::from_millis(500)));
        assert!(base.matches_within(base, Duration::ZERO));
    }

    #[test]
    fn system_time_conversion_keeps_nanoseconds() {
        let time = UNIX_EPOCH + Duration::new(5, 123);
        assert_eq!(Timestamp::from_system_time(time).as_nanos(), 5_000_000_123);
        let before = UNIX_EPOCH - Duration::from_nanos(10);
        assert_eq!(Timestamp::from_system_time(before).as_nanos(), -10);
    }

    #[test]
    fn into_files_keys_by_path() -> Result<(), PrimitiveError> {
        let root = DirectoryNode::new(
            RelativePath::root(),
            vec![file("b.txt", b"b", 0)?, file("a.txt", b"a", 0)?],
            Vec::new(),
        )?;
        let files = root.into_files();
        let keys: Vec<&str> = files.keys().map(RelativePath::as_str).collect();
        assert_eq!(keys, vec!["a.txt", "b.txt"]);
        Ok(())
    }
}
