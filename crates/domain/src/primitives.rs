//! Domain primitives with validated constructors.

use insight_shared::{ErrorCode, ErrorEnvelope};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Validation failures for domain primitives and value objects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrimitiveError {
    /// `RepositoryId` is empty after trimming.
    InvalidRepositoryId {
        /// Length of the raw input before trimming.
        input_length: usize,
    },
    /// `SessionId` is empty or contains characters unsafe for a cookie value.
    InvalidSessionId {
        /// Length of the raw input before trimming.
        input_length: usize,
    },
    /// `RelativePath` is empty, absolute, or escapes the repository root.
    InvalidRelativePath {
        /// Raw input that failed validation.
        input: String,
        /// Which rule the input violated.
        reason: &'static str,
    },
    /// `LineSpan` start/end must be >= 1.
    LineSpanNonPositive {
        /// Starting line (1-indexed).
        start_line: u32,
        /// Ending line (1-indexed).
        end_line: u32,
    },
    /// `LineSpan` start must be <= end.
    LineSpanStartAfterEnd {
        /// Starting line (1-indexed).
        start_line: u32,
        /// Ending line (1-indexed).
        end_line: u32,
    },
    /// A tree entry does not sit directly under its parent node.
    EntryOutsideNode {
        /// Node path.
        node: String,
        /// Offending entry path.
        entry: String,
    },
    /// Two sibling entries share a path.
    DuplicateEntry {
        /// Duplicate path.
        path: String,
    },
    /// A path was classified into more than one change bucket.
    OverlappingChange {
        /// Path present in more than one bucket.
        path: String,
    },
    /// A batch ordinal is outside `1..=total_batches`.
    InvalidBatchNumber {
        /// 1-based batch number.
        batch_number: u32,
        /// Total batches in the session.
        total_batches: u32,
    },
    /// An added or updated path has no timestamp to record.
    MissingTimestamp {
        /// Path without a timestamp.
        path: String,
    },
}

impl PrimitiveError {
    fn error_code(&self) -> ErrorCode {
        match self {
            Self::InvalidRepositoryId { .. } => ErrorCode::new("domain", "invalid_repository_id"),
            Self::InvalidSessionId { .. } => ErrorCode::new("domain", "invalid_session_id"),
            Self::InvalidRelativePath { .. } => ErrorCode::new("domain", "invalid_relative_path"),
            Self::LineSpanNonPositive { .. } | Self::LineSpanStartAfterEnd { .. } => {
                ErrorCode::new("domain", "invalid_line_span")
            },
            Self::EntryOutsideNode { .. } | Self::DuplicateEntry { .. } => {
                ErrorCode::new("domain", "invalid_tree")
            },
            Self::OverlappingChange { .. } => ErrorCode::new("domain", "overlapping_change"),
            Self::InvalidBatchNumber { .. } => ErrorCode::new("domain", "invalid_batch_number"),
            Self::MissingTimestamp { .. } => ErrorCode::new("domain", "missing_timestamp"),
        }
    }

    const fn is_invariant(&self) -> bool {
        matches!(
            self,
            Self::EntryOutsideNode { .. }
                | Self::DuplicateEntry { .. }
                | Self::OverlappingChange { .. }
                | Self::InvalidBatchNumber { .. }
                | Self::MissingTimestamp { .. }
        )
    }
}

impl fmt::Display for PrimitiveError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidRepositoryId { .. } => {
                formatter.write_str("RepositoryId must be non-empty")
            },
            Self::InvalidSessionId { .. } => {
                formatter.write_str("SessionId must be non-empty alphanumeric")
            },
            Self::InvalidRelativePath { input, reason } => {
                write!(formatter, "invalid relative path {input:?}: {reason}")
            },
            Self::LineSpanNonPositive { .. } => {
                formatter.write_str("LineSpan start_line/end_line must be >= 1")
            },
            Self::LineSpanStartAfterEnd { .. } => {
                formatter.write_str("LineSpan start_line must be <= end_line")
            },
            Self::EntryOutsideNode { node, entry } => {
                write!(formatter, "entry {entry} does not belong to directory {node:?}")
            },
            Self::DuplicateEntry { path } => write!(formatter, "duplicate tree entry: {path}"),
            Self::OverlappingChange { path } => {
                write!(formatter, "path {path} appears in more than one change bucket")
            },
            Self::InvalidBatchNumber {
                batch_number,
                total_batches,
            } => write!(
                formatter,
                "batch number {batch_number} is outside 1..={total_batches}"
            ),
            Self::MissingTimestamp { path } => {
                write!(formatter, "no timestamp recorded for changed path {path}")
            },
        }
    }
}

impl std::error::Error for PrimitiveError {}

impl From<PrimitiveError> for ErrorEnvelope {
    fn from(error: PrimitiveError) -> Self {
        let mut envelope = if error.is_invariant() {
            Self::invariant(error.error_code(), error.to_string())
        } else {
            Self::expected(error.error_code(), error.to_string())
        };

        match error {
            PrimitiveError::InvalidRepositoryId { input_length }
            | PrimitiveError::InvalidSessionId { input_length } => {
                envelope = envelope.with_metadata("inputLength", input_length.to_string());
            },
            PrimitiveError::InvalidRelativePath { input, .. } => {
                envelope = envelope.with_metadata("input", input);
            },
            PrimitiveError::LineSpanNonPositive {
                start_line,
                end_line,
            }
            | PrimitiveError::LineSpanStartAfterEnd {
                start_line,
                end_line,
            } => {
                envelope = envelope
                    .with_metadata("startLine", start_line.to_string())
                    .with_metadata("endLine", end_line.to_string());
            },
            PrimitiveError::EntryOutsideNode { entry, .. } => {
                envelope = envelope.with_metadata("path", entry);
            },
            PrimitiveError::DuplicateEntry { path }
            | PrimitiveError::OverlappingChange { path }
            | PrimitiveError::MissingTimestamp { path } => {
                envelope = envelope.with_metadata("path", path);
            },
            PrimitiveError::InvalidBatchNumber {
                batch_number,
                total_batches,
            } => {
                envelope = envelope
                    .with_metadata("batchNumber", batch_number.to_string())
                    .with_metadata("totalBatches", total_batches.to_string());
            },
        }

        envelope
    }
}

/// Identifier the remote service assigns to a repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RepositoryId(Box<str>);

impl RepositoryId {
    /// Parse a `RepositoryId` from a remote response or the local marker.
    pub fn parse(input: impl AsRef<str>) -> Result<Self, PrimitiveError> {
        let raw = input.as_ref();
        let Some(trimmed) = trimmed_non_empty(raw) else {
            return Err(PrimitiveError::InvalidRepositoryId {
                input_length: raw.len(),
            });
        };

        Ok(Self(trimmed.to_owned().into_boxed_str()))
    }

    /// Access the underlying string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume and return the underlying string.
    #[must_use]
    pub fn into_inner(self) -> Box<str> {
        self.0
    }
}

impl AsRef<str> for RepositoryId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for RepositoryId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Opaque identifier shared by every batch of one sync operation.
///
/// Carried as the `session_id` cookie, so only ASCII alphanumerics, `-` and
/// `_` are accepted.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Box<str>);

impl SessionId {
    /// Parse a `SessionId`.
    pub fn parse(input: impl AsRef<str>) -> Result<Self, PrimitiveError> {
        let raw = input.as_ref();
        let invalid = || PrimitiveError::InvalidSessionId {
            input_length: raw.len(),
        };
        let trimmed = trimmed_non_empty(raw).ok_or_else(invalid)?;
        if !trimmed
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
        {
            return Err(invalid());
        }

        Ok(Self(trimmed.to_owned().into_boxed_str()))
    }

    /// Access the underlying string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Session ids authorize uploads; keep them out of debug output.
impl fmt::Debug for SessionId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("SessionId([REDACTED])")
    }
}

/// A `/`-separated path relative to the repository root.
///
/// The root itself is the empty path and can only be built with
/// [`RelativePath::root`]; `parse` rejects it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RelativePath(Box<str>);

impl RelativePath {
    /// The repository root.
    #[must_use]
    pub fn root() -> Self {
        Self(Box::from(""))
    }

    /// Parse a non-root relative path. Backslashes are normalized to `/`.
    pub fn parse(input: impl AsRef<str>) -> Result<Self, PrimitiveError> {
        let raw = input.as_ref();
        let normalized = raw.replace('\\', "/");
        let reject = |reason| PrimitiveError::InvalidRelativePath {
            input: raw.to_owned(),
            reason,
        };

        if normalized.is_empty() {
            return Err(reject("path must be non-empty"));
        }
        if normalized.starts_with('/') {
            return Err(reject("path must be relative"));
        }
        for segment in normalized.split('/') {
            validate_segment(segment).map_err(reject)?;
        }

        Ok(Self(normalized.into_boxed_str()))
    }

    /// Append one path segment.
    pub fn join(&self, name: &str) -> Result<Self, PrimitiveError> {
        validate_segment(name).map_err(|reason| PrimitiveError::InvalidRelativePath {
            input: name.to_owned(),
            reason,
        })?;
        if self.is_root() {
            return Ok(Self(Box::from(name)));
        }
        Ok(Self(format!("{}/{name}", self.0).into_boxed_str()))
    }

    /// Returns true for the repository root.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Parent directory (the root for top-level entries and for the root itself).
    #[must_use]
    pub fn parent(&self) -> Self {
        self.0
            .rsplit_once('/')
            .map_or_else(Self::root, |(parent, _)| Self(Box::from(parent)))
    }

    /// Returns true when `self` is `ancestor` or lies beneath it.
    #[must_use]
    pub fn is_within(&self, ancestor: &Self) -> bool {
        ancestor.is_root()
            || self
                .0
                .strip_prefix(ancestor.as_str())
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    }

    /// Last path segment.
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or_default()
    }

    /// Access the underlying string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for RelativePath {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for RelativePath {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            formatter.write_str(".")
        } else {
            formatter.write_str(self.as_str())
        }
    }
}

impl TryFrom<String> for RelativePath {
    type Error = PrimitiveError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<RelativePath> for String {
    fn from(value: RelativePath) -> Self {
        value.0.into_string()
    }
}

fn validate_segment(segment: &str) -> Result<(), &'static str> {
    match segment {
        "" => Err("path segments must be non-empty"),
        "." | ".." => Err("path must not contain relative segments"),
        _ if segment.contains('/') => Err("segment must not contain '/'"),
        _ => Ok(()),
    }
}

fn trimmed_non_empty(input: &str) -> Option<&str> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn repository_id_requires_non_empty_input() {
        let error = RepositoryId::parse("   ").err();
        assert!(matches!(
            error,
            Some(PrimitiveError::InvalidRepositoryId { input_length: 3 })
        ));
    }

    #[test]
    fn session_id_rejects_cookie_unsafe_characters() {
        assert!(SessionId::parse("abc;def").is_err());
        assert!(SessionId::parse("a1b2-c3_d4").is_ok());
    }

    #[test]
    fn session_id_debug_is_redacted() -> Result<(), PrimitiveError> {
        let session = SessionId::parse("deadbeef")?;
        assert!(!format!("{session:?}").contains("deadbeef"));
        Ok(())
    }

    #[test]
    fn relative_path_rejects_escapes() {
        for input in ["", "/etc/passwd", "a/../b", "./a", "a//b"] {
            assert!(RelativePath::parse(input).is_err(), "accepted {input:?}");
        }
    }

    #[test]
    fn relative_path_parent_and_join() -> Result<(), PrimitiveError> {
        let path = RelativePath::parse("src\\app\\main.rs")?;
        assert_eq!(path.as_str(), "src/app/main.rs");
        assert_eq!(path.file_name(), "main.rs");
        assert_eq!(path.parent().as_str(), "src/app");

        let top = RelativePath::root().join("README.md")?;
        assert_eq!(top.as_str(), "README.md");
        assert!(top.parent().is_root());
        assert_eq!(RelativePath::root().to_string(), ".");
        Ok(())
    }

    #[test]
    fn relative_path_containment_respects_segments() -> Result<(), PrimitiveError> {
        let locked = RelativePath::parse("locked")?;
        assert!(RelativePath::parse("locked/a.txt")?.is_within(&locked));
        assert!(locked.is_within(&locked));
        assert!(!RelativePath::parse("locked2/a.txt")?.is_within(&locked));
        assert!(locked.is_within(&RelativePath::root()));
        Ok(())
    }

    #[test]
    fn relative_path_round_trips_through_serde() -> Result<(), serde_json::Error> {
        let parsed: RelativePath = serde_json::from_str("\"docs/guide.md\"")?;
        assert_eq!(parsed.as_str(), "docs/guide.md");
        assert!(serde_json::from_str::<RelativePath>("\"../x\"").is_err());
        Ok(())
    }

    #[test]
    fn primitive_errors_map_to_envelopes() {
        let envelope = ErrorEnvelope::from(PrimitiveError::OverlappingChange {
            path: "a.txt".to_owned(),
        });
        assert_eq!(envelope.kind, insight_shared::ErrorKind::Invariant);
        assert_eq!(envelope.metadata_value("path"), Some("a.txt"));
    }

    proptest! {
        #[test]
        fn joined_segments_parse_back(segments in prop::collection::vec(segment(), 1..6)) {
            let mut path = RelativePath::root();
            for segment in &segments {
                path = path.join(segment).map_err(|error| TestCaseError::fail(error.to_string()))?;
            }
            let reparsed = RelativePath::parse(path.as_str())
                .map_err(|error| TestCaseError::fail(error.to_string()))?;
            prop_assert_eq!(reparsed, path);
        }
    }

    fn segment() -> impl Strategy<Value = String> {
        "[a-zA-Z0-9_][a-zA-Z0-9_.-]{0,11}".prop_filter("relative segment", |value| {
            value != "." && value != ".."
        })
    }
}
