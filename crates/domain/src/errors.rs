//! Sync engine error taxonomy.
//!
//! | family | codes |
//! |---|---|
//! | invalid repository | `repository:not_initialized`, `repository:already_initialized`, `repository:unknown_remote` |
//! | scan | `scan:root_not_found`, `scan:root_not_directory`, `scan:io` |
//! | pattern compile | `ignore:invalid_pattern` |
//! | sync | `sync:batch_failed`, `sync:missing_repository_id`, `sync:inconsistent_repository_id` |
//! | local state corruption | `state:corrupted` |
//! | remote request | `remote:request_failed` |

use crate::batch::SyncOperation;
use crate::ignore::IgnoreScope;
use insight_shared::{ErrorClass, ErrorCode, ErrorEnvelope};
use std::fmt;

/// Failures raised by the sync engine and its adapters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    /// The path has no valid local marker.
    NotInitialized {
        /// Repository root.
        path: String,
    },
    /// A marker already exists at the path.
    AlreadyInitialized {
        /// Repository root.
        path: String,
    },
    /// The remote side no longer recognizes the stored repository id.
    UnknownRemote {
        /// Stored repository id.
        repository_id: String,
    },
    /// The scan root does not exist.
    ScanRootNotFound {
        /// Scan root.
        path: String,
    },
    /// The scan root exists but is not a directory.
    ScanRootNotDirectory {
        /// Scan root.
        path: String,
    },
    /// A filesystem failure aborted the scan.
    ScanIo {
        /// Entry being read.
        path: String,
        /// Underlying error.
        detail: String,
    },
    /// An ignore rule is not a valid regular expression.
    InvalidPattern {
        /// Offending rule.
        pattern: String,
        /// Scope the rule was declared in.
        scope: IgnoreScope,
        /// Compiler message.
        reason: String,
    },
    /// A batch request failed (transport error or non-success status).
    BatchFailed {
        /// Remote operation.
        operation: SyncOperation,
        /// 1-based batch ordinal.
        batch_number: u32,
        /// Batches in the session.
        total_batches: u32,
        /// HTTP status, when a response arrived.
        status: Option<u16>,
        /// First file of the batch, when it had any.
        path: Option<String>,
        /// Transport or response detail.
        detail: String,
    },
    /// No batch acknowledgement carried a repository id.
    MissingRepositoryId {
        /// Batches in the session.
        total_batches: u32,
    },
    /// Batches of one session were acknowledged with different ids.
    InconsistentRepositoryId {
        /// First id seen.
        first: String,
        /// Conflicting id.
        second: String,
    },
    /// A marker exists but cannot be read.
    StateCorrupted {
        /// Marker file.
        path: String,
        /// Parse or read failure.
        reason: String,
    },
    /// A non-batch remote call (query, id validation) failed.
    RemoteRequestFailed {
        /// Remote operation label.
        operation: &'static str,
        /// HTTP status, when a response arrived.
        status: Option<u16>,
        /// Transport or response detail.
        detail: String,
    },
}

impl RepositoryError {
    /// Stable code for this failure.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::NotInitialized { .. } => ErrorCode::new("repository", "not_initialized"),
            Self::AlreadyInitialized { .. } => ErrorCode::new("repository", "already_initialized"),
            Self::UnknownRemote { .. } => ErrorCode::new("repository", "unknown_remote"),
            Self::ScanRootNotFound { .. } => ErrorCode::new("scan", "root_not_found"),
            Self::ScanRootNotDirectory { .. } => ErrorCode::new("scan", "root_not_directory"),
            Self::ScanIo { .. } => ErrorCode::new("scan", "io"),
            Self::InvalidPattern { .. } => ErrorCode::new("ignore", "invalid_pattern"),
            Self::BatchFailed { .. } => ErrorCode::new("sync", "batch_failed"),
            Self::MissingRepositoryId { .. } => ErrorCode::new("sync", "missing_repository_id"),
            Self::InconsistentRepositoryId { .. } => {
                ErrorCode::new("sync", "inconsistent_repository_id")
            },
            Self::StateCorrupted { .. } => ErrorCode::new("state", "corrupted"),
            Self::RemoteRequestFailed { .. } => ErrorCode::new("remote", "request_failed"),
        }
    }

    fn class(&self) -> ErrorClass {
        match self {
            Self::BatchFailed { status, .. } | Self::RemoteRequestFailed { status, .. } => {
                match status {
                    None => ErrorClass::Retriable,
                    Some(code) if *code == 429 || *code >= 500 => ErrorClass::Retriable,
                    Some(_) => ErrorClass::NonRetriable,
                }
            },
            Self::ScanIo { .. } => ErrorClass::Retriable,
            _ => ErrorClass::NonRetriable,
        }
    }
}

impl fmt::Display for RepositoryError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotInitialized { path } => {
                write!(formatter, "{path} is not an insight repository")
            },
            Self::AlreadyInitialized { path } => {
                write!(formatter, "{path} is already an insight repository")
            },
            Self::UnknownRemote { repository_id } => write!(
                formatter,
                "the remote service does not recognize repository {repository_id}"
            ),
            Self::ScanRootNotFound { path } => write!(formatter, "{path} does not exist"),
            Self::ScanRootNotDirectory { path } => write!(formatter, "{path} is not a directory"),
            Self::ScanIo { path, detail } => write!(formatter, "failed to read {path}: {detail}"),
            Self::InvalidPattern {
                pattern,
                scope,
                reason,
            } => write!(
                formatter,
                "invalid {scope} ignore pattern {pattern:?}: {reason}"
            ),
            Self::BatchFailed {
                operation,
                batch_number,
                total_batches,
                status,
                detail,
                ..
            } => {
                write!(
                    formatter,
                    "{operation} batch {batch_number}/{total_batches} failed"
                )?;
                if let Some(status) = status {
                    write!(formatter, " with status {status}")?;
                }
                write!(formatter, ": {detail}")
            },
            Self::MissingRepositoryId { total_batches } => write!(
                formatter,
                "none of {total_batches} batch responses carried a repository_id"
            ),
            Self::InconsistentRepositoryId { first, second } => write!(
                formatter,
                "batches were acknowledged with different repository ids ({first}, {second})"
            ),
            Self::StateCorrupted { path, reason } => {
                write!(formatter, "local state at {path} is corrupted: {reason}")
            },
            Self::RemoteRequestFailed {
                operation,
                status,
                detail,
            } => {
                write!(formatter, "{operation} request failed")?;
                if let Some(status) = status {
                    write!(formatter, " with status {status}")?;
                }
                write!(formatter, ": {detail}")
            },
        }
    }
}

impl std::error::Error for RepositoryError {}

impl From<RepositoryError> for ErrorEnvelope {
    fn from(error: RepositoryError) -> Self {
        let code = error.error_code();
        let class = error.class();
        let message = error.to_string();
        let envelope = match &error {
            RepositoryError::MissingRepositoryId { .. }
            | RepositoryError::InconsistentRepositoryId { .. }
            | RepositoryError::StateCorrupted { .. } => Self::invariant(code, message),
            RepositoryError::ScanIo { .. }
            | RepositoryError::BatchFailed { .. }
            | RepositoryError::RemoteRequestFailed { .. } => Self::unexpected(code, message, class),
            _ => Self::expected(code, message),
        };

        match error {
            RepositoryError::NotInitialized { path }
            | RepositoryError::AlreadyInitialized { path }
            | RepositoryError::ScanRootNotFound { path }
            | RepositoryError::ScanRootNotDirectory { path }
            | RepositoryError::ScanIo { path, .. }
            | RepositoryError::StateCorrupted { path, .. } => envelope.with_metadata("path", path),
            RepositoryError::UnknownRemote { repository_id } => {
                envelope.with_metadata("repositoryId", repository_id)
            },
            RepositoryError::InvalidPattern { pattern, scope, .. } => envelope
                .with_metadata("pattern", pattern)
                .with_metadata("scope", scope.as_str()),
            RepositoryError::BatchFailed {
                operation,
                batch_number,
                total_batches,
                status,
                path,
                ..
            } => {
                let mut envelope = envelope
                    .with_metadata("operation", operation.as_str())
                    .with_metadata("batchNumber", batch_number.to_string())
                    .with_metadata("totalBatches", total_batches.to_string());
                if let Some(status) = status {
                    envelope = envelope.with_metadata("status", status.to_string());
                }
                if let Some(path) = path {
                    envelope = envelope.with_metadata("path", path);
                }
                envelope
            },
            RepositoryError::MissingRepositoryId { total_batches } => {
                envelope.with_metadata("totalBatches", total_batches.to_string())
            },
            RepositoryError::InconsistentRepositoryId { first, second } => envelope
                .with_metadata("repositoryId", first)
                .with_metadata("conflictingRepositoryId", second),
            RepositoryError::RemoteRequestFailed {
                operation, status, ..
            } => {
                let envelope = envelope.with_metadata("operation", operation);
                match status {
                    Some(status) => envelope.with_metadata("status", status.to_string()),
                    None => envelope,
                }
            },
        }
    }
}
