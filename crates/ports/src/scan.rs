//! Tree scanning and ignore-rule boundary contracts.

use crate::BoxFuture;
use insight_domain::{DirectoryNode, IgnoreRules};
use insight_shared::{RequestContext, Result};
use std::fmt;
use std::path::PathBuf;

/// Input to a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRequest {
    /// Absolute repository root.
    pub root: PathBuf,
    /// Uncompiled ignore rules; compiled once before any entry is read.
    pub rules: IgnoreRules,
}

/// Why an entry was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanWarningKind {
    /// The entry could not be read.
    PermissionDenied,
    /// The entry disappeared between listing and reading.
    Vanished,
    /// The entry name is not valid UTF-8.
    InvalidName,
}

impl ScanWarningKind {
    /// Stable label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PermissionDenied => "permission_denied",
            Self::Vanished => "vanished",
            Self::InvalidName => "invalid_name",
        }
    }
}

impl fmt::Display for ScanWarningKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// A recovered per-entry failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanWarning {
    /// Repository-relative path of the skipped entry.
    pub path: Box<str>,
    /// Failure kind.
    pub kind: ScanWarningKind,
    /// Underlying error message.
    pub detail: Box<str>,
}

/// Scan result: the sorted tree plus skipped entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOutput {
    /// Files that were read, sorted by path at every level.
    pub tree: DirectoryNode,
    /// Entries skipped with a warning, sorted by path.
    pub warnings: Vec<ScanWarning>,
}

/// Boundary contract for walking a repository.
pub trait TreeScannerPort: Send + Sync {
    /// Walk `request.root`, leaving out ignored entries.
    fn scan(&self, ctx: &RequestContext, request: ScanRequest)
    -> BoxFuture<'_, Result<ScanOutput>>;
}

/// Boundary contract for the per-repository ignore-rule source.
pub trait IgnoreRulesPort: Send + Sync {
    /// Load the rules that apply to `root`.
    fn load_rules(&self, ctx: &RequestContext, root: PathBuf) -> BoxFuture<'_, Result<IgnoreRules>>;
}
