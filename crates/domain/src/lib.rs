//! # insight-domain
//!
//! Domain entities and value objects for the repository sync engine.
//!
//! - **Primitives** - `RepositoryId`, `SessionId`, `RelativePath`
//! - **Files** - `Timestamp`, `FileRecord`, `DirectoryNode`
//! - **Changes** - `ChangeSet`, `FileAction`
//! - **Batches** - `Batch`, `BatchEntry`, `SyncOperation`
//! - **Repository** - `RepositoryState`, `MarkerStatus`
//! - **Query** - `QueryMatch`, `LineSpan`
//! - **Errors** - `RepositoryError`
//!
//! ## Dependency Rules
//!
//! - Depends only on `shared` crate
//! - Pure domain logic with no I/O

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub use insight_shared::shared_crate_version;

pub mod batch;
pub mod changes;
pub mod errors;
pub mod files;
pub mod ignore;
pub mod primitives;
pub mod query;
pub mod repository;

pub use batch::{Batch, BatchEntry, SyncOperation};
pub use changes::{ChangeSet, FileAction};
pub use errors::RepositoryError;
pub use files::{DirectoryNode, FileRecord, Timestamp};
pub use ignore::{BUILTIN_DIRECTORY_RULES, IgnoreRules, IgnoreScope};
pub use primitives::{PrimitiveError, RelativePath, RepositoryId, SessionId};
pub use query::{LineSpan, QueryMatch};
pub use repository::{MarkerStatus, RepositoryState, Snapshot};

/// Returns the domain crate version.
#[must_use]
pub const fn domain_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_crate_compiles() {
        let version = domain_crate_version();
        assert!(!version.is_empty());
    }

    #[test]
    fn domain_depends_on_shared() {
        let shared_version = shared_crate_version();
        assert!(!shared_version.is_empty());
    }
}
