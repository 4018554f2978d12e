//! # insight-app
//!
//! Application use cases for the repository sync engine.
//! This crate depends on `ports`, `domain`, and `shared`.
//!
//! - **Pure steps** - `change_detector`, `batch_planner`
//! - **Remote fan-out** - `dispatcher`
//! - **Use cases** - initialize, reinitialize, sync, uninitialize, query, status

pub mod batch_planner;
pub mod change_detector;
pub mod dispatcher;
pub mod initialize_repository;
mod operation_log;
pub mod query_repository;
pub mod reinitialize_repository;
pub mod repository_status;
pub mod session;
pub mod sync_repository;
pub mod uninitialize_repository;

pub use batch_planner::{DEFAULT_MAX_BATCH_BYTES, plan, plan_with_session};
pub use change_detector::{
    TIMESTAMP_TOLERANCE, diff, diff_with_tolerance, diff_with_unreadable,
};
pub use dispatcher::{DispatchOptions, DispatchSummary, SyncDispatcher};
pub use initialize_repository::{InitializeRepositoryOutput, initialize_repository};
pub use query_repository::{
    QueryRepositoryDeps, QueryRepositoryInput, QueryRepositoryOutput, query_repository,
};
pub use reinitialize_repository::{ReinitializeRepositoryOutput, reinitialize_repository};
pub use repository_status::{RepositoryStatusDeps, RepositoryStatusOutput, repository_status};
pub use session::{SyncDeps, SyncInput, SyncSettings};
pub use sync_repository::{SyncOutcome, sync_repository};
pub use uninitialize_repository::{
    UninitializeRepositoryDeps, UninitializeRepositoryInput, UninitializeRepositoryOutput,
    uninitialize_repository,
};

/// Returns the app crate version.
#[must_use]
pub const fn app_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;
    use insight_domain::domain_crate_version;
    use insight_ports::ports_crate_version;
    use insight_shared::shared_crate_version;

    #[test]
    fn app_crate_compiles() {
        let version = app_crate_version();
        assert!(!version.is_empty());
    }

    #[test]
    fn app_can_use_ports_domain_shared() {
        let ports_version = ports_crate_version();
        let domain_version = domain_crate_version();
        let shared_version = shared_crate_version();

        assert!(!ports_version.is_empty());
        assert!(!domain_version.is_empty());
        assert!(!shared_version.is_empty());
    }
}
