//! Remote index service boundary contract.

use crate::BoxFuture;
use insight_domain::{Batch, QueryMatch, RepositoryId};
use insight_shared::{RequestContext, Result};

/// Acknowledgement of one initialize batch.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InitializeAck {
    /// Repository id, when the remote included one in this response.
    pub repository_id: Option<RepositoryId>,
}

/// A natural-language query against one repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    /// Repository to search.
    pub repository_id: RepositoryId,
    /// Query text.
    pub query: Box<str>,
}

/// Boundary contract for the remote indexing service.
///
/// Batch methods fail with `sync:batch_failed` envelopes that name the batch;
/// implementations never retry.
pub trait RemoteIndexPort: Send + Sync {
    /// Upload one batch of a first-time sync.
    fn initialize_batch(&self, ctx: &RequestContext, batch: Batch)
    -> BoxFuture<'_, Result<InitializeAck>>;

    /// Upload one batch of an incremental sync.
    fn reinitialize_batch(
        &self,
        ctx: &RequestContext,
        repository_id: RepositoryId,
        batch: Batch,
    ) -> BoxFuture<'_, Result<()>>;

    /// Run a query; matches come back in the remote's ranking order.
    fn query(
        &self,
        ctx: &RequestContext,
        request: QueryRequest,
    ) -> BoxFuture<'_, Result<Vec<QueryMatch>>>;

    /// Ask whether the remote still knows `repository_id`.
    fn validate_repository_id(
        &self,
        ctx: &RequestContext,
        repository_id: RepositoryId,
    ) -> BoxFuture<'_, Result<bool>>;
}
