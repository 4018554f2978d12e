//! Send planned batches to the remote index with bounded concurrency.
//!
//! Every batch runs as its own task. The first failure aborts the tasks still
//! in flight and is returned as-is; cancellation of the request context drops
//! the task set the same way.

use insight_domain::{Batch, RepositoryError, RepositoryId, SyncOperation};
use insight_ports::{InitializeAck, LogFields, LoggerPort, RemoteIndexPort};
use insight_shared::{ErrorCode, ErrorEnvelope, RequestContext, Result};
use serde_json::Value;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Dispatch tuning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchOptions {
    /// Upper bound on in-flight requests; `None` sends every batch at once.
    pub max_concurrent_requests: Option<NonZeroUsize>,
}

/// Totals for a completed dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    /// Batches acknowledged.
    pub batches: usize,
    /// Files carried across every batch.
    pub files: usize,
    /// Payload bytes carried across every batch.
    pub bytes: u64,
}

impl DispatchSummary {
    fn of(batches: &[Batch]) -> Self {
        Self {
            batches: batches.len(),
            files: batches.iter().map(|batch| batch.entries().len()).sum(),
            bytes: batches.iter().map(Batch::size_bytes).sum(),
        }
    }
}

/// Remote-facing half of a sync session.
#[derive(Clone)]
pub struct SyncDispatcher {
    remote: Arc<dyn RemoteIndexPort>,
    options: DispatchOptions,
    logger: Option<Arc<dyn LoggerPort>>,
}

impl SyncDispatcher {
    /// Build a dispatcher over `remote`.
    pub fn new(
        remote: Arc<dyn RemoteIndexPort>,
        options: DispatchOptions,
        logger: Option<Arc<dyn LoggerPort>>,
    ) -> Self {
        Self {
            remote,
            options,
            logger,
        }
    }

    /// Upload every batch of a first sync and resolve the repository id the
    /// remote assigned.
    pub async fn initialize(
        &self,
        ctx: &RequestContext,
        batches: Vec<Batch>,
    ) -> Result<(RepositoryId, DispatchSummary)> {
        let summary = DispatchSummary::of(&batches);
        let total_batches = batches.first().map_or(0, Batch::total_batches);
        let remote = Arc::clone(&self.remote);

        let mut acks = self
            .run(ctx, SyncOperation::Initialize, batches, move |ctx, batch| {
                let remote = Arc::clone(&remote);
                async move {
                    let batch_number = batch.batch_number();
                    let ack = remote.initialize_batch(&ctx, batch).await?;
                    Ok((batch_number, ack))
                }
            })
            .await?;
        acks.sort_by_key(|(batch_number, _)| *batch_number);

        let repository_id = resolve_repository_id(acks, total_batches)?;
        Ok((repository_id, summary))
    }

    /// Upload every batch of an incremental sync for `repository_id`.
    pub async fn reinitialize(
        &self,
        ctx: &RequestContext,
        repository_id: &RepositoryId,
        batches: Vec<Batch>,
    ) -> Result<DispatchSummary> {
        let summary = DispatchSummary::of(&batches);
        let remote = Arc::clone(&self.remote);
        let repository_id = repository_id.clone();

        self.run(ctx, SyncOperation::Reinitialize, batches, move |ctx, batch| {
            let remote = Arc::clone(&remote);
            let repository_id = repository_id.clone();
            async move { remote.reinitialize_batch(&ctx, repository_id, batch).await }
        })
        .await?;
        Ok(summary)
    }

    async fn run<T, F, Fut>(
        &self,
        ctx: &RequestContext,
        operation: SyncOperation,
        batches: Vec<Batch>,
        send: F,
    ) -> Result<Vec<T>>
    where
        T: Send + 'static,
        F: Fn(RequestContext, Batch) -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        ctx.ensure_not_cancelled("sync.dispatch")?;

        let limiter = self
            .options
            .max_concurrent_requests
            .map(|limit| Arc::new(Semaphore::new(limit.get())));
        let mut tasks = JoinSet::new();
        let expected = batches.len();

        for batch in batches {
            let fields = batch_fields(operation, &batch);
            let request = send(ctx.clone(), batch);
            let limiter = limiter.clone();
            let logger = self.logger.clone();
            tasks.spawn(async move {
                let _permit = match limiter {
                    Some(limiter) => Some(limiter.acquire_owned().await.map_err(|_| {
                        ErrorEnvelope::invariant(ErrorCode::internal(), "dispatch limiter closed")
                    })?),
                    None => None,
                };
                let value = request.await?;
                if let Some(logger) = logger.as_ref() {
                    logger.debug("sync.batch.sent", "Batch acknowledged", Some(fields));
                }
                Ok(value)
            });
        }

        ctx.run_cancellable("sync.dispatch", join_all(tasks, expected))
            .await
    }
}

async fn join_all<T: Send + 'static>(
    mut tasks: JoinSet<Result<T>>,
    expected: usize,
) -> Result<Vec<T>> {
    let mut values = Vec::with_capacity(expected);
    while let Some(joined) = tasks.join_next().await {
        let outcome = joined.map_err(|error| {
            ErrorEnvelope::invariant(ErrorCode::internal(), format!("batch task failed: {error}"))
        });
        match outcome.and_then(|result| result) {
            Ok(value) => values.push(value),
            Err(error) => {
                tasks.abort_all();
                return Err(error);
            },
        }
    }
    Ok(values)
}

fn resolve_repository_id(
    acks: Vec<(u32, InitializeAck)>,
    total_batches: u32,
) -> Result<RepositoryId> {
    let mut resolved: Option<RepositoryId> = None;
    for (_, ack) in acks {
        let Some(candidate) = ack.repository_id else {
            continue;
        };
        match resolved.as_ref() {
            None => resolved = Some(candidate),
            Some(first) if *first == candidate => {},
            Some(first) => {
                return Err(RepositoryError::InconsistentRepositoryId {
                    first: first.as_str().to_owned(),
                    second: candidate.as_str().to_owned(),
                }
                .into());
            },
        }
    }
    resolved.ok_or_else(|| RepositoryError::MissingRepositoryId { total_batches }.into())
}

fn batch_fields(operation: SyncOperation, batch: &Batch) -> LogFields {
    let mut fields = LogFields::new();
    fields.insert(
        "operation".to_owned().into_boxed_str(),
        Value::String(operation.as_str().to_owned()),
    );
    fields.insert(
        "batchNumber".to_owned().into_boxed_str(),
        Value::from(batch.batch_number()),
    );
    fields.insert(
        "totalBatches".to_owned().into_boxed_str(),
        Value::from(batch.total_batches()),
    );
    fields.insert(
        "fileCount".to_owned().into_boxed_str(),
        Value::from(batch.entries().len()),
    );
    fields.insert(
        "sizeBytes".to_owned().into_boxed_str(),
        Value::from(batch.size_bytes()),
    );
    fields
}
