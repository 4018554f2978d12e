//! Natural-language query against the remote index.

use crate::operation_log::{OperationLog, insert, root_fields};
use insight_domain::{QueryMatch, RepositoryError, RepositoryId};
use insight_ports::{LocalStatePort, LogFields, LoggerPort, QueryRequest, RemoteIndexPort};
use insight_shared::{ErrorCode, ErrorEnvelope, RequestContext, Result};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

/// Input payload for query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRepositoryInput {
    /// Repository root directory (absolute path).
    pub root: PathBuf,
    /// Query text.
    pub query: Box<str>,
    /// Ask the remote whether it still knows the stored id before querying.
    pub validate_repository_id: bool,
}

/// Dependencies required by query.
#[derive(Clone)]
pub struct QueryRepositoryDeps {
    /// Remote index service.
    pub remote: Arc<dyn RemoteIndexPort>,
    /// Marker store bound to the repository root.
    pub state: Arc<dyn LocalStatePort>,
    /// Optional logger.
    pub logger: Option<Arc<dyn LoggerPort>>,
}

/// Output returned by query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRepositoryOutput {
    /// Repository that was searched.
    pub repository_id: RepositoryId,
    /// Matches in ranking order.
    pub matches: Vec<QueryMatch>,
}

/// Run `input.query` against the repository's remote index.
pub async fn query_repository(
    ctx: &RequestContext,
    deps: &QueryRepositoryDeps,
    input: QueryRepositoryInput,
) -> Result<QueryRepositoryOutput> {
    let log = OperationLog::start(
        deps.logger.as_ref(),
        "query",
        "Query repository",
        root_fields(&input.root),
    );
    let result = run_query(ctx, deps, input).await;
    log.finish(result, |output| {
        let mut fields = LogFields::new();
        insert(&mut fields, "matches", Value::from(output.matches.len()));
        fields
    })
}

async fn run_query(
    ctx: &RequestContext,
    deps: &QueryRepositoryDeps,
    input: QueryRepositoryInput,
) -> Result<QueryRepositoryOutput> {
    ctx.ensure_not_cancelled("query_repository.start")?;

    let query = input.query.trim();
    if query.is_empty() {
        return Err(ErrorEnvelope::expected(
            ErrorCode::invalid_input(),
            "query must not be empty",
        ));
    }

    let repository_id = deps.state.repository_id(ctx).await?;
    if input.validate_repository_id
        && !deps
            .remote
            .validate_repository_id(ctx, repository_id.clone())
            .await?
    {
        return Err(RepositoryError::UnknownRemote {
            repository_id: repository_id.as_str().to_owned(),
        }
        .into());
    }

    let matches = deps
        .remote
        .query(
            ctx,
            QueryRequest {
                repository_id: repository_id.clone(),
                query: query.into(),
            },
        )
        .await?;
    Ok(QueryRepositoryOutput {
        repository_id,
        matches,
    })
}
