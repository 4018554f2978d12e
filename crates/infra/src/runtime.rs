//! Runtime, interrupt and deadline wiring for one CLI invocation.

use crate::{InfraError, InfraResult};
use insight_shared::{ErrorClass, ErrorCode, ErrorEnvelope, RequestContext, timeout_with_context};
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Drive `op` to completion on a fresh multi-thread runtime.
///
/// Ctrl-C cancels `ctx`. When `deadline` is set the operation is dropped once
/// it elapses, which aborts any in-flight scan or dispatch tasks.
pub fn run_async_with_ctx<F, T>(
    ctx: RequestContext,
    deadline: Option<Duration>,
    op: impl FnOnce(RequestContext) -> F,
) -> InfraResult<T>
where
    F: Future<Output = Result<T, ErrorEnvelope>>,
{
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(InfraError::from)?;
    runtime.block_on(async {
        let watcher = spawn_interrupt_watcher(&ctx);
        let fut = op(ctx.clone());
        let result = match deadline {
            Some(deadline) => {
                timeout_with_context(&ctx, deadline, "repository.operation", fut).await
            },
            None => fut.await,
        };
        finalize_watcher(watcher).await?;
        result
    })
}

fn spawn_interrupt_watcher(ctx: &RequestContext) -> JoinHandle<()> {
    let token = ctx.cancellation_token();
    tokio::spawn(async move {
        tokio::select! {
            () = token.cancelled() => {},
            signal = tokio::signal::ctrl_c() => {
                if signal.is_ok() {
                    token.cancel();
                }
            },
        }
    })
}

async fn finalize_watcher(handle: JoinHandle<()>) -> InfraResult<()> {
    handle.abort();
    if let Err(error) = handle.await
        && error.is_panic()
    {
        return Err(ErrorEnvelope::unexpected(
            ErrorCode::internal(),
            format!("interrupt watcher failed: {error}"),
            ErrorClass::NonRetriable,
        ));
    }
    Ok(())
}
