//! HTTP adapter for the remote index service.
//!
//! Batches go out as multipart bodies carrying one part per file plus the
//! ordinal fields; the session travels in a `session_id` cookie. Every request
//! races the request context, so cancellation drops the in-flight call.

use insight_config::RemoteConfig;
use insight_domain::{Batch, LineSpan, QueryMatch, RepositoryError, RepositoryId, SyncOperation};
use insight_ports::{BoxFuture, InitializeAck, QueryRequest, RemoteIndexPort};
use insight_shared::{ErrorClass, ErrorCode, ErrorEnvelope, RequestContext, Result};
use reqwest::header::COOKIE;
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

const INITIALIZE_PATH: &str = "/initialize_repository";
const REINITIALIZE_PATH: &str = "/reinitialize_repository";
const QUERY_PATH: &str = "/query_repository";
const VALIDATE_PATH: &str = "/validate_repository_id";
const MAX_DETAIL_CHARS: usize = 512;

/// Remote index adapter configuration.
#[derive(Debug, Clone)]
pub struct HttpRemoteIndexConfig {
    /// Service base URL without a trailing slash.
    pub base_url: Box<str>,
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
}

impl HttpRemoteIndexConfig {
    /// Build from the validated remote config.
    #[must_use]
    pub fn from_remote_config(config: &RemoteConfig) -> Self {
        Self {
            base_url: config.api_base_url.clone(),
            timeout_ms: config.timeout_ms,
        }
    }
}

/// reqwest-backed remote index client.
#[derive(Debug, Clone)]
pub struct HttpRemoteIndex {
    client: reqwest::Client,
    base_url: Box<str>,
}

impl HttpRemoteIndex {
    /// Build a client; fails when the timeout is zero or the TLS stack cannot start.
    pub fn new(config: &HttpRemoteIndexConfig) -> Result<Self> {
        if config.timeout_ms == 0 {
            return Err(ErrorEnvelope::expected(
                ErrorCode::invalid_input(),
                "timeout must be greater than zero",
            ));
        }
        let base_url = config.base_url.trim_end_matches('/');
        if base_url.is_empty() {
            return Err(ErrorEnvelope::expected(
                ErrorCode::invalid_input(),
                "base url must be non-empty",
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|error| {
                ErrorEnvelope::unexpected(
                    ErrorCode::new("remote", "client_init_failed"),
                    format!("failed to build HTTP client: {error}"),
                    ErrorClass::NonRetriable,
                )
            })?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn send_batch(
        &self,
        ctx: &RequestContext,
        operation: SyncOperation,
        repository_id: Option<&RepositoryId>,
        batch: Batch,
    ) -> Result<Vec<u8>> {
        let label = match operation {
            SyncOperation::Initialize => "remote.initialize_batch",
            SyncOperation::Reinitialize => "remote.reinitialize_batch",
        };
        ctx.ensure_not_cancelled(label)?;

        let slot = BatchSlot::of(&batch);
        let cookie = format!("session_id={}", batch.session_id().as_str());
        let form = batch_form(batch, repository_id)?;
        let path = match operation {
            SyncOperation::Initialize => INITIALIZE_PATH,
            SyncOperation::Reinitialize => REINITIALIZE_PATH,
        };
        let request = self
            .client
            .post(self.url(path))
            .header(COOKIE, cookie)
            .multipart(form);

        exchange(ctx, label, request)
            .await
            .map_err(|failure| failure.into_batch_error(operation, slot))
    }
}

impl RemoteIndexPort for HttpRemoteIndex {
    fn initialize_batch(
        &self,
        ctx: &RequestContext,
        batch: Batch,
    ) -> BoxFuture<'_, Result<InitializeAck>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            let slot = BatchSlot::of(&batch);
            let payload = self
                .send_batch(&ctx, SyncOperation::Initialize, None, batch)
                .await?;
            decode_initialize_ack(&payload).map_err(|detail| {
                Failure::Decode { detail }.into_batch_error(SyncOperation::Initialize, slot)
            })
        })
    }

    fn reinitialize_batch(
        &self,
        ctx: &RequestContext,
        repository_id: RepositoryId,
        batch: Batch,
    ) -> BoxFuture<'_, Result<()>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            self.send_batch(&ctx, SyncOperation::Reinitialize, Some(&repository_id), batch)
                .await?;
            Ok(())
        })
    }

    fn query(
        &self,
        ctx: &RequestContext,
        request: QueryRequest,
    ) -> BoxFuture<'_, Result<Vec<QueryMatch>>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            const OPERATION: &str = "remote.query";
            ctx.ensure_not_cancelled(OPERATION)?;
            let body = QueryBody {
                repository_id: request.repository_id.as_str(),
                query_string: request.query.as_ref(),
            };
            let builder = self.client.get(self.url(QUERY_PATH)).json(&body);
            let payload = exchange(&ctx, OPERATION, builder)
                .await
                .map_err(|failure| failure.into_request_error("query"))?;
            decode_query_matches(&payload)
                .map_err(|detail| Failure::Decode { detail }.into_request_error("query"))
        })
    }

    fn validate_repository_id(
        &self,
        ctx: &RequestContext,
        repository_id: RepositoryId,
    ) -> BoxFuture<'_, Result<bool>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            const OPERATION: &str = "remote.validate_repository_id";
            ctx.ensure_not_cancelled(OPERATION)?;
            let body = ValidateBody {
                repository_id: repository_id.as_str(),
            };
            let builder = self.client.post(self.url(VALIDATE_PATH)).json(&body);
            let payload = exchange(&ctx, OPERATION, builder)
                .await
                .map_err(|failure| failure.into_request_error("validate_repository_id"))?;
            serde_json::from_slice::<ValidateResponse>(&payload)
                .map(|response| response.repository_id_is_valid)
                .map_err(|error| {
                    Failure::Decode {
                        detail: error.to_string(),
                    }
                    .into_request_error("validate_repository_id")
                })
        })
    }
}

#[derive(Debug, Clone)]
struct BatchSlot {
    batch_number: u32,
    total_batches: u32,
    first_path: Option<String>,
}

impl BatchSlot {
    fn of(batch: &Batch) -> Self {
        Self {
            batch_number: batch.batch_number(),
            total_batches: batch.total_batches(),
            first_path: batch.first_path().map(|path| path.as_str().to_owned()),
        }
    }
}

#[derive(Debug)]
enum Failure {
    Cancelled(ErrorEnvelope),
    Transport { detail: String },
    Status { status: u16, detail: String },
    Decode { detail: String },
}

impl Failure {
    fn into_batch_error(self, operation: SyncOperation, slot: BatchSlot) -> ErrorEnvelope {
        let (status, detail) = match self {
            Self::Cancelled(envelope) => return envelope,
            Self::Transport { detail } => (None, detail),
            Self::Status { status, detail } => (Some(status), detail),
            Self::Decode { detail } => (None, format!("invalid response: {detail}")),
        };
        RepositoryError::BatchFailed {
            operation,
            batch_number: slot.batch_number,
            total_batches: slot.total_batches,
            status,
            path: slot.first_path,
            detail,
        }
        .into()
    }

    fn into_request_error(self, operation: &'static str) -> ErrorEnvelope {
        let (status, detail) = match self {
            Self::Cancelled(envelope) => return envelope,
            Self::Transport { detail } => (None, detail),
            Self::Status { status, detail } => (Some(status), detail),
            Self::Decode { detail } => (None, format!("invalid response: {detail}")),
        };
        RepositoryError::RemoteRequestFailed {
            operation,
            status,
            detail,
        }
        .into()
    }
}

async fn exchange(
    ctx: &RequestContext,
    operation: &'static str,
    request: RequestBuilder,
) -> std::result::Result<Vec<u8>, Failure> {
    let response = tokio::select! {
        () = ctx.cancelled() => return Err(Failure::Cancelled(cancelled_error(operation))),
        result = request.send() => result.map_err(|error| transport_failure(&error))?,
    };

    let status = response.status();
    let payload = tokio::select! {
        () = ctx.cancelled() => return Err(Failure::Cancelled(cancelled_error(operation))),
        result = response.bytes() => result.map_err(|error| transport_failure(&error))?,
    };

    if !status.is_success() {
        return Err(Failure::Status {
            status: status.as_u16(),
            detail: error_detail(status, &payload),
        });
    }
    Ok(payload.to_vec())
}

fn cancelled_error(operation: &'static str) -> ErrorEnvelope {
    ErrorEnvelope::cancelled("operation cancelled").with_metadata("operation", operation)
}

fn transport_failure(error: &reqwest::Error) -> Failure {
    let detail = if error.is_timeout() {
        "request timed out".to_owned()
    } else if error.is_connect() {
        format!("connection failed: {error}")
    } else {
        format!("request failed: {error}")
    };
    Failure::Transport { detail }
}

fn error_detail(status: StatusCode, payload: &[u8]) -> String {
    let detail = serde_json::from_slice::<ErrorResponse>(payload)
        .ok()
        .and_then(|response| response.detail)
        .map(|detail| match detail {
            serde_json::Value::String(text) => text,
            other => other.to_string(),
        })
        .unwrap_or_else(|| String::from_utf8_lossy(payload).trim().to_owned());

    if detail.is_empty() {
        return status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_owned();
    }
    detail.chars().take(MAX_DETAIL_CHARS).collect()
}

fn batch_form(batch: Batch, repository_id: Option<&RepositoryId>) -> Result<Form> {
    let mut form = Form::new()
        .percent_encode_noop()
        .text("batch_num", batch.batch_number().to_string())
        .text("num_total_batches", batch.total_batches().to_string());

    let mut actions = BTreeMap::<String, &'static str>::new();
    for entry in batch.into_entries() {
        let path = entry.path.as_str().to_owned();
        actions.insert(path.clone(), entry.action.as_str());
        form = form.part(path.clone(), file_part(&path, entry.content));
    }

    let Some(repository_id) = repository_id else {
        return Ok(form);
    };
    let actions = serde_json::to_string(&actions).map_err(|error| {
        ErrorEnvelope::unexpected(
            ErrorCode::internal(),
            format!("failed to encode file actions: {error}"),
            ErrorClass::NonRetriable,
        )
    })?;
    Ok(form
        .text("repository_id", repository_id.as_str().to_owned())
        .text("file_actions", actions))
}

fn file_part(path: &str, content: Vec<u8>) -> Part {
    Part::bytes(content).file_name(path.to_owned())
}

fn decode_initialize_ack(payload: &[u8]) -> std::result::Result<InitializeAck, String> {
    if payload.iter().all(u8::is_ascii_whitespace) {
        return Ok(InitializeAck::default());
    }
    let response: InitializeResponse =
        serde_json::from_slice(payload).map_err(|error| error.to_string())?;
    let repository_id = response
        .repository_id
        .map(RepositoryId::parse)
        .transpose()
        .map_err(|error| error.to_string())?;
    Ok(InitializeAck { repository_id })
}

fn decode_query_matches(payload: &[u8]) -> std::result::Result<Vec<QueryMatch>, String> {
    let records: Vec<QueryRecord> =
        serde_json::from_slice(payload).map_err(|error| error.to_string())?;
    records
        .into_iter()
        .map(|record| {
            let span = LineSpan::new(record.start_line, record.end_line)
                .map_err(|error| error.to_string())?;
            Ok(QueryMatch {
                path: record.path,
                span,
                content: record.content,
            })
        })
        .collect()
}

#[derive(Debug, Serialize)]
struct QueryBody<'a> {
    repository_id: &'a str,
    query_string: &'a str,
}

#[derive(Debug, Serialize)]
struct ValidateBody<'a> {
    repository_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct InitializeResponse {
    #[serde(default)]
    repository_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ValidateResponse {
    repository_id_is_valid: bool,
}

#[derive(Debug, Deserialize)]
struct QueryRecord {
    path: Box<str>,
    start_line: u32,
    end_line: u32,
    content: Box<str>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    detail: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ack_without_id_is_accepted() -> std::result::Result<(), String> {
        assert_eq!(decode_initialize_ack(b"")?.repository_id, None);
        assert_eq!(decode_initialize_ack(b"{}")?.repository_id, None);
        let ack = decode_initialize_ack(br#"{"repository_id":"repo-7"}"#)?;
        assert_eq!(ack.repository_id.as_ref().map(RepositoryId::as_str), Some("repo-7"));
        Ok(())
    }

    #[test]
    fn query_records_keep_remote_order() -> std::result::Result<(), String> {
        let payload = br#"[
            {"path":"b.rs","start_line":3,"end_line":3,"content":"x"},
            {"path":"a.rs","start_line":1,"end_line":4,"content":"y"}
        ]"#;
        let matches = decode_query_matches(payload)?;
        let paths: Vec<&str> = matches.iter().map(|found| found.path.as_ref()).collect();
        assert_eq!(paths, vec!["b.rs", "a.rs"]);
        assert!(matches.first().is_some_and(|found| found.span.is_single_line()));
        Ok(())
    }

    #[test]
    fn inverted_span_is_rejected() {
        let payload = br#"[{"path":"a.rs","start_line":5,"end_line":2,"content":""}]"#;
        assert!(decode_query_matches(payload).is_err());
    }

    #[test]
    fn error_detail_prefers_json_detail() {
        let detail = error_detail(
            StatusCode::UNPROCESSABLE_ENTITY,
            br#"{"detail":"batch_num missing"}"#,
        );
        assert_eq!(detail, "batch_num missing");
        assert_eq!(
            error_detail(StatusCode::BAD_GATEWAY, b""),
            "Bad Gateway"
        );
    }

    #[test]
    fn batch_failure_names_the_batch() {
        let slot = BatchSlot {
            batch_number: 2,
            total_batches: 3,
            first_path: Some("src/lib.rs".to_owned()),
        };
        let envelope = Failure::Status {
            status: 503,
            detail: "busy".to_owned(),
        }
        .into_batch_error(SyncOperation::Reinitialize, slot);

        assert!(envelope.code.is("sync", "batch_failed"));
        assert_eq!(envelope.class, ErrorClass::Retriable);
        assert_eq!(envelope.metadata_value("batchNumber"), Some("2"));
        assert_eq!(envelope.metadata_value("totalBatches"), Some("3"));
        assert_eq!(envelope.metadata_value("status"), Some("503"));
        assert_eq!(envelope.metadata_value("path"), Some("src/lib.rs"));
        assert_eq!(envelope.metadata_value("operation"), Some("reinitialize"));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let result = HttpRemoteIndex::new(&HttpRemoteIndexConfig {
            base_url: "http://127.0.0.1:1".into(),
            timeout_ms: 0,
        });
        assert!(result.is_err());
    }
}
