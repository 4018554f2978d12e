//! Logger selection from the process environment.

use insight_adapters::{JsonLogger, LogSink, StderrLogSink, TextLogger};
use insight_ports::{LogFields, LogLevel, LoggerPort};
use insight_shared::RequestContext;
use serde_json::Value;
use std::sync::Arc;

/// `json` or `text`; anything else leaves logging disabled.
pub const LOG_FORMAT_ENV: &str = "INSIGHT_LOG_FORMAT";
/// `debug`, `info`, `warn` or `error`; defaults to `info`.
pub const LOG_LEVEL_ENV: &str = "INSIGHT_LOG_LEVEL";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogFormat {
    Json,
    Text,
}

impl LogFormat {
    fn parse(value: &str) -> Option<Self> {
        if value.eq_ignore_ascii_case("json") {
            Some(Self::Json)
        } else if value.eq_ignore_ascii_case("text") {
            Some(Self::Text)
        } else {
            None
        }
    }
}

/// Loggers wired for one process.
#[derive(Clone, Default)]
pub struct Observability {
    /// Root logger, when enabled.
    pub logger: Option<Arc<dyn LoggerPort>>,
}

/// Build loggers writing to stderr per `INSIGHT_LOG_FORMAT` / `INSIGHT_LOG_LEVEL`.
pub fn observability_from_env() -> Observability {
    observability_from_values(
        std::env::var(LOG_FORMAT_ENV).ok().as_deref(),
        std::env::var(LOG_LEVEL_ENV).ok().as_deref(),
        Arc::new(StderrLogSink),
    )
}

fn observability_from_values(
    format: Option<&str>,
    level: Option<&str>,
    sink: Arc<dyn LogSink>,
) -> Observability {
    let Some(format) = format.and_then(LogFormat::parse) else {
        return Observability::default();
    };
    let level = level.and_then(LogLevel::parse).unwrap_or(LogLevel::Info);
    let logger: Arc<dyn LoggerPort> = match format {
        LogFormat::Json => Arc::new(JsonLogger::new(sink).with_min_level(level)),
        LogFormat::Text => Arc::new(TextLogger::new(sink).with_min_level(level)),
    };
    Observability {
        logger: Some(logger),
    }
}

/// Child logger tagged with the request's correlation id.
pub fn scope_logger(
    logger: Option<&Arc<dyn LoggerPort>>,
    ctx: &RequestContext,
) -> Option<Arc<dyn LoggerPort>> {
    let logger = logger?;
    let mut fields = LogFields::new();
    fields.insert(
        "correlationId".to_owned().into_boxed_str(),
        Value::String(ctx.correlation_id().as_str().to_string()),
    );
    Some(Arc::from(logger.child(fields)))
}
