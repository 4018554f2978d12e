//! Lifecycle logging shared by the repository use cases.
//!
//! Each operation emits `repository.<name>.start`, then exactly one of
//! `.completed`, `.aborted` (cancellation) or `.failed`.

use insight_ports::{LogFields, LoggerPort};
use insight_shared::Result;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

pub struct OperationLog<'a> {
    logger: Option<&'a Arc<dyn LoggerPort>>,
    name: &'static str,
    title: &'static str,
    base: LogFields,
    started_at: Instant,
}

impl<'a> OperationLog<'a> {
    pub fn start(
        logger: Option<&'a Arc<dyn LoggerPort>>,
        name: &'static str,
        title: &'static str,
        base: LogFields,
    ) -> Self {
        if let Some(logger) = logger {
            logger.info(
                &format!("repository.{name}.start"),
                &format!("{title} started"),
                Some(base.clone()),
            );
        }
        Self {
            logger,
            name,
            title,
            base,
            started_at: Instant::now(),
        }
    }

    pub fn duration_ms(&self) -> u64 {
        u64::try_from(self.started_at.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    /// Log the outcome and hand the result back unchanged.
    pub fn finish<T>(
        self,
        result: Result<T>,
        completed: impl FnOnce(&T) -> LogFields,
    ) -> Result<T> {
        let Some(logger) = self.logger else {
            return result;
        };
        let mut fields = self.base.clone();
        insert(&mut fields, "durationMs", Value::from(self.duration_ms()));

        match &result {
            Ok(output) => {
                fields.extend(completed(output));
                logger.info(
                    &format!("repository.{}.completed", self.name),
                    &format!("{} completed", self.title),
                    Some(fields),
                );
            },
            Err(error) if error.is_cancelled() => {
                logger.info(
                    &format!("repository.{}.aborted", self.name),
                    &format!("{} aborted", self.title),
                    Some(fields),
                );
            },
            Err(error) => {
                insert(&mut fields, "errorCode", Value::String(error.code.to_string()));
                logger.error(
                    &format!("repository.{}.failed", self.name),
                    &format!("{} failed", self.title),
                    Some(fields),
                    Some(error),
                );
            },
        }
        result
    }
}

pub fn insert(fields: &mut LogFields, key: &str, value: Value) {
    fields.insert(key.to_owned().into_boxed_str(), value);
}

pub fn root_fields(root: &Path) -> LogFields {
    let mut fields = LogFields::new();
    insert(
        &mut fields,
        "root",
        Value::String(root.to_string_lossy().into_owned()),
    );
    fields
}
