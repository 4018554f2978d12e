//! Result helpers for shared error handling.

use crate::errors::ErrorEnvelope;

/// Shared result type used across the workspace.
pub type Result<T, E = ErrorEnvelope> = std::result::Result<T, E>;

/// Extension helpers for attaching context to envelope errors.
pub trait ResultExt<T> {
    /// Attach a metadata entry to the error, preserving the success.
    fn with_metadata(self, key: &str, value: impl Into<String>) -> Result<T>;

    /// Tag the error with the operation that produced it, unless already tagged.
    fn with_operation(self, operation: &'static str) -> Result<T>;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<ErrorEnvelope>,
{
    fn with_metadata(self, key: &str, value: impl Into<String>) -> Result<T> {
        self.map_err(|error| error.into().with_metadata(key, value))
    }

    fn with_operation(self, operation: &'static str) -> Result<T> {
        self.map_err(|error| error.into().with_default_metadata("operation", operation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorCode;
    use std::io;

    #[test]
    fn with_metadata_converts_and_tags() {
        let value: std::result::Result<(), io::Error> =
            Err(io::Error::new(io::ErrorKind::NotFound, "gone"));
        let mapped = value.with_metadata("path", "src/lib.rs");

        let error = mapped.err();
        assert_eq!(
            error.as_ref().map(|error| error.code.clone()),
            Some(ErrorCode::not_found())
        );
        assert_eq!(
            error.as_ref().and_then(|error| error.metadata_value("path")),
            Some("src/lib.rs")
        );
    }

    #[test]
    fn with_operation_keeps_existing_tag() {
        let value: Result<()> = Err(ErrorEnvelope::expected(ErrorCode::invalid_input(), "bad")
            .with_metadata("operation", "scan"));
        let error = value.with_operation("sync").err();

        assert_eq!(
            error.as_ref().and_then(|error| error.metadata_value("operation")),
            Some("scan")
        );
    }

    #[test]
    fn ok_values_pass_through() {
        let value: Result<i32> = Ok(3);
        assert!(matches!(value.with_operation("scan"), Ok(3)));
    }
}
