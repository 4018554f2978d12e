//! Process exit codes and CLI-local failures.

use insight_shared::{ErrorEnvelope, ErrorKind};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Ok = 0,
    Internal = 1,
    InvalidInput = 2,
    Io = 3,
}

impl ExitCode {
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Filesystem failures map to `Io`, other expected errors to
    /// `InvalidInput`, everything else to `Internal`.
    #[must_use]
    pub fn for_error(error: &ErrorEnvelope) -> Self {
        let code = &error.code;
        let is_io = code.code() == "io"
            || (error.kind != ErrorKind::Expected
                && (code.is("core", "not_found") || code.is("core", "permission_denied")));
        if is_io {
            Self::Io
        } else if error.kind == ErrorKind::Expected {
            Self::InvalidInput
        } else {
            Self::Internal
        }
    }
}

#[derive(Debug)]
pub enum CliError {
    InvalidInput(String),
    Io(std::io::Error),
    Serialization(serde_json::Error),
}

impl CliError {
    #[must_use]
    pub const fn exit_code(&self) -> ExitCode {
        match self {
            Self::InvalidInput(_) => ExitCode::InvalidInput,
            Self::Io(_) => ExitCode::Io,
            Self::Serialization(_) => ExitCode::Internal,
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidInput(message) => write!(formatter, "invalid input: {message}"),
            Self::Io(error) => write!(formatter, "io error: {error}"),
            Self::Serialization(error) => write!(formatter, "serialization error: {error}"),
        }
    }
}

impl std::error::Error for CliError {}

impl From<std::io::Error> for CliError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use insight_shared::{ErrorClass, ErrorCode};

    #[test]
    fn envelope_exit_codes() {
        let not_initialized = ErrorEnvelope::expected(
            ErrorCode::new("repository", "not_initialized"),
            "not an insight repository",
        );
        let scan_io = ErrorEnvelope::unexpected(
            ErrorCode::new("scan", "io"),
            "read failed",
            ErrorClass::NonRetriable,
        );
        let corrupted = ErrorEnvelope::invariant(ErrorCode::new("state", "corrupted"), "bad");
        let batch = ErrorEnvelope::unexpected(
            ErrorCode::new("sync", "batch_failed"),
            "500",
            ErrorClass::Retriable,
        );

        assert_eq!(ExitCode::for_error(&not_initialized), ExitCode::InvalidInput);
        assert_eq!(ExitCode::for_error(&scan_io), ExitCode::Io);
        assert_eq!(ExitCode::for_error(&corrupted), ExitCode::Internal);
        assert_eq!(ExitCode::for_error(&batch), ExitCode::Internal);
    }

    #[test]
    fn cli_error_exit_codes() -> Result<(), Box<dyn std::error::Error>> {
        let io_error = CliError::Io(std::io::Error::other("io"));
        let serialization_error = match serde_json::from_str::<serde_json::Value>("not-json") {
            Ok(_) => return Err("expected serialization error".into()),
            Err(error) => CliError::Serialization(error),
        };
        assert_eq!(io_error.exit_code(), ExitCode::Io);
        assert_eq!(serialization_error.exit_code(), ExitCode::Internal);
        assert_eq!(
            CliError::InvalidInput("x".to_owned()).exit_code(),
            ExitCode::InvalidInput
        );
        Ok(())
    }
}
