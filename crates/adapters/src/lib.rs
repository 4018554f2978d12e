//! # insight-adapters
//!
//! Adapter implementations for ports (filesystem scan, ignore rules, remote
//! index, local marker state, structured logging).
//! This crate depends on `ports`, `shared`, `domain`, and `config`.

pub mod ignore_file;
pub mod log_sink;
pub mod logger;
pub mod pattern;
/// HTTP client for the remote index service.
#[cfg(feature = "remote-http")]
pub mod remote_http;
pub mod scanner;
pub mod state_store;

pub use ignore_file::{IgnoreFile, parse_ignore_file};
pub use log_sink::{LogSink, MemoryLogSink, StderrLogSink};
pub use logger::{JsonLogger, TextLogger};
pub use pattern::{IgnorePatterns, PatternMatcher};
#[cfg(feature = "remote-http")]
pub use remote_http::{HttpRemoteIndex, HttpRemoteIndexConfig};
pub use scanner::{DEFAULT_SCAN_CONCURRENCY, LocalTreeScanner};
pub use state_store::MarkerStateStore;

/// Returns the adapters crate version.
#[must_use]
pub const fn adapters_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
