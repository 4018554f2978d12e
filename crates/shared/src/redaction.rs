//! Secret detection and redaction for log fields and error metadata.

/// The redacted placeholder string.
pub const REDACTED: &str = "[REDACTED]";

/// Checks if a key/variable name likely refers to a secret.
///
/// Session identifiers count as secrets: they authorize writes to a
/// repository upload in progress.
///
/// # Examples
///
/// ```
/// use insight_shared::is_secret_key;
///
/// assert!(is_secret_key("sessionId"));
/// assert!(is_secret_key("API_TOKEN"));
/// assert!(!is_secret_key("repositoryId"));
/// ```
pub fn is_secret_key(key: &str) -> bool {
    let key = key.to_ascii_uppercase();
    ["KEY", "TOKEN", "SECRET", "PASSWORD", "CREDENTIAL", "AUTH", "SESSION", "COOKIE"]
        .iter()
        .any(|needle| key.contains(needle))
}

/// Redacts a value if the key is likely a secret.
pub fn redact_if_secret(key: &str, value: &str) -> String {
    if is_secret_key(key) {
        REDACTED.to_string()
    } else {
        value.to_string()
    }
}
