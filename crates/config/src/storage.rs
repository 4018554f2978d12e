//! Marker storage configuration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Marker directory name used when markers live inside the repository.
pub const PROJECT_MARKER_DIR: &str = ".insight";

const CUSTOM_PREFIX: &str = "custom:";

/// Where the local marker of a repository is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum StateStorageMode {
    /// Store under `.insight/` inside the repository root.
    #[default]
    Project,
    /// Store under `<dir>/<md5(root)>/`.
    Custom(PathBuf),
}

impl StateStorageMode {
    /// Parse `project` or `custom:<dir>`.
    pub fn parse(input: &str) -> Result<Self, StateStorageParseError> {
        let trimmed = input.trim();
        if trimmed.eq_ignore_ascii_case("project") {
            return Ok(Self::Project);
        }
        match trimmed.strip_prefix(CUSTOM_PREFIX) {
            Some(dir) if !dir.trim().is_empty() => Ok(Self::Custom(PathBuf::from(dir.trim()))),
            _ => Err(StateStorageParseError {
                input: input.to_owned(),
            }),
        }
    }

    /// Resolve the marker directory for a repository root.
    ///
    /// Custom storage keys the directory by the md5 of the root path so
    /// several repositories can share one parent.
    #[must_use]
    pub fn resolve_marker_dir(&self, repository_root: &Path) -> PathBuf {
        match self {
            Self::Project => repository_root.join(PROJECT_MARKER_DIR),
            Self::Custom(dir) => {
                let digest = md5::compute(repository_root.to_string_lossy().as_bytes());
                dir.join(format!("{digest:x}"))
            },
        }
    }
}

impl fmt::Display for StateStorageMode {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Project => formatter.write_str("project"),
            Self::Custom(dir) => write!(formatter, "{CUSTOM_PREFIX}{}", dir.display()),
        }
    }
}

impl TryFrom<String> for StateStorageMode {
    type Error = StateStorageParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<StateStorageMode> for String {
    fn from(value: StateStorageMode) -> Self {
        value.to_string()
    }
}

/// Rejected storage mode string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateStorageParseError {
    /// Raw input.
    pub input: String,
}

impl fmt::Display for StateStorageParseError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            formatter,
            "state storage must be `project` or `custom:<dir>` (got {:?})",
            self.input
        )
    }
}

impl std::error::Error for StateStorageParseError {}
