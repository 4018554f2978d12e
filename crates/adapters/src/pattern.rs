//! Compiled ignore patterns.
//!
//! Rules are regular expressions compiled once, before a scan starts, so a
//! malformed rule fails the operation instead of being skipped mid-walk.
//! A directory rule prunes the whole subtree; a file rule hides one leaf.

use insight_domain::{IgnoreRules, IgnoreScope, RepositoryError};
use insight_shared::ErrorEnvelope;
use regex::RegexSet;

/// One compiled rule list.
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    set: RegexSet,
}

impl PatternMatcher {
    /// Compile `patterns` for `scope`; the first invalid rule is reported.
    pub fn compile<S: AsRef<str>>(
        scope: IgnoreScope,
        patterns: &[S],
    ) -> Result<Self, RepositoryError> {
        for pattern in patterns {
            if let Err(error) = regex::Regex::new(pattern.as_ref()) {
                return Err(RepositoryError::InvalidPattern {
                    pattern: pattern.as_ref().to_owned(),
                    scope,
                    reason: error.to_string(),
                });
            }
        }
        let set = RegexSet::new(patterns).map_err(|error| {
            RepositoryError::InvalidPattern {
                pattern: String::new(),
                scope,
                reason: error.to_string(),
            }
        })?;
        Ok(Self { set })
    }

    /// Matcher that matches nothing.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            set: RegexSet::empty(),
        }
    }

    /// True iff any pattern matches anywhere in `text`.
    #[must_use]
    pub fn matches(&self, text: &str) -> bool {
        self.set.is_match(text)
    }

    /// Number of compiled rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.set.len()
    }

    /// Returns true when there are no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }
}

/// Directory and file matchers for one scan.
#[derive(Debug, Clone)]
pub struct IgnorePatterns {
    directories: PatternMatcher,
    files: PatternMatcher,
}

impl IgnorePatterns {
    /// Compile both scopes of `rules`.
    pub fn compile(rules: &IgnoreRules) -> Result<Self, ErrorEnvelope> {
        Ok(Self {
            directories: PatternMatcher::compile(
                IgnoreScope::Directory,
                rules.directories.as_slice(),
            )?,
            files: PatternMatcher::compile(IgnoreScope::File, rules.files.as_slice())?,
        })
    }

    /// True when the directory at `relative_path` must not be descended into.
    #[must_use]
    pub fn ignores_directory(&self, relative_path: &str) -> bool {
        self.directories.matches(relative_path)
    }

    /// True when the file at `relative_path` must be left out.
    #[must_use]
    pub fn ignores_file(&self, relative_path: &str) -> bool {
        self.files.matches(relative_path)
    }
}
