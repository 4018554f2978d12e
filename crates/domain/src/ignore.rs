//! Ignore rules as plain pattern strings, before compilation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether a rule applies to directories or to files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IgnoreScope {
    /// Matching directories are not descended into.
    Directory,
    /// Matching files are left out of the tree.
    File,
}

impl IgnoreScope {
    /// Stable label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Directory => "directory",
            Self::File => "file",
        }
    }
}

impl fmt::Display for IgnoreScope {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Regular expressions that keep the marker directory out of every upload.
pub const BUILTIN_DIRECTORY_RULES: &[&str] = &[r"(^|/)\.insight$", r"(^|/)\.git$"];

/// Ordered ignore rules for one repository, split by scope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IgnoreRules {
    /// Rules matched against directory paths.
    pub directories: Vec<Box<str>>,
    /// Rules matched against file paths.
    pub files: Vec<Box<str>>,
}

impl IgnoreRules {
    /// Rules that apply to every repository.
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            directories: BUILTIN_DIRECTORY_RULES
                .iter()
                .map(|rule| Box::from(*rule))
                .collect(),
            files: Vec::new(),
        }
    }

    /// Append a rule.
    pub fn push(&mut self, scope: IgnoreScope, rule: impl Into<Box<str>>) {
        let rule = rule.into();
        let target = match scope {
            IgnoreScope::Directory => &mut self.directories,
            IgnoreScope::File => &mut self.files,
        };
        if !target.contains(&rule) {
            target.push(rule);
        }
    }

    /// Append every rule of `other`, keeping order and skipping duplicates.
    pub fn extend(&mut self, other: Self) {
        for rule in other.directories {
            self.push(IgnoreScope::Directory, rule);
        }
        for rule in other.files {
            self.push(IgnoreScope::File, rule);
        }
    }

    /// Number of rules across both scopes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.directories.len() + self.files.len()
    }

    /// Returns true when there are no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.directories.is_empty() && self.files.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_rules_cover_marker_directory() {
        let rules = IgnoreRules::builtin();
        assert!(rules.directories.iter().any(|rule| rule.contains("insight")));
        assert!(rules.files.is_empty());
    }

    #[test]
    fn extend_keeps_order_and_drops_duplicates() {
        let mut rules = IgnoreRules::builtin();
        let mut extra = IgnoreRules::default();
        extra.push(IgnoreScope::File, r"\.log$");
        extra.push(IgnoreScope::Directory, r"(^|/)\.git$");
        extra.push(IgnoreScope::Directory, "target");

        rules.extend(extra);

        assert_eq!(rules.directories.len(), 3);
        assert_eq!(rules.directories.last().map(|rule| &**rule), Some("target"));
        assert_eq!(rules.files, vec![Box::<str>::from(r"\.log$")]);
        assert_eq!(rules.len(), 4);
    }
}
