//! `.insightignore` reader.

use insight_domain::{IgnoreRules, IgnoreScope};
use insight_ports::{BoxFuture, IgnoreRulesPort};
use insight_shared::{RequestContext, Result, ResultExt};
use std::io::ErrorKind;
use std::path::PathBuf;

/// Ignore-rule source backed by a per-repository ignore file.
///
/// Rules are ordered as built-ins, then the ignore file, then `extra`
/// (typically the config rules).
#[derive(Debug, Clone)]
pub struct IgnoreFile {
    file_name: Box<str>,
    extra: IgnoreRules,
}

impl IgnoreFile {
    /// Read `<root>/<file_name>` and append `extra` after it.
    #[must_use]
    pub fn new(file_name: impl Into<Box<str>>, extra: IgnoreRules) -> Self {
        Self {
            file_name: file_name.into(),
            extra,
        }
    }
}

impl IgnoreRulesPort for IgnoreFile {
    fn load_rules(
        &self,
        ctx: &RequestContext,
        root: PathBuf,
    ) -> BoxFuture<'_, Result<IgnoreRules>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            ctx.ensure_not_cancelled("ignore.load_rules")?;
            let path = root.join(self.file_name.as_ref());
            let mut rules = IgnoreRules::builtin();
            match tokio::fs::read_to_string(&path).await {
                Ok(text) => rules.extend(parse_ignore_file(&text)),
                Err(error) if error.kind() == ErrorKind::NotFound => {},
                Err(error) => {
                    return Err(error).with_metadata("path", path.display().to_string());
                },
            }
            rules.extend(self.extra.clone());
            Ok(rules)
        })
    }
}

/// Parse ignore-file text. `dir/` lines are directory rules; other non-blank,
/// non-`#` lines are file rules.
#[must_use]
pub fn parse_ignore_file(text: &str) -> IgnoreRules {
    let mut rules = IgnoreRules::default();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match line.strip_suffix('/') {
            Some(directory) if !directory.is_empty() => {
                rules.push(IgnoreScope::Directory, directory);
            },
            Some(_) => {},
            None => rules.push(IgnoreScope::File, line),
        }
    }
    rules
}
