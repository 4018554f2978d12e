//! Parallel local tree scanner.
//!
//! Every directory listing spawns one task per child directory and per file
//! onto a `JoinSet`. Tasks return their own records and the parent assembles
//! the node once all of them finish, so no tree node is ever shared between
//! tasks. Filesystem reads are gated by a semaphore; a directory task never
//! holds a permit while waiting on its children.

use crate::pattern::IgnorePatterns;
use insight_domain::{DirectoryNode, FileRecord, RelativePath, RepositoryError, Timestamp};
use insight_ports::{
    BoxFuture, LogFields, LoggerPort, ScanOutput, ScanRequest, ScanWarning, ScanWarningKind,
    TreeScannerPort,
};
use insight_shared::{ErrorClass, ErrorCode, ErrorEnvelope, RequestContext, Result};
use serde_json::Value;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Default bound on in-flight filesystem reads.
pub const DEFAULT_SCAN_CONCURRENCY: usize = 32;

/// Tree scanner over the local filesystem.
#[derive(Clone)]
pub struct LocalTreeScanner {
    max_concurrency: usize,
    logger: Option<Arc<dyn LoggerPort>>,
}

impl LocalTreeScanner {
    /// Scanner allowing `max_concurrency` filesystem reads at once.
    #[must_use]
    pub fn new(max_concurrency: usize) -> Self {
        Self {
            max_concurrency: max_concurrency.max(1),
            logger: None,
        }
    }

    /// Report skipped entries through `logger`.
    #[must_use]
    pub fn with_logger(mut self, logger: Arc<dyn LoggerPort>) -> Self {
        self.logger = Some(logger);
        self
    }

    fn log_warnings(&self, warnings: &[ScanWarning]) {
        let Some(logger) = self.logger.as_ref() else {
            return;
        };
        for warning in warnings {
            let mut fields = LogFields::new();
            fields.insert("path".into(), Value::from(warning.path.as_ref()));
            fields.insert("reason".into(), Value::from(warning.kind.as_str()));
            fields.insert("detail".into(), Value::from(warning.detail.as_ref()));
            logger.warn("scan.entry_skipped", "skipped unreadable entry", Some(fields));
        }
    }
}

impl Default for LocalTreeScanner {
    fn default() -> Self {
        Self::new(DEFAULT_SCAN_CONCURRENCY)
    }
}

impl TreeScannerPort for LocalTreeScanner {
    fn scan(
        &self,
        ctx: &RequestContext,
        request: ScanRequest,
    ) -> BoxFuture<'_, Result<ScanOutput>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            ctx.ensure_not_cancelled("scan")?;
            check_root(&request.root).await?;
            let patterns = IgnorePatterns::compile(&request.rules)?;

            let walker = Walker {
                root: Arc::new(request.root),
                patterns: Arc::new(patterns),
                permits: Arc::new(Semaphore::new(self.max_concurrency)),
                ctx: ctx.clone(),
            };
            let (tree, mut warnings) = ctx
                .run_cancellable("scan", walker.scan_directory(RelativePath::root()))
                .await?;

            warnings.sort_by(|left, right| left.path.cmp(&right.path));
            self.log_warnings(&warnings);
            Ok(ScanOutput { tree, warnings })
        })
    }
}

async fn check_root(root: &Path) -> Result<()> {
    let label = root.display().to_string();
    match tokio::fs::metadata(root).await {
        Ok(metadata) if metadata.is_dir() => Ok(()),
        Ok(_) => Err(RepositoryError::ScanRootNotDirectory { path: label }.into()),
        Err(error) if error.kind() == ErrorKind::NotFound => {
            Err(RepositoryError::ScanRootNotFound { path: label }.into())
        },
        Err(error) => Err(RepositoryError::ScanIo {
            path: label,
            detail: error.to_string(),
        }
        .into()),
    }
}

enum Entry {
    File(FileRecord),
    Directory(DirectoryNode, Vec<ScanWarning>),
    Skipped(ScanWarning),
}

#[derive(Clone)]
struct Walker {
    root: Arc<PathBuf>,
    patterns: Arc<IgnorePatterns>,
    permits: Arc<Semaphore>,
    ctx: RequestContext,
}

impl Walker {
    fn absolute(&self, path: &RelativePath) -> PathBuf {
        if path.is_root() {
            self.root.as_ref().clone()
        } else {
            self.root.join(path.as_str())
        }
    }

    async fn permit(&self) -> Result<tokio::sync::SemaphorePermit<'_>> {
        self.permits.acquire().await.map_err(|_| {
            ErrorEnvelope::unexpected(
                ErrorCode::internal(),
                "scan permits closed",
                ErrorClass::NonRetriable,
            )
        })
    }

    fn scan_directory(
        self,
        path: RelativePath,
    ) -> BoxFuture<'static, Result<(DirectoryNode, Vec<ScanWarning>)>> {
        Box::pin(async move {
            self.ctx.ensure_not_cancelled("scan.directory")?;
            let mut tasks = JoinSet::new();
            let mut warnings = Vec::new();

            let permit = self.permit().await?;
            let listed = self.spawn_entries(&path, &mut tasks, &mut warnings).await;
            drop(permit);
            if let Err(error) = listed {
                if path.is_root() {
                    return Err(scan_io(&path, &error));
                }
                warnings.push(recover(&path, error)?);
                return Ok((DirectoryNode::new(path, Vec::new(), Vec::new())?, warnings));
            }

            let mut files = Vec::new();
            let mut children = Vec::new();
            while let Some(joined) = tasks.join_next().await {
                match join_result(joined)? {
                    Entry::File(record) => files.push(record),
                    Entry::Directory(node, nested) => {
                        children.push(node);
                        warnings.extend(nested);
                    },
                    Entry::Skipped(warning) => warnings.push(warning),
                }
            }

            Ok((DirectoryNode::new(path, files, children)?, warnings))
        })
    }

    async fn spawn_entries(
        &self,
        path: &RelativePath,
        tasks: &mut JoinSet<Result<Entry>>,
        warnings: &mut Vec<ScanWarning>,
    ) -> io::Result<()> {
        let mut listing = tokio::fs::read_dir(self.absolute(path)).await?;

        while let Some(entry) = listing.next_entry().await? {
            let raw_name = entry.file_name();
            let Some(name) = raw_name.to_str() else {
                warnings.push(ScanWarning {
                    path: display_child(path, &raw_name.to_string_lossy()),
                    kind: ScanWarningKind::InvalidName,
                    detail: "entry name is not valid UTF-8".into(),
                });
                continue;
            };
            let child = match path.join(name) {
                Ok(child) => child,
                Err(error) => {
                    warnings.push(ScanWarning {
                        path: display_child(path, name),
                        kind: ScanWarningKind::InvalidName,
                        detail: error.to_string().into_boxed_str(),
                    });
                    continue;
                },
            };

            let file_type = match entry.file_type().await {
                Ok(file_type) => file_type,
                Err(error) if error.kind() == ErrorKind::NotFound => {
                    warnings.push(warning(&child, ScanWarningKind::Vanished, &error));
                    continue;
                },
                Err(error) => return Err(error),
            };

            if file_type.is_dir() {
                if !self.patterns.ignores_directory(child.as_str()) {
                    tasks.spawn(self.clone().scan_child_directory(child));
                }
            } else if file_type.is_file() && !self.patterns.ignores_file(child.as_str()) {
                let walker = self.clone();
                tasks.spawn(async move { walker.read_file(child).await });
            }
        }
        Ok(())
    }

    async fn scan_child_directory(self, path: RelativePath) -> Result<Entry> {
        let (node, warnings) = self.scan_directory(path).await?;
        Ok(Entry::Directory(node, warnings))
    }

    async fn read_file(self, path: RelativePath) -> Result<Entry> {
        self.ctx.ensure_not_cancelled("scan.file")?;
        let _permit = self.permit().await?;
        let absolute = self.absolute(&path);

        let metadata = match tokio::fs::symlink_metadata(&absolute).await {
            Ok(metadata) => metadata,
            Err(error) => return recover(&path, error).map(Entry::Skipped),
        };
        if !metadata.is_file() {
            return Ok(Entry::Skipped(ScanWarning {
                path: Box::from(path.as_str()),
                kind: ScanWarningKind::Vanished,
                detail: "entry changed type during scan".into(),
            }));
        }
        let modified = metadata
            .modified()
            .map_err(|error| scan_io(&path, &error))?;
        let content = match tokio::fs::read(&absolute).await {
            Ok(content) => content,
            Err(error) => return recover(&path, error).map(Entry::Skipped),
        };

        let record = FileRecord::new(path, content, Timestamp::from_system_time(modified))?;
        Ok(Entry::File(record))
    }
}

fn join_result(
    joined: std::result::Result<Result<Entry>, tokio::task::JoinError>,
) -> Result<Entry> {
    joined.map_err(|error| {
        ErrorEnvelope::unexpected(
            ErrorCode::internal(),
            format!("scan task failed: {error}"),
            ErrorClass::NonRetriable,
        )
    })?
}

fn recover(path: &RelativePath, error: io::Error) -> Result<ScanWarning> {
    match error.kind() {
        ErrorKind::PermissionDenied => Ok(warning(path, ScanWarningKind::PermissionDenied, &error)),
        ErrorKind::NotFound => Ok(warning(path, ScanWarningKind::Vanished, &error)),
        _ => Err(scan_io(path, &error)),
    }
}

fn warning(path: &RelativePath, kind: ScanWarningKind, error: &io::Error) -> ScanWarning {
    ScanWarning {
        path: Box::from(path.as_str()),
        kind,
        detail: error.to_string().into_boxed_str(),
    }
}

fn scan_io(path: &RelativePath, error: &io::Error) -> ErrorEnvelope {
    RepositoryError::ScanIo {
        path: path.as_str().to_owned(),
        detail: error.to_string(),
    }
    .into()
}

fn display_child(parent: &RelativePath, name: &str) -> Box<str> {
    if parent.is_root() {
        Box::from(name)
    } else {
        format!("{}/{name}", parent.as_str()).into_boxed_str()
    }
}
