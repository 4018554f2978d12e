//! Local marker store: repository id and last-synced snapshot on disk.
//!
//! The marker is a directory holding `state.json`. Writes go to a temp file
//! that is flushed and renamed over the previous document, so a crash
//! mid-write leaves either the old or the new snapshot.

use insight_config::StateStorageMode;
use insight_domain::{
    ChangeSet, MarkerStatus, RepositoryError, RepositoryId, RepositoryState, Snapshot,
};
use insight_ports::{BoxFuture, LocalStatePort};
use insight_shared::{ErrorClass, ErrorCode, ErrorEnvelope, RequestContext, Result, ResultExt};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

const STATE_VERSION: u32 = 1;
const STATE_FILE: &str = "state.json";
const STATE_TEMP_FILE: &str = "state.json.tmp";

/// Marker store bound to one repository root.
#[derive(Debug, Clone)]
pub struct MarkerStateStore {
    repository_root: PathBuf,
    marker_dir: PathBuf,
}

impl MarkerStateStore {
    /// Store for `repository_root` using the configured storage mode.
    #[must_use]
    pub fn new(repository_root: PathBuf, storage: &StateStorageMode) -> Self {
        let marker_dir = storage.resolve_marker_dir(&repository_root);
        Self {
            repository_root,
            marker_dir,
        }
    }

    /// Directory holding the marker.
    #[must_use]
    pub fn marker_dir(&self) -> &Path {
        &self.marker_dir
    }

    fn state_path(&self) -> PathBuf {
        self.marker_dir.join(STATE_FILE)
    }

    fn root_label(&self) -> String {
        self.repository_root.display().to_string()
    }

    fn not_initialized(&self) -> ErrorEnvelope {
        RepositoryError::NotInitialized {
            path: self.root_label(),
        }
        .into()
    }

    async fn read_status(&self) -> Result<MarkerStatus> {
        match tokio::fs::metadata(&self.marker_dir).await {
            Ok(metadata) if metadata.is_dir() => {},
            Ok(_) => {
                return Ok(MarkerStatus::Corrupted {
                    reason: "marker path is not a directory".to_owned(),
                });
            },
            Err(error) if error.kind() == ErrorKind::NotFound => {
                return Ok(MarkerStatus::Uninitialized);
            },
            Err(error) => {
                return Err(ErrorEnvelope::from(error)
                    .with_metadata("path", self.marker_dir.display().to_string()));
            },
        }

        let payload = match tokio::fs::read(self.state_path()).await {
            Ok(payload) => payload,
            Err(error) if error.kind() == ErrorKind::NotFound => {
                return Ok(MarkerStatus::Corrupted {
                    reason: format!("{STATE_FILE} is missing"),
                });
            },
            Err(error) => {
                return Err(ErrorEnvelope::from(error)
                    .with_metadata("path", self.state_path().display().to_string()));
            },
        };

        Ok(match decode_state(&payload) {
            Ok(state) => MarkerStatus::Valid(state),
            Err(reason) => MarkerStatus::Corrupted { reason },
        })
    }

    async fn load_valid(&self) -> Result<RepositoryState> {
        match self.read_status().await? {
            MarkerStatus::Valid(state) => Ok(state),
            MarkerStatus::Uninitialized => Err(self.not_initialized()),
            MarkerStatus::Corrupted { reason } => Err(RepositoryError::StateCorrupted {
                path: self.state_path().display().to_string(),
                reason,
            }
            .into()),
        }
    }

    async fn write_state(&self, state: &RepositoryState) -> Result<()> {
        let document = StateDocument {
            version: STATE_VERSION,
            repository_id: state.repository_id.clone(),
            file_timestamps: state.file_timestamps.clone(),
        };
        let payload = serde_json::to_vec_pretty(&document).map_err(|error| {
            ErrorEnvelope::unexpected(
                ErrorCode::internal(),
                format!("failed to serialize local state: {error}"),
                ErrorClass::NonRetriable,
            )
        })?;

        let temp_path = self.marker_dir.join(STATE_TEMP_FILE);
        let mut file = tokio::fs::File::create(&temp_path)
            .await
            .with_metadata("path", temp_path.display().to_string())?;
        file.write_all(&payload)
            .await
            .with_metadata("path", temp_path.display().to_string())?;
        file.sync_all()
            .await
            .with_metadata("path", temp_path.display().to_string())?;
        drop(file);

        tokio::fs::rename(&temp_path, self.state_path())
            .await
            .with_metadata("path", self.state_path().display().to_string())?;
        Ok(())
    }
}

impl LocalStatePort for MarkerStateStore {
    fn status(&self, ctx: &RequestContext) -> BoxFuture<'_, Result<MarkerStatus>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            ctx.ensure_not_cancelled("state.status")?;
            self.read_status().await
        })
    }

    fn create(&self, ctx: &RequestContext, state: RepositoryState) -> BoxFuture<'_, Result<()>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            ctx.ensure_not_cancelled("state.create")?;
            if self.read_status().await?.marker_exists() {
                return Err(RepositoryError::AlreadyInitialized {
                    path: self.root_label(),
                }
                .into());
            }
            tokio::fs::create_dir_all(&self.marker_dir)
                .await
                .with_metadata("path", self.marker_dir.display().to_string())?;
            self.write_state(&state).await
        })
    }

    fn load(&self, ctx: &RequestContext) -> BoxFuture<'_, Result<RepositoryState>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            ctx.ensure_not_cancelled("state.load")?;
            self.load_valid().await
        })
    }

    fn update(
        &self,
        ctx: &RequestContext,
        changes: ChangeSet,
        new_timestamps: Snapshot,
    ) -> BoxFuture<'_, Result<RepositoryState>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            ctx.ensure_not_cancelled("state.update")?;
            let mut state = self.load_valid().await?;
            state.apply(&changes, &new_timestamps)?;
            self.write_state(&state).await?;
            Ok(state)
        })
    }

    fn delete(&self, ctx: &RequestContext) -> BoxFuture<'_, Result<()>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            ctx.ensure_not_cancelled("state.delete")?;
            let removed = match tokio::fs::metadata(&self.marker_dir).await {
                Ok(metadata) if metadata.is_dir() => {
                    tokio::fs::remove_dir_all(&self.marker_dir).await
                },
                Ok(_) => tokio::fs::remove_file(&self.marker_dir).await,
                Err(error) if error.kind() == ErrorKind::NotFound => {
                    return Err(self.not_initialized());
                },
                Err(error) => Err(error),
            };
            removed.with_metadata("path", self.marker_dir.display().to_string())
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StateDocument {
    version: u32,
    repository_id: RepositoryId,
    file_timestamps: Snapshot,
}

fn decode_state(payload: &[u8]) -> std::result::Result<RepositoryState, String> {
    let document: StateDocument =
        serde_json::from_slice(payload).map_err(|error| error.to_string())?;
    if document.version != STATE_VERSION {
        return Err(format!(
            "unsupported state version {} (expected {STATE_VERSION})",
            document.version
        ));
    }
    Ok(RepositoryState::new(
        document.repository_id,
        document.file_timestamps,
    ))
}
