use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::cancel::CancellationCoordinator;
use crate::catalog::CatalogClient;
use crate::error::{ClientError, ClientResult, Outcome};
use crate::metrics::TransferMetrics;
use crate::types::{Credential, FileRef};

/// Receives downloaded bytes. Stands in for the platform save dialog.
#[async_trait]
pub trait FileSink: Send + Sync {
    /// Stores `bytes` and returns a human-readable location.
    async fn save(&self, file_name: &str, mime_type: &str, bytes: &[u8]) -> ClientResult<String>;
}

/// Writes files into a fixed directory.
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl FileSink for DirectorySink {
    async fn save(&self, file_name: &str, mime_type: &str, bytes: &[u8]) -> ClientResult<String> {
        // Host-supplied names must not escape the target directory
        let name = Path::new(file_name)
            .file_name()
            .ok_or_else(|| ClientError::Save(format!("invalid file name: {}", file_name)))?;
        let target = self.dir.join(name);
        let partial = self.dir.join(format!(".{}.part", name.to_string_lossy()));

        let write = async {
            tokio::fs::create_dir_all(&self.dir).await?;
            tokio::fs::write(&partial, bytes).await?;
            tokio::fs::rename(&partial, &target).await
        };
        if let Err(e) = write.await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(ClientError::Save(format!("{}: {}", target.display(), e)));
        }

        tracing::info!(file = %target.display(), mime_type, size = bytes.len(), "file saved");
        Ok(format!("saved {}", target.display()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    Saved { file_name: String, location: String, size: usize },
    /// Aborted by the user. Not an error and never reported as one.
    Cancelled,
}

/// Fetches one file under the cancellation coordinator and hands it to a
/// [`FileSink`].
#[derive(Clone)]
pub struct Downloader {
    catalog: CatalogClient,
    coordinator: CancellationCoordinator,
    metrics: TransferMetrics,
}

impl Downloader {
    pub fn new(catalog: CatalogClient, coordinator: CancellationCoordinator, metrics: TransferMetrics) -> Self {
        Self { catalog, coordinator, metrics }
    }

    pub async fn download(
        &self,
        kind: &str,
        file: &FileRef,
        credential: &Credential,
        sink: &dyn FileSink,
    ) -> ClientResult<DownloadOutcome> {
        let guard = self.coordinator.begin()?;
        self.metrics.inc_started();

        let fetched = self.catalog.get_file(kind, file, credential, Some(guard.token())).await;
        // A cancel that took the slot after the fetch returned still wins
        let fetched = if guard.end() { fetched } else { Outcome::Cancelled };

        let fetched = match fetched {
            Outcome::Completed(f) => f,
            Outcome::Cancelled => {
                self.metrics.inc_cancelled();
                tracing::info!(kind, name = %file.name, "download cancelled");
                return Ok(DownloadOutcome::Cancelled);
            }
            Outcome::Failed(message) => {
                self.metrics.inc_failed();
                tracing::warn!(kind, name = %file.name, "download failed: {}", message);
                return Err(ClientError::Transport(message));
            }
        };

        let file_name = fetched.file.file_name();
        let Some(bytes) = fetched.bytes() else {
            self.metrics.inc_failed();
            return Err(ClientError::Save(format!("File binary data not found: {}", file_name)));
        };
        self.metrics.add_bytes(bytes.len() as u64);

        let mime_type = fetched.file.mime_type(kind);
        match sink.save(&file_name, &mime_type, bytes).await {
            Ok(location) => {
                self.metrics.inc_completed();
                Ok(DownloadOutcome::Saved { file_name, location, size: bytes.len() })
            }
            Err(e) => {
                self.metrics.inc_failed();
                Err(e)
            }
        }
    }
}
