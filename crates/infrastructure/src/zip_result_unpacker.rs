use std::io::Cursor;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use triggergate_application::ResultUnpacker;
use triggergate_core::{AppError, AppResult, CorrelationId};

/// File the workflow is expected to place inside the result artifact.
const RESULT_FILE_NAME: &str = "result.json";

/// Subdirectory the archive is extracted into within the staging dir.
const ARCHIVE_DIR_NAME: &str = "artifact";

/// Unpacks result artifacts through a per-call staging directory.
///
/// Each archive is staged under a directory keyed by the correlation
/// id; the directory is removed on every exit path, success or not.
pub struct ZipResultUnpacker {
    staging_root: PathBuf,
}

impl Default for ZipResultUnpacker {
    fn default() -> Self {
        Self::new()
    }
}

impl ZipResultUnpacker {
    /// Creates an unpacker staging under the system temp directory.
    #[must_use]
    pub fn new() -> Self {
        Self::with_staging_root(std::env::temp_dir().join("triggergate-results"))
    }

    /// Creates an unpacker staging under an explicit root.
    #[must_use]
    pub fn with_staging_root(staging_root: PathBuf) -> Self {
        Self { staging_root }
    }

    async fn extract_and_read(&self, staging_dir: &Path, archive: Vec<u8>) -> AppResult<Value> {
        tokio::fs::create_dir_all(staging_dir).await.map_err(|error| {
            AppError::ArtifactUnpack(format!("staging directory creation failed: {error}"))
        })?;

        let archive_dir = staging_dir.join(ARCHIVE_DIR_NAME);
        let extract_target = archive_dir.clone();
        tokio::task::spawn_blocking(move || extract_archive(&extract_target, archive))
            .await
            .map_err(|error| AppError::Internal(format!("extraction task failed: {error}")))??;

        let result_path = archive_dir.join(RESULT_FILE_NAME);
        let content = tokio::fs::read_to_string(&result_path).await.map_err(|error| {
            AppError::ArtifactUnpack(format!(
                "artifact carries no readable {RESULT_FILE_NAME}: {error}"
            ))
        })?;

        serde_json::from_str(&content).map_err(|error| {
            AppError::ArtifactUnpack(format!("{RESULT_FILE_NAME} is not valid JSON: {error}"))
        })
    }
}

fn extract_archive(target: &Path, archive: Vec<u8>) -> AppResult<()> {
    let mut zip_archive = zip::ZipArchive::new(Cursor::new(archive))
        .map_err(|error| AppError::ArtifactUnpack(format!("archive open failed: {error}")))?;

    zip_archive
        .extract(target)
        .map_err(|error| AppError::ArtifactUnpack(format!("archive extraction failed: {error}")))
}

#[async_trait]
impl ResultUnpacker for ZipResultUnpacker {
    async fn unpack(&self, correlation_id: CorrelationId, archive: Vec<u8>) -> AppResult<Value> {
        let staging_dir = self.staging_root.join(correlation_id.to_string());

        let outcome = self.extract_and_read(&staging_dir, archive).await;

        if let Err(error) = tokio::fs::remove_dir_all(&staging_dir).await {
            if error.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(
                    path = %staging_dir.display(),
                    %error,
                    "staging directory cleanup failed"
                );
            }
        }

        outcome
    }
}
