use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::{StorageError, StorageResult};
use crate::session::UploadSessionStore;

/// Concatenates a session's staged parts, in ascending part order, into one
/// file under `assembled/{session_id}/{key}`.
///
/// The output is written to a `.partial` sibling and renamed into place only
/// when every part has been copied, so a failed assembly never leaves a file
/// that looks complete. On success the session's staging is leased for
/// deletion after `cleanup_grace`; the sweep performs the deletion.
pub struct UploadAssembler {
    sessions: Arc<UploadSessionStore>,
    cleanup_grace: Duration,
}

impl UploadAssembler {
    pub fn new(sessions: Arc<UploadSessionStore>, cleanup_grace: Duration) -> Self {
        Self {
            sessions,
            cleanup_grace,
        }
    }

    #[tracing::instrument(skip_all, fields(session_id = %session_id, key = %key, part_count))]
    pub async fn assemble(
        &self,
        session_id: &str,
        key: &str,
        part_count: u32,
    ) -> StorageResult<PathBuf> {
        if part_count == 0 {
            return Err(StorageError::InvalidPart(0));
        }

        let lock = self.sessions.session_lock(key, session_id).await?;
        let _guard = lock.lock().await;
        let layout = self.sessions.layout();
        let start = Instant::now();

        for part in 1..=part_count {
            if !fs::try_exists(layout.part_path(key, session_id, part)).await? {
                tracing::warn!(part, part_count, "Assembly aborted, part missing");
                return Err(StorageError::MissingPart { part });
            }
        }

        let output_dir = layout.assembled_dir(session_id);
        fs::create_dir_all(&output_dir).await?;
        let destination = output_dir.join(key);
        let partial = output_dir.join(format!("{}.partial", key));

        let bytes = match self
            .concatenate(session_id, key, part_count, &partial)
            .await
        {
            Ok(bytes) => bytes,
            Err(e) => {
                let _ = fs::remove_file(&partial).await;
                return Err(e);
            }
        };
        fs::rename(&partial, &destination).await?;

        self.sessions
            .mark_assembled(session_id, self.cleanup_grace)
            .await;

        tracing::info!(
            part_count,
            bytes,
            duration_ms = start.elapsed().as_millis() as u64,
            "Upload assembled"
        );
        Ok(destination)
    }

    async fn concatenate(
        &self,
        session_id: &str,
        key: &str,
        part_count: u32,
        output: &Path,
    ) -> StorageResult<u64> {
        let layout = self.sessions.layout();
        let mut destination = fs::File::create(output).await.map_err(|e| {
            StorageError::WriteFailed(format!(
                "Failed to create {}: {}",
                output.display(),
                e
            ))
        })?;

        let mut total = 0u64;
        for part in 1..=part_count {
            let mut source = match fs::File::open(layout.part_path(key, session_id, part)).await {
                Ok(file) => file,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    return Err(StorageError::MissingPart { part });
                }
                Err(e) => return Err(e.into()),
            };
            total += tokio::io::copy(&mut source, &mut destination).await?;
        }

        destination.flush().await?;
        destination.sync_all().await?;
        Ok(total)
    }
}
