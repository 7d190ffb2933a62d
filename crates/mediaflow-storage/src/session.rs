//! Multipart upload sessions and chunk staging.
//!
//! Each session owns `staging/{key}/{session_id}/` exclusively. Chunks are
//! written to a temporary file and renamed over `{part_number}`, so a resent
//! part replaces the previous bytes atomically and the last write wins.
//!
//! Staging directories are never deleted by a bare delayed task. Assembly
//! leases the session for deletion (`mark_assembled`) and the sweep removes
//! leased directories once their grace period has passed, along with open
//! sessions nobody has touched for longer than the orphan TTL.

use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{StorageError, StorageResult};
use crate::fs::remove_dir_if_exists;
use crate::keys::validate_segment;

/// Highest accepted part number, as in S3.
pub const MAX_PART_NUMBER: u32 = 10_000;

/// Directory layout under the temporary root.
#[derive(Debug, Clone)]
pub struct StagingLayout {
    root: PathBuf,
}

impl StagingLayout {
    pub fn new(temporary_dir: impl Into<PathBuf>) -> Self {
        Self {
            root: temporary_dir.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn staging_root(&self) -> PathBuf {
        self.root.join("staging")
    }

    pub fn key_dir(&self, key: &str) -> PathBuf {
        self.staging_root().join(key)
    }

    pub fn session_dir(&self, key: &str, session_id: &str) -> PathBuf {
        self.key_dir(key).join(session_id)
    }

    pub fn part_path(&self, key: &str, session_id: &str, part_number: u32) -> PathBuf {
        self.session_dir(key, session_id)
            .join(part_number.to_string())
    }

    pub fn assembled_dir(&self, session_id: &str) -> PathBuf {
        self.root.join("assembled").join(session_id)
    }
}

/// Confirmation for one staged chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedPart {
    pub part_number: u32,
    pub size: u64,
    /// Hex SHA-256 of the chunk bytes.
    pub etag: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Open,
    /// Assembled; staging may be deleted once `sweep_after` has passed.
    Leased { sweep_after: Instant },
}

struct SessionEntry {
    key: String,
    parts: BTreeMap<u32, StagedPart>,
    state: SessionState,
    last_touched: Instant,
    lock: Arc<Mutex<()>>,
}

impl SessionEntry {
    fn open(key: &str) -> Self {
        Self {
            key: key.to_string(),
            parts: BTreeMap::new(),
            state: SessionState::Open,
            last_touched: Instant::now(),
            lock: Arc::new(Mutex::new(())),
        }
    }
}

/// Outcome of one sweep pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Leased (assembled) sessions whose staging was removed.
    pub released: usize,
    /// Open sessions removed because they outlived the orphan TTL.
    pub reaped: usize,
}

pub struct UploadSessionStore {
    layout: StagingLayout,
    sessions: Mutex<HashMap<String, SessionEntry>>,
}

impl UploadSessionStore {
    pub fn new(temporary_dir: impl Into<PathBuf>) -> Self {
        Self {
            layout: StagingLayout::new(temporary_dir),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn layout(&self) -> &StagingLayout {
        &self.layout
    }

    /// Allocate a session for `key` and create its staging directory.
    pub async fn initiate(&self, key: &str) -> StorageResult<String> {
        validate_segment("key", key)?;
        self.release_due(Instant::now()).await;

        let session_id = Uuid::new_v4().to_string();
        fs::create_dir_all(self.layout.session_dir(key, &session_id)).await?;

        self.sessions
            .lock()
            .await
            .insert(session_id.clone(), SessionEntry::open(key));

        tracing::debug!(session_id = %session_id, key = %key, "Upload session initiated");
        Ok(session_id)
    }

    /// Write one chunk to `staging/{key}/{session_id}/{part_number}`.
    pub async fn stage_chunk(
        &self,
        key: &str,
        session_id: &str,
        part_number: u32,
        data: &[u8],
    ) -> StorageResult<StagedPart> {
        if part_number == 0 || part_number > MAX_PART_NUMBER {
            return Err(StorageError::InvalidPart(part_number));
        }
        self.session_lock(key, session_id).await?;

        let start = Instant::now();
        let dir = self.layout.session_dir(key, session_id);
        let temp_path = dir.join(format!(".{}.{}.tmp", part_number, Uuid::new_v4().simple()));
        let part_path = self.layout.part_path(key, session_id, part_number);

        if let Err(e) = write_synced(&temp_path, data).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(StorageError::WriteFailed(format!(
                "Failed to stage part {} of session {}: {}",
                part_number, session_id, e
            )));
        }
        fs::rename(&temp_path, &part_path).await?;

        let staged = StagedPart {
            part_number,
            size: data.len() as u64,
            etag: hex::encode(Sha256::digest(data)),
        };

        let mut sessions = self.sessions.lock().await;
        if let Some(entry) = sessions.get_mut(session_id) {
            entry.parts.insert(part_number, staged.clone());
            entry.last_touched = Instant::now();
        }
        drop(sessions);

        tracing::debug!(
            session_id = %session_id,
            part_number,
            size = staged.size,
            duration_ms = start.elapsed().as_millis() as u64,
            "Chunk staged"
        );
        Ok(staged)
    }

    /// Part numbers recorded for a session, ascending.
    pub async fn staged_parts(&self, session_id: &str) -> Vec<StagedPart> {
        self.sessions
            .lock()
            .await
            .get(session_id)
            .map(|entry| entry.parts.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Exclusivity lock of a session. A session unknown to this process but
    /// present on disk (e.g. after a restart) is adopted.
    pub async fn session_lock(&self, key: &str, session_id: &str) -> StorageResult<Arc<Mutex<()>>> {
        validate_segment("key", key)?;
        validate_segment("session id", session_id)?;

        let mut sessions = self.sessions.lock().await;
        if let Some(entry) = sessions.get_mut(session_id) {
            if entry.key != key {
                return Err(StorageError::SessionNotFound(session_id.to_string()));
            }
            entry.last_touched = Instant::now();
            return Ok(entry.lock.clone());
        }

        if fs::try_exists(self.layout.session_dir(key, session_id)).await? {
            let entry = SessionEntry::open(key);
            let lock = entry.lock.clone();
            sessions.insert(session_id.to_string(), entry);
            tracing::debug!(session_id = %session_id, key = %key, "Adopted staged session");
            return Ok(lock);
        }

        Err(StorageError::SessionNotFound(session_id.to_string()))
    }

    /// Lease an assembled session's staging for deletion after `grace`.
    pub async fn mark_assembled(&self, session_id: &str, grace: Duration) {
        if let Some(entry) = self.sessions.lock().await.get_mut(session_id) {
            entry.state = SessionState::Leased {
                sweep_after: Instant::now() + grace,
            };
        }
    }

    /// Delete a session's staging. Unknown sessions are a no-op.
    pub async fn abort(&self, key: &str, session_id: &str) -> StorageResult<()> {
        validate_segment("key", key)?;
        validate_segment("session id", session_id)?;

        let lock = self
            .sessions
            .lock()
            .await
            .get(session_id)
            .map(|entry| entry.lock.clone());
        let _guard = match &lock {
            Some(lock) => Some(lock.lock().await),
            None => None,
        };

        remove_dir_if_exists(&self.layout.session_dir(key, session_id)).await?;
        let _ = fs::remove_dir(self.layout.key_dir(key)).await;
        self.sessions.lock().await.remove(session_id);

        tracing::info!(session_id = %session_id, key = %key, "Upload session aborted");
        Ok(())
    }

    /// Delete every staged session of `key`. Returns how many sessions were
    /// known for it.
    pub async fn abort_key(&self, key: &str) -> StorageResult<usize> {
        validate_segment("key", key)?;

        let removed = {
            let mut sessions = self.sessions.lock().await;
            let ids: Vec<String> = sessions
                .iter()
                .filter(|(_, entry)| entry.key == key)
                .map(|(id, _)| id.clone())
                .collect();
            for id in &ids {
                sessions.remove(id);
            }
            ids.len()
        };

        remove_dir_if_exists(&self.layout.key_dir(key)).await?;
        tracing::info!(key = %key, sessions = removed, "Upload sessions aborted for key");
        Ok(removed)
    }

    pub async fn sweep(&self, orphan_ttl: Option<Duration>) -> SweepReport {
        self.sweep_at(Instant::now(), orphan_ttl).await
    }

    /// Release leased sessions due at `now` and reap open sessions idle for
    /// longer than `orphan_ttl`. Sessions whose lock is held are skipped.
    /// With a TTL, staged directories unknown to this process are reaped by
    /// modification time.
    pub async fn sweep_at(&self, now: Instant, orphan_ttl: Option<Duration>) -> SweepReport {
        let mut report = SweepReport::default();
        let mut doomed: Vec<(String, String)> = Vec::new();

        {
            let mut sessions = self.sessions.lock().await;
            let due: Vec<(String, SessionState)> = sessions
                .iter()
                .filter(|(_, entry)| match entry.state {
                    SessionState::Leased { sweep_after } => sweep_after <= now,
                    SessionState::Open => {
                        orphan_ttl.is_some_and(|ttl| entry.last_touched + ttl <= now)
                    }
                })
                .filter(|(_, entry)| entry.lock.try_lock().is_ok())
                .map(|(id, entry)| (id.clone(), entry.state))
                .collect();

            for (id, state) in due {
                match state {
                    SessionState::Leased { .. } => report.released += 1,
                    SessionState::Open => report.reaped += 1,
                }
                if let Some(entry) = sessions.remove(&id) {
                    doomed.push((entry.key, id));
                }
            }
        }

        for (key, session_id) in &doomed {
            self.delete_session_dirs(key, session_id).await;
        }

        if let Some(ttl) = orphan_ttl {
            report.reaped += self.reap_unknown_on_disk(ttl).await;
        }

        if report != SweepReport::default() {
            tracing::info!(
                released = report.released,
                reaped = report.reaped,
                "Staging sweep completed"
            );
        }
        report
    }

    async fn release_due(&self, now: Instant) {
        let due: Vec<(String, String)> = {
            let mut sessions = self.sessions.lock().await;
            let ids: Vec<String> = sessions
                .iter()
                .filter(|(_, entry)| {
                    matches!(entry.state, SessionState::Leased { sweep_after } if sweep_after <= now)
                        && entry.lock.try_lock().is_ok()
                })
                .map(|(id, _)| id.clone())
                .collect();
            ids.into_iter()
                .filter_map(|id| sessions.remove(&id).map(|entry| (entry.key, id)))
                .collect()
        };
        for (key, session_id) in &due {
            self.delete_session_dirs(key, session_id).await;
        }
    }

    async fn delete_session_dirs(&self, key: &str, session_id: &str) {
        for dir in [
            self.layout.session_dir(key, session_id),
            self.layout.assembled_dir(session_id),
        ] {
            if let Err(e) = remove_dir_if_exists(&dir).await {
                tracing::warn!(
                    error = %e,
                    session_id = %session_id,
                    path = %dir.display(),
                    "Failed to remove staging directory"
                );
            }
        }
        let _ = fs::remove_dir(self.layout.key_dir(key)).await;
    }

    async fn reap_unknown_on_disk(&self, ttl: Duration) -> usize {
        let known: Vec<String> = self.sessions.lock().await.keys().cloned().collect();
        let cutoff = SystemTime::now().checked_sub(ttl);
        let Some(cutoff) = cutoff else {
            return 0;
        };

        let mut reaped = 0;
        let Ok(mut keys) = fs::read_dir(self.layout.staging_root()).await else {
            return 0;
        };
        while let Ok(Some(key_entry)) = keys.next_entry().await {
            let Ok(mut session_dirs) = fs::read_dir(key_entry.path()).await else {
                continue;
            };
            while let Ok(Some(session_entry)) = session_dirs.next_entry().await {
                let session_id = session_entry.file_name().to_string_lossy().into_owned();
                if known.contains(&session_id) {
                    continue;
                }
                let stale = session_entry
                    .metadata()
                    .await
                    .and_then(|m| m.modified())
                    .map(|modified| modified <= cutoff)
                    .unwrap_or(false);
                if !stale {
                    continue;
                }
                match remove_dir_if_exists(&session_entry.path()).await {
                    Ok(()) => reaped += 1,
                    Err(e) => tracing::warn!(
                        error = %e,
                        session_id = %session_id,
                        "Failed to reap orphaned staging directory"
                    ),
                }
            }
            let _ = fs::remove_dir(key_entry.path()).await;
        }
        reaped
    }
}

async fn write_synced(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(path).await?;
    file.write_all(data).await?;
    file.sync_all().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_initiate_creates_session_dir() {
        let dir = tempdir().unwrap();
        let store = UploadSessionStore::new(dir.path());

        let first = store.initiate("clip.mp4").await.unwrap();
        let second = store.initiate("clip.mp4").await.unwrap();

        assert_ne!(first, second);
        assert!(store.layout().session_dir("clip.mp4", &first).is_dir());
    }

    #[tokio::test]
    async fn test_stage_chunk_last_write_wins() {
        let dir = tempdir().unwrap();
        let store = UploadSessionStore::new(dir.path());
        let session = store.initiate("doc.txt").await.unwrap();

        store.stage_chunk("doc.txt", &session, 1, b"first").await.unwrap();
        let staged = store.stage_chunk("doc.txt", &session, 1, b"second").await.unwrap();

        let on_disk = fs::read(store.layout().part_path("doc.txt", &session, 1))
            .await
            .unwrap();
        assert_eq!(on_disk, b"second");
        assert_eq!(staged.size, 6);
        assert_eq!(staged.etag, hex::encode(Sha256::digest(b"second")));
        assert_eq!(store.staged_parts(&session).await.len(), 1);
    }

    #[tokio::test]
    async fn test_stage_chunk_rejects_bad_part_numbers() {
        let dir = tempdir().unwrap();
        let store = UploadSessionStore::new(dir.path());
        let session = store.initiate("doc.txt").await.unwrap();

        assert!(matches!(
            store.stage_chunk("doc.txt", &session, 0, b"x").await,
            Err(StorageError::InvalidPart(0))
        ));
        assert!(store
            .stage_chunk("doc.txt", &session, MAX_PART_NUMBER + 1, b"x")
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_stage_chunk_unknown_session() {
        let dir = tempdir().unwrap();
        let store = UploadSessionStore::new(dir.path());

        assert!(matches!(
            store.stage_chunk("doc.txt", "missing", 1, b"x").await,
            Err(StorageError::SessionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_stage_chunk_key_mismatch() {
        let dir = tempdir().unwrap();
        let store = UploadSessionStore::new(dir.path());
        let session = store.initiate("a.txt").await.unwrap();

        assert!(store.stage_chunk("b.txt", &session, 1, b"x").await.is_err());
    }

    #[tokio::test]
    async fn test_session_on_disk_is_adopted() {
        let dir = tempdir().unwrap();
        let layout = StagingLayout::new(dir.path());
        fs::create_dir_all(layout.session_dir("doc.txt", "restored"))
            .await
            .unwrap();

        let store = UploadSessionStore::new(dir.path());
        store.stage_chunk("doc.txt", "restored", 1, b"x").await.unwrap();
        assert_eq!(store.staged_parts("restored").await.len(), 1);
    }

    #[tokio::test]
    async fn test_abort_removes_staging_and_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = UploadSessionStore::new(dir.path());
        let session = store.initiate("doc.txt").await.unwrap();
        store.stage_chunk("doc.txt", &session, 1, b"x").await.unwrap();

        store.abort("doc.txt", &session).await.unwrap();
        assert!(!store.layout().session_dir("doc.txt", &session).exists());

        store.abort("doc.txt", &session).await.unwrap();
        store.abort("doc.txt", "never-existed").await.unwrap();
    }

    #[tokio::test]
    async fn test_abort_key_removes_all_sessions() {
        let dir = tempdir().unwrap();
        let store = UploadSessionStore::new(dir.path());
        store.initiate("doc.txt").await.unwrap();
        store.initiate("doc.txt").await.unwrap();
        let other = store.initiate("other.txt").await.unwrap();

        assert_eq!(store.abort_key("doc.txt").await.unwrap(), 2);
        assert!(!store.layout().key_dir("doc.txt").exists());
        assert!(store.layout().session_dir("other.txt", &other).exists());
    }

    #[tokio::test]
    async fn test_sweep_releases_leases_after_grace() {
        let dir = tempdir().unwrap();
        let store = UploadSessionStore::new(dir.path());
        let session = store.initiate("doc.txt").await.unwrap();
        store
            .mark_assembled(&session, Duration::from_secs(30))
            .await;

        let early = store.sweep_at(Instant::now(), None).await;
        assert_eq!(early.released, 0);
        assert!(store.layout().session_dir("doc.txt", &session).exists());

        let later = store
            .sweep_at(Instant::now() + Duration::from_secs(31), None)
            .await;
        assert_eq!(later.released, 1);
        assert!(!store.layout().session_dir("doc.txt", &session).exists());
    }

    #[tokio::test]
    async fn test_sweep_reaps_idle_open_sessions() {
        let dir = tempdir().unwrap();
        let store = UploadSessionStore::new(dir.path());
        let session = store.initiate("doc.txt").await.unwrap();
        let ttl = Duration::from_secs(3600);

        let report = store.sweep_at(Instant::now(), Some(ttl)).await;
        assert_eq!(report.reaped, 0);

        let report = store
            .sweep_at(Instant::now() + ttl + Duration::from_secs(1), Some(ttl))
            .await;
        assert_eq!(report.reaped, 1);
        assert!(!store.layout().session_dir("doc.txt", &session).exists());

        let report = store
            .sweep_at(Instant::now() + ttl + Duration::from_secs(1), None)
            .await;
        assert_eq!(report, SweepReport::default());
    }

    #[tokio::test]
    async fn test_sweep_skips_locked_sessions() {
        let dir = tempdir().unwrap();
        let store = UploadSessionStore::new(dir.path());
        let session = store.initiate("doc.txt").await.unwrap();
        store.mark_assembled(&session, Duration::ZERO).await;

        let lock = store.session_lock("doc.txt", &session).await.unwrap();
        let guard = lock.lock().await;
        let report = store
            .sweep_at(Instant::now() + Duration::from_secs(1), None)
            .await;
        assert_eq!(report.released, 0);
        drop(guard);

        let report = store
            .sweep_at(Instant::now() + Duration::from_secs(1), None)
            .await;
        assert_eq!(report.released, 1);
    }

    #[tokio::test]
    async fn test_sweep_reaps_unknown_directories() {
        let dir = tempdir().unwrap();
        let layout = StagingLayout::new(dir.path());
        let stale = layout.session_dir("doc.txt", "left-behind");
        fs::create_dir_all(&stale).await.unwrap();

        let store = UploadSessionStore::new(dir.path());
        let report = store.sweep(Some(Duration::ZERO)).await;
        assert_eq!(report.reaped, 1);
        assert!(!stale.exists());
    }
}
