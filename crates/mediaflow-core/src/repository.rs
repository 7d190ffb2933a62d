//! Persistence seam for media records.
//!
//! The engine saves a record at every state transition and looks multipart
//! records up by their session id (`external_id`). `InMemoryMediaRepository`
//! backs tests and database-less deployments; the PostgreSQL implementation
//! lives in `mediaflow-db`.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::AppError;
use crate::models::{MediaRecord, MetadataEntry};

#[async_trait]
pub trait MediaRepository: Send + Sync {
    /// Insert when `record.id == 0` (assigning the id), update otherwise.
    /// Refreshes `updated_at`.
    async fn save(&self, record: &mut MediaRecord) -> Result<(), AppError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<MediaRecord>, AppError>;

    async fn find_by_external_id(&self, external_id: &str)
        -> Result<Option<MediaRecord>, AppError>;

    /// Replace the extracted tags of a record.
    async fn save_metadata(&self, media_id: i64, entries: &[MetadataEntry])
        -> Result<(), AppError>;

    async fn list_metadata(&self, media_id: i64) -> Result<Vec<MetadataEntry>, AppError>;
}

#[derive(Default)]
struct InMemoryState {
    records: HashMap<i64, MediaRecord>,
    metadata: HashMap<i64, Vec<MetadataEntry>>,
}

#[derive(Clone, Default)]
pub struct InMemoryMediaRepository {
    state: Arc<RwLock<InMemoryState>>,
    next_id: Arc<AtomicI64>,
}

impl InMemoryMediaRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl MediaRepository for InMemoryMediaRepository {
    async fn save(&self, record: &mut MediaRecord) -> Result<(), AppError> {
        let mut state = self.state.write().await;
        if record.id == 0 {
            record.id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        } else if !state.records.contains_key(&record.id) {
            return Err(AppError::NotFound(format!("Media {} not found", record.id)));
        }
        record.updated_at = Utc::now();
        state.records.insert(record.id, record.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<MediaRecord>, AppError> {
        Ok(self.state.read().await.records.get(&id).cloned())
    }

    async fn find_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<MediaRecord>, AppError> {
        let state = self.state.read().await;
        Ok(state
            .records
            .values()
            .find(|r| r.external_id.as_deref() == Some(external_id))
            .cloned())
    }

    async fn save_metadata(
        &self,
        media_id: i64,
        entries: &[MetadataEntry],
    ) -> Result<(), AppError> {
        let mut state = self.state.write().await;
        if !state.records.contains_key(&media_id) {
            return Err(AppError::NotFound(format!("Media {} not found", media_id)));
        }
        // Keyed like the SQL table: last value per key wins, listed by key.
        let by_key: BTreeMap<&str, &str> = entries
            .iter()
            .map(|e| (e.key.as_str(), e.value.as_str()))
            .collect();
        let entries = by_key
            .into_iter()
            .map(|(k, v)| MetadataEntry::new(k, v))
            .collect();
        state.metadata.insert(media_id, entries);
        Ok(())
    }

    async fn list_metadata(&self, media_id: i64) -> Result<Vec<MetadataEntry>, AppError> {
        Ok(self
            .state
            .read()
            .await
            .metadata
            .get(&media_id)
            .cloned()
            .unwrap_or_default())
    }
}
