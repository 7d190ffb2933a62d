use async_trait::async_trait;
use mediaflow_core::models::MediaRecord;
use mediaflow_core::{AppError, MediaRepository, ReadyObserver};
use mediaflow_processing::TagExtractor;
use mediaflow_storage::LocalMediaStore;
use std::sync::Arc;
use std::time::Instant;

/// Default on-ready observer: extracts descriptive tags from the published
/// file and stores them against the record.
///
/// Extraction problems are logged and swallowed. A failed write to the
/// repository is returned.
pub struct MetadataObserver {
    repository: Arc<dyn MediaRepository>,
    extractor: Arc<dyn TagExtractor>,
    store: LocalMediaStore,
}

impl MetadataObserver {
    pub fn new(
        repository: Arc<dyn MediaRepository>,
        extractor: Arc<dyn TagExtractor>,
        store: LocalMediaStore,
    ) -> Self {
        Self {
            repository,
            extractor,
            store,
        }
    }
}

#[async_trait]
impl ReadyObserver for MetadataObserver {
    fn name(&self) -> &str {
        "metadata"
    }

    #[tracing::instrument(skip(self, record), fields(media_id = record.id))]
    async fn on_ready(&self, record: &MediaRecord) -> Result<(), AppError> {
        let Some(category) = record.category else {
            return Ok(());
        };
        if !record.is_persisted() {
            tracing::debug!("Record not persisted, skipping metadata tags");
            return Ok(());
        }

        let start = Instant::now();
        let path = self.store.key_to_path(&record.path)?;
        let entries = match self.extractor.extract(category, &path).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    path = %record.path,
                    "Metadata extraction failed, continuing without tags"
                );
                return Ok(());
            }
        };
        if entries.is_empty() {
            tracing::debug!("No metadata tags found");
            return Ok(());
        }

        self.repository.save_metadata(record.id, &entries).await?;
        tracing::info!(
            tag_count = entries.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Metadata tags stored"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediaflow_core::models::{MediaCategory, MetadataEntry};
    use mediaflow_core::InMemoryMediaRepository;
    use std::path::Path;
    use tempfile::tempdir;

    struct FixedTags(Result<Vec<MetadataEntry>, String>);

    #[async_trait]
    impl TagExtractor for FixedTags {
        async fn extract(
            &self,
            _: MediaCategory,
            _: &Path,
        ) -> Result<Vec<MetadataEntry>, AppError> {
            self.0.clone().map_err(AppError::Probe)
        }
    }

    async fn ready_record(repo: &InMemoryMediaRepository) -> MediaRecord {
        let mut record = MediaRecord::new("song", "song.mp3");
        record.category = Some(MediaCategory::Audio);
        record.path = "abc/song.mp3".to_string();
        repo.save(&mut record).await.unwrap();
        record
    }

    async fn observer(
        repo: &InMemoryMediaRepository,
        tags: Result<Vec<MetadataEntry>, String>,
    ) -> (MetadataObserver, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let store = LocalMediaStore::new(dir.path()).await.unwrap();
        let observer = MetadataObserver::new(Arc::new(repo.clone()), Arc::new(FixedTags(tags)), store);
        (observer, dir)
    }

    #[tokio::test]
    async fn test_tags_are_saved() {
        let repo = InMemoryMediaRepository::new();
        let record = ready_record(&repo).await;
        let tags = vec![MetadataEntry::new("artist", "Someone")];
        let (observer, _dir) = observer(&repo, Ok(tags.clone())).await;

        observer.on_ready(&record).await.unwrap();

        assert_eq!(repo.list_metadata(record.id).await.unwrap(), tags);
    }

    #[tokio::test]
    async fn test_extraction_error_is_swallowed() {
        let repo = InMemoryMediaRepository::new();
        let record = ready_record(&repo).await;
        let (observer, _dir) = observer(&repo, Err("unreadable".to_string())).await;

        observer.on_ready(&record).await.unwrap();

        assert!(repo.list_metadata(record.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unsaved_record_is_skipped() {
        let repo = InMemoryMediaRepository::new();
        let mut record = MediaRecord::new("song", "song.mp3");
        record.category = Some(MediaCategory::Audio);
        let (observer, _dir) =
            observer(&repo, Ok(vec![MetadataEntry::new("artist", "Someone")])).await;

        observer.on_ready(&record).await.unwrap();

        assert!(repo.is_empty().await);
    }
}
