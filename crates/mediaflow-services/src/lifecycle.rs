//! Persistence of record transitions.
//!
//! Every successful transition is saved before the caller continues; a save
//! failure aborts the operation in flight. Reaching `ready` runs the
//! registered observers in order.

use mediaflow_core::models::MediaRecord;
use mediaflow_core::{AppError, MediaRepository, ReadyObserver};
use std::sync::Arc;

#[derive(Clone)]
pub struct RecordLifecycle {
    repository: Arc<dyn MediaRepository>,
    observers: Vec<Arc<dyn ReadyObserver>>,
}

impl RecordLifecycle {
    pub fn new(
        repository: Arc<dyn MediaRepository>,
        observers: Vec<Arc<dyn ReadyObserver>>,
    ) -> Self {
        Self {
            repository,
            observers,
        }
    }

    pub fn repository(&self) -> &Arc<dyn MediaRepository> {
        &self.repository
    }

    /// Persist a record in its current state.
    pub async fn save(&self, record: &mut MediaRecord) -> Result<(), AppError> {
        self.repository.save(record).await
    }

    pub async fn begin_processing(&self, record: &mut MediaRecord) -> Result<(), AppError> {
        record.begin_processing()?;
        self.repository.save(record).await?;
        tracing::debug!(media_id = record.id, "Record processing");
        Ok(())
    }

    /// Advisory progress; persisted only for saved records.
    pub async fn progress(&self, record: &mut MediaRecord, progress: f64) -> Result<(), AppError> {
        record.set_progress(progress);
        if record.is_persisted() {
            self.repository.save(record).await?;
        }
        Ok(())
    }

    /// Move a record to `failed` with the text of `cause` and persist it.
    pub async fn fail(&self, record: &mut MediaRecord, cause: &AppError) -> Result<(), AppError> {
        record.mark_failed(cause.to_string())?;
        self.repository.save(record).await?;
        tracing::warn!(
            media_id = record.id,
            error = %cause,
            "Record failed"
        );
        Ok(())
    }

    /// Move a record to `ready`, persist it when `persist` is set, then run
    /// the observers.
    pub async fn complete(&self, record: &mut MediaRecord, persist: bool) -> Result<(), AppError> {
        record.mark_ready()?;
        if persist {
            self.repository.save(record).await?;
        }
        tracing::info!(
            media_id = record.id,
            category = record.category.map(|c| c.as_str()).unwrap_or("unknown"),
            path = %record.path,
            "Record ready"
        );
        self.notify_ready(record).await
    }

    /// Run observers in registration order. The first failure stops the rest.
    pub async fn notify_ready(&self, record: &MediaRecord) -> Result<(), AppError> {
        for observer in &self.observers {
            if let Err(e) = observer.on_ready(record).await {
                tracing::error!(
                    observer = observer.name(),
                    media_id = record.id,
                    error = %e,
                    "On-ready observer failed"
                );
                return Err(AppError::Observer {
                    observer: observer.name().to_string(),
                    message: e.to_string(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mediaflow_core::models::MediaStatus;
    use mediaflow_core::InMemoryMediaRepository;
    use std::sync::Mutex;

    struct Recording {
        name: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
        fail: bool,
    }

    #[async_trait]
    impl ReadyObserver for Recording {
        fn name(&self) -> &str {
            self.name
        }

        async fn on_ready(&self, _: &MediaRecord) -> Result<(), AppError> {
            self.log.lock().unwrap().push(self.name);
            if self.fail {
                return Err(AppError::Internal("boom".to_string()));
            }
            Ok(())
        }
    }

    fn observer(
        name: &'static str,
        log: &Arc<Mutex<Vec<&'static str>>>,
        fail: bool,
    ) -> Arc<dyn ReadyObserver> {
        Arc::new(Recording {
            name,
            log: log.clone(),
            fail,
        })
    }

    fn processing_record() -> MediaRecord {
        let mut record = MediaRecord::new("notes", "notes.txt");
        record.begin_processing().unwrap();
        record.path = "abc/notes.txt".to_string();
        record
    }

    #[tokio::test]
    async fn test_observers_run_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let repo = Arc::new(InMemoryMediaRepository::new());
        let lifecycle = RecordLifecycle::new(
            repo.clone(),
            vec![observer("first", &log, false), observer("second", &log, false)],
        );
        let mut record = processing_record();

        lifecycle.complete(&mut record, true).await.unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["first", "second"]);
        let stored = repo.find_by_id(record.id).await.unwrap().unwrap();
        assert_eq!(stored.status, MediaStatus::Ready);
    }

    #[tokio::test]
    async fn test_first_observer_error_stops_the_rest() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let lifecycle = RecordLifecycle::new(
            Arc::new(InMemoryMediaRepository::new()),
            vec![
                observer("first", &log, true),
                observer("second", &log, false),
            ],
        );
        let mut record = processing_record();

        let err = lifecycle.complete(&mut record, true).await.unwrap_err();

        assert!(matches!(err, AppError::Observer { ref observer, .. } if observer == "first"));
        assert_eq!(*log.lock().unwrap(), vec!["first"]);
    }

    #[tokio::test]
    async fn test_fail_persists_error() {
        let repo = Arc::new(InMemoryMediaRepository::new());
        let lifecycle = RecordLifecycle::new(repo.clone(), Vec::new());
        let mut record = MediaRecord::new("clip", "clip.mp4");
        lifecycle.save(&mut record).await.unwrap();
        lifecycle.begin_processing(&mut record).await.unwrap();

        lifecycle
            .fail(&mut record, &AppError::MissingPart { part: 2 })
            .await
            .unwrap();

        let stored = repo.find_by_id(record.id).await.unwrap().unwrap();
        assert_eq!(stored.status, MediaStatus::Failed);
        assert_eq!(stored.error.as_deref(), Some("Missing part 2"));
    }

    #[tokio::test]
    async fn test_unsaved_progress_is_not_persisted() {
        let repo = Arc::new(InMemoryMediaRepository::new());
        let lifecycle = RecordLifecycle::new(repo.clone(), Vec::new());
        let mut record = processing_record();

        lifecycle.progress(&mut record, 0.5).await.unwrap();

        assert_eq!(record.progress, 0.5);
        assert!(repo.is_empty().await);
    }
}
