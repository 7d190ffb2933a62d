//! Upload engine
//!
//! Drives a basic upload or a completed multipart session from raw bytes to
//! a `ready` record:
//!
//! 1. bytes are published under the upload directory (`{prefix}/{filename}`)
//! 2. the published file is classified by content
//! 3. the category handler extracts structural facts (fatal on failure)
//! 4. the category handler builds artifacts next to the file (best effort)
//! 5. the record reaches `ready` and observers run
//!
//! Basic uploads persist nothing until step 5 succeeds. Multipart records
//! exist from initiation and end in `failed` when a fatal step fails.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use mediaflow_core::models::{
    CompleteMultipartUpload, InitiateMultipartUploadResult, MediaCategory, MediaRecord,
    MediaStatus, MetadataEntry,
};
use mediaflow_core::{normalize_filename, AppError, EngineConfig, MediaRepository, ReadyObserver};
use mediaflow_processing::{classify_path, MediaTools, PreviewPipeline};
use mediaflow_storage::keys::{published_key, sibling_key};
use mediaflow_storage::{LocalMediaStore, StagedPart, UploadAssembler, UploadSessionStore};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::lifecycle::RecordLifecycle;

const ASSEMBLED_PROGRESS: f64 = 0.3;
const PROBED_PROGRESS: f64 = 0.6;
const ARTIFACTS_PROGRESS: f64 = 0.9;

/// Body of a basic upload.
#[derive(Debug, Clone)]
pub enum UploadPayload {
    Bytes(Bytes),
    /// Base64 text, optionally prefixed with `data:<mime>;base64,`.
    Base64(String),
}

#[derive(Debug, Clone)]
pub struct BasicUploadRequest {
    pub filename: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub payload: UploadPayload,
    /// Process and publish without persisting a record.
    pub skip_save: bool,
}

impl BasicUploadRequest {
    pub fn bytes(filename: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            filename: Some(filename.into()),
            title: None,
            description: None,
            payload: UploadPayload::Bytes(data.into()),
            skip_save: false,
        }
    }
}

/// Descriptive fields supplied when a multipart upload is initiated.
#[derive(Debug, Clone, Default)]
pub struct MultipartInitiation {
    pub title: Option<String>,
    pub description: Option<String>,
    /// Category hint; replaced by content classification on completion.
    pub file_type: Option<String>,
}

pub struct MediaEngine {
    sessions: Arc<UploadSessionStore>,
    assembler: UploadAssembler,
    store: LocalMediaStore,
    pipeline: PreviewPipeline,
    lifecycle: RecordLifecycle,
}

impl MediaEngine {
    pub async fn new(
        config: &EngineConfig,
        repository: Arc<dyn MediaRepository>,
        tools: MediaTools,
        observers: Vec<Arc<dyn ReadyObserver>>,
    ) -> Result<Self, AppError> {
        let store = LocalMediaStore::new(config.upload_dir.clone()).await?;
        let sessions = Arc::new(UploadSessionStore::new(config.temporary_dir.clone()));
        let assembler = UploadAssembler::new(sessions.clone(), config.staging_cleanup_grace());
        let pipeline = PreviewPipeline::new(tools, config.temporary_dir.join("previews"));

        tracing::info!(
            upload_dir = %config.upload_dir.display(),
            temporary_dir = %config.temporary_dir.display(),
            observers = observers.len(),
            "Media engine initialized"
        );

        Ok(Self {
            sessions,
            assembler,
            store,
            pipeline,
            lifecycle: RecordLifecycle::new(repository, observers),
        })
    }

    pub fn sessions(&self) -> Arc<UploadSessionStore> {
        self.sessions.clone()
    }

    pub fn store(&self) -> &LocalMediaStore {
        &self.store
    }

    fn repository(&self) -> &Arc<dyn MediaRepository> {
        self.lifecycle.repository()
    }

    /// Accept a whole file in one request. Nothing is persisted unless
    /// every fatal step succeeds.
    #[tracing::instrument(skip_all, fields(skip_save = request.skip_save))]
    pub async fn basic_upload(&self, request: BasicUploadRequest) -> Result<MediaRecord, AppError> {
        let start = Instant::now();
        let (raw_name, data) = match request.payload {
            UploadPayload::Bytes(data) => (
                request.filename.unwrap_or_else(|| "upload".to_string()),
                data,
            ),
            UploadPayload::Base64(encoded) => {
                let name = request.filename.filter(|f| !f.trim().is_empty()).ok_or_else(|| {
                    AppError::InvalidInput("filename is required for base64 uploads".to_string())
                })?;
                (name, Bytes::from(decode_base64_payload(&encoded)?))
            }
        };

        let filename = normalize_filename(&raw_name);
        let prefix = Uuid::new_v4().to_string();
        let key = published_key(&prefix, &filename);

        let mut record = MediaRecord::new(
            request
                .title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| filename.clone()),
            filename.clone(),
        );
        record.description = request.description.unwrap_or_default();
        record.path = key.clone();
        record.begin_processing()?;

        let result = async {
            let path = self.store.write(&key, &data).await?;
            self.process_file(&mut record, &path, &key).await?;
            self.lifecycle
                .complete(&mut record, !request.skip_save)
                .await
        }
        .await;

        if let Err(e) = result {
            if !record.is_persisted() {
                if let Err(cleanup) = self.store.remove_dir(&prefix).await {
                    tracing::warn!(error = %cleanup, prefix = %prefix, "Failed to remove rejected upload");
                }
            }
            tracing::warn!(error = %e, filename = %filename, "Basic upload failed");
            return Err(e);
        }

        tracing::info!(
            media_id = record.id,
            key = %key,
            size_bytes = data.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Basic upload completed"
        );
        Ok(record)
    }

    /// Allocate a session for `key` and create its `uploading` record.
    #[tracing::instrument(skip(self, initiation))]
    pub async fn initiate_multipart(
        &self,
        key: &str,
        initiation: MultipartInitiation,
    ) -> Result<InitiateMultipartUploadResult, AppError> {
        let key = normalize_filename(key);
        let session_id = self.sessions.initiate(&key).await?;

        let mut record = MediaRecord::new(
            initiation
                .title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| key.clone()),
            key.clone(),
        );
        record.description = initiation.description.unwrap_or_default();
        record.external_id = Some(session_id.clone());
        record.category = initiation
            .file_type
            .as_deref()
            .and_then(|t| t.parse::<MediaCategory>().ok());

        if let Err(e) = self.lifecycle.save(&mut record).await {
            if let Err(abort) = self.sessions.abort(&key, &session_id).await {
                tracing::warn!(error = %abort, session_id = %session_id, "Failed to abort session");
            }
            return Err(e);
        }

        tracing::info!(
            session_id = %session_id,
            key = %key,
            media_id = record.id,
            "Multipart upload initiated"
        );
        Ok(InitiateMultipartUploadResult::new(key, session_id))
    }

    /// Stage one part. Re-sending a part number replaces it.
    pub async fn upload_part(
        &self,
        key: &str,
        session_id: &str,
        part_number: u32,
        data: &[u8],
    ) -> Result<StagedPart, AppError> {
        let key = normalize_filename(key);
        Ok(self
            .sessions
            .stage_chunk(&key, session_id, part_number, data)
            .await?)
    }

    /// Assemble the parts listed by `manifest`, publish and process the
    /// result. Fatal failures leave the record `failed`.
    #[tracing::instrument(skip(self, manifest), fields(part_count = manifest.part_count()))]
    pub async fn complete_multipart(
        &self,
        key: &str,
        session_id: &str,
        manifest: &CompleteMultipartUpload,
    ) -> Result<MediaRecord, AppError> {
        let key = normalize_filename(key);
        let start = Instant::now();
        let mut record = self
            .repository()
            .find_by_external_id(session_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Upload session {} not found", session_id)))?;

        self.lifecycle.begin_processing(&mut record).await?;

        let processed = async {
            let assembled = self
                .assembler
                .assemble(session_id, &key, manifest.part_count())
                .await?;

            let published = published_key(session_id, &key);
            let path = self.store.publish(&assembled, &published).await?;
            record.path = published.clone();
            self.lifecycle
                .progress(&mut record, ASSEMBLED_PROGRESS)
                .await?;

            self.process_file(&mut record, &path, &published).await
        }
        .await;

        if let Err(e) = processed {
            self.fail_record(&mut record, &e).await;
            return Err(e);
        }

        self.lifecycle.complete(&mut record, true).await?;
        tracing::info!(
            media_id = record.id,
            session_id = %session_id,
            duration_ms = start.elapsed().as_millis() as u64,
            "Multipart upload completed"
        );
        Ok(record)
    }

    /// Abort one session, or every session of `key` when no id is given.
    /// The record of an aborted session is marked failed.
    pub async fn abort_multipart(&self, key: &str, session_id: Option<&str>) -> Result<(), AppError> {
        let key = normalize_filename(key);
        let Some(session_id) = session_id else {
            let sessions = self.sessions.abort_key(&key).await?;
            tracing::info!(key = %key, sessions, "Multipart uploads aborted");
            return Ok(());
        };

        self.sessions.abort(&key, session_id).await?;
        if let Some(mut record) = self.repository().find_by_external_id(session_id).await? {
            if record.status == MediaStatus::Uploading {
                self.lifecycle
                    .fail(&mut record, &AppError::InvalidInput("upload aborted".to_string()))
                    .await?;
            }
        }
        Ok(())
    }

    /// Re-drive a failed record whose published source still exists.
    #[tracing::instrument(skip(self))]
    pub async fn reprocess(&self, id: i64) -> Result<MediaRecord, AppError> {
        let mut record = self.get(id).await?;
        if record.status != MediaStatus::Failed {
            return Err(AppError::InvalidTransition {
                from: record.status.to_string(),
                to: MediaStatus::Processing.to_string(),
            });
        }
        if record.path.is_empty() || !self.store.exists(&record.path).await? {
            return Err(AppError::InvalidInput(format!(
                "Media {} has no published source to reprocess",
                id
            )));
        }

        let key = record.path.clone();
        let path = self.store.key_to_path(&key)?;
        self.lifecycle.begin_processing(&mut record).await?;

        if let Err(e) = self.process_file(&mut record, &path, &key).await {
            self.fail_record(&mut record, &e).await;
            return Err(e);
        }
        self.lifecycle.complete(&mut record, true).await?;
        Ok(record)
    }

    pub async fn get(&self, id: i64) -> Result<MediaRecord, AppError> {
        self.repository()
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Media {} not found", id)))
    }

    pub async fn metadata(&self, id: i64) -> Result<Vec<MetadataEntry>, AppError> {
        self.get(id).await?;
        self.repository().list_metadata(id).await
    }

    /// Classify, extract structure and build artifacts for a published file.
    /// Leaves the record in `processing`.
    async fn process_file(
        &self,
        record: &mut MediaRecord,
        path: &Path,
        key: &str,
    ) -> Result<(), AppError> {
        let classification = classify_path(path).await?;
        record.apply_classification(&classification);
        let category = classification.category;

        let info = self
            .pipeline
            .extract_structural_info(category, path)
            .await?;
        record.apply_structural_info(&info);
        self.lifecycle.progress(record, PROBED_PROGRESS).await?;

        let output_dir = path.parent().unwrap_or(path);
        let artifacts = self
            .pipeline
            .build_artifacts(category, path, &info, output_dir)
            .await;
        record.thumbnail = artifacts
            .thumbnail
            .as_deref()
            .and_then(|p| artifact_key(key, p));
        record.preview = artifacts
            .preview
            .as_deref()
            .and_then(|p| artifact_key(key, p));
        self.lifecycle.progress(record, ARTIFACTS_PROGRESS).await?;

        tracing::debug!(
            media_id = record.id,
            category = %category,
            mime_type = %record.mime_type,
            screen_size = %record.screen_size,
            duration = record.duration,
            has_preview = record.preview.is_some(),
            "File processed"
        );
        Ok(())
    }

    async fn fail_record(&self, record: &mut MediaRecord, cause: &AppError) {
        if let Err(e) = self.lifecycle.fail(record, cause).await {
            tracing::error!(
                error = %e,
                media_id = record.id,
                cause = %cause,
                "Failed to persist failed state"
            );
        }
    }
}

/// Strip an optional `data:...;base64,` prefix and decode.
/// Record key of an artifact written next to the file stored at `key`.
fn artifact_key(key: &str, artifact: &Path) -> Option<String> {
    let name = artifact.file_name()?.to_str()?;
    Some(sibling_key(key, name))
}

fn decode_base64_payload(encoded: &str) -> Result<Vec<u8>, AppError> {
    let trimmed = encoded.trim();
    let body = match trimmed.strip_prefix("data:") {
        Some(rest) => rest
            .split_once(',')
            .map(|(_, body)| body)
            .ok_or_else(|| AppError::InvalidInput("Malformed data URL".to_string()))?,
        None => trimmed,
    };
    let compact: String = body.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD
        .decode(compact)
        .map_err(|e| AppError::InvalidInput(format!("Invalid base64 payload: {}", e)))
}
