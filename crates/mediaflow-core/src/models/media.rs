use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AppError;
use crate::models::StructuralInfo;

/// Coarse media category derived from the sniffed MIME type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "media_category", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum MediaCategory {
    Image,
    Video,
    Audio,
    Document,
}

impl MediaCategory {
    /// Map a MIME type prefix to its category. Anything that is not
    /// image, video or audio is a document.
    pub fn from_mime(mime: &str) -> Self {
        let mime = mime.trim().to_ascii_lowercase();
        if mime.starts_with("image/") {
            MediaCategory::Image
        } else if mime.starts_with("video/") {
            MediaCategory::Video
        } else if mime.starts_with("audio/") {
            MediaCategory::Audio
        } else {
            MediaCategory::Document
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaCategory::Image => "image",
            MediaCategory::Video => "video",
            MediaCategory::Audio => "audio",
            MediaCategory::Document => "document",
        }
    }
}

impl fmt::Display for MediaCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaCategory {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "image" => Ok(MediaCategory::Image),
            "video" => Ok(MediaCategory::Video),
            "audio" => Ok(MediaCategory::Audio),
            "document" => Ok(MediaCategory::Document),
            other => Err(AppError::InvalidInput(format!(
                "Unknown media category: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "media_status", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum MediaStatus {
    Uploading,
    Processing,
    Ready,
    Failed,
}

impl MediaStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaStatus::Uploading => "uploading",
            MediaStatus::Processing => "processing",
            MediaStatus::Ready => "ready",
            MediaStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for MediaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of sniffing a source: category, MIME type and size in bytes
/// (0 when the size is not known up front).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileClassification {
    pub category: MediaCategory,
    pub mime_type: String,
    pub size: u64,
}

/// The unit of work tracked through upload and processing.
///
/// Status changes go through the transition methods below so the
/// ready/failed invariants hold for every caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct MediaRecord {
    /// Assigned by the repository on first save; 0 until then.
    pub id: i64,
    pub external_id: Option<String>,
    pub title: String,
    pub filename: String,
    pub description: String,
    pub category: Option<MediaCategory>,
    pub mime_type: String,
    /// Whole seconds, truncated.
    pub duration: i64,
    /// "WxH", empty when unknown.
    pub screen_size: String,
    pub aspect_ratio: String,
    pub file_size: i64,
    pub thumbnail: Option<String>,
    pub preview: Option<String>,
    pub status: MediaStatus,
    pub progress: f64,
    pub error: Option<String>,
    /// Relative to the upload directory.
    pub path: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MediaRecord {
    pub fn new(title: impl Into<String>, filename: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            external_id: None,
            title: title.into(),
            filename: filename.into(),
            description: String::new(),
            category: None,
            mime_type: String::new(),
            duration: 0,
            screen_size: String::new(),
            aspect_ratio: String::new(),
            file_size: 0,
            thumbnail: None,
            preview: None,
            status: MediaStatus::Uploading,
            progress: 0.0,
            error: None,
            path: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_persisted(&self) -> bool {
        self.id > 0
    }

    fn invalid_transition(&self, to: MediaStatus) -> AppError {
        AppError::InvalidTransition {
            from: self.status.to_string(),
            to: to.to_string(),
        }
    }

    /// uploading → processing, or failed → processing when a caller re-drives
    /// a failed attempt.
    pub fn begin_processing(&mut self) -> Result<(), AppError> {
        match self.status {
            MediaStatus::Uploading | MediaStatus::Failed => {
                self.status = MediaStatus::Processing;
                self.error = None;
                self.progress = 0.0;
                self.thumbnail = None;
                self.preview = None;
                Ok(())
            }
            _ => Err(self.invalid_transition(MediaStatus::Processing)),
        }
    }

    /// processing → ready. Requires a storage path.
    pub fn mark_ready(&mut self) -> Result<(), AppError> {
        if self.status != MediaStatus::Processing {
            return Err(self.invalid_transition(MediaStatus::Ready));
        }
        if self.path.is_empty() {
            return Err(AppError::Internal(
                "cannot mark media ready without a storage path".to_string(),
            ));
        }
        self.status = MediaStatus::Ready;
        self.error = None;
        self.progress = 1.0;
        Ok(())
    }

    /// uploading|processing → failed. Derived artifacts are dropped since
    /// nothing produced by a failed attempt is trusted.
    pub fn mark_failed(&mut self, error: impl Into<String>) -> Result<(), AppError> {
        match self.status {
            MediaStatus::Uploading | MediaStatus::Processing => {
                let error = error.into();
                self.status = MediaStatus::Failed;
                self.error = Some(if error.trim().is_empty() {
                    "unknown processing error".to_string()
                } else {
                    error
                });
                self.thumbnail = None;
                self.preview = None;
                Ok(())
            }
            _ => Err(self.invalid_transition(MediaStatus::Failed)),
        }
    }

    /// Advisory progress, clamped to 0.0..=1.0.
    pub fn set_progress(&mut self, progress: f64) {
        self.progress = if progress.is_nan() {
            0.0
        } else {
            progress.clamp(0.0, 1.0)
        };
    }

    pub fn apply_classification(&mut self, classification: &FileClassification) {
        self.category = Some(classification.category);
        self.mime_type = classification.mime_type.clone();
        self.file_size = i64::try_from(classification.size).unwrap_or(i64::MAX);
    }

    pub fn apply_structural_info(&mut self, info: &StructuralInfo) {
        if let Some(duration) = info.duration {
            self.duration = duration.max(0.0).trunc() as i64;
        }
        if let Some(size) = info.screen_size() {
            self.screen_size = size;
        }
        if let Some(ratio) = info.aspect_ratio() {
            self.aspect_ratio = ratio.to_string();
        }
    }
}
