//! One handler per media category.
//!
//! Structural extraction is fatal to processing when it fails. Artifact
//! generation is best effort: each failure is logged and the artifact is
//! simply absent.

use async_trait::async_trait;
use mediaflow_core::models::StructuralInfo;
use mediaflow_core::AppError;
use std::path::{Path, PathBuf};

use crate::preview::SegmentPreviewBuilder;
use crate::probe::{AudioProbe, ImageProbe, VideoProbe};
use crate::thumbnail::ThumbnailExtractor;

const PREVIEW_CLIP_SUFFIX: &str = "_preview.mp4";
const THUMBNAIL_SUFFIX: &str = "_preview.jpg";

fn source_stem(source: &Path) -> &str {
    source
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("media")
}

/// File name of the preview clip written next to `source`.
///
/// Derived from the source stem, so it never equals the source name: the
/// suffix starts with `_`, while the source's own extension starts with `.`.
pub fn preview_clip_name(source: &Path) -> String {
    format!("{}{}", source_stem(source), PREVIEW_CLIP_SUFFIX)
}

/// File name of the thumbnail written next to `source`.
pub fn thumbnail_name(source: &Path) -> String {
    format!("{}{}", source_stem(source), THUMBNAIL_SUFFIX)
}

/// Derived files produced for a record. Paths are absolute.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Artifacts {
    pub thumbnail: Option<PathBuf>,
    pub preview: Option<PathBuf>,
}

#[async_trait]
pub trait CategoryHandler: Send + Sync {
    async fn extract_structural_info(&self, source: &Path) -> Result<StructuralInfo, AppError>;

    async fn build_artifacts(
        &self,
        source: &Path,
        info: &StructuralInfo,
        output_dir: &Path,
    ) -> Artifacts;
}

pub struct VideoHandler {
    probe: VideoProbe,
    thumbnails: ThumbnailExtractor,
    previews: SegmentPreviewBuilder,
}

impl VideoHandler {
    pub fn new(
        probe: VideoProbe,
        thumbnails: ThumbnailExtractor,
        previews: SegmentPreviewBuilder,
    ) -> Self {
        Self {
            probe,
            thumbnails,
            previews,
        }
    }
}

#[async_trait]
impl CategoryHandler for VideoHandler {
    async fn extract_structural_info(&self, source: &Path) -> Result<StructuralInfo, AppError> {
        self.probe.probe(source).await
    }

    async fn build_artifacts(
        &self,
        source: &Path,
        info: &StructuralInfo,
        output_dir: &Path,
    ) -> Artifacts {
        let duration = info.duration.unwrap_or(0.0);
        let preview_path = output_dir.join(preview_clip_name(source));
        let thumbnail_path = output_dir.join(thumbnail_name(source));

        let (preview, thumbnail) = tokio::join!(
            self.previews.build(source, &preview_path, duration),
            self.thumbnails.extract(source, &thumbnail_path, duration),
        );

        let preview = match preview {
            Ok(()) => Some(preview_path),
            Err(e) => {
                tracing::warn!(error = %e, source = %source.display(), "Preview generation failed");
                None
            }
        };
        let thumbnail = match thumbnail {
            Ok(()) => Some(thumbnail_path),
            Err(e) => {
                tracing::warn!(error = %e, source = %source.display(), "Thumbnail extraction failed");
                None
            }
        };
        Artifacts { thumbnail, preview }
    }
}

pub struct ImageHandler {
    probe: ImageProbe,
}

impl ImageHandler {
    pub fn new(probe: ImageProbe) -> Self {
        Self { probe }
    }
}

#[async_trait]
impl CategoryHandler for ImageHandler {
    async fn extract_structural_info(&self, source: &Path) -> Result<StructuralInfo, AppError> {
        self.probe.probe(source).await
    }

    async fn build_artifacts(&self, _: &Path, _: &StructuralInfo, _: &Path) -> Artifacts {
        Artifacts::default()
    }
}

pub struct AudioHandler {
    probe: AudioProbe,
}

impl AudioHandler {
    pub fn new(probe: AudioProbe) -> Self {
        Self { probe }
    }
}

#[async_trait]
impl CategoryHandler for AudioHandler {
    async fn extract_structural_info(&self, source: &Path) -> Result<StructuralInfo, AppError> {
        self.probe.probe(source).await
    }

    async fn build_artifacts(&self, _: &Path, _: &StructuralInfo, _: &Path) -> Artifacts {
        Artifacts::default()
    }
}

/// Documents carry no structure and get no artifacts.
pub struct DocumentHandler;

#[async_trait]
impl CategoryHandler for DocumentHandler {
    async fn extract_structural_info(&self, _: &Path) -> Result<StructuralInfo, AppError> {
        Ok(StructuralInfo::default())
    }

    async fn build_artifacts(&self, _: &Path, _: &StructuralInfo, _: &Path) -> Artifacts {
        Artifacts::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_names_follow_source_stem() {
        let source = Path::new("/media/abc/clip.mp4");
        assert_eq!(preview_clip_name(source), "clip_preview.mp4");
        assert_eq!(thumbnail_name(source), "clip_preview.jpg");
    }

    #[test]
    fn test_artifact_names_never_equal_source() {
        for name in ["preview.mp4", "preview.jpg", "clip_preview.mp4", "preview", ".mp4"] {
            let source = Path::new("/media/abc").join(name);
            assert_ne!(preview_clip_name(&source), name);
            assert_ne!(thumbnail_name(&source), name);
        }
    }
}
