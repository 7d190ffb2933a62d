use mediaflow_core::models::{MediaCategory, StructuralInfo};
use mediaflow_core::AppError;
use std::path::{Path, PathBuf};

use crate::handlers::{
    Artifacts, AudioHandler, CategoryHandler, DocumentHandler, ImageHandler, VideoHandler,
};
use crate::preview::SegmentPreviewBuilder;
use crate::probe::{AudioProbe, ImageProbe, VideoProbe};
use crate::thumbnail::ThumbnailExtractor;
use crate::tool::MediaTools;

/// Routes a classified file to the handler of its category.
pub struct PreviewPipeline {
    video: VideoHandler,
    image: ImageHandler,
    audio: AudioHandler,
    document: DocumentHandler,
}

impl PreviewPipeline {
    /// `work_root` receives the short-lived preview work directories.
    pub fn new(tools: MediaTools, work_root: impl Into<PathBuf>) -> Self {
        Self {
            video: VideoHandler::new(
                VideoProbe::new(tools.clone()),
                ThumbnailExtractor::new(tools.clone()),
                SegmentPreviewBuilder::new(tools.clone(), work_root),
            ),
            image: ImageHandler::new(ImageProbe),
            audio: AudioHandler::new(AudioProbe::new(tools)),
            document: DocumentHandler,
        }
    }

    pub fn handler(&self, category: MediaCategory) -> &dyn CategoryHandler {
        match category {
            MediaCategory::Video => &self.video,
            MediaCategory::Image => &self.image,
            MediaCategory::Audio => &self.audio,
            MediaCategory::Document => &self.document,
        }
    }

    pub async fn extract_structural_info(
        &self,
        category: MediaCategory,
        source: &Path,
    ) -> Result<StructuralInfo, AppError> {
        self.handler(category).extract_structural_info(source).await
    }

    pub async fn build_artifacts(
        &self,
        category: MediaCategory,
        source: &Path,
        info: &StructuralInfo,
        output_dir: &Path,
    ) -> Artifacts {
        self.handler(category)
            .build_artifacts(source, info, output_dir)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedRunner;
    use mediaflow_core::EngineConfig;
    use std::sync::Arc;
    use tempfile::tempdir;

    const LONG_VIDEO_PROBE: &str = r#"{"streams":[{"codec_name":"vp9","width":1920,"height":1080}],"format":{"duration":"120.0"}}"#;

    fn pipeline(
        runner: ScriptedRunner,
        work_root: &Path,
    ) -> (PreviewPipeline, Arc<ScriptedRunner>) {
        let runner = Arc::new(runner);
        let tools = MediaTools::new(runner.clone(), &EngineConfig::with_dirs("/u", "/t")).unwrap();
        (PreviewPipeline::new(tools, work_root), runner)
    }

    #[tokio::test]
    async fn test_document_has_no_structure_or_tools() {
        let dir = tempdir().unwrap();
        let (pipeline, runner) = pipeline(ScriptedRunner::default(), dir.path());

        let info = pipeline
            .extract_structural_info(MediaCategory::Document, Path::new("/media/notes.txt"))
            .await
            .unwrap();
        let artifacts = pipeline
            .build_artifacts(
                MediaCategory::Document,
                Path::new("/media/notes.txt"),
                &info,
                dir.path(),
            )
            .await;

        assert_eq!(info, StructuralInfo::default());
        assert_eq!(artifacts, Artifacts::default());
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_video_artifacts_written_next_to_media() {
        let dir = tempdir().unwrap();
        let output_dir = dir.path().join("abc");
        let (pipeline, _) = pipeline(
            ScriptedRunner::default().with_probe_output(LONG_VIDEO_PROBE),
            &dir.path().join("previews"),
        );
        let source = output_dir.join("clip.mp4");

        let info = pipeline
            .extract_structural_info(MediaCategory::Video, &source)
            .await
            .unwrap();
        let artifacts = pipeline
            .build_artifacts(MediaCategory::Video, &source, &info, &output_dir)
            .await;

        assert_eq!(info.aspect_ratio(), Some("16:9"));
        assert_eq!(artifacts.preview, Some(output_dir.join("clip_preview.mp4")));
        assert_eq!(artifacts.thumbnail, Some(output_dir.join("clip_preview.jpg")));
        assert!(output_dir.join("clip_preview.mp4").exists());
    }

    #[tokio::test]
    async fn test_artifact_failure_is_not_fatal() {
        let dir = tempdir().unwrap();
        let output_dir = dir.path().join("abc");
        let (pipeline, _) = pipeline(
            ScriptedRunner::default()
                .with_probe_output(LONG_VIDEO_PROBE)
                .fail_when("part2.mp4"),
            &dir.path().join("previews"),
        );
        let source = output_dir.join("clip.mp4");

        let info = pipeline
            .extract_structural_info(MediaCategory::Video, &source)
            .await
            .unwrap();
        let artifacts = pipeline
            .build_artifacts(MediaCategory::Video, &source, &info, &output_dir)
            .await;

        assert_eq!(artifacts.preview, None);
        assert_eq!(artifacts.thumbnail, Some(output_dir.join("clip_preview.jpg")));
        assert!(!output_dir.join("clip_preview.mp4").exists());
    }

    #[tokio::test]
    async fn test_audio_probe_failure_is_fatal() {
        let dir = tempdir().unwrap();
        let (pipeline, _) = pipeline(ScriptedRunner::default().fail_when("song.mp3"), dir.path());

        let result = pipeline
            .extract_structural_info(MediaCategory::Audio, Path::new("/media/song.mp3"))
            .await;
        assert!(matches!(result, Err(AppError::Probe(_))));
    }
}
