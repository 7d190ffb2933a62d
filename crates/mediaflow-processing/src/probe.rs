//! Structural probes: dimensions, duration and codec per category.

use mediaflow_core::models::StructuralInfo;
use mediaflow_core::AppError;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::ffprobe::{parse_duration, FFprobeOutput};
use crate::tool::MediaTools;

/// Reads the first video stream and the container duration with ffprobe.
#[derive(Clone)]
pub struct VideoProbe {
    tools: MediaTools,
}

impl VideoProbe {
    pub fn new(tools: MediaTools) -> Self {
        Self { tools }
    }

    #[tracing::instrument(
        skip(self),
        fields(
            process.executable.name = "ffprobe",
            process.executable.path = %self.tools.ffprobe_path(),
            ffmpeg.operation = "probe"
        )
    )]
    pub async fn probe(&self, path: &Path) -> Result<StructuralInfo, AppError> {
        let start = Instant::now();
        let invocation = self
            .tools
            .ffprobe()
            .args([
                "-v",
                "error",
                "-select_streams",
                "v:0",
                "-show_entries",
                "stream=width,height,codec_name,display_aspect_ratio",
                "-show_entries",
                "format=duration",
                "-of",
                "json",
            ])
            .path_arg(path);
        let stdout = self.tools.run(&invocation).await?;
        let output = FFprobeOutput::parse(&stdout)?;

        let stream = output
            .streams
            .first()
            .ok_or_else(|| AppError::Probe("No video stream found".to_string()))?;
        let (width, height) = match (stream.width, stream.height) {
            (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
            _ => return Err(AppError::Probe("Video stream has no dimensions".to_string())),
        };
        let duration = output
            .duration()
            .ok_or_else(|| AppError::Probe("Video duration unavailable".to_string()))?;

        let info = StructuralInfo {
            width: Some(width),
            height: Some(height),
            duration: Some(duration),
            codec: stream.codec_name.clone(),
        };

        tracing::info!(
            duration_ms = start.elapsed().as_millis() as u64,
            video_duration = duration,
            width,
            height,
            codec = info.codec.as_deref().unwrap_or("unknown"),
            "Video probe completed"
        );
        Ok(info)
    }
}

/// Reads the container duration with ffprobe as a bare number.
#[derive(Clone)]
pub struct AudioProbe {
    tools: MediaTools,
}

impl AudioProbe {
    pub fn new(tools: MediaTools) -> Self {
        Self { tools }
    }

    #[tracing::instrument(
        skip(self),
        fields(process.executable.name = "ffprobe", ffmpeg.operation = "probe")
    )]
    pub async fn probe(&self, path: &Path) -> Result<StructuralInfo, AppError> {
        let start = Instant::now();
        let invocation = self
            .tools
            .ffprobe()
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .path_arg(path);
        let stdout = self.tools.run(&invocation).await?;
        let raw = String::from_utf8_lossy(&stdout);
        let duration = parse_duration(&raw).ok_or_else(|| {
            AppError::Probe(format!("Unparseable audio duration: '{}'", raw.trim()))
        })?;

        tracing::info!(
            duration_ms = start.elapsed().as_millis() as u64,
            audio_duration = duration,
            "Audio probe completed"
        );
        Ok(StructuralInfo::default().with_duration(duration))
    }
}

/// Decodes only the image header to learn its dimensions.
#[derive(Clone, Copy, Debug, Default)]
pub struct ImageProbe;

impl ImageProbe {
    pub async fn probe(&self, path: &Path) -> Result<StructuralInfo, AppError> {
        let (width, height) = read_image_dimensions(path.to_path_buf()).await?;
        tracing::debug!(width, height, "Image header decoded");
        Ok(StructuralInfo::dimensions(width, height))
    }
}

pub(crate) async fn read_image_dimensions(path: PathBuf) -> Result<(u32, u32), AppError> {
    tokio::task::spawn_blocking(move || {
        image::ImageReader::open(&path)
            .and_then(|reader| reader.with_guessed_format())
            .map_err(|e| AppError::Probe(format!("Failed to open image: {}", e)))?
            .into_dimensions()
            .map_err(|e| AppError::Probe(format!("Failed to decode image header: {}", e)))
    })
    .await
    .map_err(|e| AppError::Internal(format!("Image probe task failed: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedRunner;
    use mediaflow_core::EngineConfig;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn tools(runner: ScriptedRunner) -> (MediaTools, Arc<ScriptedRunner>) {
        let runner = Arc::new(runner);
        let tools =
            MediaTools::new(runner.clone(), &EngineConfig::with_dirs("/tmp/u", "/tmp/t")).unwrap();
        (tools, runner)
    }

    #[tokio::test]
    async fn test_video_probe_reads_stream_and_duration() {
        let (tools, runner) = tools(ScriptedRunner::default().with_probe_output(
            r#"{"streams":[{"codec_name":"h264","width":1280,"height":720,"display_aspect_ratio":"16:9"}],"format":{"duration":"95.5"}}"#,
        ));

        let info = VideoProbe::new(tools)
            .probe(Path::new("/media/clip.mp4"))
            .await
            .unwrap();

        assert_eq!(info.screen_size().as_deref(), Some("1280x720"));
        assert_eq!(info.duration, Some(95.5));
        assert_eq!(info.codec.as_deref(), Some("h264"));
        let call = &runner.calls()[0];
        assert_eq!(call.args.last().map(String::as_str), Some("/media/clip.mp4"));
        assert!(call.args.iter().any(|a| a == "v:0"));
    }

    #[tokio::test]
    async fn test_video_probe_without_stream_fails() {
        let (tools, _) = tools(
            ScriptedRunner::default().with_probe_output(r#"{"streams":[],"format":{"duration":"3"}}"#),
        );
        let err = VideoProbe::new(tools)
            .probe(Path::new("/media/audio-only.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Probe(_)));
    }

    #[tokio::test]
    async fn test_probe_timeout_surfaces() {
        let (tools, _) = tools(ScriptedRunner::default().timeout_when("clip.mp4"));
        let err = VideoProbe::new(tools)
            .probe(Path::new("/media/clip.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ToolTimeout { .. }));
    }

    #[tokio::test]
    async fn test_audio_probe_parses_plain_duration() {
        let (tools, _) = tools(ScriptedRunner::default().with_probe_output("184.032000\n"));
        let info = AudioProbe::new(tools)
            .probe(Path::new("/media/song.mp3"))
            .await
            .unwrap();
        assert_eq!(info.duration, Some(184.032));
        assert_eq!(info.width, None);
    }

    #[tokio::test]
    async fn test_audio_probe_rejects_na() {
        let (tools, _) = tools(ScriptedRunner::default().with_probe_output("N/A\n"));
        assert!(AudioProbe::new(tools)
            .probe(Path::new("/media/song.mp3"))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_image_probe_reads_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("upload.bin");
        image::RgbImage::new(64, 48).save_with_format(&path, image::ImageFormat::Png).unwrap();

        let info = ImageProbe.probe(&path).await.unwrap();

        assert_eq!(info.width, Some(64));
        assert_eq!(info.height, Some(48));
        assert_eq!(info.aspect_ratio(), Some("4:3"));
    }

    #[tokio::test]
    async fn test_image_probe_rejects_corrupt_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.png");
        tokio::fs::write(&path, b"\x89PNG\r\n\x1A\ngarbage").await.unwrap();
        assert!(matches!(
            ImageProbe.probe(&path).await,
            Err(AppError::Probe(_))
        ));
    }
}
