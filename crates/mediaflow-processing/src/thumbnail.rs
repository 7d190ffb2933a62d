use mediaflow_core::AppError;
use std::path::Path;
use std::time::Instant;

use crate::tool::MediaTools;

/// Thumbnail frame height; width follows the source aspect ratio.
pub const THUMBNAIL_HEIGHT: u32 = 720;

/// Grabs one frame from the middle of a video as a JPEG.
#[derive(Clone)]
pub struct ThumbnailExtractor {
    tools: MediaTools,
}

impl ThumbnailExtractor {
    pub fn new(tools: MediaTools) -> Self {
        Self { tools }
    }

    #[tracing::instrument(
        skip(self),
        fields(process.executable.name = "ffmpeg", ffmpeg.operation = "thumbnail")
    )]
    pub async fn extract(
        &self,
        source: &Path,
        output: &Path,
        duration: f64,
    ) -> Result<(), AppError> {
        let start = Instant::now();
        let seek = (duration.max(0.0)) / 2.0;
        let invocation = self
            .tools
            .ffmpeg()
            .args(["-y", "-ss", &format!("{:.2}", seek), "-i"])
            .path_arg(source)
            .args([
                "-vframes",
                "1",
                "-q:v",
                "2",
                "-vf",
                &format!("scale=-2:{}", THUMBNAIL_HEIGHT),
            ])
            .path_arg(output);

        if let Err(e) = self.tools.run(&invocation).await {
            let _ = tokio::fs::remove_file(output).await;
            return Err(e.into());
        }

        tracing::info!(
            duration_ms = start.elapsed().as_millis() as u64,
            seek_seconds = seek,
            "Thumbnail extracted"
        );
        Ok(())
    }
}
