//! Segmented preview clips.
//!
//! Videos shorter than [`SHORT_VIDEO_THRESHOLD_SECS`] get a single clip from
//! their start. Longer videos get [`PREVIEW_SEGMENTS`] short clips taken from
//! evenly spaced points, extracted in parallel, concatenated in order and
//! re-encoded once more. All intermediate files live in a private work
//! directory that is removed whatever the outcome; the destination is only
//! written when every step succeeded.

use mediaflow_core::AppError;
use mediaflow_storage::fs::move_file;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::task::JoinSet;

use crate::tool::MediaTools;

pub const SHORT_VIDEO_THRESHOLD_SECS: f64 = 30.0;
pub const SHORT_PREVIEW_SECS: f64 = 10.0;
pub const PREVIEW_SEGMENTS: usize = 4;
pub const SEGMENT_CLIP_SECS: f64 = 2.5;
pub const PREVIEW_HEIGHT: u32 = 480;

/// Where clips are cut from a source of a given duration.
#[derive(Debug, Clone, PartialEq)]
pub enum PreviewPlan {
    /// One clip from `start`, at most `length` seconds.
    Single { start: f64, length: f64 },
    /// One clip of `length` seconds from each start, joined in order.
    Segmented { starts: Vec<f64>, length: f64 },
}

impl PreviewPlan {
    pub fn for_duration(duration: f64) -> Self {
        if !duration.is_finite() || duration < SHORT_VIDEO_THRESHOLD_SECS {
            return PreviewPlan::Single {
                start: 0.0,
                length: SHORT_PREVIEW_SECS,
            };
        }
        let interval = duration / PREVIEW_SEGMENTS as f64;
        PreviewPlan::Segmented {
            starts: (0..PREVIEW_SEGMENTS).map(|i| i as f64 * interval).collect(),
            length: SEGMENT_CLIP_SECS,
        }
    }
}

#[derive(Clone)]
pub struct SegmentPreviewBuilder {
    tools: MediaTools,
    work_root: PathBuf,
}

impl SegmentPreviewBuilder {
    /// `work_root` holds one short-lived directory per build.
    pub fn new(tools: MediaTools, work_root: impl Into<PathBuf>) -> Self {
        Self {
            tools,
            work_root: work_root.into(),
        }
    }

    #[tracing::instrument(
        skip(self),
        fields(process.executable.name = "ffmpeg", ffmpeg.operation = "preview")
    )]
    pub async fn build(
        &self,
        source: &Path,
        destination: &Path,
        duration: f64,
    ) -> Result<(), AppError> {
        let start = Instant::now();
        tokio::fs::create_dir_all(&self.work_root).await?;
        let work_dir = tempfile::Builder::new()
            .prefix("preview-")
            .tempdir_in(&self.work_root)?;
        let finished = work_dir.path().join("preview.mp4");

        let plan = PreviewPlan::for_duration(duration);
        match &plan {
            PreviewPlan::Single { start, length } => {
                extract_clip(&self.tools, source, &finished, *start, Some(*length)).await?;
            }
            PreviewPlan::Segmented { starts, length } => {
                let segments = self
                    .extract_segments(source, work_dir.path(), starts, *length)
                    .await?;
                let combined = work_dir.path().join("combined.mp4");
                self.concat(&segments, work_dir.path(), &combined).await?;
                // Re-encode so the joined clips share one timeline and profile.
                extract_clip(&self.tools, &combined, &finished, 0.0, None).await?;
            }
        }

        move_file(&finished, destination).await?;
        tracing::info!(
            duration_ms = start.elapsed().as_millis() as u64,
            segmented = matches!(plan, PreviewPlan::Segmented { .. }),
            "Preview built"
        );
        Ok(())
    }

    /// Extract every segment concurrently. The first failure aborts the
    /// rest and is returned once all tasks have stopped.
    async fn extract_segments(
        &self,
        source: &Path,
        work_dir: &Path,
        starts: &[f64],
        length: f64,
    ) -> Result<Vec<PathBuf>, AppError> {
        let segments: Vec<PathBuf> = (1..=starts.len())
            .map(|i| work_dir.join(format!("part{}.mp4", i)))
            .collect();

        let mut tasks = JoinSet::new();
        for (segment, start) in segments.iter().zip(starts) {
            let tools = self.tools.clone();
            let source = source.to_path_buf();
            let segment = segment.clone();
            let start = *start;
            tasks.spawn(async move {
                extract_clip(&tools, &source, &segment, start, Some(length)).await
            });
        }

        let mut failure = None;
        while let Some(joined) = tasks.join_next().await {
            let result = match joined {
                Ok(result) => result,
                Err(e) if e.is_cancelled() => continue,
                Err(e) => Err(AppError::Internal(format!("Segment task failed: {}", e))),
            };
            if let Err(e) = result {
                if failure.is_none() {
                    tracing::warn!(error = %e, "Segment extraction failed, cancelling the rest");
                    tasks.abort_all();
                    failure = Some(e);
                }
            }
        }

        match failure {
            Some(e) => Err(e),
            None => Ok(segments),
        }
    }

    async fn concat(
        &self,
        segments: &[PathBuf],
        work_dir: &Path,
        output: &Path,
    ) -> Result<(), AppError> {
        let list_path = work_dir.join("segments.txt");
        tokio::fs::write(&list_path, concat_list(segments)).await?;

        let invocation = self
            .tools
            .ffmpeg()
            .args(["-y", "-f", "concat", "-safe", "0", "-i"])
            .path_arg(&list_path)
            .args(["-c", "copy"])
            .path_arg(output);
        self.tools.run(&invocation).await?;
        Ok(())
    }
}

/// Cut `[start, start + length)` from `source`, scaled to the preview height
/// and without audio. `length: None` keeps everything after `start`.
async fn extract_clip(
    tools: &MediaTools,
    source: &Path,
    output: &Path,
    start: f64,
    length: Option<f64>,
) -> Result<(), AppError> {
    let mut invocation = tools.ffmpeg().args(["-y", "-ss", &format!("{:.2}", start)]);
    if let Some(length) = length {
        invocation = invocation.args(["-t", &format!("{:.2}", length)]);
    }
    let invocation = invocation
        .arg("-i")
        .path_arg(source)
        .args([
            "-an",
            "-vf",
            &format!("scale=-2:{}", PREVIEW_HEIGHT),
            "-c:v",
            "libx264",
            "-preset",
            "fast",
        ])
        .path_arg(output);
    tools.run(&invocation).await?;
    Ok(())
}

/// ffmpeg concat demuxer list, one quoted path per line.
fn concat_list(segments: &[PathBuf]) -> String {
    segments
        .iter()
        .map(|p| format!("file '{}'\n", p.to_string_lossy().replace('\'', r"'\''")))
        .collect()
}
