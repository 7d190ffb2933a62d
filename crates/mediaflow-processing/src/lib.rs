//! Mediaflow Processing Library
//!
//! Everything that happens to an assembled file before its record is ready:
//! type sniffing, structural probing through external tools, thumbnail and
//! preview generation, and metadata-tag extraction.
//!
//! External tools (ffprobe, ffmpeg) are only reached through the
//! [`CommandRunner`] trait, with a timeout on every invocation.

pub mod classifier;
mod ffprobe;
pub mod handlers;
pub mod pipeline;
pub mod preview;
pub mod probe;
pub mod tags;
pub mod thumbnail;
pub mod tool;

#[cfg(test)]
pub(crate) mod testing;

pub use classifier::{classify_bytes, classify_path, SNIFF_LEN};
pub use handlers::{
    preview_clip_name, thumbnail_name, Artifacts, AudioHandler, CategoryHandler, DocumentHandler,
    ImageHandler, VideoHandler,
};
pub use pipeline::PreviewPipeline;
pub use preview::{PreviewPlan, SegmentPreviewBuilder};
pub use probe::{AudioProbe, ImageProbe, VideoProbe};
pub use tags::{MediaTagExtractor, TagExtractor};
pub use thumbnail::ThumbnailExtractor;
pub use tool::{CommandRunner, MediaTools, SystemCommandRunner, ToolError, ToolInvocation};
