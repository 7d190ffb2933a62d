//! Metadata-tag extraction.
//!
//! Images yield their EXIF fields; video and audio yield container and
//! stream facts from ffprobe. Documents have no tags.

use async_trait::async_trait;
use mediaflow_core::models::{nearest_aspect_ratio, MediaCategory, MetadataEntry};
use mediaflow_core::AppError;
use std::path::{Path, PathBuf};

use crate::ffprobe::{parse_frame_rate, FFprobeOutput};
use crate::probe::read_image_dimensions;
use crate::tool::MediaTools;

#[async_trait]
pub trait TagExtractor: Send + Sync {
    async fn extract(
        &self,
        category: MediaCategory,
        path: &Path,
    ) -> Result<Vec<MetadataEntry>, AppError>;
}

/// EXIF fields copied verbatim, under the given tag name.
const EXIF_FIELDS: &[(exif::Tag, &str)] = &[
    (exif::Tag::Make, "make"),
    (exif::Tag::Model, "model"),
    (exif::Tag::Software, "software"),
    (exif::Tag::LensModel, "lens_model"),
    (exif::Tag::DateTime, "datetime"),
    (exif::Tag::DateTimeOriginal, "datetime_original"),
    (exif::Tag::DateTimeDigitized, "datetime_digitized"),
    (exif::Tag::SubSecTimeOriginal, "subsec_time_original"),
    (exif::Tag::ExposureTime, "exposure_time"),
    (exif::Tag::FNumber, "f_number"),
    (exif::Tag::PhotographicSensitivity, "iso"),
    (exif::Tag::ShutterSpeedValue, "shutter_speed_value"),
    (exif::Tag::ApertureValue, "aperture_value"),
    (exif::Tag::FocalLength, "focal_length"),
    (exif::Tag::Orientation, "orientation"),
    (exif::Tag::Flash, "flash"),
    (exif::Tag::WhiteBalance, "white_balance"),
    (exif::Tag::ColorSpace, "color_space"),
    (exif::Tag::Artist, "artist"),
    (exif::Tag::Copyright, "copyright"),
];

/// Container tags worth keeping for audio, matched case-insensitively.
const AUDIO_TAGS: &[&str] = &[
    "title", "artist", "album", "album_artist", "genre", "track", "composer",
];

/// Container tags that may carry the release year, in lookup order.
const YEAR_TAGS: &[&str] = &["year", "date", "tyer", "tdrc"];

#[derive(Clone)]
pub struct MediaTagExtractor {
    tools: MediaTools,
}

impl MediaTagExtractor {
    pub fn new(tools: MediaTools) -> Self {
        Self { tools }
    }

    async fn image_tags(&self, path: &Path) -> Result<Vec<MetadataEntry>, AppError> {
        let (width, height) = read_image_dimensions(path.to_path_buf()).await?;
        let mut entries = vec![
            MetadataEntry::new("width", width.to_string()),
            MetadataEntry::new("height", height.to_string()),
        ];
        if let Some(ratio) = nearest_aspect_ratio(width, height) {
            entries.push(MetadataEntry::new("aspect_ratio", ratio));
        }
        entries.extend(read_exif(path.to_path_buf()).await?);
        Ok(entries)
    }

    async fn probe_json(&self, path: &Path) -> Result<FFprobeOutput, AppError> {
        let invocation = self
            .tools
            .ffprobe()
            .args(["-v", "error", "-show_format", "-show_streams", "-of", "json"])
            .path_arg(path);
        let stdout = self.tools.run(&invocation).await?;
        FFprobeOutput::parse(&stdout)
    }

    async fn video_tags(&self, path: &Path) -> Result<Vec<MetadataEntry>, AppError> {
        let output = self.probe_json(path).await?;
        let mut entries = Vec::new();
        push_container_tags(&output, &mut entries);

        if let Some(video) = output.first_stream("video") {
            if let (Some(w), Some(h)) = (video.width, video.height) {
                entries.push(MetadataEntry::new("resolution", format!("{}x{}", w, h)));
                if h > 0 {
                    let ratio = w as f64 / h as f64;
                    entries.push(MetadataEntry::new("aspect_ratio", format!("{:.2}", ratio)));
                }
            }
            if let Some(codec) = &video.codec_name {
                entries.push(MetadataEntry::new("codec", codec));
            }
            if let Some(dar) = video.display_aspect_ratio.as_deref().filter(|d| *d != "0:1") {
                entries.push(MetadataEntry::new("display_aspect_ratio", dar));
            }
            if let Some(fps) = video.r_frame_rate.as_deref().and_then(parse_frame_rate) {
                entries.push(MetadataEntry::new("frame_rate", format!("{:.2}", fps)));
            }
        }

        let languages: Vec<&str> = output
            .streams
            .iter()
            .filter(|s| s.codec_type.as_deref() == Some("audio"))
            .map(|s| s.tags.get("language").map(String::as_str).unwrap_or("und"))
            .collect();
        if !languages.is_empty() {
            entries.push(MetadataEntry::new("audio_languages", languages.join(",")));
        }
        push_audio_streams(&output, &mut entries);

        let subtitles: Vec<&str> = output
            .streams
            .iter()
            .filter(|s| s.codec_type.as_deref() == Some("subtitle"))
            .map(|s| s.tags.get("language").map(String::as_str).unwrap_or("und"))
            .collect();
        if !subtitles.is_empty() {
            entries.push(MetadataEntry::new("subtitle_languages", subtitles.join(",")));
        }
        Ok(entries)
    }

    async fn audio_tags(&self, path: &Path) -> Result<Vec<MetadataEntry>, AppError> {
        let output = self.probe_json(path).await?;
        let mut entries = Vec::new();
        push_container_tags(&output, &mut entries);
        push_audio_streams(&output, &mut entries);

        if let Some(format) = &output.format {
            for name in AUDIO_TAGS {
                let value = format
                    .tags
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case(name))
                    .map(|(_, v)| v.trim());
                if let Some(value) = value.filter(|v| !v.is_empty()) {
                    entries.push(MetadataEntry::new(*name, value));
                }
            }
            let year = YEAR_TAGS.iter().find_map(|name| {
                format
                    .tags
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case(name))
                    .and_then(|(_, v)| parse_year(v))
            });
            if let Some(year) = year {
                entries.push(MetadataEntry::new("year", year.to_string()));
            }
        }
        Ok(entries)
    }
}

fn push_container_tags(output: &FFprobeOutput, entries: &mut Vec<MetadataEntry>) {
    if let Some(duration) = output.duration() {
        entries.push(MetadataEntry::new("duration", format!("{:.2}", duration)));
    }
    if let Some(format) = &output.format {
        if let Some(name) = &format.format_name {
            entries.push(MetadataEntry::new("container", name));
        }
        if let Some(bit_rate) = &format.bit_rate {
            entries.push(MetadataEntry::new("bit_rate", bit_rate));
        }
    }
}

/// Codec and sample rate of the first audio stream, plus the channel count
/// summed over every audio stream.
fn push_audio_streams(output: &FFprobeOutput, entries: &mut Vec<MetadataEntry>) {
    let Some(first) = output.first_stream("audio") else {
        return;
    };
    if let Some(codec) = &first.codec_name {
        entries.push(MetadataEntry::new("audio_codec", codec));
    }
    if let Some(rate) = &first.sample_rate {
        entries.push(MetadataEntry::new("sample_rate", rate));
    }
    let channels: u32 = output
        .streams
        .iter()
        .filter(|s| s.codec_type.as_deref() == Some("audio"))
        .filter_map(|s| s.channels)
        .sum();
    entries.push(MetadataEntry::new("audio_channels", channels.to_string()));
}

/// Leading four-digit year of a tag such as `2019` or `2019-04-01`.
fn parse_year(value: &str) -> Option<u32> {
    let digits = value.trim().get(..4)?;
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok().filter(|y| *y > 0)
}

#[async_trait]
impl TagExtractor for MediaTagExtractor {
    #[tracing::instrument(skip(self, category), fields(category = %category))]
    async fn extract(
        &self,
        category: MediaCategory,
        path: &Path,
    ) -> Result<Vec<MetadataEntry>, AppError> {
        let entries = match category {
            MediaCategory::Image => self.image_tags(path).await?,
            MediaCategory::Video => self.video_tags(path).await?,
            MediaCategory::Audio => self.audio_tags(path).await?,
            MediaCategory::Document => Vec::new(),
        };
        tracing::debug!(tag_count = entries.len(), "Tags extracted");
        Ok(entries)
    }
}

/// Read EXIF fields. An image without EXIF yields no entries.
async fn read_exif(path: PathBuf) -> Result<Vec<MetadataEntry>, AppError> {
    tokio::task::spawn_blocking(move || {
        let file = std::fs::File::open(&path)
            .map_err(|e| AppError::Probe(format!("Failed to open image: {}", e)))?;
        let mut reader = std::io::BufReader::new(file);
        let exif = match exif::Reader::new().read_from_container(&mut reader) {
            Ok(exif) => exif,
            Err(exif::Error::NotFound(_)) => return Ok(Vec::new()),
            Err(e) => return Err(AppError::Probe(format!("Failed to read EXIF: {}", e))),
        };
        Ok(exif_entries(&exif))
    })
    .await
    .map_err(|e| AppError::Internal(format!("EXIF task failed: {}", e)))?
}

fn exif_entries(exif: &exif::Exif) -> Vec<MetadataEntry> {
    let mut entries = Vec::new();
    for (tag, name) in EXIF_FIELDS {
        let Some(field) = exif.get_field(*tag, exif::In::PRIMARY) else {
            continue;
        };
        let value = match &field.value {
            exif::Value::Ascii(parts) => parts
                .iter()
                .map(|p| String::from_utf8_lossy(p).trim_end_matches('\0').trim().to_string())
                .collect::<Vec<_>>()
                .join(" "),
            _ => field.display_value().with_unit(exif).to_string(),
        };
        if !value.is_empty() {
            entries.push(MetadataEntry::new(*name, value));
        }
    }

    // ResolutionUnit 2 means inches.
    let inches = exif
        .get_field(exif::Tag::ResolutionUnit, exif::In::PRIMARY)
        .and_then(|f| f.value.get_uint(0))
        == Some(2);
    if inches {
        for (tag, name) in [(exif::Tag::XResolution, "dpi_x"), (exif::Tag::YResolution, "dpi_y")] {
            if let Some(dpi) = rational(exif, tag, 0) {
                entries.push(MetadataEntry::new(name, format!("{}", dpi.round() as u32)));
            }
        }
    }

    if let (Some(lat), Some(lon)) = (
        gps_coordinate(exif, exif::Tag::GPSLatitude, exif::Tag::GPSLatitudeRef, "S"),
        gps_coordinate(exif, exif::Tag::GPSLongitude, exif::Tag::GPSLongitudeRef, "W"),
    ) {
        entries.push(MetadataEntry::new("latitude", format!("{:.6}", lat)));
        entries.push(MetadataEntry::new("longitude", format!("{:.6}", lon)));
    }
    entries
}

fn rational(exif: &exif::Exif, tag: exif::Tag, index: usize) -> Option<f64> {
    match &exif.get_field(tag, exif::In::PRIMARY)?.value {
        exif::Value::Rational(values) => values.get(index).map(|r| r.to_f64()),
        _ => None,
    }
}

/// Degrees/minutes/seconds to signed decimal degrees.
fn gps_coordinate(
    exif: &exif::Exif,
    tag: exif::Tag,
    ref_tag: exif::Tag,
    negative_ref: &str,
) -> Option<f64> {
    let degrees = rational(exif, tag, 0)?;
    let minutes = rational(exif, tag, 1).unwrap_or(0.0);
    let seconds = rational(exif, tag, 2).unwrap_or(0.0);
    let mut value = degrees + minutes / 60.0 + seconds / 3600.0;

    let negative = exif
        .get_field(ref_tag, exif::In::PRIMARY)
        .map(|f| f.display_value().to_string().contains(negative_ref))
        .unwrap_or(false);
    if negative {
        value = -value;
    }
    value.is_finite().then_some(value)
}
