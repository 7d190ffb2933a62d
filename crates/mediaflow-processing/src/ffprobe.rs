use mediaflow_core::AppError;
use serde::Deserialize;
use std::collections::HashMap;

/// `ffprobe -of json` output. Every field is optional: which ones appear
/// depends on the `-show_entries` selection and the container.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct FFprobeOutput {
    #[serde(default)]
    pub streams: Vec<FFprobeStream>,
    pub format: Option<FFprobeFormat>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct FFprobeStream {
    pub codec_type: Option<String>,
    pub codec_name: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub display_aspect_ratio: Option<String>,
    pub r_frame_rate: Option<String>,
    pub channels: Option<u32>,
    pub sample_rate: Option<String>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct FFprobeFormat {
    pub duration: Option<String>,
    pub bit_rate: Option<String>,
    pub format_name: Option<String>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

impl FFprobeOutput {
    pub fn parse(stdout: &[u8]) -> Result<Self, AppError> {
        serde_json::from_slice(stdout)
            .map_err(|e| AppError::Probe(format!("Failed to parse ffprobe output: {}", e)))
    }

    pub fn first_stream(&self, codec_type: &str) -> Option<&FFprobeStream> {
        self.streams
            .iter()
            .find(|s| s.codec_type.as_deref() == Some(codec_type))
    }

    pub fn duration(&self) -> Option<f64> {
        self.format
            .as_ref()
            .and_then(|f| f.duration.as_deref())
            .and_then(parse_duration)
    }
}

/// Parse a duration in seconds, rejecting `N/A`, negatives and non-finite values.
pub(crate) fn parse_duration(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|d| d.is_finite() && *d >= 0.0)
}

/// Evaluate a frame rate given as `num/den` (e.g. `30000/1001`).
pub(crate) fn parse_frame_rate(raw: &str) -> Option<f64> {
    let (num, den) = raw.split_once('/')?;
    let num: f64 = num.trim().parse().ok()?;
    let den: f64 = den.trim().parse().ok()?;
    (den > 0.0).then(|| num / den)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_selected_entries() {
        let output = FFprobeOutput::parse(
            br#"{"programs":[],"streams":[{"codec_name":"h264","width":1920,"height":1080}],"format":{"duration":"12.480000"}}"#,
        )
        .unwrap();

        assert_eq!(output.streams[0].width, Some(1920));
        assert_eq!(output.duration(), Some(12.48));
    }

    #[test]
    fn test_duration_not_available() {
        let output = FFprobeOutput::parse(br#"{"format":{"duration":"N/A"}}"#).unwrap();
        assert_eq!(output.duration(), None);
    }

    #[test]
    fn test_frame_rate() {
        assert_eq!(parse_frame_rate("30/1"), Some(30.0));
        assert!((parse_frame_rate("30000/1001").unwrap() - 29.97).abs() < 0.01);
        assert_eq!(parse_frame_rate("0/0"), None);
        assert_eq!(parse_frame_rate("25"), None);
    }

    #[test]
    fn test_garbage_is_probe_error() {
        assert!(matches!(
            FFprobeOutput::parse(b"not json"),
            Err(AppError::Probe(_))
        ));
    }
}
