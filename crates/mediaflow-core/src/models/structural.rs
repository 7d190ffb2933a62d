use serde::{Deserialize, Serialize};

/// Named aspect ratios in priority order. When two entries are equally close
/// to a measured ratio, the earlier one wins.
pub const NAMED_ASPECT_RATIOS: [(&str, f64); 7] = [
    ("16:9", 16.0 / 9.0),
    ("4:3", 4.0 / 3.0),
    ("3:2", 3.0 / 2.0),
    ("1:1", 1.0),
    ("21:9", 21.0 / 9.0),
    ("5:4", 5.0 / 4.0),
    ("2:1", 2.0),
];

/// Returns the named ratio closest to `width / height`, or `None` when either
/// dimension is zero.
pub fn nearest_aspect_ratio(width: u32, height: u32) -> Option<&'static str> {
    if width == 0 || height == 0 {
        return None;
    }
    let actual = f64::from(width) / f64::from(height);

    let mut best: Option<(&'static str, f64)> = None;
    for (name, ratio) in NAMED_ASPECT_RATIOS {
        let diff = (actual - ratio).abs();
        match best {
            Some((_, best_diff)) if diff >= best_diff => {}
            _ => best = Some((name, diff)),
        }
    }
    best.map(|(name, _)| name)
}

/// Structural facts gathered by probing a file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuralInfo {
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Seconds.
    pub duration: Option<f64>,
    pub codec: Option<String>,
}

impl StructuralInfo {
    pub fn dimensions(width: u32, height: u32) -> Self {
        Self {
            width: Some(width),
            height: Some(height),
            ..Default::default()
        }
    }

    pub fn with_duration(mut self, duration: f64) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn screen_size(&self) -> Option<String> {
        match (self.width, self.height) {
            (Some(w), Some(h)) => Some(format!("{}x{}", w, h)),
            _ => None,
        }
    }

    pub fn aspect_ratio(&self) -> Option<&'static str> {
        nearest_aspect_ratio(self.width?, self.height?)
    }
}
