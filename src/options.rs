use crate::{selector::SelectorOptions, DEFAULT_DESIRED_COLORS, DEFAULT_MAX_CLUSTERS, DEFAULT_TARGET_PIXELS};

/// Everything that tunes one palette extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ExtractOptions {
    /// How many colors to return at most. Clamped to `1..=128`.
    pub desired_count: usize,
    /// How many pixels to sample out of the image before quantizing.
    pub target_pixels: usize,
    /// How many clusters to ask the quantizer for. Clamped to `1..=128`.
    pub max_clusters: usize,
    pub selector: SelectorOptions,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            desired_count: DEFAULT_DESIRED_COLORS,
            target_pixels: DEFAULT_TARGET_PIXELS,
            max_clusters: DEFAULT_MAX_CLUSTERS,
            selector: SelectorOptions::default(),
        }
    }
}
