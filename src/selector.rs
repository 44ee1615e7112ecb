//! Greedy, hue-separated palette selection.
//!
//! Candidates are scanned best first. A candidate is accepted if its hue is at least `threshold` degrees away from
//! every hue accepted before it. The threshold starts wide and is relaxed one degree at a time until enough colors
//! are accepted or the minimum separation is reached.

use crate::{
    color::{Candidate, Rgb24},
    FALLBACK_COLOR, MAX_DESIRED_COLORS,
};
use log::{trace, warn};

pub const DEFAULT_MAX_SEPARATION: u32 = 90;
pub const DEFAULT_MIN_SEPARATION: u32 = 15;

/// The circular distance between two hue angles in degrees, in `[0, 180]`.
pub fn hue_distance(a: f32, b: f32) -> f32 {
    180.0 - ((a - b).abs() - 180.0).abs()
}

/// Runs a single selection pass: accepts candidates in order while they are at least `threshold` degrees away from
/// every hue already accepted, stopping at `desired` colors.
pub fn select_at_threshold(candidates: &[Candidate], desired: usize, threshold: f32) -> Vec<Candidate> {
    let mut chosen: Vec<Candidate> = Vec::with_capacity(desired.min(candidates.len()));

    for &candidate in candidates {
        if chosen.len() >= desired {
            break;
        }

        if chosen
            .iter()
            .all(|accepted| hue_distance(candidate.hue(), accepted.hue()) >= threshold)
        {
            chosen.push(candidate);
        }
    }

    chosen
}

/// Selects up to `desired` hue-separated colors with the default thresholds (90° relaxing to 15°) and the mid-gray
/// fallback.
pub fn select_palette(candidates: &[Candidate], desired: usize) -> Vec<Rgb24> {
    SelectorOptions::default().select(candidates, desired)
}

/// Tuning for [`select_palette`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SelectorOptions {
    /// The separation, in whole degrees, of the first pass.
    pub max_separation: u32,
    /// The separation of the last pass.
    pub min_separation: u32,
    /// Returned alone when no candidate is accepted at all.
    pub fallback: Rgb24,
}

impl Default for SelectorOptions {
    fn default() -> Self {
        Self {
            max_separation: DEFAULT_MAX_SEPARATION,
            min_separation: DEFAULT_MIN_SEPARATION,
            fallback: FALLBACK_COLOR,
        }
    }
}

impl SelectorOptions {
    /// Selects up to `desired` colors (clamped to `1..=128`) from `candidates`, which must be ordered best first.
    ///
    /// The result is never empty: if nothing can be accepted, it holds only the fallback color.
    pub fn select(&self, candidates: &[Candidate], desired: usize) -> Vec<Rgb24> {
        let desired = desired.clamp(1, MAX_DESIRED_COLORS);
        let min_separation = self.min_separation.min(self.max_separation);

        let mut chosen = Vec::new();

        for threshold in (min_separation..=self.max_separation).rev() {
            chosen = select_at_threshold(candidates, desired, threshold as f32);
            trace!("{} of {} colors accepted at {threshold}°", chosen.len(), desired);

            if chosen.len() >= desired {
                break;
            }
        }

        if chosen.is_empty() {
            warn!("no candidate colors to choose from, falling back to {}", self.fallback);
            return vec![self.fallback];
        }

        chosen.into_iter().map(Candidate::color).collect()
    }
}
