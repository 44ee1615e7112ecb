// Copyright 2022 Spanfile
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A library to extract a small, hue-diverse color palette from an image.
//!
//! Extraction runs in three steps:
//!
//! 1. the image is decoded and subsampled to a fixed pixel budget. PNGs are walked row by row; JPEGs are decoded at
//!    the smallest IDCT scale that still covers the budget.
//! 2. the samples are clustered by a [`Quantizer`] into candidate colors ranked by score.
//! 3. the candidates are picked greedily, best first, keeping their hues apart by a separation that starts at 90° and
//!    relaxes down to 15° until enough colors fit.
//!
//! ```no_run
//! let colors = hueprint::extract_palette("wallpaper.jpg", 5)?;
//!
//! for color in colors {
//!     println!("{color}");
//! }
//! # Ok::<(), hueprint::Error>(())
//! ```

mod codec;
mod color;
mod color_cut_quantizer;
mod error;
mod normalize;
mod options;
mod quantizer;
pub mod sampler;
pub mod selector;

pub const DEFAULT_DESIRED_COLORS: usize = 5;
pub const DEFAULT_TARGET_PIXELS: usize = 16384;
pub const MAX_CLUSTERS: usize = 128;
pub const DEFAULT_MAX_CLUSTERS: usize = MAX_CLUSTERS;
pub const MAX_DESIRED_COLORS: usize = 128;
pub const FALLBACK_COLOR: Rgb24 = Rgb24::new(0x80, 0x80, 0x80);

pub use crate::{
    codec::{load_rgb, load_subsampled, JpegSource, PngSource},
    color::{Candidate, Rgb24},
    color_cut_quantizer::ColorCutQuantizer,
    error::{Error, ImageFormat, Result},
    normalize::{normalize_buffer, normalize_image, RowLayout},
    options::ExtractOptions,
    quantizer::Quantizer,
    sampler::{DecodedImage, Samples, ScaleFactor},
    selector::SelectorOptions,
};
pub use image;
pub use palette;

use image::DynamicImage;
use log::debug;
use std::path::Path;

/// Extracts up to `desired_count` colors (clamped to `1..=128`) from the PNG or JPEG at `path` with the default
/// settings and the built-in quantizer.
pub fn extract_palette<P: AsRef<Path>>(path: P, desired_count: usize) -> Result<Vec<Rgb24>> {
    Extractor::new().desired_count(desired_count).extract(path)
}

/// Extracts a palette from the image at `path` with the given options and quantizer.
pub fn extract_palette_with<P, Q>(path: P, options: ExtractOptions, quantizer: Q) -> Result<Vec<Rgb24>>
where
    P: AsRef<Path>,
    Q: Quantizer,
{
    Extractor::new().options(options).quantizer(quantizer).extract(path)
}

/// Configures and runs palette extractions.
pub struct Extractor<Q = ColorCutQuantizer> {
    options: ExtractOptions,
    quantizer: Q,
}

impl Extractor {
    pub fn new() -> Self {
        Self {
            options: ExtractOptions::default(),
            quantizer: ColorCutQuantizer,
        }
    }
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new()
    }
}

impl<Q> Extractor<Q>
where
    Q: Quantizer,
{
    /// Replaces the clustering engine.
    pub fn quantizer<R>(self, quantizer: R) -> Extractor<R>
    where
        R: Quantizer,
    {
        Extractor {
            options: self.options,
            quantizer,
        }
    }

    pub fn options(self, options: ExtractOptions) -> Self {
        Self { options, ..self }
    }

    pub fn desired_count(mut self, desired_count: usize) -> Self {
        self.options.desired_count = desired_count;
        self
    }

    pub fn target_pixels(mut self, target_pixels: usize) -> Self {
        self.options.target_pixels = target_pixels;
        self
    }

    pub fn max_clusters(mut self, max_clusters: usize) -> Self {
        self.options.max_clusters = max_clusters;
        self
    }

    /// Sets the hue separation of the first and last selection pass, in degrees.
    pub fn separation(mut self, max_degrees: u32, min_degrees: u32) -> Self {
        self.options.selector.max_separation = max_degrees;
        self.options.selector.min_separation = min_degrees;
        self
    }

    pub fn fallback_color(mut self, color: Rgb24) -> Self {
        self.options.selector.fallback = color;
        self
    }

    pub fn get_options(&self) -> &ExtractOptions {
        &self.options
    }

    /// Decodes, samples, quantizes and selects colors from the PNG or JPEG at `path`.
    pub fn extract<P: AsRef<Path>>(&self, path: P) -> Result<Vec<Rgb24>> {
        let samples = load_subsampled(path, self.options.target_pixels)?;
        self.extract_from_samples(samples)
    }

    /// Runs the extraction over an RGB8 buffer of `width` by `height` pixels that is already in memory.
    pub fn extract_from_rgb(&self, width: u32, height: u32, rgb: &[u8]) -> Result<Vec<Rgb24>> {
        let samples = sampler::sample_buffer(width, height, rgb, self.options.target_pixels)?;
        self.extract_from_samples(samples)
    }

    /// Runs the extraction over an image decoded by the `image` crate.
    pub fn extract_from_image(&self, image: DynamicImage) -> Result<Vec<Rgb24>> {
        let rgb = normalize_image(image);
        let (width, height) = rgb.dimensions();

        self.extract_from_rgb(width, height, rgb.as_raw())
    }

    fn extract_from_samples(&self, samples: Samples) -> Result<Vec<Rgb24>> {
        let max_clusters = self.options.max_clusters.clamp(1, MAX_CLUSTERS);
        let candidates = self.quantizer.quantize(samples.pixels(), max_clusters)?;
        drop(samples);

        debug!("quantizer returned {} candidates", candidates.len());

        Ok(self.options.selector.select(&candidates, self.options.desired_count))
    }
}
