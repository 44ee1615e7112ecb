//! Adaptive pixel subsampling.
//!
//! Both sampling modes walk the flattened pixel index space (`y * width + x`) from index 0 in steps of a fixed
//! stride, so "evenly spaced" means the same thing regardless of where the pixels come from:
//!
//! - scanline sources (PNG) hand out one row at a time, in order, at full resolution. A [`StrideCursor`] tracks the
//!   next index on the stride grid and picks the matching columns out of each row as it is decoded.
//! - scalable sources (JPEG) can decode at a reduced resolution. The smallest scale that still yields at least the
//!   target number of samples is decoded, and the stride walk then runs over the decoded buffer.

use crate::{
    error::{try_alloc, Result},
    normalize::RowLayout,
};
use log::debug;
use std::cmp::Ordering;

/// Returns the sampling stride for `total` pixels and a budget of `target` samples.
///
/// `ceil(total / stride) >= target` holds whenever `total >= target`.
pub fn stride(total: u64, target: u64) -> u64 {
    if target == 0 || target >= total {
        return 1;
    }

    (total / target).max(1)
}

/// Returns how many pixels a stride walk over `total` pixels visits.
pub fn sampled_count(total: u64, stride: u64) -> u64 {
    let stride = stride.max(1);
    (total + stride - 1) / stride
}

/// Walks the flattened index space of a `total`-pixel image in steps of `stride`, one row at a time.
#[derive(Debug, Clone)]
pub struct StrideCursor {
    next: u64,
    stride: u64,
    total: u64,
}

impl StrideCursor {
    pub fn new(total: u64, stride: u64) -> Self {
        Self {
            next: 0,
            stride: stride.max(1),
            total,
        }
    }

    /// Calls `visit` with the column of every grid index in the row that starts at flat index `row_start` and is
    /// `width` pixels wide, then moves past the row.
    ///
    /// Rows must be passed in order; the cursor never moves backwards.
    pub fn take_row<F>(&mut self, row_start: u64, width: u64, mut visit: F)
    where
        F: FnMut(usize),
    {
        let row_end = (row_start + width).min(self.total);

        while self.next < row_end {
            if self.next >= row_start {
                visit((self.next - row_start) as usize);
            }

            self.next += self.stride;
        }
    }

    pub fn is_done(&self) -> bool {
        self.next >= self.total
    }
}

/// A pixel source that can only be decoded one full row at a time, top to bottom.
pub trait ScanlineSource {
    /// The image size as `(width, height)`.
    fn dimensions(&self) -> (u32, u32);

    /// Decodes the next row. Returns `None` once every row has been read.
    fn next_row(&mut self) -> Result<Option<(RowLayout, &[u8])>>;
}

/// A rational decode scale, `num / denom`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScaleFactor {
    pub num: u32,
    pub denom: u32,
}

impl ScaleFactor {
    pub const FULL: ScaleFactor = ScaleFactor { num: 1, denom: 1 };

    pub const fn new(num: u32, denom: u32) -> Self {
        Self { num, denom }
    }

    /// Scales one dimension, rounding up.
    pub fn scale(self, dim: u32) -> u32 {
        let denom = u64::from(self.denom.max(1));
        ((u64::from(dim) * u64::from(self.num) + denom - 1) / denom) as u32
    }

    pub fn apply(self, (width, height): (u32, u32)) -> (u32, u32) {
        (self.scale(width), self.scale(height))
    }

    fn cmp_ratio(self, other: ScaleFactor) -> Ordering {
        (u64::from(self.num) * u64::from(other.denom)).cmp(&(u64::from(other.num) * u64::from(self.denom)))
    }
}

/// A fully decoded RGB8 image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// A pixel source whose decoder can produce the image pre-scaled by one of a few fixed factors.
pub trait ScalableSource {
    /// The full-resolution image size as `(width, height)`.
    fn dimensions(&self) -> (u32, u32);

    /// The scale factors the decoder offers for this image.
    fn scale_factors(&self) -> Vec<ScaleFactor>;

    /// Decodes the whole image at `factor` into RGB8.
    fn decode_at_scale(&mut self, factor: ScaleFactor) -> Result<DecodedImage>;
}

/// The output of a sampling pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Samples {
    pixels: Vec<u8>,
    stride: u64,
    dimensions: (u32, u32),
}

impl Samples {
    /// The sampled pixels as packed RGB triples.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// The number of sampled pixels.
    pub fn len(&self) -> usize {
        self.pixels.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    /// The stride the samples were taken with.
    pub fn stride(&self) -> u64 {
        self.stride
    }

    /// The dimensions of the image the stride walk ran over, after any decode-time scaling.
    pub fn dimensions(&self) -> (u32, u32) {
        self.dimensions
    }
}

/// Samples a scanline source down to at least `target` pixels (or every pixel if the image is smaller).
pub fn sample_scanlines<S>(source: &mut S, target: usize) -> Result<Samples>
where
    S: ScanlineSource + ?Sized,
{
    let (width, height) = source.dimensions();
    let total = u64::from(width) * u64::from(height);
    let stride = stride(total, target as u64);
    let count = sampled_count(total, stride);

    debug!("sampling {width}x{height} ({total} px) with stride {stride} for {count} samples");

    let mut pixels = try_alloc(count as usize * 3)?;
    let mut cursor = StrideCursor::new(total, stride);
    let mut row_start = 0;

    while !cursor.is_done() {
        let Some((layout, row)) = source.next_row()? else {
            break;
        };

        cursor.take_row(row_start, u64::from(width), |x| {
            pixels.extend_from_slice(&layout.pixel(row, x));
        });

        row_start += u64::from(width);
    }

    Ok(Samples {
        pixels,
        stride,
        dimensions: (width, height),
    })
}

/// Samples an in-memory RGB8 buffer with the same stride walk as [`sample_scanlines`].
pub fn sample_buffer(width: u32, height: u32, rgb: &[u8], target: usize) -> Result<Samples> {
    let mut rows = BufferRows {
        width,
        height,
        rgb,
        row: 0,
    };

    sample_scanlines(&mut rows, target)
}

/// Picks the decode scale for a `dimensions`-sized image and a budget of `target` samples.
///
/// The pick is the factor with the smallest decoded pixel count whose stride walk still produces at least `target`
/// samples. Equal decoded counts go to the smaller factor. If no factor qualifies the largest one is used.
pub fn choose_scale(dimensions: (u32, u32), factors: &[ScaleFactor], target: usize) -> ScaleFactor {
    let target = target as u64;
    let decoded = |factor: ScaleFactor| {
        let (w, h) = factor.apply(dimensions);
        u64::from(w) * u64::from(h)
    };

    let best = factors
        .iter()
        .copied()
        .filter(|&factor| {
            let pixels = decoded(factor);
            sampled_count(pixels, stride(pixels, target)) >= target
        })
        .min_by(|&a, &b| decoded(a).cmp(&decoded(b)).then_with(|| a.cmp_ratio(b)));

    best.or_else(|| factors.iter().copied().max_by(|a, b| a.cmp_ratio(*b)))
        .unwrap_or(ScaleFactor::FULL)
}

/// Decodes a scalable source once at the cheapest sufficient scale and samples the result.
///
/// A decode failure at the chosen scale is returned as is; no other scale is tried.
pub fn sample_scaled<S>(source: &mut S, target: usize) -> Result<Samples>
where
    S: ScalableSource + ?Sized,
{
    let dimensions = source.dimensions();
    let factor = choose_scale(dimensions, &source.scale_factors(), target);
    let decoded = source.decode_at_scale(factor)?;

    debug!(
        "decoding {}x{} at {}/{} gave {}x{}",
        dimensions.0, dimensions.1, factor.num, factor.denom, decoded.width, decoded.height
    );

    sample_buffer(decoded.width, decoded.height, &decoded.pixels, target)
}

struct BufferRows<'a> {
    width: u32,
    height: u32,
    rgb: &'a [u8],
    row: u32,
}

impl ScanlineSource for BufferRows<'_> {
    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn next_row(&mut self) -> Result<Option<(RowLayout, &[u8])>> {
        let row_len = self.width as usize * 3;
        let start = self.row as usize * row_len;

        if self.row >= self.height || start + row_len > self.rgb.len() {
            return Ok(None);
        }

        self.row += 1;
        Ok(Some((RowLayout::Rgb, &self.rgb[start..start + row_len])))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // a forward-only source that hands out a gradient where every pixel encodes its own flat index
    struct IndexRows {
        width: u32,
        height: u32,
        row: u32,
        buf: Vec<u8>,
    }

    impl IndexRows {
        fn new(width: u32, height: u32) -> Self {
            Self {
                width,
                height,
                row: 0,
                buf: Vec::new(),
            }
        }
    }

    impl ScanlineSource for IndexRows {
        fn dimensions(&self) -> (u32, u32) {
            (self.width, self.height)
        }

        fn next_row(&mut self) -> Result<Option<(RowLayout, &[u8])>> {
            if self.row >= self.height {
                return Ok(None);
            }

            let start = self.row * self.width;
            self.buf = (start..start + self.width)
                .flat_map(|i| [(i >> 16) as u8, (i >> 8) as u8, i as u8])
                .collect();
            self.row += 1;

            Ok(Some((RowLayout::Rgb, &self.buf)))
        }
    }

    fn indices(samples: &Samples) -> Vec<u32> {
        samples
            .pixels()
            .chunks(3)
            .map(|p| (p[0] as u32) << 16 | (p[1] as u32) << 8 | p[2] as u32)
            .collect()
    }

    struct FixedScales {
        dimensions: (u32, u32),
        factors: Vec<ScaleFactor>,
        decoded_at: Option<ScaleFactor>,
    }

    impl ScalableSource for FixedScales {
        fn dimensions(&self) -> (u32, u32) {
            self.dimensions
        }

        fn scale_factors(&self) -> Vec<ScaleFactor> {
            self.factors.clone()
        }

        fn decode_at_scale(&mut self, factor: ScaleFactor) -> Result<DecodedImage> {
            self.decoded_at = Some(factor);
            let (width, height) = factor.apply(self.dimensions);

            Ok(DecodedImage {
                width,
                height,
                pixels: vec![128; width as usize * height as usize * 3],
            })
        }
    }

    fn eighths() -> Vec<ScaleFactor> {
        [1, 2, 4, 8].into_iter().map(|num| ScaleFactor::new(num, 8)).collect()
    }

    #[test]
    fn stride_for_a_megapixel() {
        let s = stride(1_000_000, 16_384);

        assert_eq!(s, 61);
        assert_eq!(sampled_count(1_000_000, s), 16_394);
    }

    #[test]
    fn stride_is_one_when_target_covers_image() {
        assert_eq!(stride(1, 16_384), 1);
        assert_eq!(sampled_count(1, 1), 1);
        assert_eq!(stride(100, 100), 1);
        assert_eq!(stride(100, 0), 1);
    }

    #[test]
    fn sampling_never_undershoots() {
        for total in 1..2_000u64 {
            for target in [1u64, 2, 3, 7, 64, 333, 999, 1_999] {
                let count = sampled_count(total, stride(total, target));

                if total >= target {
                    assert!(count >= target, "total {total} target {target} gave {count}");
                } else {
                    assert_eq!(count, total);
                }
            }
        }
    }

    #[test]
    fn scanline_walk_matches_the_flat_grid() {
        for (width, height, target) in [(7, 5, 4), (10, 10, 7), (1, 50, 9), (50, 1, 9), (13, 11, 143), (3, 3, 100)] {
            let mut source = IndexRows::new(width, height);
            let samples = sample_scanlines(&mut source, target).unwrap();

            let total = width * height;
            let step = stride(total as u64, target as u64) as usize;
            let expected: Vec<u32> = (0..total).step_by(step).collect();

            assert_eq!(indices(&samples), expected, "{width}x{height} target {target}");
            assert_eq!(samples.stride(), step as u64);
        }
    }

    #[test]
    fn scanline_walk_stops_reading_once_the_grid_is_exhausted() {
        // 4x4 with stride 8 visits indices 0 and 8, both before the last row
        let mut source = IndexRows::new(4, 4);
        let samples = sample_scanlines(&mut source, 2).unwrap();

        assert_eq!(indices(&samples), vec![0, 8]);
        assert_eq!(source.row, 3);
    }

    #[test]
    fn single_pixel_image() {
        let samples = sample_buffer(1, 1, &[1, 2, 3], 16_384).unwrap();

        assert_eq!(samples.len(), 1);
        assert_eq!(samples.pixels(), &[1, 2, 3]);
    }

    #[test]
    fn cursor_skips_rows_without_grid_points() {
        let mut cursor = StrideCursor::new(30, 12);
        let mut hits = Vec::new();

        for row in 0..3u64 {
            cursor.take_row(row * 10, 10, |x| hits.push((row, x)));
        }

        assert_eq!(hits, vec![(0, 0), (1, 2), (2, 4)]);
        assert!(cursor.is_done());
    }

    #[test]
    fn scale_rounds_up() {
        let factor = ScaleFactor::new(1, 8);

        assert_eq!(factor.apply((4000, 3000)), (500, 375));
        assert_eq!(factor.apply((9, 1)), (2, 1));
    }

    #[test]
    fn picks_the_smallest_sufficient_scale() {
        assert_eq!(choose_scale((4000, 3000), &eighths(), 16_384), ScaleFactor::new(1, 8));
        assert_eq!(choose_scale((400, 300), &eighths(), 16_384), ScaleFactor::new(4, 8));
    }

    #[test]
    fn chosen_scale_is_minimal() {
        for (w, h) in [(4000, 3000), (640, 480), (321, 123), (1024, 17), (256, 64)] {
            let chosen = choose_scale((w, h), &eighths(), 16_384);
            let (cw, ch) = chosen.apply((w, h));
            let chosen_pixels = u64::from(cw) * u64::from(ch);

            for factor in eighths() {
                let (fw, fh) = factor.apply((w, h));
                let pixels = u64::from(fw) * u64::from(fh);
                let qualifies = sampled_count(pixels, stride(pixels, 16_384)) >= 16_384;

                if qualifies {
                    assert!(chosen_pixels <= pixels, "{w}x{h}: {factor:?} beats {chosen:?}");
                }
            }
        }
    }

    #[test]
    fn equal_decoded_sizes_prefer_the_smaller_factor() {
        let factors = [ScaleFactor::new(2, 4), ScaleFactor::new(1, 2)];
        let chosen = choose_scale((1000, 1000), &factors, 100);

        // both halve the image; 1/2 and 2/4 compare equal by ratio so the first minimum wins
        assert_eq!(chosen.apply((1000, 1000)), (500, 500));

        let factors = [ScaleFactor::new(3, 8), ScaleFactor::new(1, 3)];
        // 3/8 of 8 and 1/3 of 8 both round up to 3
        assert_eq!(choose_scale((8, 8), &factors, 4), ScaleFactor::new(1, 3));
    }

    #[test]
    fn falls_back_to_the_largest_scale() {
        assert_eq!(choose_scale((100, 100), &eighths(), 16_384), ScaleFactor::new(8, 8));
        assert_eq!(choose_scale((100, 100), &[], 16_384), ScaleFactor::FULL);
    }

    #[test]
    fn scaled_sampling_decodes_once_at_the_chosen_scale() {
        let mut source = FixedScales {
            dimensions: (4000, 3000),
            factors: eighths(),
            decoded_at: None,
        };

        let samples = sample_scaled(&mut source, 16_384).unwrap();

        assert_eq!(source.decoded_at, Some(ScaleFactor::new(1, 8)));
        assert_eq!(samples.dimensions(), (500, 375));
        assert_eq!(samples.stride(), 11);
        assert_eq!(samples.len(), 17_046);
    }

    #[test]
    fn scaled_sampling_returns_everything_from_small_images() {
        let mut source = FixedScales {
            dimensions: (20, 10),
            factors: eighths(),
            decoded_at: None,
        };

        let samples = sample_scaled(&mut source, 16_384).unwrap();

        assert_eq!(source.decoded_at, Some(ScaleFactor::new(8, 8)));
        assert_eq!(samples.len(), 200);
    }
}
