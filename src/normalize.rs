//! Collapsing decoded pixel data into plain 8-bit RGB.
//!
//! Alpha is dropped, never composited. Sources that carry transparency as a key color (PNG `tRNS`) are expanded into
//! an alpha channel by the decoder first, so dropping the channel treats them like any other alpha source. 16-bit
//! channels keep their high byte.

use image::{DynamicImage, ImageBuffer, Pixel, Rgb, RgbImage};

/// The memory layout of one decoded 8-bit pixel row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowLayout {
    Gray,
    GrayAlpha,
    Rgb,
    Rgba,
}

impl RowLayout {
    pub fn channels(self) -> usize {
        match self {
            RowLayout::Gray => 1,
            RowLayout::GrayAlpha => 2,
            RowLayout::Rgb => 3,
            RowLayout::Rgba => 4,
        }
    }

    /// Maps a PNG output color type onto a row layout. Indexed rows have no direct layout; they must be expanded by
    /// the decoder.
    pub fn from_png(color_type: png::ColorType) -> Option<Self> {
        match color_type {
            png::ColorType::Grayscale => Some(RowLayout::Gray),
            png::ColorType::GrayscaleAlpha => Some(RowLayout::GrayAlpha),
            png::ColorType::Rgb => Some(RowLayout::Rgb),
            png::ColorType::Rgba => Some(RowLayout::Rgba),
            png::ColorType::Indexed => None,
        }
    }

    /// Returns the RGB value of the pixel at column `x` of `row`.
    pub fn pixel(self, row: &[u8], x: usize) -> [u8; 3] {
        let offset = x * self.channels();

        match self {
            RowLayout::Gray | RowLayout::GrayAlpha => {
                let v = row[offset];
                [v, v, v]
            }
            RowLayout::Rgb | RowLayout::Rgba => [row[offset], row[offset + 1], row[offset + 2]],
        }
    }

    /// Appends every pixel of `row` to `out` as RGB8.
    pub fn extend_rgb(self, row: &[u8], out: &mut Vec<u8>) {
        match self {
            RowLayout::Rgb => out.extend_from_slice(row),
            _ => {
                let width = row.len() / self.channels();
                for x in 0..width {
                    out.extend_from_slice(&self.pixel(row, x));
                }
            }
        }
    }
}

/// Converts a whole packed buffer in `layout` into an RGB8 buffer of the same dimensions.
pub fn normalize_buffer(layout: RowLayout, data: &[u8]) -> Vec<u8> {
    if layout == RowLayout::Rgb {
        return data.to_vec();
    }

    let mut out = Vec::with_capacity(data.len() / layout.channels() * 3);
    layout.extend_rgb(data, &mut out);
    out
}

/// Normalizes an already decoded image into RGB8.
///
/// An image that is RGB8 already is returned as is.
pub fn normalize_image(image: DynamicImage) -> RgbImage {
    match image {
        DynamicImage::ImageRgb8(buf) => buf,
        DynamicImage::ImageLuma8(buf) => map_pixels(&buf, |c| [c[0]; 3]),
        DynamicImage::ImageLumaA8(buf) => map_pixels(&buf, |c| [c[0]; 3]),
        DynamicImage::ImageRgba8(buf) => map_pixels(&buf, |c| [c[0], c[1], c[2]]),
        DynamicImage::ImageLuma16(buf) => map_pixels(&buf, |c| [high_byte(c[0]); 3]),
        DynamicImage::ImageLumaA16(buf) => map_pixels(&buf, |c| [high_byte(c[0]); 3]),
        DynamicImage::ImageRgb16(buf) => {
            map_pixels(&buf, |c| [high_byte(c[0]), high_byte(c[1]), high_byte(c[2])])
        }
        DynamicImage::ImageRgba16(buf) => {
            map_pixels(&buf, |c| [high_byte(c[0]), high_byte(c[1]), high_byte(c[2])])
        }
        other => other.to_rgb8(),
    }
}

fn map_pixels<P, F>(buf: &ImageBuffer<P, Vec<P::Subpixel>>, to_rgb: F) -> RgbImage
where
    P: Pixel,
    F: Fn(&[P::Subpixel]) -> [u8; 3],
{
    RgbImage::from_fn(buf.width(), buf.height(), |x, y| Rgb(to_rgb(buf.get_pixel(x, y).channels())))
}

fn high_byte(v: u16) -> u8 {
    (v >> 8) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, LumaA, Rgb32FImage, Rgba};

    #[test]
    fn rgb8_is_left_untouched() {
        let buf = RgbImage::from_fn(3, 2, |x, y| Rgb([x as u8 * 10, y as u8 * 20, 7]));
        let normalized = normalize_image(DynamicImage::ImageRgb8(buf.clone()));

        assert_eq!(normalized, buf);
        assert_eq!(normalize_image(DynamicImage::ImageRgb8(normalized.clone())), normalized);
    }

    #[test]
    fn gray_is_replicated_across_channels() {
        let buf = ImageBuffer::from_fn(2, 1, |x, _| Luma([if x == 0 { 10u8 } else { 200 }]));
        let normalized = normalize_image(DynamicImage::ImageLuma8(buf));

        assert_eq!(normalized.as_raw(), &vec![10, 10, 10, 200, 200, 200]);
    }

    #[test]
    fn alpha_is_dropped_not_composited() {
        let buf = ImageBuffer::from_pixel(1, 1, Rgba([90u8, 60, 30, 0]));
        let normalized = normalize_image(DynamicImage::ImageRgba8(buf));
        assert_eq!(normalized.as_raw(), &vec![90, 60, 30]);

        let buf = ImageBuffer::from_pixel(1, 1, LumaA([77u8, 0]));
        let normalized = normalize_image(DynamicImage::ImageLumaA8(buf));
        assert_eq!(normalized.as_raw(), &vec![77, 77, 77]);
    }

    #[test]
    fn sixteen_bit_channels_keep_the_high_byte() {
        let buf = ImageBuffer::from_pixel(1, 1, Rgb([0x12ffu16, 0xab00, 0x00ff]));
        let normalized = normalize_image(DynamicImage::ImageRgb16(buf));
        assert_eq!(normalized.as_raw(), &vec![0x12, 0xab, 0x00]);

        let buf = ImageBuffer::from_pixel(1, 1, Rgba([0xfe01u16, 0x0102, 0x8080, 0xffff]));
        let normalized = normalize_image(DynamicImage::ImageRgba16(buf));
        assert_eq!(normalized.as_raw(), &vec![0xfe, 0x01, 0x80]);
    }

    #[test]
    fn every_variant_keeps_its_dimensions() {
        let images = [
            DynamicImage::ImageLuma16(ImageBuffer::from_pixel(5, 3, Luma([0xa0ffu16]))),
            DynamicImage::ImageLumaA16(ImageBuffer::from_pixel(5, 3, LumaA([0xa0ffu16, 0]))),
            DynamicImage::ImageLumaA8(ImageBuffer::from_pixel(5, 3, LumaA([0xa0u8, 9]))),
            DynamicImage::ImageRgb32F(Rgb32FImage::from_pixel(5, 3, Rgb([0.628f32, 0.628, 0.628]))),
        ];

        for image in images {
            let normalized = normalize_image(image);

            assert_eq!(normalized.dimensions(), (5, 3));
            assert!(normalized.pixels().all(|p| p.0[0] == 0xa0 && p.0[1] == 0xa0 && p.0[2] == 0xa0));
        }
    }

    #[test]
    fn row_pixels_by_layout() {
        let row = [1, 2, 3, 4, 5, 6, 7, 8];

        assert_eq!(RowLayout::Gray.pixel(&row, 3), [4, 4, 4]);
        assert_eq!(RowLayout::GrayAlpha.pixel(&row, 3), [7, 7, 7]);
        assert_eq!(RowLayout::Rgba.pixel(&row, 1), [5, 6, 7]);
        assert_eq!(RowLayout::Rgb.pixel(&row, 1), [4, 5, 6]);
    }

    #[test]
    fn buffers_convert_pixel_for_pixel() {
        assert_eq!(normalize_buffer(RowLayout::GrayAlpha, &[9, 0, 8, 255]), vec![9, 9, 9, 8, 8, 8]);
        assert_eq!(normalize_buffer(RowLayout::Rgb, &[1, 2, 3]), vec![1, 2, 3]);
    }
}
