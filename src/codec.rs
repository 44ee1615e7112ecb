//! PNG and JPEG decoding into the sampler's source traits.

use crate::{
    error::{try_alloc, Error, ImageFormat, Result},
    normalize::{normalize_buffer, RowLayout},
    sampler::{sample_scaled, sample_scanlines, DecodedImage, ScalableSource, ScaleFactor, Samples, ScanlineSource},
};
use jpeg_decoder::PixelFormat;
use log::debug;
use std::{
    fs::File,
    io::{BufReader, Read},
    path::Path,
};

/// The reduced IDCT scales jpeg-decoder can decode at, in eighths.
const JPEG_REDUCED_EIGHTHS: [u32; 3] = [1, 2, 4];
const JPEG_FULL_SCALE: ScaleFactor = ScaleFactor::new(8, 8);

impl ImageFormat {
    /// Guesses the format from the file extension, ignoring case.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<ImageFormat> {
        let ext = path.as_ref().extension()?.to_str()?;

        if ext.eq_ignore_ascii_case("png") {
            Some(ImageFormat::Png)
        } else if ext.eq_ignore_ascii_case("jpg") || ext.eq_ignore_ascii_case("jpeg") {
            Some(ImageFormat::Jpeg)
        } else {
            None
        }
    }
}

/// A PNG decoded one row at a time, normalized to 8-bit channels.
///
/// Interlaced images don't produce rows in display order, so they are deinterlaced into a single frame on the first
/// row request and served from that.
pub struct PngSource<R: Read> {
    reader: png::Reader<R>,
    layout: RowLayout,
    frame: Option<Vec<u8>>,
    row: u32,
}

impl<R: Read> PngSource<R> {
    pub fn new(input: R) -> Result<Self> {
        let mut decoder = png::Decoder::new(input);
        // palette -> rgb, low bit depths -> 8 bits, tRNS -> alpha, 16 bits -> high byte
        decoder.set_transformations(png::Transformations::EXPAND | png::Transformations::STRIP_16);

        let reader = decoder.read_info()?;
        let (color_type, bit_depth) = reader.output_color_type();

        let layout = RowLayout::from_png(color_type)
            .filter(|_| bit_depth == png::BitDepth::Eight)
            .ok_or_else(|| {
                Error::decode(
                    ImageFormat::Png,
                    format!("unexpected output format {color_type:?} at {bit_depth:?}"),
                )
            })?;

        Ok(Self {
            reader,
            layout,
            frame: None,
            row: 0,
        })
    }

    /// Decodes every row into a single RGB8 image.
    pub fn decode_full(mut self) -> Result<DecodedImage> {
        let (width, height) = self.dimensions();
        let frame = self.read_frame()?;

        Ok(DecodedImage {
            width,
            height,
            pixels: normalize_buffer(self.layout, &frame),
        })
    }

    fn read_frame(&mut self) -> Result<Vec<u8>> {
        let size = self.reader.output_buffer_size();
        let mut frame = try_alloc(size)?;
        frame.resize(size, 0);

        self.reader.next_frame(&mut frame)?;
        Ok(frame)
    }
}

impl<R: Read> ScanlineSource for PngSource<R> {
    fn dimensions(&self) -> (u32, u32) {
        let info = self.reader.info();
        (info.width, info.height)
    }

    fn next_row(&mut self) -> Result<Option<(RowLayout, &[u8])>> {
        let layout = self.layout;

        if !self.reader.info().interlaced {
            return Ok(self.reader.next_row()?.map(|row| (layout, row.data())));
        }

        if self.frame.is_none() {
            self.frame = Some(self.read_frame()?);
        }

        let (width, height) = self.dimensions();
        let line = width as usize * layout.channels();
        let start = self.row as usize * line;

        match self.frame.as_deref() {
            Some(frame) if self.row < height && start + line <= frame.len() => {
                self.row += 1;
                Ok(Some((layout, &frame[start..start + line])))
            }
            _ => Ok(None),
        }
    }
}

/// A JPEG that can be decoded pre-scaled by 1/8, 2/8, 4/8 or 8/8.
pub struct JpegSource<R: Read> {
    decoder: jpeg_decoder::Decoder<R>,
    dimensions: (u32, u32),
}

impl<R: Read> JpegSource<R> {
    pub fn new(input: R) -> Result<Self> {
        let mut decoder = jpeg_decoder::Decoder::new(input);
        decoder.read_info()?;

        let info = decoder
            .info()
            .ok_or_else(|| Error::decode(ImageFormat::Jpeg, "missing frame header"))?;

        Ok(Self {
            decoder,
            dimensions: (u32::from(info.width), u32::from(info.height)),
        })
    }

    /// Decodes the image at full resolution.
    pub fn decode_full(mut self) -> Result<DecodedImage> {
        self.decode_at_scale(JPEG_FULL_SCALE)
    }
}

impl<R: Read> ScalableSource for JpegSource<R> {
    fn dimensions(&self) -> (u32, u32) {
        self.dimensions
    }

    /// Offers every reduced scale the decoder can be asked for, plus full resolution.
    fn scale_factors(&self) -> Vec<ScaleFactor> {
        let mut factors: Vec<ScaleFactor> = JPEG_REDUCED_EIGHTHS
            .iter()
            .filter(|&&num| scale_request(self.dimensions, num).is_some())
            .map(|&num| ScaleFactor::new(num, 8))
            .collect();

        factors.push(JPEG_FULL_SCALE);
        factors
    }

    fn decode_at_scale(&mut self, factor: ScaleFactor) -> Result<DecodedImage> {
        let (mut width, mut height) = self.dimensions;

        if factor.num < factor.denom {
            let (requested_width, requested_height) = as_eighths(factor)
                .and_then(|num| scale_request(self.dimensions, num))
                .ok_or_else(|| {
                    Error::decode(
                        ImageFormat::Jpeg,
                        format!("cannot decode at scale {}/{}", factor.num, factor.denom),
                    )
                })?;

            let (w, h) = self.decoder.scale(requested_width, requested_height)?;
            (width, height) = (u32::from(w), u32::from(h));

            debug!("requested {requested_width}x{requested_height} from the jpeg decoder, got {width}x{height}");
        }

        let data = self.decoder.decode()?;
        let format = self
            .decoder
            .info()
            .map(|info| info.pixel_format)
            .ok_or_else(|| Error::decode(ImageFormat::Jpeg, "missing frame header"))?;

        let pixels = jpeg_to_rgb(format, data);

        let expected = width as usize * height as usize * 3;
        if pixels.len() < expected {
            return Err(Error::decode(
                ImageFormat::Jpeg,
                format!("decoder produced {} bytes for a {width}x{height} image", pixels.len()),
            ));
        }

        Ok(DecodedImage { width, height, pixels })
    }
}

/// Returns the `(width, height)` to hand `jpeg_decoder::Decoder::scale` so it decodes at exactly `num / 8`.
///
/// The decoder picks the smallest scale whose output reaches either requested dimension. An axis on which `num / 8`
/// doesn't grow past every smaller scale can't select it, so that axis gets an unreachable request instead. If neither
/// axis grows, the scale can't be asked for at all.
fn scale_request(dimensions: (u32, u32), num: u32) -> Option<(u16, u16)> {
    let (w, h) = ScaleFactor::new(num, 8).apply(dimensions);
    let smaller = JPEG_REDUCED_EIGHTHS.iter().take_while(|&&other| other < num);

    let (mut width_grows, mut height_grows) = (true, true);
    for &other in smaller {
        let (sw, sh) = ScaleFactor::new(other, 8).apply(dimensions);
        width_grows &= sw < w;
        height_grows &= sh < h;
    }

    let request = |grows: bool, len: u32| if grows { u16::try_from(len).unwrap_or(u16::MAX) } else { u16::MAX };

    (width_grows || height_grows).then(|| (request(width_grows, w), request(height_grows, h)))
}

fn as_eighths(factor: ScaleFactor) -> Option<u32> {
    let scaled = factor.num.checked_mul(8)?;

    (factor.denom != 0 && scaled % factor.denom == 0)
        .then(|| scaled / factor.denom)
        .filter(|num| JPEG_REDUCED_EIGHTHS.contains(num))
}

fn jpeg_to_rgb(format: PixelFormat, data: Vec<u8>) -> Vec<u8> {
    match format {
        PixelFormat::RGB24 => data,
        PixelFormat::L8 => normalize_buffer(RowLayout::Gray, &data),
        // jpeg-decoder writes 16-bit samples big endian
        PixelFormat::L16 => {
            let high: Vec<u8> = data.chunks_exact(2).map(|v| v[0]).collect();
            normalize_buffer(RowLayout::Gray, &high)
        }
        PixelFormat::CMYK32 => cmyk_to_rgb(&data),
    }
}

// Adobe writes CMYK JPEGs with inverted channels, which is what jpeg-decoder hands back
fn cmyk_to_rgb(data: &[u8]) -> Vec<u8> {
    data.chunks_exact(4)
        .flat_map(|p| {
            let k = u16::from(p[3]);
            let channel = |v: u8| (u16::from(v) * k / 255) as u8;
            [channel(p[0]), channel(p[1]), channel(p[2])]
        })
        .collect()
}

/// Decodes the image at `path` and samples it down to at least `target` pixels.
///
/// PNGs are walked row by row at full resolution. JPEGs are decoded at the smallest scale that still yields `target`
/// samples.
pub fn load_subsampled<P: AsRef<Path>>(path: P, target: usize) -> Result<Samples> {
    let (format, input) = open(path.as_ref())?;

    let samples = match format {
        ImageFormat::Png => sample_scanlines(&mut PngSource::new(input)?, target)?,
        ImageFormat::Jpeg => sample_scaled(&mut JpegSource::new(input)?, target)?,
    };

    debug!("sampled {} pixels from {}", samples.len(), path.as_ref().display());
    Ok(samples)
}

/// Decodes the image at `path` at full resolution into RGB8.
pub fn load_rgb<P: AsRef<Path>>(path: P) -> Result<DecodedImage> {
    let (format, input) = open(path.as_ref())?;

    match format {
        ImageFormat::Png => PngSource::new(input)?.decode_full(),
        ImageFormat::Jpeg => JpegSource::new(input)?.decode_full(),
    }
}

fn open(path: &Path) -> Result<(ImageFormat, BufReader<File>)> {
    let format = ImageFormat::from_path(path).ok_or_else(|| Error::UnsupportedFormat {
        path: path.to_path_buf(),
    })?;

    let file = File::open(path).map_err(|source| Error::Io { format, source })?;
    Ok((format, BufReader::new(file)))
}
