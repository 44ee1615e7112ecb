use std::{fmt, path::PathBuf};

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// The container formats the loader understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    Png,
    Jpeg,
}

impl ImageFormat {
    pub fn name(self) -> &'static str {
        match self {
            ImageFormat::Png => "PNG",
            ImageFormat::Jpeg => "JPEG",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("unsupported image format for {}: only PNG and JPEG are supported", .path.display())]
    UnsupportedFormat { path: PathBuf },

    #[error("failed to decode {format} image: {message}")]
    Decode { format: ImageFormat, message: String },

    #[error("failed to read {format} image")]
    Io {
        format: ImageFormat,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to allocate {bytes} bytes for pixel data")]
    Allocation { bytes: usize },

    #[error("quantizer failed")]
    Quantize(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),

    #[error("invalid hex color {0:?}")]
    InvalidColor(String),
}

impl Error {
    pub(crate) fn decode(format: ImageFormat, message: impl fmt::Display) -> Self {
        Error::Decode {
            format,
            message: message.to_string(),
        }
    }

    /// Whether this error came out of reading or parsing the image file.
    pub fn is_decode_error(&self) -> bool {
        matches!(self, Error::Decode { .. } | Error::Io { .. })
    }
}

impl From<png::DecodingError> for Error {
    fn from(err: png::DecodingError) -> Self {
        match err {
            png::DecodingError::IoError(source) => Error::Io {
                format: ImageFormat::Png,
                source,
            },
            other => Error::decode(ImageFormat::Png, other),
        }
    }
}

impl From<jpeg_decoder::Error> for Error {
    fn from(err: jpeg_decoder::Error) -> Self {
        match err {
            jpeg_decoder::Error::Io(source) => Error::Io {
                format: ImageFormat::Jpeg,
                source,
            },
            other => Error::decode(ImageFormat::Jpeg, other),
        }
    }
}

/// Allocates an empty buffer with room for exactly `len` bytes, reporting failure instead of aborting.
pub(crate) fn try_alloc(len: usize) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len).map_err(|_| Error::Allocation { bytes: len })?;

    Ok(buf)
}
