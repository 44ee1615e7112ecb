use std::{fmt, str::FromStr};

use palette::IntoColor;

use crate::error::Error;

/// A packed 24-bit sRGB color, stored as `0xRRGGBB`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Rgb24(u32);

impl Rgb24 {
    pub const fn new(red: u8, green: u8, blue: u8) -> Self {
        Self(((red as u32) << 16) | ((green as u32) << 8) | blue as u32)
    }

    /// Builds a color from a packed value. Anything above the low 24 bits (an alpha or score channel) is discarded.
    pub const fn from_u32(packed: u32) -> Self {
        Self(packed & 0x00ff_ffff)
    }

    pub const fn to_u32(self) -> u32 {
        self.0
    }

    pub const fn rgb(self) -> (u8, u8, u8) {
        ((self.0 >> 16) as u8, (self.0 >> 8) as u8, self.0 as u8)
    }

    pub fn hsl(self) -> (f32, f32, f32) {
        rgb_to_hsl(self.rgb())
    }

    /// The hue angle in degrees, in `[0, 360)`. Achromatic colors have a hue of 0.
    pub fn hue(self) -> f32 {
        self.hsl().0
    }
}

impl From<(u8, u8, u8)> for Rgb24 {
    fn from((red, green, blue): (u8, u8, u8)) -> Self {
        Self::new(red, green, blue)
    }
}

impl From<[u8; 3]> for Rgb24 {
    fn from([red, green, blue]: [u8; 3]) -> Self {
        Self::new(red, green, blue)
    }
}

impl fmt::Display for Rgb24 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:06X}", self.0)
    }
}

impl FromStr for Rgb24 {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix('#').unwrap_or(s);

        if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::InvalidColor(s.to_owned()));
        }

        u32::from_str_radix(digits, 16)
            .map(Self::from_u32)
            .map_err(|_| Error::InvalidColor(s.to_owned()))
    }
}

/// A quantizer-produced color considered for the final palette.
///
/// The score ranks candidates (higher is better); the hue is what the selector separates on.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Candidate {
    color: Rgb24,
    score: f32,
    hue: f32,
}

impl Candidate {
    /// Creates a candidate, deriving its hue from the color.
    pub fn new(color: Rgb24, score: f32) -> Self {
        Self {
            color,
            score,
            hue: color.hue(),
        }
    }

    /// Creates a candidate with an explicit hue angle, wrapped into `[0, 360)`.
    pub fn with_hue(color: Rgb24, score: f32, hue: f32) -> Self {
        let hue = hue.rem_euclid(360.0);

        Self {
            color,
            score,
            // rem_euclid can round up to exactly 360 for tiny negative inputs
            hue: if hue >= 360.0 { 0.0 } else { hue },
        }
    }

    pub fn color(self) -> Rgb24 {
        self.color
    }

    pub fn score(self) -> f32 {
        self.score
    }

    pub fn hue(self) -> f32 {
        self.hue
    }
}

pub(crate) fn rgb_to_hsl(rgb: (u8, u8, u8)) -> (f32, f32, f32) {
    let raw = palette::Srgb::from_components(rgb);
    let raw_float: palette::Srgb<f32> = raw.into_format();
    let hsl: palette::Hsl = raw_float.into_color();
    let (h, s, l) = hsl.into_components();

    (h.into_positive_degrees(), s, l)
}
