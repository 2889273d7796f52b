//! Texel formats and analytic decode formulas
//!
//! This module defines the pixel formats a view may alias the backing store with,
//! the decode semantic each format implies, and the pure host-side functions that
//! compute the value a conforming device must produce for every raw byte.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;

/// Linear-segment threshold of the sRGB transfer function (in encoded space)
pub const SRGB_LINEAR_THRESHOLD: f64 = 0.04045;

/// Pixel formats understood by the harness
///
/// All formats use 8 bits per channel, so any two formats with the same channel
/// count describe texels of identical size and may alias one another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TexelFormat {
    /// Four 8-bit unsigned normalized channels
    #[serde(rename = "rgba8unorm")]
    Rgba8Unorm,
    /// Four 8-bit signed normalized channels
    #[serde(rename = "rgba8snorm")]
    Rgba8Snorm,
    /// Four 8-bit sRGB-encoded channels (alpha linear)
    #[serde(rename = "rgba8unorm-srgb")]
    Rgba8UnormSrgb,
    /// Four 8-bit unsigned integer channels (storage only)
    #[serde(rename = "rgba8uint")]
    Rgba8Uint,
    /// One 8-bit unsigned normalized channel
    #[serde(rename = "r8unorm")]
    R8Unorm,
    /// One 8-bit signed normalized channel
    #[serde(rename = "r8snorm")]
    R8Snorm,
}

impl TexelFormat {
    /// Returns the manifest name of this format
    pub const fn name(self) -> &'static str {
        match self {
            TexelFormat::Rgba8Unorm => "rgba8unorm",
            TexelFormat::Rgba8Snorm => "rgba8snorm",
            TexelFormat::Rgba8UnormSrgb => "rgba8unorm-srgb",
            TexelFormat::Rgba8Uint => "rgba8uint",
            TexelFormat::R8Unorm => "r8unorm",
            TexelFormat::R8Snorm => "r8snorm",
        }
    }

    /// Number of 8-bit channels per texel
    pub const fn channels(self) -> usize {
        match self {
            TexelFormat::Rgba8Unorm | TexelFormat::Rgba8Snorm | TexelFormat::Rgba8UnormSrgb | TexelFormat::Rgba8Uint => 4,
            TexelFormat::R8Unorm | TexelFormat::R8Snorm => 1,
        }
    }

    /// Size of one texel in bytes
    pub const fn bytes_per_texel(self) -> usize {
        self.channels()
    }

    /// Decode semantic applied when a kernel samples this format as float
    ///
    /// Integer formats have no normalized decode and return `None`.
    pub const fn semantic(self) -> Option<DecodeSemantic> {
        match self {
            TexelFormat::Rgba8Unorm | TexelFormat::R8Unorm => Some(DecodeSemantic::Unorm),
            TexelFormat::Rgba8Snorm | TexelFormat::R8Snorm => Some(DecodeSemantic::Snorm),
            TexelFormat::Rgba8UnormSrgb => Some(DecodeSemantic::Srgb),
            TexelFormat::Rgba8Uint => None,
        }
    }

    /// Returns true if texels of both formats have the same size
    pub const fn is_size_compatible(self, other: TexelFormat) -> bool {
        self.bytes_per_texel() == other.bytes_per_texel()
    }
}

impl fmt::Display for TexelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How a device converts a stored byte to a float
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DecodeSemantic {
    /// `b / 255`
    Unorm,
    /// `max(s / 127, -1)` with `s` the two's-complement value of `b`
    Snorm,
    /// `sRGBToLinear(b / 255)`
    Srgb,
}

impl DecodeSemantic {
    /// Returns the display name of this semantic
    pub const fn name(self) -> &'static str {
        match self {
            DecodeSemantic::Unorm => "UNORM",
            DecodeSemantic::Snorm => "SNORM",
            DecodeSemantic::Srgb => "SRGB",
        }
    }

    /// Default comparison tolerance for values decoded with this semantic
    ///
    /// Normalized integer decodes only suffer float rounding; the sRGB curve also
    /// carries the error of the device's transcendental approximation.
    pub const fn tolerance(self) -> f32 {
        match self {
            DecodeSemantic::Unorm | DecodeSemantic::Snorm => 1e-4,
            DecodeSemantic::Srgb => 1e-3,
        }
    }

    /// Byte ranges and the integer interpretation that applies to each
    pub fn byte_ranges(self) -> &'static [ByteRange] {
        match self {
            DecodeSemantic::Unorm | DecodeSemantic::Srgb => &UNSIGNED_RANGES,
            DecodeSemantic::Snorm => &SIGNED_RANGES,
        }
    }

    /// Decodes an already interpreted integer value
    pub fn decode(self, value: i16) -> f32 {
        match self {
            DecodeSemantic::Unorm => value as f32 / 255.0,
            DecodeSemantic::Snorm => (value as f32 / 127.0).max(-1.0),
            DecodeSemantic::Srgb => srgb_to_linear(value as f64 / 255.0) as f32,
        }
    }

    /// Expected float for a raw stored byte
    pub fn expected(self, raw: u8) -> f32 {
        DecodeRule::new(self).expected(raw)
    }
}

impl fmt::Display for DecodeSemantic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Integer reading of a raw byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ByteInterpretation {
    /// The byte value as is (`0..=255`)
    Unsigned,
    /// Two's-complement signed 8-bit value (`b - 256` for `b >= 128`)
    TwosComplement,
}

impl ByteInterpretation {
    /// Applies this interpretation to a raw byte
    pub const fn apply(self, raw: u8) -> i16 {
        match self {
            ByteInterpretation::Unsigned => raw as i16,
            ByteInterpretation::TwosComplement => {
                if raw >= 128 {
                    raw as i16 - 256
                } else {
                    raw as i16
                }
            }
        }
    }
}

/// A contiguous span of raw byte values sharing one interpretation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ByteRange {
    /// Raw byte values covered by this range
    pub bytes: RangeInclusive<u8>,
    /// Interpretation applied to bytes in this range
    pub interpretation: ByteInterpretation,
}

static UNSIGNED_RANGES: [ByteRange; 1] = [ByteRange {
    bytes: 0..=255,
    interpretation: ByteInterpretation::Unsigned,
}];

// SNORM splits the byte domain: the lower half reads as itself, the upper half wraps negative.
static SIGNED_RANGES: [ByteRange; 2] = [
    ByteRange {
        bytes: 0..=127,
        interpretation: ByteInterpretation::Unsigned,
    },
    ByteRange {
        bytes: 128..=255,
        interpretation: ByteInterpretation::TwosComplement,
    },
];

/// Complete decode rule for one view: semantic, byte ranges and tolerance
///
/// This is the expected-value function the validator evaluates. It never touches
/// the device and is fully determined by the view's format and configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeRule {
    /// Decode semantic of the view
    pub semantic: DecodeSemantic,
    /// Interpretation of each half of the byte domain
    pub ranges: &'static [ByteRange],
    /// Maximum accepted `|actual - expected|`
    pub tolerance: f32,
}

impl DecodeRule {
    /// Creates the rule for a semantic with its default tolerance
    pub fn new(semantic: DecodeSemantic) -> Self {
        Self {
            semantic,
            ranges: semantic.byte_ranges(),
            tolerance: semantic.tolerance(),
        }
    }

    /// Creates the rule for a format, if the format has a normalized decode
    pub fn for_format(format: TexelFormat) -> Option<Self> {
        format.semantic().map(Self::new)
    }

    /// Overrides the comparison tolerance
    pub fn with_tolerance(mut self, tolerance: f32) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Interprets a raw byte according to the range that contains it
    pub fn interpret(&self, raw: u8) -> i16 {
        self.ranges
            .iter()
            .find(|range| range.bytes.contains(&raw))
            .map_or(ByteInterpretation::Unsigned, |range| range.interpretation)
            .apply(raw)
    }

    /// Expected decoded value for a raw byte
    pub fn expected(&self, raw: u8) -> f32 {
        self.semantic.decode(self.interpret(raw))
    }
}

/// UNORM decode of one byte
pub fn unorm8(raw: u8) -> f32 {
    DecodeSemantic::Unorm.expected(raw)
}

/// SNORM decode of one byte, reinterpreted as two's complement
pub fn snorm8(raw: u8) -> f32 {
    DecodeSemantic::Snorm.expected(raw)
}

/// sRGB decode of one byte
pub fn srgb8(raw: u8) -> f32 {
    DecodeSemantic::Srgb.expected(raw)
}

/// sRGB electro-optical transfer function for an encoded value in `[0, 1]`
pub fn srgb_to_linear(c: f64) -> f64 {
    if c <= SRGB_LINEAR_THRESHOLD { c / 12.92 } else { ((c + 0.055) / 1.055).powf(2.4) }
}
