// SPDX-License-Identifier: GPL-3.0-only

//! Canonical pixel format description
//!
//! A [`PixelFormat`] records how one pixel is laid out in a frame buffer:
//! which channels it has, in which order, and how many bits each channel
//! takes. All channels of a format share one bit depth; 32-bit channels are
//! IEEE floats, 8 and 16-bit channels are unsigned integers in native byte
//! order.

use crate::constants::frame;
use crate::errors::{VideoError, VideoResult};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Channel order and meaning within one pixel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelLayout {
    /// Single luminance channel
    Luminance,
    /// Luminance followed by alpha
    LuminanceAlpha,
    /// Red, green, blue
    Rgb,
    /// Blue, green, red
    Bgr,
    /// Red, green, blue, alpha
    Rgba,
    /// Blue, green, red, alpha
    Bgra,
    /// Single depth channel (sensor units, usually millimetres)
    Depth,
    /// Packed 4:2:2 luma/chroma: Y0 U Y1 V shared by two horizontal pixels
    Yuyv,
}

impl ChannelLayout {
    /// Number of channels stored per pixel
    pub fn channel_count(&self) -> u8 {
        match self {
            Self::Luminance | Self::Depth => 1,
            Self::LuminanceAlpha | Self::Yuyv => 2,
            Self::Rgb | Self::Bgr => 3,
            Self::Rgba | Self::Bgra => 4,
        }
    }

    /// Whether the layout carries an alpha channel
    pub fn has_alpha(&self) -> bool {
        matches!(self, Self::LuminanceAlpha | Self::Rgba | Self::Bgra)
    }
}

/// Supported channel bit depths
pub const SUPPORTED_BIT_DEPTHS: [u8; 3] = [8, 16, 32];

/// Every valid (layout, bits) pair with its canonical name
const FORMAT_NAMES: &[(&str, ChannelLayout, u8)] = &[
    ("GRAY8", ChannelLayout::Luminance, 8),
    ("GRAY16LE", ChannelLayout::Luminance, 16),
    ("GRAY32F", ChannelLayout::Luminance, 32),
    ("Y400A", ChannelLayout::LuminanceAlpha, 8),
    ("GRAYA32", ChannelLayout::LuminanceAlpha, 16),
    ("GRAYA64F", ChannelLayout::LuminanceAlpha, 32),
    ("RGB24", ChannelLayout::Rgb, 8),
    ("RGB48", ChannelLayout::Rgb, 16),
    ("RGB96F", ChannelLayout::Rgb, 32),
    ("BGR24", ChannelLayout::Bgr, 8),
    ("BGR48", ChannelLayout::Bgr, 16),
    ("BGR96F", ChannelLayout::Bgr, 32),
    ("RGBA32", ChannelLayout::Rgba, 8),
    ("RGBA64", ChannelLayout::Rgba, 16),
    ("RGBA128F", ChannelLayout::Rgba, 32),
    ("BGRA32", ChannelLayout::Bgra, 8),
    ("BGRA64", ChannelLayout::Bgra, 16),
    ("BGRA128F", ChannelLayout::Bgra, 32),
    ("DEPTH16", ChannelLayout::Depth, 16),
    ("DEPTH32F", ChannelLayout::Depth, 32),
    ("YUYV422", ChannelLayout::Yuyv, 8),
];

/// Alternative spellings accepted when parsing
const FORMAT_ALIASES: &[(&str, &str)] = &[
    ("GRAY", "GRAY8"),
    ("GREY", "GRAY8"),
    ("Y8", "GRAY8"),
    ("GRAY16", "GRAY16LE"),
    ("Y16", "GRAY16LE"),
    ("RGB", "RGB24"),
    ("BGR", "BGR24"),
    ("RGBA", "RGBA32"),
    ("BGRA", "BGRA32"),
    ("YUYV", "YUYV422"),
    ("YUY2", "YUYV422"),
];

/// Pixel format for frames delivered by a video source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PixelFormat {
    layout: ChannelLayout,
    bits: u8,
}

impl PixelFormat {
    pub const GRAY8: PixelFormat = PixelFormat::known(ChannelLayout::Luminance, 8);
    pub const GRAY16: PixelFormat = PixelFormat::known(ChannelLayout::Luminance, 16);
    pub const GRAY32F: PixelFormat = PixelFormat::known(ChannelLayout::Luminance, 32);
    pub const RGB24: PixelFormat = PixelFormat::known(ChannelLayout::Rgb, 8);
    pub const BGR24: PixelFormat = PixelFormat::known(ChannelLayout::Bgr, 8);
    pub const RGBA32: PixelFormat = PixelFormat::known(ChannelLayout::Rgba, 8);
    pub const BGRA32: PixelFormat = PixelFormat::known(ChannelLayout::Bgra, 8);
    pub const RGB48: PixelFormat = PixelFormat::known(ChannelLayout::Rgb, 16);
    pub const RGBA64: PixelFormat = PixelFormat::known(ChannelLayout::Rgba, 16);
    pub const DEPTH16: PixelFormat = PixelFormat::known(ChannelLayout::Depth, 16);
    pub const YUYV422: PixelFormat = PixelFormat::known(ChannelLayout::Yuyv, 8);

    const fn known(layout: ChannelLayout, bits: u8) -> Self {
        Self { layout, bits }
    }

    /// Create a format from a layout and per-channel bit depth
    pub fn new(layout: ChannelLayout, bits_per_channel: u32) -> VideoResult<Self> {
        let bits = u8::try_from(bits_per_channel)
            .ok()
            .filter(|b| SUPPORTED_BIT_DEPTHS.contains(b))
            .ok_or_else(|| {
                VideoError::UnsupportedFormat(format!(
                    "{} bits per channel (supported: 8, 16, 32)",
                    bits_per_channel
                ))
            })?;

        if FORMAT_NAMES
            .iter()
            .any(|&(_, l, b)| l == layout && b == bits)
        {
            Ok(Self { layout, bits })
        } else {
            Err(VideoError::UnsupportedFormat(format!(
                "{:?} layout cannot use {} bits per channel",
                layout, bits
            )))
        }
    }

    /// Create a format from a backend-reported channel count and bit depth
    ///
    /// Channel counts map to luminance, luminance+alpha, RGB and RGBA.
    pub fn from_channels(channels: u32, bits_per_channel: u32) -> VideoResult<Self> {
        let layout = match channels {
            1 => ChannelLayout::Luminance,
            2 => ChannelLayout::LuminanceAlpha,
            3 => ChannelLayout::Rgb,
            4 => ChannelLayout::Rgba,
            other => {
                return Err(VideoError::UnsupportedFormat(format!(
                    "{} channels (supported: 1-4)",
                    other
                )));
            }
        };
        Self::new(layout, bits_per_channel)
    }

    /// Create a format from an explicit per-channel bit list
    ///
    /// Only homogeneous formats are supported; mixed depths are rejected.
    pub fn from_channel_bits(channel_bits: &[u32]) -> VideoResult<Self> {
        let first = *channel_bits.first().ok_or_else(|| {
            VideoError::UnsupportedFormat("format must have at least one channel".to_string())
        })?;
        if channel_bits.iter().any(|&b| b != first) {
            return Err(VideoError::UnsupportedFormat(format!(
                "heterogeneous channel depths {:?}",
                channel_bits
            )));
        }
        Self::from_channels(channel_bits.len() as u32, first)
    }

    /// Look up a format by name (case-insensitive, common aliases accepted)
    pub fn from_name(name: &str) -> VideoResult<Self> {
        let upper = name.trim().to_ascii_uppercase();
        let canonical = FORMAT_ALIASES
            .iter()
            .find(|(alias, _)| *alias == upper)
            .map(|(_, target)| *target)
            .unwrap_or(upper.as_str());

        FORMAT_NAMES
            .iter()
            .find(|(n, _, _)| *n == canonical)
            .map(|&(_, layout, bits)| Self { layout, bits })
            .ok_or_else(|| VideoError::UnsupportedFormat(format!("unknown format name '{}'", name)))
    }

    /// Canonical name, e.g. `RGB24`
    pub fn name(&self) -> &'static str {
        FORMAT_NAMES
            .iter()
            .find(|&&(_, l, b)| l == self.layout && b == self.bits)
            .map(|(n, _, _)| *n)
            .unwrap_or("UNKNOWN")
    }

    pub fn layout(&self) -> ChannelLayout {
        self.layout
    }

    pub fn channel_count(&self) -> u8 {
        self.layout.channel_count()
    }

    /// Bit depth shared by every channel
    pub fn bits_per_channel(&self) -> u8 {
        self.bits
    }

    /// Bit depth of each channel in storage order
    pub fn channel_bits(&self) -> Vec<u8> {
        vec![self.bits; self.channel_count() as usize]
    }

    /// Channels are 32-bit floats
    pub fn is_float(&self) -> bool {
        self.bits == 32
    }

    pub fn bits_per_pixel(&self) -> u32 {
        self.channel_count() as u32 * self.bits as u32
    }

    pub fn bytes_per_pixel(&self) -> usize {
        self.bits_per_pixel() as usize / 8
    }

    /// Bytes needed for one `width` x `height` frame
    ///
    /// Only valid for geometry already accepted by [`Self::try_frame_size`].
    pub fn frame_size(&self, width: u32, height: u32) -> usize {
        width as usize * height as usize * self.bytes_per_pixel()
    }

    /// Bytes needed for one frame, rejecting sizes past `MAX_FRAME_BYTES`
    pub fn try_frame_size(&self, width: u32, height: u32) -> VideoResult<usize> {
        (width as usize)
            .checked_mul(height as usize)
            .and_then(|pixels| pixels.checked_mul(self.bytes_per_pixel()))
            .filter(|&bytes| bytes <= frame::MAX_FRAME_BYTES)
            .ok_or_else(|| {
                VideoError::UnsupportedFormat(format!(
                    "{}x{} {} frames exceed {} bytes",
                    width,
                    height,
                    self,
                    frame::MAX_FRAME_BYTES
                ))
            })
    }

    /// Describe how a display surface should interpret this format
    ///
    /// Total over all formats: layouts a surface cannot show directly
    /// (two-channel and packed YUV) return `UnsupportedFormat`.
    pub fn surface_format(&self) -> VideoResult<SurfaceFormat> {
        let layout = match self.layout {
            ChannelLayout::Luminance | ChannelLayout::Depth => SurfaceLayout::Luminance,
            ChannelLayout::Rgb => SurfaceLayout::Rgb,
            ChannelLayout::Bgr => SurfaceLayout::Bgr,
            ChannelLayout::Rgba => SurfaceLayout::Rgba,
            ChannelLayout::Bgra => SurfaceLayout::Bgra,
            ChannelLayout::LuminanceAlpha | ChannelLayout::Yuyv => {
                return Err(VideoError::UnsupportedFormat(format!(
                    "{} cannot be displayed without conversion",
                    self.name()
                )));
            }
        };

        let component = match self.bits {
            8 => ComponentType::UnsignedByte,
            16 => ComponentType::UnsignedShort,
            32 => ComponentType::Float,
            other => {
                return Err(VideoError::UnsupportedFormat(format!(
                    "no surface component type for {} bits",
                    other
                )));
            }
        };

        Ok(SurfaceFormat { layout, component })
    }
}

impl std::fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for PixelFormat {
    type Err = VideoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s)
    }
}

impl TryFrom<String> for PixelFormat {
    type Error = VideoError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_name(&value)
    }
}

impl From<PixelFormat> for String {
    fn from(format: PixelFormat) -> Self {
        format.name().to_string()
    }
}

/// Channel arrangement understood by a display surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SurfaceLayout {
    Luminance,
    Rgb,
    Bgr,
    Rgba,
    Bgra,
}

/// Per-channel component type understood by a display surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComponentType {
    UnsignedByte,
    UnsignedShort,
    Float,
}

/// Display-surface description of a pixel format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SurfaceFormat {
    pub layout: SurfaceLayout,
    pub component: ComponentType,
}

impl std::fmt::Display for SurfaceFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}/{:?}", self.layout, self.component)
    }
}
