// SPDX-License-Identifier: GPL-3.0-only

//! Pixel format model and conversions
//!
//! - [`pixel_format`]: canonical layout description and display-surface mapping
//! - [`conversions`]: CPU conversion between any two supported formats

pub mod conversions;
pub mod pixel_format;

pub use conversions::{FrameConverter, convert_frame};
pub use pixel_format::{ChannelLayout, ComponentType, PixelFormat, SurfaceFormat, SurfaceLayout};
