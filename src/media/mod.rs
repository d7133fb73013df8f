// SPDX-License-Identifier: GPL-3.0-only

//! Media format handling
//!
//! The [`formats`] module describes frame memory layouts ([`PixelFormat`])
//! and converts frames between them.

pub mod formats;

pub use formats::{
    ChannelLayout, ComponentType, FrameConverter, PixelFormat, SurfaceFormat, SurfaceLayout,
    convert_frame,
};
