// SPDX-License-Identifier: GPL-3.0-only

//! Uri-driven video input
//!
//! Opens cameras, recorded files, image sequences and synthetic generators
//! through one textual uri, and reads frames from them through one interface.
//!
//! # Architecture
//!
//! - [`uri`]: the `scheme:[key=value,...]//path` grammar and typed options
//! - [`backends`]: driver registry, composer, source contract and drivers
//! - [`media`]: pixel formats and frame conversion
//! - [`config`]: process-level tunables
//! - [`errors`]: the shared error type
//!
//! # Example
//!
//! ```no_run
//! use video_input::{GrabOutcome, open_video};
//!
//! let mut input = open_video("convert:[fmt=GRAY8]//test:[size=320x240]//")?;
//! let mut frame = vec![0u8; input.size_bytes()];
//! if let GrabOutcome::FrameDelivered(info) = input.grab_next(&mut frame, true)? {
//!     println!("frame {}", info.sequence);
//! }
//! # Ok::<(), video_input::VideoError>(())
//! ```

pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod media;
pub mod uri;

// Re-export commonly used types
pub use backends::{
    CloseHandle, Composer, DriverFactory, DriverRegistry, FrameDescriptor, FrameInfo,
    GrabOutcome, SourceState, VideoInput, VideoSource, open_video,
};
pub use config::VideoConfig;
pub use errors::{VideoError, VideoResult};
pub use media::{PixelFormat, SurfaceFormat};
pub use uri::{ImageDim, OptionValue, VideoUri};
