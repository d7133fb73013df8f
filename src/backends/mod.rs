// SPDX-License-Identifier: GPL-3.0-only

//! Video source resolution and capture
//!
//! A uri names a chain of drivers. Terminal drivers acquire a device, file
//! or generator; decorators wrap the source named by their path:
//!
//! ```text
//!   convert:[fmt=RGB24]//v4l:///dev/video0
//!   └─ decorator ──────┘ └─ terminal ─────┘
//!
//! ┌──────────────────────────────────────────────┐
//! │                  VideoInput                  │  lifecycle checks
//! ├──────────────────────────────────────────────┤
//! │  ConvertSource  (decorator, owns inner)      │
//! │  └── V4lSource  (terminal)                   │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`registry`]: scheme to driver factory table
//! - [`composer`]: builds a source chain from a uri
//! - [`input`]: the consumer-facing handle
//! - [`source`]: the contract every driver implements
//! - [`drivers`]: built-in drivers

pub mod composer;
pub mod drivers;
pub mod input;
pub mod registry;
pub mod source;

pub use composer::{Composer, open_video};
pub use input::{CloseHandle, VideoInput};
pub use registry::{DecoratorDriver, DriverFactory, DriverRegistry, TerminalDriver};
pub use source::{
    CloseSignal, FrameDescriptor, FrameInfo, FramePacer, GrabOutcome, Pace, SourceState,
    VideoSource,
};
