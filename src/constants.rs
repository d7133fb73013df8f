// SPDX-License-Identifier: GPL-3.0-only

//! Crate-wide constants

use std::time::Duration;

/// Composer limits
pub mod composer {
    /// Deepest decorator chain accepted by default (terminal counts as one level)
    pub const MAX_NESTING_DEPTH: usize = 8;
}

/// Frame buffer limits
pub mod frame {
    /// Largest single frame any source may report (1 GiB)
    pub const MAX_FRAME_BYTES: usize = 1 << 30;
}

/// Capture timing shared by blocking backends
pub mod timing {
    use super::Duration;

    /// Interval at which blocking waits re-check the close signal
    pub const POLL_INTERVAL: Duration = Duration::from_millis(50);

    /// Default number of internal retries before a transient failure escalates
    pub const TRANSIENT_RETRIES: u32 = 3;

    /// Log every Nth delivered frame at debug level
    pub const FRAME_LOG_INTERVAL: u64 = 60;
}

/// Synthetic test source defaults
pub mod test_source {
    /// Default frame width
    pub const WIDTH: u32 = 640;
    /// Default frame height
    pub const HEIGHT: u32 = 480;
    /// Default frame rate (0 disables pacing)
    pub const FPS: f64 = 30.0;
}

/// File and image-sequence sources
pub mod file_formats {
    /// Supported still image extensions (lowercase)
    pub const IMAGE_EXTENSIONS: &[&str] = &[
        "png", "jpg", "jpeg", "gif", "bmp", "webp", "tiff", "tif", "pnm", "pgm", "ppm", "tga",
    ];

    /// Container extensions handed to the GStreamer decoder
    pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "mkv", "avi", "mov", "ogv", "m4v"];

    /// Raw headered video extension
    pub const PVN_EXTENSION: &str = "pvn";

    /// Longest accepted PVN text header
    pub const PVN_MAX_HEADER_BYTES: usize = 256;

    /// Check if extension is a supported image format
    pub fn is_image_extension(ext: &str) -> bool {
        IMAGE_EXTENSIONS.contains(&ext)
    }

    /// Check if extension is a supported video container
    pub fn is_video_extension(ext: &str) -> bool {
        VIDEO_EXTENSIONS.contains(&ext)
    }
}

/// V4L2 capture defaults
pub mod v4l {
    /// Default device node
    pub const DEFAULT_DEVICE: &str = "/dev/video0";
    /// Default memory-mapped buffer count
    pub const BUFFER_COUNT: u32 = 4;
    /// Default fourcc requested from the device
    pub const DEFAULT_FOURCC: &str = "YUYV";
}

/// Configuration file lookup
pub mod config {
    /// Environment variable naming a JSON configuration file
    pub const CONFIG_ENV_VAR: &str = "VIDEO_INPUT_CONFIG";
}
