// SPDX-License-Identifier: GPL-3.0-only

//! Built-in video drivers
//!
//! | Scheme    | Kind      | Feature     |
//! |-----------|-----------|-------------|
//! | `test`    | terminal  |             |
//! | `files`   | terminal  |             |
//! | `file`    | terminal  |             |
//! | `convert` | decorator |             |
//! | `v4l`     | terminal  | `v4l`       |
//! | `gst`     | terminal  | `gstreamer` |
//! | `mjpeg`   | terminal  | `gstreamer` |

pub mod convert;
pub mod file;
#[cfg(feature = "gstreamer")]
pub mod gst;
pub mod image_sequence;
pub mod pvn;
pub mod test_pattern;
#[cfg(feature = "v4l")]
pub mod v4l2;

use super::registry::DriverRegistry;
use super::source::VideoSource;
use crate::config::VideoConfig;
use crate::errors::VideoResult;
use crate::uri::VideoUri;

/// Register every driver compiled into this build
pub fn register_default_drivers(registry: &mut DriverRegistry) {
    registry.register_terminal(
        test_pattern::SCHEME,
        |uri: &VideoUri, _: &VideoConfig| -> VideoResult<Box<dyn VideoSource>> {
            Ok(Box::new(test_pattern::TestPatternSource::open(uri)?))
        },
    );
    registry.register_terminal(
        image_sequence::SCHEME,
        |uri: &VideoUri, _: &VideoConfig| -> VideoResult<Box<dyn VideoSource>> {
            Ok(Box::new(image_sequence::ImageSequenceSource::open(uri)?))
        },
    );
    registry.register_terminal(
        file::SCHEME,
        |uri: &VideoUri, config: &VideoConfig| file::open(uri, config),
    );
    registry.register_decorator(
        convert::SCHEME,
        |uri: &VideoUri,
         inner: Box<dyn VideoSource>,
         _: &VideoConfig|
         -> VideoResult<Box<dyn VideoSource>> {
            Ok(Box::new(convert::ConvertSource::open(uri, inner)?))
        },
    );

    #[cfg(feature = "v4l")]
    registry.register_terminal(
        v4l2::SCHEME,
        |uri: &VideoUri, config: &VideoConfig| -> VideoResult<Box<dyn VideoSource>> {
            Ok(Box::new(v4l2::V4lSource::open(uri, config)?))
        },
    );

    #[cfg(feature = "gstreamer")]
    {
        registry.register_terminal(
            gst::GST_SCHEME,
            |uri: &VideoUri, config: &VideoConfig| -> VideoResult<Box<dyn VideoSource>> {
                Ok(Box::new(gst::GstSource::from_launch(uri, config)?))
            },
        );
        registry.register_terminal(
            gst::MJPEG_SCHEME,
            |uri: &VideoUri, config: &VideoConfig| -> VideoResult<Box<dyn VideoSource>> {
                Ok(Box::new(gst::GstSource::from_mjpeg(uri, config)?))
            },
        );
    }
}
