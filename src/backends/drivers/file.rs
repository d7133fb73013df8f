// SPDX-License-Identifier: GPL-3.0-only

//! `file` source: opens a recorded video by extension
//!
//! - `.pvn` raw recordings, see [`pvn`](super::pvn)
//! - still images, played as a one-frame sequence (`loop=1` repeats it)
//! - video containers, decoded through GStreamer when built with the
//!   `gstreamer` feature
//!
//! `file:[realtime=1]///home/user/video/movie.pvn`

use super::image_sequence::ImageSequenceSource;
use super::pvn::PvnSource;
use crate::backends::source::VideoSource;
use crate::config::VideoConfig;
use crate::constants::file_formats;
use crate::errors::{VideoError, VideoResult};
use crate::uri::VideoUri;
use std::path::Path;
use tracing::debug;

pub const SCHEME: &str = "file";

fn open_failed(uri: &VideoUri, reason: String) -> VideoError {
    VideoError::DeviceOpenFailed {
        scheme: uri.scheme().to_string(),
        options: uri.options_summary(),
        reason,
    }
}

/// Open the file named by the uri path with the matching reader
pub fn open(uri: &VideoUri, config: &VideoConfig) -> VideoResult<Box<dyn VideoSource>> {
    let path = Path::new(uri.path());
    if !path.is_file() {
        return Err(open_failed(uri, format!("{} is not a file", path.display())));
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();
    debug!(path = %path.display(), extension = %extension, "Opening video file");

    if extension == file_formats::PVN_EXTENSION {
        Ok(Box::new(PvnSource::open(uri, path)?))
    } else if file_formats::is_image_extension(&extension) {
        Ok(Box::new(ImageSequenceSource::from_paths(
            uri,
            vec![path.to_path_buf()],
        )?))
    } else if file_formats::is_video_extension(&extension) {
        open_container(uri, path, config)
    } else {
        Err(open_failed(
            uri,
            format!("unsupported file type '{}'", extension),
        ))
    }
}

#[cfg(feature = "gstreamer")]
fn open_container(
    uri: &VideoUri,
    path: &Path,
    config: &VideoConfig,
) -> VideoResult<Box<dyn VideoSource>> {
    Ok(Box::new(super::gst::GstSource::from_file(uri, path, config)?))
}

#[cfg(not(feature = "gstreamer"))]
fn open_container(
    uri: &VideoUri,
    path: &Path,
    _config: &VideoConfig,
) -> VideoResult<Box<dyn VideoSource>> {
    Err(open_failed(
        uri,
        format!(
            "{} needs a container decoder; rebuild with the 'gstreamer' feature",
            path.display()
        ),
    ))
}
