// SPDX-License-Identifier: GPL-3.0-only

//! GStreamer-backed sources
//!
//! - `gst://<launch description>` runs an arbitrary pipeline
//! - `mjpeg://http://host/?action=stream` reads a multipart MJPEG stream
//! - video container files, opened through the `file` driver
//!
//! Every pipeline ends in `videoconvert ! video/x-raw,format=... ! appsink`.
//! `fmt` selects the delivered format (RGB24 by default).

use crate::backends::source::{CloseSignal, FrameInfo, GrabOutcome, VideoSource};
use crate::config::VideoConfig;
use crate::errors::{VideoError, VideoResult};
use crate::media::PixelFormat;
use crate::uri::VideoUri;
use gstreamer::prelude::*;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub const GST_SCHEME: &str = "gst";
pub const MJPEG_SCHEME: &str = "mjpeg";

const SINK_NAME: &str = "videosink";
const PREROLL_TIMEOUT: Duration = Duration::from_secs(5);

fn caps_format(format: PixelFormat) -> VideoResult<&'static str> {
    match format {
        PixelFormat::RGB24 => Ok("RGB"),
        PixelFormat::BGR24 => Ok("BGR"),
        PixelFormat::RGBA32 => Ok("RGBA"),
        PixelFormat::BGRA32 => Ok("BGRA"),
        PixelFormat::GRAY8 => Ok("GRAY8"),
        PixelFormat::GRAY16 => Ok("GRAY16_LE"),
        PixelFormat::YUYV422 => Ok("YUY2"),
        other => Err(VideoError::UnsupportedFormat(format!(
            "{} is not available from GStreamer",
            other
        ))),
    }
}

pub struct GstSource {
    scheme: &'static str,
    pipeline: gstreamer::Pipeline,
    appsink: gstreamer_app::AppSink,
    width: u32,
    height: u32,
    stride: usize,
    format: PixelFormat,
    looping: bool,
    /// First sample, pulled during open to learn the frame size
    preroll: Option<gstreamer::Sample>,
    poll_interval: Duration,
    sequence: u64,
    closed: bool,
    signal: CloseSignal,
}

impl GstSource {
    /// `gst://` with a user launch description
    pub fn from_launch(uri: &VideoUri, config: &VideoConfig) -> VideoResult<Self> {
        if uri.path().is_empty() {
            return Err(VideoError::malformed(
                &uri.to_string(),
                "",
                "gst needs a pipeline description",
            ));
        }
        Self::launch(GST_SCHEME, uri, uri.path(), false, config)
    }

    /// `mjpeg://<url>`
    pub fn from_mjpeg(uri: &VideoUri, config: &VideoConfig) -> VideoResult<Self> {
        let head = format!(
            "souphttpsrc location=\"{}\" is-live=true do-timestamp=true ! multipartdemux ! jpegdec",
            uri.path()
        );
        Self::launch(MJPEG_SCHEME, uri, &head, true, config)
    }

    /// A container file handed over by the `file` driver
    pub fn from_file(uri: &VideoUri, path: &Path, config: &VideoConfig) -> VideoResult<Self> {
        let head = format!(
            "filesrc location=\"{}\" ! decodebin ! queue",
            path.to_string_lossy()
        );
        let sync = uri.get("realtime", false)?;
        let mut source = Self::launch("file", uri, &head, sync, config)?;
        source.looping = uri.get("loop", false)?;
        Ok(source)
    }

    /// Bus poll period used by non-blocking and cancellable grabs
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    fn launch(
        scheme: &'static str,
        uri: &VideoUri,
        head: &str,
        sync: bool,
        config: &VideoConfig,
    ) -> VideoResult<Self> {
        let format = uri.get("fmt", PixelFormat::RGB24)?;
        let caps = caps_format(format)?;
        let open_failed = |reason: String| VideoError::DeviceOpenFailed {
            scheme: scheme.to_string(),
            options: uri.options_summary(),
            reason,
        };

        gstreamer::init().map_err(|e| open_failed(format!("GStreamer init failed: {}", e)))?;

        let description = format!(
            "{head} ! videoconvert ! video/x-raw,format={caps} ! \
             appsink name={SINK_NAME} sync={sync} max-buffers=4 drop={sync}"
        );
        debug!(pipeline = %description, "Launching GStreamer pipeline");

        let pipeline = gstreamer::parse::launch(&description)
            .map_err(|e| open_failed(format!("failed to create pipeline: {}", e)))?
            .downcast::<gstreamer::Pipeline>()
            .map_err(|_| open_failed("description is not a pipeline".into()))?;
        let appsink = pipeline
            .by_name(SINK_NAME)
            .ok_or_else(|| open_failed("failed to find appsink".into()))?
            .downcast::<gstreamer_app::AppSink>()
            .map_err(|_| open_failed("sink is not an appsink".into()))?;

        pipeline
            .set_state(gstreamer::State::Playing)
            .map_err(|e| open_failed(format!("failed to start pipeline: {:?}", e)))?;

        let preroll = Self::wait_for_first_sample(&pipeline, &appsink);
        let sample = match preroll {
            Ok(sample) => sample,
            Err(reason) => {
                let _ = pipeline.set_state(gstreamer::State::Null);
                return Err(open_failed(reason));
            }
        };
        let info = sample
            .caps()
            .and_then(|caps| gstreamer_video::VideoInfo::from_caps(caps).ok())
            .ok_or_else(|| {
                let _ = pipeline.set_state(gstreamer::State::Null);
                open_failed("first sample carries no video caps".into())
            })?;

        let width = info.width();
        let height = info.height();
        let stride = info.stride()[0].max(0) as usize;
        info!(scheme, width, height, format = %format, "GStreamer source ready");

        Ok(Self {
            scheme,
            pipeline,
            appsink,
            width,
            height,
            stride,
            format,
            looping: false,
            preroll: Some(sample),
            poll_interval: config.poll_interval(),
            sequence: 0,
            closed: false,
            signal: CloseSignal::new(),
        })
    }

    fn wait_for_first_sample(
        pipeline: &gstreamer::Pipeline,
        appsink: &gstreamer_app::AppSink,
    ) -> Result<gstreamer::Sample, String> {
        let deadline = Instant::now() + PREROLL_TIMEOUT;
        while Instant::now() < deadline {
            if let Some(sample) = appsink.try_pull_sample(gstreamer::ClockTime::from_mseconds(100)) {
                return Ok(sample);
            }
            if let Some(message) = Self::pop_error(pipeline) {
                return Err(message);
            }
            if appsink.is_eos() {
                return Err("stream ended before the first frame".into());
            }
        }
        Err("timed out waiting for the first frame".into())
    }

    fn pop_error(pipeline: &gstreamer::Pipeline) -> Option<String> {
        let bus = pipeline.bus()?;
        let message = bus.pop_filtered(&[gstreamer::MessageType::Error])?;
        match message.view() {
            gstreamer::MessageView::Error(err) => Some(format!("pipeline error: {}", err.error())),
            _ => None,
        }
    }

    fn copy_sample(&self, sample: &gstreamer::Sample, buffer: &mut [u8]) -> VideoResult<()> {
        let data = sample
            .buffer()
            .ok_or_else(|| VideoError::TransientReadFailure("sample has no buffer".into()))?;
        let map = data
            .map_readable()
            .map_err(|_| VideoError::TransientReadFailure("failed to map buffer".into()))?;
        let src = map.as_slice();

        let row_bytes = self.format.frame_size(self.width, 1);
        let stride = self.stride.max(row_bytes);
        let rows = self.height as usize;
        if src.len() < stride * rows.saturating_sub(1) + row_bytes {
            return Err(VideoError::TransientReadFailure(format!(
                "sample holds {} bytes, frame needs {}",
                src.len(),
                buffer.len()
            )));
        }
        for (row, dst) in buffer.chunks_exact_mut(row_bytes).enumerate().take(rows) {
            let start = row * stride;
            dst.copy_from_slice(&src[start..start + row_bytes]);
        }
        Ok(())
    }

    fn restart(&mut self) -> VideoResult<()> {
        debug!("Restarting video for loop");
        self.pipeline
            .seek_simple(
                gstreamer::SeekFlags::FLUSH | gstreamer::SeekFlags::KEY_UNIT,
                gstreamer::ClockTime::ZERO,
            )
            .map_err(|e| VideoError::ReadFailed(format!("seek failed: {}", e)))
    }

    fn deliver(&mut self, sample: &gstreamer::Sample, buffer: &mut [u8]) -> VideoResult<GrabOutcome> {
        self.copy_sample(sample, buffer)?;
        let info = FrameInfo::new(self.sequence);
        self.sequence += 1;
        Ok(GrabOutcome::FrameDelivered(info))
    }
}

impl VideoSource for GstSource {
    fn name(&self) -> &str {
        self.scheme
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn pixel_format(&self) -> PixelFormat {
        self.format
    }

    fn grab_next(&mut self, buffer: &mut [u8], block: bool) -> VideoResult<GrabOutcome> {
        if self.closed || self.signal.is_closed() {
            return Err(VideoError::SourceClosed);
        }
        let expected = self.size_bytes();
        if buffer.len() != expected {
            return Err(VideoError::InvalidBuffer {
                expected,
                actual: buffer.len(),
            });
        }
        if let Some(sample) = self.preroll.take() {
            return self.deliver(&sample, buffer);
        }

        let timeout = if block {
            gstreamer::ClockTime::from_mseconds(self.poll_interval.as_millis() as u64)
        } else {
            gstreamer::ClockTime::ZERO
        };
        loop {
            if let Some(sample) = self.appsink.try_pull_sample(timeout) {
                return self.deliver(&sample, buffer);
            }
            if let Some(message) = Self::pop_error(&self.pipeline) {
                warn!(scheme = self.scheme, error = %message, "GStreamer pipeline failed");
                return Err(VideoError::ReadFailed(message));
            }
            if self.appsink.is_eos() {
                if !self.looping {
                    return Ok(GrabOutcome::EndOfStream);
                }
                self.restart()?;
                continue;
            }
            if !block {
                return Ok(GrabOutcome::NoFrameYet);
            }
            if self.signal.is_closed() {
                return Err(VideoError::SourceClosed);
            }
        }
    }

    fn close(&mut self) {
        self.signal.close();
        if !self.closed {
            self.closed = true;
            self.preroll = None;
            let _ = self.pipeline.set_state(gstreamer::State::Null);
            info!(scheme = self.scheme, "GStreamer pipeline stopped");
        }
    }

    fn close_signal(&self) -> CloseSignal {
        self.signal.clone()
    }
}

impl Drop for GstSource {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caps_names() {
        assert_eq!(caps_format(PixelFormat::RGB24).unwrap(), "RGB");
        assert_eq!(caps_format(PixelFormat::GRAY16).unwrap(), "GRAY16_LE");
        assert!(caps_format(PixelFormat::RGB48).is_err());
    }

    /// Encode a few test frames into a Matroska file
    fn record_clip(path: &Path) {
        gstreamer::init().unwrap();
        let description = format!(
            "videotestsrc num-buffers=3 ! video/x-raw,width=16,height=8 ! \
             matroskamux ! filesink location=\"{}\"",
            path.display()
        );
        let pipeline = gstreamer::parse::launch(&description).unwrap();
        pipeline.set_state(gstreamer::State::Playing).unwrap();
        let bus = pipeline.bus().unwrap();
        let done = bus.timed_pop_filtered(
            gstreamer::ClockTime::from_seconds(10),
            &[gstreamer::MessageType::Eos, gstreamer::MessageType::Error],
        );
        pipeline.set_state(gstreamer::State::Null).unwrap();
        assert!(
            matches!(done.as_ref().map(|m| m.type_()), Some(gstreamer::MessageType::Eos)),
            "recording did not finish"
        );
    }

    #[test]
    fn test_container_file_uses_composer_config() {
        let path = std::env::temp_dir().join(format!("video-input-{}.mkv", std::process::id()));
        record_clip(&path);

        let uri = VideoUri::parse(&format!("file://{}", path.display())).unwrap();
        let config = VideoConfig {
            poll_interval_ms: 7,
            ..VideoConfig::default()
        };
        let source = GstSource::from_file(&uri, &path, &config).unwrap();
        assert_eq!(source.poll_interval(), Duration::from_millis(7));
        assert_eq!((source.width(), source.height()), (16, 8));

        let mut opened = crate::backends::drivers::file::open(&uri, &config).unwrap();
        assert_eq!(opened.pixel_format(), PixelFormat::RGB24);
        opened.close();
        let _ = std::fs::remove_file(&path);
    }
}
