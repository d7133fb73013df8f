// SPDX-License-Identifier: GPL-3.0-only

//! `v4l` source: direct V4L2 capture through memory-mapped buffers
//!
//! `v4l:[size=640x480,fmt=YUYV,buffers=4,retries=3]///dev/video0`
//!
//! `fmt` is the four character code requested from the driver. Raw codes
//! are delivered as-is; `MJPG` frames are decoded to RGB24.

use crate::backends::source::{CloseSignal, FrameInfo, GrabOutcome, VideoSource};
use crate::config::VideoConfig;
use crate::constants::v4l as defaults;
use crate::errors::{VideoError, VideoResult};
use crate::media::PixelFormat;
use crate::uri::{ImageDim, VideoUri};
use std::time::Duration;
use tracing::{debug, info, warn};
use v4l::buffer::Type;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::FourCC;

pub const SCHEME: &str = "v4l";

/// How frames leave the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WireFormat {
    Raw(PixelFormat),
    Jpeg,
}

fn wire_format(fourcc: FourCC) -> VideoResult<WireFormat> {
    match &fourcc.repr {
        b"YUYV" => Ok(WireFormat::Raw(PixelFormat::YUYV422)),
        b"GREY" => Ok(WireFormat::Raw(PixelFormat::GRAY8)),
        b"Y16 " => Ok(WireFormat::Raw(PixelFormat::GRAY16)),
        b"Z16 " => Ok(WireFormat::Raw(PixelFormat::DEPTH16)),
        b"RGB3" => Ok(WireFormat::Raw(PixelFormat::RGB24)),
        b"BGR3" => Ok(WireFormat::Raw(PixelFormat::BGR24)),
        b"AB24" => Ok(WireFormat::Raw(PixelFormat::RGBA32)),
        b"MJPG" | b"JPEG" => Ok(WireFormat::Jpeg),
        _ => Err(VideoError::UnsupportedFormat(format!(
            "V4L2 fourcc {}",
            fourcc
        ))),
    }
}

pub struct V4lSource {
    // Declared before the device so buffers are unmapped first
    stream: Option<MmapStream<'static>>,
    _device: Device,
    path: String,
    width: u32,
    height: u32,
    wire: WireFormat,
    retries: u32,
    poll_interval: Duration,
    failures: u32,
    sequence: u64,
    signal: CloseSignal,
}

impl V4lSource {
    pub fn open(uri: &VideoUri, config: &VideoConfig) -> VideoResult<Self> {
        let path = if uri.path().is_empty() {
            defaults::DEFAULT_DEVICE.to_string()
        } else {
            uri.path().to_string()
        };
        let size = uri.get_opt::<ImageDim>("size")?;
        let fourcc_name = uri.get("fmt", defaults::DEFAULT_FOURCC.to_string())?;
        let buffers = uri.get("buffers", defaults::BUFFER_COUNT)?;
        let retries = uri.get("retries", config.transient_retries)?;

        let fourcc_bytes: [u8; 4] = fourcc_name
            .as_bytes()
            .try_into()
            .map_err(|_| VideoError::InvalidOptionValue {
                key: "fmt".to_string(),
                value: fourcc_name.clone(),
                expected: "a four character code".to_string(),
            })?;
        let open_failed = |reason: String| VideoError::DeviceOpenFailed {
            scheme: SCHEME.to_string(),
            options: uri.options_summary(),
            reason,
        };

        info!(path = %path, fourcc = %fourcc_name, "Opening V4L2 device");
        let mut device = Device::with_path(&path)
            .map_err(|e| open_failed(format!("{}: {}", path, e)))?;

        let mut format = device
            .format()
            .map_err(|e| open_failed(format!("failed to query format: {}", e)))?;
        if let Some(size) = size {
            format.width = size.width;
            format.height = size.height;
        }
        format.fourcc = FourCC::new(&fourcc_bytes);
        let format = device
            .set_format(&format)
            .map_err(|e| open_failed(format!("failed to set format: {}", e)))?;

        if format.fourcc.repr != fourcc_bytes {
            warn!(
                requested = %fourcc_name,
                got = %format.fourcc,
                "Device chose a different format"
            );
        }
        let wire = wire_format(format.fourcc)?;

        let stream = MmapStream::with_buffers(&mut device, Type::VideoCapture, buffers)
            .map_err(|e| open_failed(format!("failed to map buffers: {}", e)))?;

        info!(
            width = format.width,
            height = format.height,
            fourcc = %format.fourcc,
            buffers,
            "V4L2 capture stream started"
        );

        Ok(Self {
            stream: Some(stream),
            _device: device,
            path,
            width: format.width,
            height: format.height,
            wire,
            retries,
            poll_interval: config.poll_interval(),
            failures: 0,
            sequence: 0,
            signal: CloseSignal::new(),
        })
    }

    fn deliver(&self, data: &[u8], buffer: &mut [u8]) -> VideoResult<()> {
        match self.wire {
            WireFormat::Raw(_) => {
                if data.len() < buffer.len() {
                    return Err(VideoError::TransientReadFailure(format!(
                        "short frame: {} of {} bytes",
                        data.len(),
                        buffer.len()
                    )));
                }
                buffer.copy_from_slice(&data[..buffer.len()]);
            }
            WireFormat::Jpeg => {
                let image = image::load_from_memory_with_format(data, image::ImageFormat::Jpeg)
                    .map_err(|e| VideoError::TransientReadFailure(e.to_string()))?
                    .to_rgb8();
                if image.width() != self.width || image.height() != self.height {
                    return Err(VideoError::TransientReadFailure(format!(
                        "jpeg frame is {}x{}, stream is {}x{}",
                        image.width(),
                        image.height(),
                        self.width,
                        self.height
                    )));
                }
                buffer.copy_from_slice(image.as_raw());
            }
        }
        Ok(())
    }
}

impl VideoSource for V4lSource {
    fn name(&self) -> &str {
        SCHEME
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn pixel_format(&self) -> PixelFormat {
        match self.wire {
            WireFormat::Raw(format) => format,
            WireFormat::Jpeg => PixelFormat::RGB24,
        }
    }

    fn grab_next(&mut self, buffer: &mut [u8], block: bool) -> VideoResult<GrabOutcome> {
        loop {
            if self.signal.is_closed() {
                return Err(VideoError::SourceClosed);
            }
            let Some(stream) = self.stream.as_mut() else {
                return Err(VideoError::SourceClosed);
            };
            stream.set_timeout(if block {
                self.poll_interval
            } else {
                Duration::ZERO
            });

            let error = match stream.next() {
                Ok((data, meta)) => {
                    let used = (meta.bytesused as usize).min(data.len());
                    let data = data[..used].to_vec();
                    let device_sequence = meta.sequence;
                    match self.deliver(&data, buffer) {
                        Ok(()) => {
                            self.failures = 0;
                            let info = FrameInfo::new(self.sequence);
                            self.sequence += 1;
                            if info.sequence % crate::constants::timing::FRAME_LOG_INTERVAL == 0 {
                                debug!(
                                    path = %self.path,
                                    sequence = info.sequence,
                                    device_sequence,
                                    bytes = used,
                                    "V4L2 frame captured"
                                );
                            }
                            return Ok(GrabOutcome::FrameDelivered(info));
                        }
                        Err(e) => e,
                    }
                }
                Err(e)
                    if matches!(
                        e.kind(),
                        std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
                    ) =>
                {
                    if !block {
                        return Ok(GrabOutcome::NoFrameYet);
                    }
                    continue;
                }
                Err(e) => VideoError::TransientReadFailure(e.to_string()),
            };

            self.failures += 1;
            warn!(
                path = %self.path,
                failures = self.failures,
                error = %error,
                "Failed to capture V4L2 frame"
            );
            if self.failures > self.retries {
                return Err(VideoError::ReadFailed(format!(
                    "{} failed {} times in a row: {}",
                    self.path, self.failures, error
                )));
            }
            if !block {
                return Err(error);
            }
            if self.signal.wait_timeout(self.poll_interval) {
                return Err(VideoError::SourceClosed);
            }
        }
    }

    fn close(&mut self) {
        self.signal.close();
        if self.stream.take().is_some() {
            info!(path = %self.path, "V4L2 capture stream stopped");
        }
    }

    fn close_signal(&self) -> CloseSignal {
        self.signal.clone()
    }
}

impl Drop for V4lSource {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fourcc_mapping() {
        assert_eq!(
            wire_format(FourCC::new(b"YUYV")).unwrap(),
            WireFormat::Raw(PixelFormat::YUYV422)
        );
        assert_eq!(wire_format(FourCC::new(b"MJPG")).unwrap(), WireFormat::Jpeg);
        assert!(matches!(
            wire_format(FourCC::new(b"NV12")),
            Err(VideoError::UnsupportedFormat(_))
        ));
    }
}
