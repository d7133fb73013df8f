// SPDX-License-Identifier: GPL-3.0-only

//! Synthetic `test` source
//!
//! Produces a moving gradient. Options:
//! - `size=WxH` (default 640x480)
//! - `fmt=NAME` output pixel format (default RGB24)
//! - `n=1` stream count; only a single stream is supported
//! - `frames=N` stop after N frames, 0 for endless (default)
//! - `fps=R` delivery rate, 0 delivers as fast as frames are requested

use crate::backends::source::{
    CloseSignal, FrameInfo, FramePacer, GrabOutcome, Pace, VideoSource,
};
use crate::constants::test_source;
use crate::errors::{VideoError, VideoResult};
use crate::media::{FrameConverter, PixelFormat};
use crate::uri::{ImageDim, VideoUri};
use tracing::debug;

pub const SCHEME: &str = "test";

pub struct TestPatternSource {
    width: u32,
    height: u32,
    format: PixelFormat,
    frame_limit: u64,
    sequence: u64,
    pacer: FramePacer,
    signal: CloseSignal,
    /// RGB24 render target when the output format differs
    scratch: Vec<u8>,
    converter: Option<FrameConverter>,
}

impl TestPatternSource {
    pub fn open(uri: &VideoUri) -> VideoResult<Self> {
        let size = uri.get(
            "size",
            ImageDim::new(test_source::WIDTH, test_source::HEIGHT),
        )?;
        let format = uri.get("fmt", PixelFormat::RGB24)?;
        let streams = uri.get("n", 1u32)?;
        let frame_limit = uri.get("frames", 0u64)?;
        let fps = uri.get("fps", test_source::FPS)?;

        if streams != 1 {
            return Err(VideoError::DeviceOpenFailed {
                scheme: SCHEME.to_string(),
                options: uri.options_summary(),
                reason: format!("{} streams requested, only 1 is supported", streams),
            });
        }
        let pacer = FramePacer::new(fps)?;
        format.try_frame_size(size.width, size.height)?;
        PixelFormat::RGB24.try_frame_size(size.width, size.height)?;

        let converter = if format == PixelFormat::RGB24 {
            None
        } else {
            Some(FrameConverter::new(
                PixelFormat::RGB24,
                format,
                size.width,
                size.height,
            )?)
        };
        let scratch = match converter {
            Some(_) => vec![0; PixelFormat::RGB24.frame_size(size.width, size.height)],
            None => Vec::new(),
        };

        debug!(
            width = size.width,
            height = size.height,
            format = %format,
            frame_limit,
            fps,
            "Opened test pattern"
        );

        Ok(Self {
            width: size.width,
            height: size.height,
            format,
            frame_limit,
            sequence: 0,
            pacer,
            signal: CloseSignal::new(),
            scratch,
            converter,
        })
    }
}

/// Diagonal gradient that scrolls by `phase` pixels
fn render_rgb(buffer: &mut [u8], width: u32, height: u32, phase: u64) {
    let w = width as usize;
    let h = height as usize;
    let shift = phase as usize;
    let blue = (phase.wrapping_mul(3) % 256) as u8;

    for (y, row) in buffer.chunks_exact_mut(w * 3).enumerate().take(h) {
        let green = (((y + shift) % h) * 255 / h.max(1)) as u8;
        for (x, px) in row.chunks_exact_mut(3).enumerate() {
            px[0] = (((x + shift) % w) * 255 / w.max(1)) as u8;
            px[1] = green;
            px[2] = blue;
        }
    }
}

impl VideoSource for TestPatternSource {
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
        self.format
    }

    fn grab_next(&mut self, buffer: &mut [u8], block: bool) -> VideoResult<GrabOutcome> {
        if self.signal.is_closed() {
            return Err(VideoError::SourceClosed);
        }
        if self.frame_limit > 0 && self.sequence >= self.frame_limit {
            return Ok(GrabOutcome::EndOfStream);
        }
        let expected = self.size_bytes();
        if buffer.len() != expected {
            return Err(VideoError::InvalidBuffer {
                expected,
                actual: buffer.len(),
            });
        }

        match self.pacer.wait(block, &self.signal) {
            Pace::Ready => {}
            Pace::NotYet => return Ok(GrabOutcome::NoFrameYet),
            Pace::Closed => return Err(VideoError::SourceClosed),
        }

        match self.converter.as_mut() {
            Some(converter) => {
                render_rgb(&mut self.scratch, self.width, self.height, self.sequence);
                converter.convert(&self.scratch, buffer)?;
            }
            None => render_rgb(buffer, self.width, self.height, self.sequence),
        }

        let info = FrameInfo::new(self.sequence);
        self.sequence += 1;
        Ok(GrabOutcome::FrameDelivered(info))
    }

    fn close(&mut self) {
        self.signal.close();
    }

    fn close_signal(&self) -> CloseSignal {
        self.signal.clone()
    }
}

impl Drop for TestPatternSource {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(uri: &str) -> VideoResult<TestPatternSource> {
        TestPatternSource::open(&VideoUri::parse(uri).unwrap())
    }

    #[test]
    fn test_defaults() {
        let source = open("test://").unwrap();
        assert_eq!(source.width(), 640);
        assert_eq!(source.height(), 480);
        assert_eq!(source.pixel_format(), PixelFormat::RGB24);
        assert_eq!(source.size_bytes(), 640 * 480 * 3);
    }

    #[test]
    fn test_multiple_streams_rejected() {
        let err = open("test:[n=2]//").err().unwrap();
        assert!(matches!(err, VideoError::DeviceOpenFailed { .. }));
    }

    #[test]
    fn test_frames_advance() {
        let mut source = open("test:[size=16x8,fps=0]//").unwrap();
        let mut first = vec![0u8; source.size_bytes()];
        let mut second = vec![0u8; source.size_bytes()];

        let a = source.grab_next(&mut first, true).unwrap();
        let b = source.grab_next(&mut second, true).unwrap();
        match (a, b) {
            (GrabOutcome::FrameDelivered(a), GrabOutcome::FrameDelivered(b)) => {
                assert!(b.sequence > a.sequence);
            }
            other => panic!("expected two frames, got {other:?}"),
        }
        assert_ne!(first, second, "pattern should move between frames");
    }

    #[test]
    fn test_converted_output() {
        let mut source = open("test:[size=16x8,fmt=GRAY8,fps=0]//").unwrap();
        assert_eq!(source.size_bytes(), 16 * 8);
        let mut buf = vec![0u8; 16 * 8];
        assert!(source.grab_next(&mut buf, true).unwrap().is_frame());
    }

    #[test]
    fn test_nonblocking_paced() {
        let mut source = open("test:[size=4x4,fps=1]//").unwrap();
        let mut buf = vec![0u8; source.size_bytes()];
        assert!(source.grab_next(&mut buf, false).unwrap().is_frame());
        assert_eq!(
            source.grab_next(&mut buf, false).unwrap(),
            GrabOutcome::NoFrameYet
        );
    }
}
