// SPDX-License-Identifier: GPL-3.0-only

//! `convert` decorator: re-encodes every frame of the inner source
//!
//! `convert:[fmt=RGB24]//v4l:///dev/video0`

use crate::backends::source::{CloseSignal, GrabOutcome, VideoSource};
use crate::errors::VideoResult;
use crate::media::{FrameConverter, PixelFormat};
use crate::uri::VideoUri;
use tracing::debug;

pub const SCHEME: &str = "convert";

pub struct ConvertSource {
    inner: Box<dyn VideoSource>,
    converter: FrameConverter,
    /// Frame in the inner format; unused when formats match
    scratch: Vec<u8>,
}

impl ConvertSource {
    pub fn open(uri: &VideoUri, inner: Box<dyn VideoSource>) -> VideoResult<Self> {
        let target = uri.get("fmt", PixelFormat::RGB24)?;
        let converter =
            FrameConverter::new(inner.pixel_format(), target, inner.width(), inner.height())?;
        let scratch = if converter.src_format() == target {
            Vec::new()
        } else {
            vec![0; converter.src_size()]
        };

        debug!(
            from = %inner.pixel_format(),
            to = %target,
            inner = inner.name(),
            "Converting video frames"
        );

        Ok(Self {
            inner,
            converter,
            scratch,
        })
    }
}

impl VideoSource for ConvertSource {
    fn name(&self) -> &str {
        SCHEME
    }

    fn width(&self) -> u32 {
        self.inner.width()
    }

    fn height(&self) -> u32 {
        self.inner.height()
    }

    fn pixel_format(&self) -> PixelFormat {
        self.converter.dst_format()
    }

    fn grab_next(&mut self, buffer: &mut [u8], block: bool) -> VideoResult<GrabOutcome> {
        if self.scratch.is_empty() {
            return self.inner.grab_next(buffer, block);
        }
        let outcome = self.inner.grab_next(&mut self.scratch, block)?;
        if outcome.is_frame() {
            self.converter.convert(&self.scratch, buffer)?;
        }
        Ok(outcome)
    }

    fn close(&mut self) {
        self.inner.close();
    }

    fn close_signal(&self) -> CloseSignal {
        self.inner.close_signal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::drivers::test_pattern::TestPatternSource;

    fn inner(uri: &str) -> Box<dyn VideoSource> {
        Box::new(TestPatternSource::open(&VideoUri::parse(uri).unwrap()).unwrap())
    }

    #[test]
    fn test_converts_to_gray() {
        let uri = VideoUri::parse("convert:[fmt=GRAY8]//test://").unwrap();
        let mut source = ConvertSource::open(&uri, inner("test:[size=8x2,fps=0]//")).unwrap();
        assert_eq!(source.pixel_format(), PixelFormat::GRAY8);
        assert_eq!(source.size_bytes(), 16);

        let mut buf = vec![0u8; 16];
        assert!(source.grab_next(&mut buf, true).unwrap().is_frame());
    }

    #[test]
    fn test_shares_inner_close_signal() {
        let uri = VideoUri::parse("convert://test://").unwrap();
        let inner = inner("test:[size=8x2]//");
        let signal = inner.close_signal();
        let source = ConvertSource::open(&uri, inner).unwrap();
        assert!(source.close_signal().same_as(&signal));
    }

    #[test]
    fn test_end_of_stream_passes_through() {
        let uri = VideoUri::parse("convert:[fmt=RGBA32]//test://").unwrap();
        let mut source =
            ConvertSource::open(&uri, inner("test:[size=4x4,fps=0,frames=1]//")).unwrap();
        let mut buf = vec![0u8; source.size_bytes()];
        assert!(source.grab_next(&mut buf, true).unwrap().is_frame());
        assert_eq!(source.grab_next(&mut buf, true).unwrap(), GrabOutcome::EndOfStream);
    }
}
