// SPDX-License-Identifier: GPL-3.0-only

//! Lifecycle-checked handle on an opened source chain

use super::source::{CloseSignal, FrameDescriptor, GrabOutcome, SourceState, VideoSource};
use crate::constants::timing::FRAME_LOG_INTERVAL;
use crate::errors::{VideoError, VideoResult};
use crate::media::PixelFormat;
use crate::uri::VideoUri;
use tracing::{debug, error, info, warn};

/// Cancels a [`VideoInput`] from another thread
///
/// Closing wakes a blocked `grab_next`, which then returns `SourceClosed`.
#[derive(Debug, Clone)]
pub struct CloseHandle {
    signal: CloseSignal,
}

impl CloseHandle {
    pub fn close(&self) {
        self.signal.close();
    }

    pub fn is_closed(&self) -> bool {
        self.signal.is_closed()
    }
}

/// An opened video source together with the uri it came from
///
/// Dimensions and format are captured at open time; the geometry queries and
/// [`descriptor`](Self::descriptor) keep answering from that copy after close
/// without touching the released source. Grabs must use buffers of exactly
/// [`size_bytes`](Self::size_bytes).
pub struct VideoInput {
    uri: VideoUri,
    source: Box<dyn VideoSource>,
    signal: CloseSignal,
    state: SourceState,
    width: u32,
    height: u32,
    format: PixelFormat,
    size_bytes: usize,
    frames_delivered: u64,
    last_sequence: Option<u64>,
}

impl VideoInput {
    pub fn new(uri: VideoUri, source: Box<dyn VideoSource>) -> Self {
        Self {
            signal: source.close_signal(),
            width: source.width(),
            height: source.height(),
            format: source.pixel_format(),
            size_bytes: source.size_bytes(),
            state: SourceState::Open,
            frames_delivered: 0,
            last_sequence: None,
            uri,
            source,
        }
    }

    /// The uri this input was opened from, including its options
    pub fn uri(&self) -> &VideoUri {
        &self.uri
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.format
    }

    pub fn size_bytes(&self) -> usize {
        self.size_bytes
    }

    pub fn state(&self) -> SourceState {
        self.state
    }

    pub fn frames_delivered(&self) -> u64 {
        self.frames_delivered
    }

    pub fn descriptor(&self) -> FrameDescriptor {
        FrameDescriptor::new(self.width, self.height, self.format, self.size_bytes)
    }

    /// Handle that closes this input from any thread
    pub fn close_handle(&self) -> CloseHandle {
        CloseHandle {
            signal: self.signal.clone(),
        }
    }

    /// Grab the next frame into `buffer`
    ///
    /// After `EndOfStream` has been reported once, further grabs fail with
    /// `SourceExhausted`; after close they fail with `SourceClosed`.
    pub fn grab_next(&mut self, buffer: &mut [u8], block: bool) -> VideoResult<GrabOutcome> {
        match self.state {
            SourceState::Closed => return Err(VideoError::SourceClosed),
            SourceState::Exhausted => return Err(VideoError::SourceExhausted),
            _ => {}
        }
        if self.signal.is_closed() {
            self.shutdown(SourceState::Closed);
            return Err(VideoError::SourceClosed);
        }
        if buffer.len() != self.size_bytes {
            return Err(VideoError::InvalidBuffer {
                expected: self.size_bytes,
                actual: buffer.len(),
            });
        }

        self.state = SourceState::Reading;
        match self.source.grab_next(buffer, block) {
            Ok(GrabOutcome::FrameDelivered(info)) => {
                if let Some(last) = self.last_sequence.filter(|last| info.sequence <= *last) {
                    warn!(
                        uri = %self.uri,
                        previous = last,
                        sequence = info.sequence,
                        "Source delivered frames out of order"
                    );
                }
                self.last_sequence = Some(info.sequence);
                self.frames_delivered += 1;
                if self.frames_delivered % FRAME_LOG_INTERVAL == 1 {
                    debug!(
                        uri = %self.uri,
                        sequence = info.sequence,
                        delivered = self.frames_delivered,
                        "Frame delivered"
                    );
                }
                self.state = SourceState::Idle;
                Ok(GrabOutcome::FrameDelivered(info))
            }
            Ok(GrabOutcome::NoFrameYet) => {
                self.state = SourceState::Idle;
                Ok(GrabOutcome::NoFrameYet)
            }
            Ok(GrabOutcome::EndOfStream) => {
                info!(uri = %self.uri, frames = self.frames_delivered, "Video stream ended");
                self.shutdown(SourceState::Exhausted);
                Ok(GrabOutcome::EndOfStream)
            }
            Err(VideoError::SourceClosed) => {
                self.shutdown(SourceState::Closed);
                Err(VideoError::SourceClosed)
            }
            Err(VideoError::SourceExhausted) => {
                self.shutdown(SourceState::Exhausted);
                Err(VideoError::SourceExhausted)
            }
            Err(e) if e.is_transient() => {
                warn!(uri = %self.uri, error = %e, "Transient read failure");
                self.state = SourceState::Idle;
                Err(e)
            }
            Err(e) => {
                error!(uri = %self.uri, error = %e, "Video source failed");
                self.shutdown(SourceState::Closed);
                Err(e)
            }
        }
    }

    /// Release the source; further grabs fail with `SourceClosed`
    pub fn close(&mut self) {
        if self.state == SourceState::Closed {
            return;
        }
        debug!(uri = %self.uri, "Closing video input");
        self.shutdown(SourceState::Closed);
    }

    fn shutdown(&mut self, state: SourceState) {
        self.signal.close();
        self.source.close();
        self.state = state;
    }
}

impl std::fmt::Debug for VideoInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoInput")
            .field("uri", &self.uri.to_string())
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("state", &self.state)
            .finish()
    }
}

impl Drop for VideoInput {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::drivers::test_pattern::TestPatternSource;

    fn input(uri: &str) -> VideoInput {
        let uri = VideoUri::parse(uri).unwrap();
        let source = TestPatternSource::open(&uri).unwrap();
        VideoInput::new(uri, Box::new(source))
    }

    #[test]
    fn test_wrong_buffer_size_rejected() {
        let mut input = input("test:[size=8x4,fps=0]//");
        let mut buf = vec![0u8; input.size_bytes() - 1];
        let err = input.grab_next(&mut buf, true).unwrap_err();
        assert!(matches!(err, VideoError::InvalidBuffer { expected: 96, actual: 95 }));
        assert_eq!(input.state(), SourceState::Open);
    }

    #[test]
    fn test_end_of_stream_then_exhausted() {
        let mut input = input("test:[size=8x4,fps=0,frames=2]//");
        let mut buf = vec![0u8; input.size_bytes()];
        assert!(input.grab_next(&mut buf, true).unwrap().is_frame());
        assert!(input.grab_next(&mut buf, true).unwrap().is_frame());
        assert_eq!(input.grab_next(&mut buf, true).unwrap(), GrabOutcome::EndOfStream);
        assert!(matches!(
            input.grab_next(&mut buf, true),
            Err(VideoError::SourceExhausted)
        ));
        assert_eq!(input.frames_delivered(), 2);
    }

    #[test]
    fn test_descriptor_survives_close() {
        let mut input = input("test:[size=8x4,fmt=GRAY8,fps=0]//");
        let before = input.descriptor();
        input.close();
        let after = input.descriptor();
        assert_eq!((after.width, after.height), (8, 4));
        assert_eq!(after.format, before.format);
        assert_eq!(after.size_bytes, 32);
        assert_eq!(input.state(), SourceState::Closed);
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut input = input("test:[size=8x4]//");
        let mut buf = vec![0u8; input.size_bytes()];
        input.close();
        input.close();
        assert!(matches!(
            input.grab_next(&mut buf, false),
            Err(VideoError::SourceClosed)
        ));
    }

    #[test]
    fn test_close_handle_cancels() {
        let mut input = input("test:[size=8x4]//");
        let handle = input.close_handle();
        let mut buf = vec![0u8; input.size_bytes()];
        handle.close();
        assert!(handle.is_closed());
        assert!(matches!(
            input.grab_next(&mut buf, true),
            Err(VideoError::SourceClosed)
        ));
        assert_eq!(input.state(), SourceState::Closed);
    }
}
