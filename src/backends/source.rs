// SPDX-License-Identifier: GPL-3.0-only

//! Video source contract
//!
//! Every driver produces a [`VideoSource`]. Consumers normally hold it
//! through [`VideoInput`](super::VideoInput), which enforces the lifecycle:
//!
//! ```text
//! Closed ──open──▶ Open ──grab──▶ Reading ⇄ Idle ──close / end of stream──▶ Closed
//! ```

use crate::media::{PixelFormat, SurfaceFormat};
use serde::Serialize;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::errors::{VideoError, VideoResult};

/// Metadata of one delivered frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameInfo {
    /// Capture order within the source, strictly increasing
    pub sequence: u64,
    /// When the frame was produced or dequeued
    pub captured_at: Instant,
}

impl FrameInfo {
    pub fn new(sequence: u64) -> Self {
        Self {
            sequence,
            captured_at: Instant::now(),
        }
    }
}

/// Result of a successful `grab_next` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrabOutcome {
    /// A frame was written to the caller's buffer
    FrameDelivered(FrameInfo),
    /// Non-blocking grab found no frame ready
    NoFrameYet,
    /// The source has no more frames
    EndOfStream,
}

impl GrabOutcome {
    pub fn is_frame(&self) -> bool {
        matches!(self, GrabOutcome::FrameDelivered(_))
    }
}

/// Lifecycle state of a video input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SourceState {
    /// Device acquired, no frame requested yet
    Open,
    /// A grab is in progress
    Reading,
    /// Between grabs
    Idle,
    /// Closed after delivering its last frame
    Exhausted,
    /// Closed by the owner, by cancellation or after a hard failure
    Closed,
}

impl SourceState {
    pub fn is_closed(&self) -> bool {
        matches!(self, SourceState::Exhausted | SourceState::Closed)
    }
}

/// Uniform runtime interface of a resolved video source
///
/// A source has a single reader: `grab_next` takes `&mut self`. Cancellation
/// from other threads goes through the [`CloseSignal`] returned by
/// `close_signal`, which blocking grabs must observe.
pub trait VideoSource: Send {
    /// Driver scheme, for diagnostics
    fn name(&self) -> &str;

    fn width(&self) -> u32;

    fn height(&self) -> u32;

    fn pixel_format(&self) -> PixelFormat;

    /// Bytes a caller buffer must hold for one frame
    fn size_bytes(&self) -> usize {
        self.pixel_format().frame_size(self.width(), self.height())
    }

    /// Write the next frame into `buffer`
    ///
    /// With `block` set, waits until a frame is available, the stream ends or
    /// the source is closed. Without it, returns `NoFrameYet` immediately when
    /// nothing is ready.
    fn grab_next(&mut self, buffer: &mut [u8], block: bool) -> VideoResult<GrabOutcome>;

    /// Release backend resources; idempotent
    fn close(&mut self);

    /// Signal shared with any thread that needs to cancel this source
    fn close_signal(&self) -> CloseSignal;
}

/// Serializable summary of an opened source
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameDescriptor {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub size_bytes: usize,
    /// Display mapping, absent when the format needs conversion first
    pub surface: Option<SurfaceFormat>,
}

impl FrameDescriptor {
    pub fn new(width: u32, height: u32, format: PixelFormat, size_bytes: usize) -> Self {
        Self {
            width,
            height,
            format,
            size_bytes,
            surface: format.surface_format().ok(),
        }
    }
}

#[derive(Debug, Default)]
struct SignalState {
    closed: Mutex<bool>,
    wake: Condvar,
}

/// Shared close flag with wake-up for blocked readers
///
/// Cloning shares the flag. Once closed it stays closed.
#[derive(Debug, Clone, Default)]
pub struct CloseSignal {
    state: Arc<SignalState>,
}

impl CloseSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark closed and wake every waiter
    pub fn close(&self) {
        let mut closed = self
            .state
            .closed
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        *closed = true;
        self.state.wake.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        *self
            .state
            .closed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    /// Sleep up to `timeout`; returns true if the signal closed meanwhile
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        self.wait_until(Instant::now() + timeout)
    }

    /// Sleep until `deadline`; returns true if the signal closed meanwhile
    pub fn wait_until(&self, deadline: Instant) -> bool {
        let mut closed = self
            .state
            .closed
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        while !*closed {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            closed = self
                .state
                .wake
                .wait_timeout(closed, deadline - now)
                .unwrap_or_else(|e| e.into_inner())
                .0;
        }
        true
    }

    /// Whether two handles share the same flag
    pub fn same_as(&self, other: &CloseSignal) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }
}

/// Outcome of waiting for the next frame slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pace {
    Ready,
    NotYet,
    Closed,
}

/// Fixed-rate frame scheduler for sources without a hardware clock
///
/// The first frame is due immediately. A rate of zero disables pacing.
#[derive(Debug, Clone)]
pub struct FramePacer {
    period: Option<Duration>,
    next_due: Instant,
}

impl FramePacer {
    /// Pace at `fps` frames per second
    ///
    /// Rates below zero or too small to express as a period fail with
    /// `InvalidOptionValue`.
    pub fn new(fps: f64) -> VideoResult<Self> {
        let invalid = |expected: &str| VideoError::InvalidOptionValue {
            key: "fps".to_string(),
            value: fps.to_string(),
            expected: expected.to_string(),
        };
        if fps.is_nan() || fps < 0.0 {
            return Err(invalid("a non-negative frame rate"));
        }
        let period = if fps > 0.0 {
            Some(
                Duration::try_from_secs_f64(1.0 / fps)
                    .map_err(|_| invalid("a frame period that fits in a duration"))?,
            )
        } else {
            None
        };
        Ok(Self {
            period,
            next_due: Instant::now(),
        })
    }

    pub fn is_paced(&self) -> bool {
        self.period.is_some()
    }

    /// Wait for (or poll) the next frame slot and claim it when ready
    pub fn wait(&mut self, block: bool, signal: &CloseSignal) -> Pace {
        let Some(period) = self.period else {
            return Pace::Ready;
        };

        let now = Instant::now();
        if now < self.next_due {
            if !block {
                return Pace::NotYet;
            }
            if signal.wait_until(self.next_due) {
                return Pace::Closed;
            }
        }

        // Fall back to "now" when the consumer lagged more than a period
        let now = Instant::now();
        self.next_due = if now > self.next_due + period {
            now + period
        } else {
            self.next_due + period
        };
        Pace::Ready
    }

    /// Restart the schedule (e.g. after looping a file)
    pub fn reset(&mut self) {
        self.next_due = Instant::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_close_signal_wakes_waiter() {
        let signal = CloseSignal::new();
        let remote = signal.clone();

        let waiter = thread::spawn(move || {
            let start = Instant::now();
            let closed = remote.wait_timeout(Duration::from_secs(10));
            (closed, start.elapsed())
        });

        thread::sleep(Duration::from_millis(20));
        signal.close();

        let (closed, elapsed) = waiter.join().unwrap();
        assert!(closed);
        assert!(elapsed < Duration::from_secs(5), "waiter was not woken promptly");
    }

    #[test]
    fn test_close_signal_timeout() {
        let signal = CloseSignal::new();
        assert!(!signal.wait_timeout(Duration::from_millis(5)));
        assert!(!signal.is_closed());
        signal.close();
        assert!(signal.wait_timeout(Duration::from_secs(10)));
    }

    #[test]
    fn test_clones_share_state() {
        let a = CloseSignal::new();
        let b = a.clone();
        assert!(a.same_as(&b));
        assert!(!a.same_as(&CloseSignal::new()));
        b.close();
        assert!(a.is_closed());
    }

    #[test]
    fn test_unpaced_always_ready() {
        let mut pacer = FramePacer::new(0.0).unwrap();
        let signal = CloseSignal::new();
        assert!(!pacer.is_paced());
        for _ in 0..100 {
            assert_eq!(pacer.wait(false, &signal), Pace::Ready);
        }
    }

    #[test]
    fn test_pacer_rejects_unusable_rates() {
        for fps in [-5.0, f64::NAN, 1e-300] {
            assert!(
                matches!(
                    FramePacer::new(fps),
                    Err(VideoError::InvalidOptionValue { .. })
                ),
                "fps {} should be rejected",
                fps
            );
        }
    }

    #[test]
    fn test_paced_poll_reports_not_yet() {
        let mut pacer = FramePacer::new(1.0).unwrap();
        let signal = CloseSignal::new();
        assert_eq!(pacer.wait(false, &signal), Pace::Ready);
        assert_eq!(pacer.wait(false, &signal), Pace::NotYet);
    }

    #[test]
    fn test_paced_block_cancelled_by_close() {
        let mut pacer = FramePacer::new(0.1).unwrap();
        let signal = CloseSignal::new();
        assert_eq!(pacer.wait(true, &signal), Pace::Ready);

        let remote = signal.clone();
        let closer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            remote.close();
        });
        assert_eq!(pacer.wait(true, &signal), Pace::Closed);
        closer.join().unwrap();
    }
}
