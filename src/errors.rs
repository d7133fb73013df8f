// SPDX-License-Identifier: GPL-3.0-only

//! Error types for video source resolution and capture
//!
//! Every failure the crate can report is a [`VideoError`]. Open-time errors
//! (`MalformedUri`, `UnknownScheme`, `InvalidOptionValue`, `UnsupportedFormat`,
//! `DeviceOpenFailed`) end the open attempt. Capture-time errors distinguish
//! transient conditions the caller may retry from terminal ones.

use thiserror::Error;

/// Result type alias using VideoError
pub type VideoResult<T> = Result<T, VideoError>;

/// Video source error type
#[derive(Debug, Error)]
pub enum VideoError {
    /// The URI does not follow `scheme:[options]//path`
    #[error("malformed video uri '{uri}': {reason} (at '{fragment}')")]
    MalformedUri {
        uri: String,
        fragment: String,
        reason: String,
    },

    /// No driver is registered for the scheme
    #[error("unknown video scheme '{0}'")]
    UnknownScheme(String),

    /// An option is present but its value does not parse as the requested type
    #[error("invalid value '{value}' for option '{key}': expected {expected}")]
    InvalidOptionValue {
        key: String,
        value: String,
        expected: String,
    },

    /// Pixel format cannot be represented or displayed
    #[error("unsupported pixel format: {0}")]
    UnsupportedFormat(String),

    /// Driver failed to acquire its device or resource
    #[error("failed to open '{scheme}' source (options: {options}): {reason}")]
    DeviceOpenFailed {
        scheme: String,
        options: String,
        reason: String,
    },

    /// The source delivered its last frame
    #[error("video source exhausted")]
    SourceExhausted,

    /// The source was closed by its owner
    #[error("video source closed")]
    SourceClosed,

    /// A read failed but the device is still usable
    #[error("transient read failure: {0}")]
    TransientReadFailure(String),

    /// A read failed and the source cannot continue
    #[error("read failed: {0}")]
    ReadFailed(String),

    /// Caller supplied a frame buffer of the wrong length
    #[error("frame buffer holds {actual} bytes, source needs {expected}")]
    InvalidBuffer { expected: usize, actual: usize },

    /// Filesystem or device I/O failure outside of a grab
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl VideoError {
    /// Build a `MalformedUri` error for `uri` pointing at `fragment`
    pub fn malformed(uri: &str, fragment: &str, reason: impl Into<String>) -> Self {
        VideoError::MalformedUri {
            uri: uri.to_string(),
            fragment: fragment.to_string(),
            reason: reason.into(),
        }
    }

    /// True for failures a caller may retry with another `grab_next`
    pub fn is_transient(&self) -> bool {
        matches!(self, VideoError::TransientReadFailure(_))
    }

    /// True for the expected end states of a source (not failures)
    pub fn is_terminal_state(&self) -> bool {
        matches!(self, VideoError::SourceExhausted | VideoError::SourceClosed)
    }

    /// True for errors raised while parsing or resolving a uri
    pub fn is_open_error(&self) -> bool {
        matches!(
            self,
            VideoError::MalformedUri { .. }
                | VideoError::UnknownScheme(_)
                | VideoError::InvalidOptionValue { .. }
                | VideoError::UnsupportedFormat(_)
                | VideoError::DeviceOpenFailed { .. }
        )
    }
}

impl From<image::ImageError> for VideoError {
    fn from(err: image::ImageError) -> Self {
        VideoError::ReadFailed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(VideoError::TransientReadFailure("busy".into()).is_transient());
        assert!(!VideoError::ReadFailed("gone".into()).is_transient());
        assert!(VideoError::SourceClosed.is_terminal_state());
        assert!(VideoError::SourceExhausted.is_terminal_state());
        assert!(!VideoError::SourceClosed.is_open_error());
        assert!(VideoError::UnknownScheme("x".into()).is_open_error());
    }

    #[test]
    fn test_malformed_message_carries_fragment() {
        let err = VideoError::malformed("test:[a=1//", "[a=1//", "unterminated option block");
        let msg = err.to_string();
        assert!(msg.contains("test:[a=1//"));
        assert!(msg.contains("unterminated option block"));
    }
}
