// SPDX-License-Identifier: GPL-3.0-only

//! Runtime configuration for the composer and built-in backends
//!
//! Per-session settings travel in the video uri. The values here are the
//! process-level tunables a uri cannot express: the decorator depth limit,
//! the default transient retry budget and the blocking poll interval.

use crate::constants;
use crate::errors::{VideoError, VideoResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    /// Deepest decorator chain the composer accepts
    pub max_nesting_depth: usize,
    /// Retries a backend performs before escalating a transient read failure
    pub transient_retries: u32,
    /// Poll interval for blocking waits, in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            max_nesting_depth: constants::composer::MAX_NESTING_DEPTH,
            transient_retries: constants::timing::TRANSIENT_RETRIES,
            poll_interval_ms: constants::timing::POLL_INTERVAL.as_millis() as u64,
        }
    }
}

impl VideoConfig {
    /// Parse a configuration from JSON; missing fields take their defaults
    pub fn from_json_str(json: &str) -> VideoResult<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| VideoError::InvalidOptionValue {
            key: "config".to_string(),
            value: json.to_string(),
            expected: format!("video configuration JSON ({})", e),
        })?;
        config.validated()
    }

    /// Load a configuration file
    pub fn load(path: &Path) -> VideoResult<Self> {
        debug!(path = %path.display(), "Loading video configuration");
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Load from the file named by `VIDEO_INPUT_CONFIG`, or defaults when unset
    pub fn from_env() -> VideoResult<Self> {
        match std::env::var_os(constants::config::CONFIG_ENV_VAR) {
            Some(path) => {
                info!(path = ?path, "Using video configuration from environment");
                Self::load(Path::new(&path))
            }
            None => Ok(Self::default()),
        }
    }

    /// Poll interval as a duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    fn validated(self) -> VideoResult<Self> {
        if self.max_nesting_depth == 0 {
            return Err(VideoError::InvalidOptionValue {
                key: "max_nesting_depth".to_string(),
                value: "0".to_string(),
                expected: "a depth of at least 1".to_string(),
            });
        }
        if self.poll_interval_ms == 0 {
            return Err(VideoError::InvalidOptionValue {
                key: "poll_interval_ms".to_string(),
                value: "0".to_string(),
                expected: "a positive interval".to_string(),
            });
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = VideoConfig::from_json_str(r#"{"transient_retries": 7}"#).unwrap();
        assert_eq!(config.transient_retries, 7);
        assert_eq!(config.max_nesting_depth, constants::composer::MAX_NESTING_DEPTH);
    }

    #[test]
    fn test_zero_depth_rejected() {
        let err = VideoConfig::from_json_str(r#"{"max_nesting_depth": 0}"#).unwrap_err();
        assert!(matches!(err, VideoError::InvalidOptionValue { .. }));
    }

    #[test]
    fn test_bad_json_rejected() {
        assert!(VideoConfig::from_json_str("{not json").is_err());
    }
}
