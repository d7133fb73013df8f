// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for configuration module

use std::time::Duration;
use video_input::{Composer, DriverRegistry, VideoConfig, VideoError};

#[test]
fn test_config_default() {
    let config = VideoConfig::default();

    assert!(
        config.max_nesting_depth >= 2,
        "Default depth should allow at least one decorator"
    );
    assert_eq!(config.poll_interval(), Duration::from_millis(50));
}

#[test]
fn test_config_load_from_file() {
    let dir = std::env::temp_dir().join(format!("video-input-config-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("config.json");
    std::fs::write(&path, r#"{"max_nesting_depth": 3, "poll_interval_ms": 10}"#).unwrap();

    let config = VideoConfig::load(&path).unwrap();
    assert_eq!(config.max_nesting_depth, 3);
    assert_eq!(config.poll_interval(), Duration::from_millis(10));
    assert_eq!(
        config.transient_retries,
        VideoConfig::default().transient_retries,
        "Unset fields should keep their defaults"
    );

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_config_missing_file() {
    let path = std::env::temp_dir().join(format!("missing-{}.json", uuid::Uuid::new_v4()));
    assert!(matches!(VideoConfig::load(&path), Err(VideoError::Io(_))));
}

#[test]
fn test_config_depth_applies_to_composer() {
    let registry = DriverRegistry::with_default_drivers();
    let config = VideoConfig {
        max_nesting_depth: 1,
        ..VideoConfig::default()
    };
    let composer = Composer::with_config(&registry, config);

    assert!(composer.open_str("test:[size=4x4]//").is_ok());
    assert!(matches!(
        composer.open_str("convert://test:[size=4x4]//"),
        Err(VideoError::MalformedUri { .. })
    ));
}
