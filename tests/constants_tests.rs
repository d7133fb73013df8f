// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for constants module

use video_input::constants::{composer, file_formats, test_source, timing};

#[test]
fn test_image_extensions_are_lowercase() {
    for ext in file_formats::IMAGE_EXTENSIONS {
        assert_eq!(
            *ext,
            ext.to_lowercase(),
            "Extension {} should be lowercase",
            ext
        );
    }
}

#[test]
fn test_extension_lookup() {
    assert!(file_formats::is_image_extension("png"));
    assert!(file_formats::is_image_extension("jpeg"));
    assert!(!file_formats::is_image_extension("mp4"));
    assert!(file_formats::is_video_extension("mkv"));
    assert!(!file_formats::is_video_extension(file_formats::PVN_EXTENSION));
}

#[test]
fn test_image_and_video_extensions_disjoint() {
    for ext in file_formats::VIDEO_EXTENSIONS {
        assert!(
            !file_formats::is_image_extension(ext),
            "{} should not be both an image and a video extension",
            ext
        );
    }
}

#[test]
fn test_defaults_sensible() {
    assert!(composer::MAX_NESTING_DEPTH > 1);
    assert!(timing::TRANSIENT_RETRIES > 0);
    assert!(!timing::POLL_INTERVAL.is_zero());
    assert!(test_source::WIDTH > 0 && test_source::HEIGHT > 0);
    assert!(test_source::FPS >= 0.0);
}
