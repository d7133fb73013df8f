// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for pixel formats and their display mapping

use video_input::media::{ComponentType, SurfaceLayout, convert_frame};
use video_input::{PixelFormat, VideoError};

#[test]
fn test_surface_mapping_grid() {
    let layouts = [
        (1, SurfaceLayout::Luminance),
        (3, SurfaceLayout::Rgb),
        (4, SurfaceLayout::Rgba),
    ];
    let components = [
        (8, ComponentType::UnsignedByte),
        (16, ComponentType::UnsignedShort),
        (32, ComponentType::Float),
    ];
    for (channels, layout) in layouts {
        for (bits, component) in components {
            let format = PixelFormat::from_channels(channels, bits).unwrap();
            let surface = format.surface_format().unwrap();
            assert_eq!(surface.layout, layout, "{} channels", channels);
            assert_eq!(surface.component, component, "{} bits", bits);
        }
    }
}

#[test]
fn test_unmappable_formats() {
    assert!(matches!(
        PixelFormat::YUYV422.surface_format(),
        Err(VideoError::UnsupportedFormat(_))
    ));
    assert!(matches!(
        PixelFormat::from_channels(2, 8).unwrap().surface_format(),
        Err(VideoError::UnsupportedFormat(_))
    ));
    assert!(PixelFormat::from_channels(0, 8).is_err());
    assert!(PixelFormat::from_channels(3, 12).is_err());
}

#[test]
fn test_frame_size() {
    assert_eq!(PixelFormat::RGB24.frame_size(640, 480), 640 * 480 * 3);
    assert_eq!(PixelFormat::GRAY16.frame_size(10, 10), 200);
    assert_eq!(PixelFormat::YUYV422.frame_size(4, 2), 16);
}

#[test]
fn test_convert_rgb_to_bgr() {
    let rgb = [10u8, 20, 30, 40, 50, 60];
    let mut bgr = [0u8; 6];
    convert_frame(&rgb, PixelFormat::RGB24, &mut bgr, PixelFormat::BGR24, 2, 1).unwrap();
    assert_eq!(bgr, [30, 20, 10, 60, 50, 40]);
}

#[test]
fn test_convert_rejects_wrong_buffer() {
    let rgb = [0u8; 5];
    let mut gray = [0u8; 2];
    assert!(matches!(
        convert_frame(&rgb, PixelFormat::RGB24, &mut gray, PixelFormat::GRAY8, 2, 1),
        Err(VideoError::InvalidBuffer { .. })
    ));
}
