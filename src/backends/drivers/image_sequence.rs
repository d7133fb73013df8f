// SPDX-License-Identifier: GPL-3.0-only

//! `files` source: a sequence of still images played as video
//!
//! The path is one of:
//! - a printf-style pattern, `seq/foo%03d.jpeg`, read from index `start`
//!   until the first missing file
//! - a wildcard pattern in the file name, `seq/*.png`, sorted by name
//! - a directory, whose image files are played in name order
//! - a single image
//!
//! Options: `start=N`, `loop=1` to restart after the last image, `fps=R`
//! (default 0, unpaced). Frame size and format come from the first image;
//! later images in another format are converted, other sizes are an error.

use crate::backends::source::{
    CloseSignal, FrameInfo, FramePacer, GrabOutcome, Pace, VideoSource,
};
use crate::constants::file_formats;
use crate::errors::{VideoError, VideoResult};
use crate::media::{ChannelLayout, PixelFormat, convert_frame};
use crate::uri::VideoUri;
use image::DynamicImage;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const SCHEME: &str = "files";

/// Still image decoded into a packed frame
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub data: Vec<u8>,
}

/// Decode an image file, keeping its native channel layout and depth
pub fn load_image(path: &Path) -> VideoResult<DecodedImage> {
    let img = image::open(path)?;
    decode_image(img)
}

/// Pack a decoded image without widening or narrowing its samples
pub fn decode_image(img: DynamicImage) -> VideoResult<DecodedImage> {
    let (width, height) = (img.width(), img.height());
    let (format, data) = match img {
        DynamicImage::ImageLuma8(buf) => (PixelFormat::GRAY8, buf.into_raw()),
        DynamicImage::ImageLumaA8(buf) => (
            PixelFormat::new(ChannelLayout::LuminanceAlpha, 8)?,
            buf.into_raw(),
        ),
        DynamicImage::ImageRgb8(buf) => (PixelFormat::RGB24, buf.into_raw()),
        DynamicImage::ImageRgba8(buf) => (PixelFormat::RGBA32, buf.into_raw()),
        DynamicImage::ImageLuma16(buf) => (
            PixelFormat::GRAY16,
            bytemuck::cast_slice(&buf.into_raw()).to_vec(),
        ),
        DynamicImage::ImageLumaA16(buf) => (
            PixelFormat::new(ChannelLayout::LuminanceAlpha, 16)?,
            bytemuck::cast_slice(&buf.into_raw()).to_vec(),
        ),
        DynamicImage::ImageRgb16(buf) => (
            PixelFormat::RGB48,
            bytemuck::cast_slice(&buf.into_raw()).to_vec(),
        ),
        DynamicImage::ImageRgba16(buf) => (
            PixelFormat::RGBA64,
            bytemuck::cast_slice(&buf.into_raw()).to_vec(),
        ),
        DynamicImage::ImageRgb32F(buf) => (
            PixelFormat::new(ChannelLayout::Rgb, 32)?,
            bytemuck::cast_slice(&buf.into_raw()).to_vec(),
        ),
        DynamicImage::ImageRgba32F(buf) => (
            PixelFormat::new(ChannelLayout::Rgba, 32)?,
            bytemuck::cast_slice(&buf.into_raw()).to_vec(),
        ),
        other => (PixelFormat::RGBA32, other.to_rgba8().into_raw()),
    };
    Ok(DecodedImage {
        width,
        height,
        format,
        data,
    })
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| file_formats::is_image_extension(&e.to_lowercase()))
        .unwrap_or(false)
}

/// Split `foo%03d.png` into prefix, zero-padded width and suffix
fn parse_printf_pattern(pattern: &str) -> Option<(&str, usize, &str)> {
    let percent = pattern.find('%')?;
    let (prefix, rest) = pattern.split_at(percent);
    let conversion = &rest[1..];
    let d = conversion.find('d')?;
    let digits = &conversion[..d];
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let width = if digits.is_empty() {
        0
    } else {
        digits.parse().ok()?
    };
    Some((prefix, width, &conversion[d + 1..]))
}

/// Match `name` against a pattern of literal characters, `*` and `?`
fn wildcard_match(pattern: &str, name: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let n: Vec<char> = name.chars().collect();
    let (mut pi, mut ni) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while ni < n.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == n[ni]) {
            pi += 1;
            ni += 1;
        } else if pi < p.len() && p[pi] == '*' {
            backtrack = Some((pi, ni));
            pi += 1;
        } else if let Some((star, matched)) = backtrack {
            pi = star + 1;
            ni = matched + 1;
            backtrack = Some((star, matched + 1));
        } else {
            return false;
        }
    }
    p[pi..].iter().all(|&c| c == '*')
}

fn sorted_dir_entries(dir: &Path, keep: impl Fn(&Path) -> bool) -> VideoResult<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && keep(&path) {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

/// Drop the first `start` entries of a sorted listing
fn skip_leading(mut paths: Vec<PathBuf>, start: u64) -> Vec<PathBuf> {
    let skip = usize::try_from(start).unwrap_or(usize::MAX).min(paths.len());
    paths.drain(..skip);
    paths
}

/// Expand a `files` path into the ordered list of images it names
pub fn expand_sequence(pattern: &str, start: u64) -> VideoResult<Vec<PathBuf>> {
    if let Some((prefix, width, suffix)) = parse_printf_pattern(pattern) {
        let mut paths = Vec::new();
        let mut index = start;
        loop {
            let path = PathBuf::from(format!("{prefix}{index:0width$}{suffix}"));
            if !path.is_file() {
                break;
            }
            paths.push(path);
            index += 1;
        }
        return Ok(paths);
    }

    let path = Path::new(pattern);
    let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    if file_name.contains(['*', '?']) {
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let paths = sorted_dir_entries(dir, |p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .map(|n| wildcard_match(file_name, n))
                .unwrap_or(false)
        })?;
        return Ok(skip_leading(paths, start));
    }

    if path.is_dir() {
        let paths = sorted_dir_entries(path, has_image_extension)?;
        return Ok(skip_leading(paths, start));
    }

    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    Ok(Vec::new())
}

pub struct ImageSequenceSource {
    paths: Vec<PathBuf>,
    next_index: usize,
    looping: bool,
    width: u32,
    height: u32,
    format: PixelFormat,
    /// First image, served without re-reading the file
    first: Option<Vec<u8>>,
    sequence: u64,
    pacer: FramePacer,
    signal: CloseSignal,
}

impl ImageSequenceSource {
    /// Open a `files` uri
    pub fn open(uri: &VideoUri) -> VideoResult<Self> {
        let start = uri.get("start", 0u64)?;
        let paths = expand_sequence(uri.path(), start)?;
        Self::from_paths(uri, paths)
    }

    /// Play an explicit list of images with the uri's `loop` and `fps` options
    pub fn from_paths(uri: &VideoUri, paths: Vec<PathBuf>) -> VideoResult<Self> {
        let looping = uri.get("loop", false)?;
        let fps = uri.get("fps", 0.0f64)?;

        let Some(first_path) = paths.first() else {
            return Err(VideoError::DeviceOpenFailed {
                scheme: uri.scheme().to_string(),
                options: uri.options_summary(),
                reason: format!("no images match '{}'", uri.path()),
            });
        };
        let first = load_image(first_path)?;

        info!(
            first = %first_path.display(),
            count = paths.len(),
            width = first.width,
            height = first.height,
            format = %first.format,
            "Opened image sequence"
        );

        Ok(Self {
            paths,
            next_index: 0,
            looping,
            width: first.width,
            height: first.height,
            format: first.format,
            first: Some(first.data),
            sequence: 0,
            pacer: FramePacer::new(fps)?,
            signal: CloseSignal::new(),
        })
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    fn read_frame(&self, index: usize, buffer: &mut [u8]) -> VideoResult<()> {
        if let (0, Some(data)) = (index, self.first.as_deref()) {
            buffer.copy_from_slice(data);
            return Ok(());
        }

        let path = &self.paths[index];
        debug!(path = %path.display(), "Loading image frame");
        let image = load_image(path)?;
        if image.width != self.width || image.height != self.height {
            return Err(VideoError::ReadFailed(format!(
                "{} is {}x{}, sequence is {}x{}",
                path.display(),
                image.width,
                image.height,
                self.width,
                self.height
            )));
        }
        if image.format == self.format {
            buffer.copy_from_slice(&image.data);
            Ok(())
        } else {
            convert_frame(
                &image.data,
                image.format,
                buffer,
                self.format,
                self.width,
                self.height,
            )
        }
    }
}

impl VideoSource for ImageSequenceSource {
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
        if self.next_index >= self.paths.len() {
            if !self.looping {
                return Ok(GrabOutcome::EndOfStream);
            }
            debug!("Image sequence looping");
            self.next_index = 0;
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

        self.read_frame(self.next_index, buffer)?;
        self.next_index += 1;
        let info = FrameInfo::new(self.sequence);
        self.sequence += 1;
        Ok(GrabOutcome::FrameDelivered(info))
    }

    fn close(&mut self) {
        self.signal.close();
        self.first = None;
    }

    fn close_signal(&self) -> CloseSignal {
        self.signal.clone()
    }
}

impl Drop for ImageSequenceSource {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_printf_pattern() {
        assert_eq!(
            parse_printf_pattern("seq/foo%03d.jpeg"),
            Some(("seq/foo", 3, ".jpeg"))
        );
        assert_eq!(parse_printf_pattern("a%d.png"), Some(("a", 0, ".png")));
        assert_eq!(parse_printf_pattern("plain.png"), None);
        assert_eq!(parse_printf_pattern("bad%x3d.png"), None);
    }

    #[test]
    fn test_wildcards() {
        assert!(wildcard_match("*.png", "frame_001.png"));
        assert!(wildcard_match("frame_??.png", "frame_01.png"));
        assert!(!wildcard_match("frame_??.png", "frame_001.png"));
        assert!(!wildcard_match("*.png", "frame.jpg"));
        assert!(wildcard_match("*", ""));
    }

    #[test]
    fn test_decode_keeps_depth() {
        let img = DynamicImage::ImageLuma16(image::ImageBuffer::from_pixel(
            3,
            2,
            image::Luma([1000u16]),
        ));
        let decoded = decode_image(img).unwrap();
        assert_eq!(decoded.format, PixelFormat::GRAY16);
        assert_eq!(decoded.data.len(), 3 * 2 * 2);
        assert_eq!(u16::from_ne_bytes([decoded.data[0], decoded.data[1]]), 1000);
    }
}
