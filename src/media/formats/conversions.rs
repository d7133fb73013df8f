// SPDX-License-Identifier: GPL-3.0-only

//! Pixel format conversion utilities
//!
//! Frames are converted row by row through a normalized RGBA scratch row, so
//! every supported layout and bit depth converts to every other one. Common
//! pairs (identical formats, RGB/BGR swaps, YUYV to RGB) take direct paths.

use super::pixel_format::{ChannelLayout, PixelFormat};
use crate::errors::{VideoError, VideoResult};

/// Normalized RGBA sample, 0.0..=1.0 for integer formats
type Rgba = [f32; 4];

/// Reusable converter between two formats at a fixed frame size
#[derive(Debug)]
pub struct FrameConverter {
    src_format: PixelFormat,
    dst_format: PixelFormat,
    width: u32,
    height: u32,
    row: Vec<Rgba>,
}

impl FrameConverter {
    /// Prepare a conversion for `width` x `height` frames
    pub fn new(
        src_format: PixelFormat,
        dst_format: PixelFormat,
        width: u32,
        height: u32,
    ) -> VideoResult<Self> {
        for format in [src_format, dst_format] {
            if format.layout() == ChannelLayout::Yuyv && width % 2 != 0 {
                return Err(VideoError::UnsupportedFormat(format!(
                    "{} needs an even frame width, got {}",
                    format, width
                )));
            }
        }
        src_format.try_frame_size(width, height)?;
        dst_format.try_frame_size(width, height)?;
        // The scratch row holds one normalized RGBA float per pixel
        PixelFormat::from_channels(4, 32)?.try_frame_size(width, 1)?;
        Ok(Self {
            src_format,
            dst_format,
            width,
            height,
            row: vec![[0.0; 4]; width as usize],
        })
    }

    pub fn src_format(&self) -> PixelFormat {
        self.src_format
    }

    pub fn dst_format(&self) -> PixelFormat {
        self.dst_format
    }

    /// Bytes expected in the source buffer
    pub fn src_size(&self) -> usize {
        self.src_format.frame_size(self.width, self.height)
    }

    /// Bytes written to the destination buffer
    pub fn dst_size(&self) -> usize {
        self.dst_format.frame_size(self.width, self.height)
    }

    /// Convert one frame from `src` into `dst`
    pub fn convert(&mut self, src: &[u8], dst: &mut [u8]) -> VideoResult<()> {
        check_len(src.len(), self.src_size())?;
        check_len(dst.len(), self.dst_size())?;

        if self.src_format == self.dst_format {
            dst.copy_from_slice(src);
            return Ok(());
        }

        let src_stride = self.width as usize * self.src_format.bytes_per_pixel();
        let dst_stride = self.width as usize * self.dst_format.bytes_per_pixel();
        if src_stride == 0 || dst_stride == 0 {
            return Ok(());
        }

        match (self.src_format, self.dst_format) {
            (PixelFormat::RGB24, PixelFormat::BGR24) | (PixelFormat::BGR24, PixelFormat::RGB24) => {
                swap_red_blue(src, dst, 3);
                return Ok(());
            }
            (PixelFormat::RGBA32, PixelFormat::BGRA32)
            | (PixelFormat::BGRA32, PixelFormat::RGBA32) => {
                swap_red_blue(src, dst, 4);
                return Ok(());
            }
            (PixelFormat::YUYV422, PixelFormat::RGB24) => {
                yuyv_to_rgb(src, dst, 3);
                return Ok(());
            }
            (PixelFormat::YUYV422, PixelFormat::RGBA32) => {
                yuyv_to_rgb(src, dst, 4);
                return Ok(());
            }
            _ => {}
        }

        for (src_row, dst_row) in src
            .chunks_exact(src_stride)
            .zip(dst.chunks_exact_mut(dst_stride))
        {
            decode_row(src_row, self.src_format, &mut self.row);
            encode_row(&self.row, self.dst_format, dst_row);
        }
        Ok(())
    }
}

/// Convert a whole frame in one call
pub fn convert_frame(
    src: &[u8],
    src_format: PixelFormat,
    dst: &mut [u8],
    dst_format: PixelFormat,
    width: u32,
    height: u32,
) -> VideoResult<()> {
    FrameConverter::new(src_format, dst_format, width, height)?.convert(src, dst)
}

fn check_len(actual: usize, expected: usize) -> VideoResult<()> {
    if actual == expected {
        Ok(())
    } else {
        Err(VideoError::InvalidBuffer { expected, actual })
    }
}

fn swap_red_blue(src: &[u8], dst: &mut [u8], bpp: usize) {
    for (s, d) in src.chunks_exact(bpp).zip(dst.chunks_exact_mut(bpp)) {
        d.copy_from_slice(s);
        d.swap(0, 2);
    }
}

/// Convert YUYV (YUV 4:2:2) to 8-bit RGB or RGBA
///
/// YUYV format: Y0 U Y1 V - each 4-byte group encodes 2 pixels.
/// Uses BT.601 coefficients.
fn yuyv_to_rgb(src: &[u8], dst: &mut [u8], bpp: usize) {
    for (chunk, out) in src.chunks_exact(4).zip(dst.chunks_exact_mut(bpp * 2)) {
        let y0 = chunk[0] as f32;
        let u = chunk[1] as f32 - 128.0;
        let y1 = chunk[2] as f32;
        let v = chunk[3] as f32 - 128.0;

        for (i, y) in [y0, y1].into_iter().enumerate() {
            let px = &mut out[i * bpp..(i + 1) * bpp];
            px[0] = (y + 1.402 * v).clamp(0.0, 255.0) as u8;
            px[1] = (y - 0.344 * u - 0.714 * v).clamp(0.0, 255.0) as u8;
            px[2] = (y + 1.772 * u).clamp(0.0, 255.0) as u8;
            if bpp == 4 {
                px[3] = 255;
            }
        }
    }
}

#[inline]
fn read_channel(px: &[u8], index: usize, bits: u8) -> f32 {
    match bits {
        8 => px[index] as f32 / 255.0,
        16 => {
            let o = index * 2;
            u16::from_ne_bytes([px[o], px[o + 1]]) as f32 / 65535.0
        }
        _ => {
            let o = index * 4;
            f32::from_ne_bytes([px[o], px[o + 1], px[o + 2], px[o + 3]])
        }
    }
}

#[inline]
fn write_channel(px: &mut [u8], index: usize, bits: u8, value: f32) {
    match bits {
        8 => px[index] = (value.clamp(0.0, 1.0) * 255.0).round() as u8,
        16 => {
            let o = index * 2;
            let v = (value.clamp(0.0, 1.0) * 65535.0).round() as u16;
            px[o..o + 2].copy_from_slice(&v.to_ne_bytes());
        }
        _ => {
            let o = index * 4;
            px[o..o + 4].copy_from_slice(&value.to_ne_bytes());
        }
    }
}

/// BT.601 luma
#[inline]
fn luma(rgba: &Rgba) -> f32 {
    0.299 * rgba[0] + 0.587 * rgba[1] + 0.114 * rgba[2]
}

/// YUV to RGB conversion (BT.601), chroma centred on zero
#[inline]
fn yuv_to_rgb(y: f32, u: f32, v: f32) -> (f32, f32, f32) {
    let r = (y + 1.402 * v).clamp(0.0, 1.0);
    let g = (y - 0.344 * u - 0.714 * v).clamp(0.0, 1.0);
    let b = (y + 1.772 * u).clamp(0.0, 1.0);
    (r, g, b)
}

/// RGB to YUV conversion (BT.601)
#[inline]
fn rgb_to_yuv(r: f32, g: f32, b: f32) -> (f32, f32, f32) {
    let y = 0.299 * r + 0.587 * g + 0.114 * b;
    let u = -0.169 * r - 0.331 * g + 0.500 * b;
    let v = 0.500 * r - 0.419 * g - 0.081 * b;
    (y, u, v)
}

fn decode_row(row: &[u8], format: PixelFormat, out: &mut [Rgba]) {
    let bits = format.bits_per_channel();

    if format.layout() == ChannelLayout::Yuyv {
        for (chunk, pair) in row.chunks_exact(4).zip(out.chunks_exact_mut(2)) {
            let u = (chunk[1] as f32 - 128.0) / 255.0;
            let v = (chunk[3] as f32 - 128.0) / 255.0;
            for (i, y) in [chunk[0], chunk[2]].into_iter().enumerate() {
                let (r, g, b) = yuv_to_rgb(y as f32 / 255.0, u, v);
                pair[i] = [r, g, b, 1.0];
            }
        }
        return;
    }

    let bpp = format.bytes_per_pixel();
    for (px, rgba) in row.chunks_exact(bpp).zip(out.iter_mut()) {
        let c = |i| read_channel(px, i, bits);
        *rgba = match format.layout() {
            ChannelLayout::Luminance | ChannelLayout::Depth => {
                let l = c(0);
                [l, l, l, 1.0]
            }
            ChannelLayout::LuminanceAlpha => {
                let l = c(0);
                [l, l, l, c(1)]
            }
            ChannelLayout::Rgb => [c(0), c(1), c(2), 1.0],
            ChannelLayout::Bgr => [c(2), c(1), c(0), 1.0],
            ChannelLayout::Rgba => [c(0), c(1), c(2), c(3)],
            ChannelLayout::Bgra => [c(2), c(1), c(0), c(3)],
            ChannelLayout::Yuyv => unreachable!("handled above"),
        };
    }
}

fn encode_row(row: &[Rgba], format: PixelFormat, out: &mut [u8]) {
    let bits = format.bits_per_channel();

    if format.layout() == ChannelLayout::Yuyv {
        for (pair, chunk) in row.chunks_exact(2).zip(out.chunks_exact_mut(4)) {
            let (y0, u0, v0) = rgb_to_yuv(pair[0][0], pair[0][1], pair[0][2]);
            let (y1, u1, v1) = rgb_to_yuv(pair[1][0], pair[1][1], pair[1][2]);
            chunk[0] = (y0.clamp(0.0, 1.0) * 255.0).round() as u8;
            chunk[1] = (((u0 + u1) / 2.0 + 0.5).clamp(0.0, 1.0) * 255.0).round() as u8;
            chunk[2] = (y1.clamp(0.0, 1.0) * 255.0).round() as u8;
            chunk[3] = (((v0 + v1) / 2.0 + 0.5).clamp(0.0, 1.0) * 255.0).round() as u8;
        }
        return;
    }

    let bpp = format.bytes_per_pixel();
    for (rgba, px) in row.iter().zip(out.chunks_exact_mut(bpp)) {
        match format.layout() {
            ChannelLayout::Luminance | ChannelLayout::Depth => {
                write_channel(px, 0, bits, luma(rgba));
            }
            ChannelLayout::LuminanceAlpha => {
                write_channel(px, 0, bits, luma(rgba));
                write_channel(px, 1, bits, rgba[3]);
            }
            ChannelLayout::Rgb => {
                for i in 0..3 {
                    write_channel(px, i, bits, rgba[i]);
                }
            }
            ChannelLayout::Bgr => {
                for i in 0..3 {
                    write_channel(px, i, bits, rgba[2 - i]);
                }
            }
            ChannelLayout::Rgba => {
                for i in 0..4 {
                    write_channel(px, i, bits, rgba[i]);
                }
            }
            ChannelLayout::Bgra => {
                for i in 0..3 {
                    write_channel(px, i, bits, rgba[2 - i]);
                }
                write_channel(px, 3, bits, rgba[3]);
            }
            ChannelLayout::Yuyv => unreachable!("handled above"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_copies() {
        let src = vec![1u8, 2, 3, 4, 5, 6];
        let mut dst = vec![0u8; 6];
        convert_frame(&src, PixelFormat::RGB24, &mut dst, PixelFormat::RGB24, 2, 1).unwrap();
        assert_eq!(src, dst);
    }

    #[test]
    fn test_converter_rejects_oversized_frames() {
        let err = FrameConverter::new(PixelFormat::RGB24, PixelFormat::GRAY8, u32::MAX, u32::MAX)
            .unwrap_err();
        assert!(matches!(err, VideoError::UnsupportedFormat(_)));
        assert!(FrameConverter::new(PixelFormat::GRAY8, PixelFormat::RGB24, u32::MAX, 0).is_err());
    }

    #[test]
    fn test_rgb_to_bgr_swaps() {
        let src = vec![10u8, 20, 30];
        let mut dst = vec![0u8; 3];
        convert_frame(&src, PixelFormat::RGB24, &mut dst, PixelFormat::BGR24, 1, 1).unwrap();
        assert_eq!(dst, vec![30, 20, 10]);
    }

    #[test]
    fn test_gray_to_rgba() {
        let src = vec![0u8, 255];
        let mut dst = vec![0u8; 8];
        convert_frame(&src, PixelFormat::GRAY8, &mut dst, PixelFormat::RGBA32, 2, 1).unwrap();
        assert_eq!(dst, vec![0, 0, 0, 255, 255, 255, 255, 255]);
    }

    #[test]
    fn test_rgb_to_gray_uses_luma() {
        let src = vec![255u8, 0, 0, 0, 255, 0];
        let mut dst = vec![0u8; 2];
        convert_frame(&src, PixelFormat::RGB24, &mut dst, PixelFormat::GRAY8, 2, 1).unwrap();
        assert_eq!(dst[0], (0.299f32 * 255.0).round() as u8);
        assert_eq!(dst[1], (0.587f32 * 255.0).round() as u8);
    }

    #[test]
    fn test_gray16_to_gray8_keeps_scale() {
        let src: Vec<u8> = [0u16, 65535, 32896]
            .iter()
            .flat_map(|v| v.to_ne_bytes())
            .collect();
        let mut dst = vec![0u8; 3];
        convert_frame(&src, PixelFormat::GRAY16, &mut dst, PixelFormat::GRAY8, 3, 1).unwrap();
        assert_eq!(dst, vec![0, 255, 128]);
    }

    #[test]
    fn test_yuyv_neutral_chroma_is_gray() {
        // Y0=128 U=128 Y1=128 V=128 decodes to mid gray
        let src = vec![128u8, 128, 128, 128];
        let mut dst = vec![0u8; 6];
        convert_frame(&src, PixelFormat::YUYV422, &mut dst, PixelFormat::RGB24, 2, 1).unwrap();
        assert!(dst.iter().all(|&v| v == 128), "got {:?}", dst);
    }

    #[test]
    fn test_yuyv_generic_path_matches_fast_path() {
        let src = vec![16u8, 90, 235, 200, 80, 128, 60, 40];
        let mut fast = vec![0u8; 12];
        let mut generic = vec![0u8; 12];
        convert_frame(&src, PixelFormat::YUYV422, &mut fast, PixelFormat::RGB24, 4, 1).unwrap();
        let mut tmp = vec![0u8; 4 * 6];
        convert_frame(&src, PixelFormat::YUYV422, &mut tmp, PixelFormat::RGB48, 4, 1).unwrap();
        convert_frame(&tmp, PixelFormat::RGB48, &mut generic, PixelFormat::RGB24, 4, 1).unwrap();
        for (a, b) in fast.iter().zip(&generic) {
            assert!((*a as i32 - *b as i32).abs() <= 2, "{:?} vs {:?}", fast, generic);
        }
    }

    #[test]
    fn test_odd_width_yuyv_rejected() {
        assert!(FrameConverter::new(PixelFormat::YUYV422, PixelFormat::RGB24, 3, 2).is_err());
    }

    #[test]
    fn test_wrong_buffer_size() {
        let src = vec![0u8; 5];
        let mut dst = vec![0u8; 3];
        let err = convert_frame(&src, PixelFormat::RGB24, &mut dst, PixelFormat::GRAY8, 1, 1)
            .unwrap_err();
        assert!(matches!(err, VideoError::InvalidBuffer { expected: 3, actual: 5 }));
    }

    #[test]
    fn test_float_round_trip() {
        let format = PixelFormat::from_name("RGB96F").unwrap();
        let src = vec![0u8, 128, 255];
        let mut float = vec![0u8; format.frame_size(1, 1)];
        convert_frame(&src, PixelFormat::RGB24, &mut float, format, 1, 1).unwrap();
        let mut back = vec![0u8; 3];
        convert_frame(&float, format, &mut back, PixelFormat::RGB24, 1, 1).unwrap();
        assert_eq!(src, back);
    }
}
