// SPDX-License-Identifier: GPL-3.0-only

//! Raw `.pvn` video files
//!
//! A single text header line `FORMAT WIDTH HEIGHT FPS\n` followed by packed
//! frames of `format.frame_size(width, height)` bytes each. `FPS` may be
//! omitted or 0 when the rate is unknown.
//!
//! Reader options (from the `file` uri): `realtime=1` plays at the recorded
//! rate, `loop=1` restarts at the end.

use crate::backends::source::{
    CloseSignal, FrameInfo, FramePacer, GrabOutcome, Pace, VideoSource,
};
use crate::constants::file_formats::PVN_MAX_HEADER_BYTES;
use crate::errors::{VideoError, VideoResult};
use crate::media::PixelFormat;
use crate::uri::VideoUri;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;
use tracing::{debug, info, warn};

/// Parsed `.pvn` header
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PvnHeader {
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
}

impl PvnHeader {
    pub fn parse(line: &str) -> VideoResult<Self> {
        let malformed = |reason: &str| {
            VideoError::ReadFailed(format!("invalid pvn header '{}': {}", line.trim_end(), reason))
        };
        let mut fields = line.split_whitespace();
        let format = fields
            .next()
            .ok_or_else(|| malformed("empty header"))?
            .parse::<PixelFormat>()?;
        let width = fields
            .next()
            .and_then(|w| w.parse::<u32>().ok())
            .ok_or_else(|| malformed("missing width"))?;
        let height = fields
            .next()
            .and_then(|h| h.parse::<u32>().ok())
            .ok_or_else(|| malformed("missing height"))?;
        let fps = match fields.next() {
            Some(f) => f
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite() && *f >= 0.0)
                .ok_or_else(|| malformed("bad frame rate"))?,
            None => 0.0,
        };
        if width == 0 || height == 0 {
            return Err(malformed("empty frame size"));
        }
        format.try_frame_size(width, height)?;
        Ok(Self {
            format,
            width,
            height,
            fps,
        })
    }

    pub fn frame_size(&self) -> usize {
        self.format.frame_size(self.width, self.height)
    }
}

impl std::fmt::Display for PvnHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{} {} {} {}", self.format, self.width, self.height, self.fps)
    }
}

pub struct PvnSource {
    reader: Option<BufReader<File>>,
    header: PvnHeader,
    data_offset: u64,
    looping: bool,
    sequence: u64,
    pacer: FramePacer,
    signal: CloseSignal,
}

impl PvnSource {
    pub fn open(uri: &VideoUri, path: &Path) -> VideoResult<Self> {
        let realtime = uri.get("realtime", false)?;
        let looping = uri.get("loop", false)?;

        let mut reader = BufReader::new(File::open(path)?);
        let mut line = String::new();
        (&mut reader)
            .take(PVN_MAX_HEADER_BYTES as u64)
            .read_line(&mut line)?;
        if !line.ends_with('\n') {
            return Err(VideoError::ReadFailed(format!(
                "{} has no pvn header line",
                path.display()
            )));
        }
        let header = PvnHeader::parse(&line)?;
        let data_offset = line.len() as u64;

        let fps = if realtime { header.fps } else { 0.0 };
        if realtime && header.fps <= 0.0 {
            warn!(path = %path.display(), "pvn file has no frame rate, playing unpaced");
        }
        info!(
            path = %path.display(),
            width = header.width,
            height = header.height,
            format = %header.format,
            fps = header.fps,
            realtime,
            "Opened pvn file"
        );

        Ok(Self {
            reader: Some(reader),
            header,
            data_offset,
            looping,
            sequence: 0,
            pacer: FramePacer::new(fps)?,
            signal: CloseSignal::new(),
        })
    }

    pub fn header(&self) -> &PvnHeader {
        &self.header
    }

    /// Fill `buffer` from the file; returns the bytes read before end of file
    fn read_full(reader: &mut BufReader<File>, buffer: &mut [u8]) -> io::Result<usize> {
        let mut filled = 0;
        while filled < buffer.len() {
            match reader.read(&mut buffer[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }
}

impl VideoSource for PvnSource {
    fn name(&self) -> &str {
        "file"
    }

    fn width(&self) -> u32 {
        self.header.width
    }

    fn height(&self) -> u32 {
        self.header.height
    }

    fn pixel_format(&self) -> PixelFormat {
        self.header.format
    }

    fn grab_next(&mut self, buffer: &mut [u8], block: bool) -> VideoResult<GrabOutcome> {
        if self.signal.is_closed() {
            return Err(VideoError::SourceClosed);
        }
        let expected = self.header.frame_size();
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

        let Some(reader) = self.reader.as_mut() else {
            return Err(VideoError::SourceClosed);
        };
        let read_err = |e: io::Error| VideoError::ReadFailed(e.to_string());

        let mut filled = Self::read_full(reader, buffer).map_err(read_err)?;
        if filled < expected && self.looping {
            debug!("pvn file looping");
            reader
                .seek(SeekFrom::Start(self.data_offset))
                .map_err(read_err)?;
            filled = Self::read_full(reader, buffer).map_err(read_err)?;
        }
        if filled < expected {
            if filled > 0 {
                warn!(
                    bytes = filled,
                    expected, "pvn file ends in a truncated frame"
                );
            }
            return Ok(GrabOutcome::EndOfStream);
        }

        let info = FrameInfo::new(self.sequence);
        self.sequence += 1;
        Ok(GrabOutcome::FrameDelivered(info))
    }

    fn close(&mut self) {
        self.signal.close();
        self.reader = None;
    }

    fn close_signal(&self) -> CloseSignal {
        self.signal.clone()
    }
}

impl Drop for PvnSource {
    fn drop(&mut self) {
        self.close();
    }
}

/// Records frames into a `.pvn` file
pub struct PvnWriter {
    writer: BufWriter<File>,
    header: PvnHeader,
    frames: u64,
}

impl PvnWriter {
    pub fn create(path: &Path, header: PvnHeader) -> VideoResult<Self> {
        header.format.try_frame_size(header.width, header.height)?;
        let mut writer = BufWriter::new(File::create(path)?);
        write!(writer, "{}", header)?;
        info!(path = %path.display(), header = %header.to_string().trim_end(), "Recording pvn file");
        Ok(Self {
            writer,
            header,
            frames: 0,
        })
    }

    pub fn write_frame(&mut self, frame: &[u8]) -> VideoResult<()> {
        let expected = self.header.frame_size();
        if frame.len() != expected {
            return Err(VideoError::InvalidBuffer {
                expected,
                actual: frame.len(),
            });
        }
        self.writer.write_all(frame)?;
        self.frames += 1;
        Ok(())
    }

    pub fn frames_written(&self) -> u64 {
        self.frames
    }

    pub fn finish(mut self) -> VideoResult<u64> {
        self.writer.flush()?;
        Ok(self.frames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_parse() {
        let header = PvnHeader::parse("GRAY8 640 480 30\n").unwrap();
        assert_eq!(header.format, PixelFormat::GRAY8);
        assert_eq!((header.width, header.height), (640, 480));
        assert_eq!(header.fps, 30.0);
        assert_eq!(header.frame_size(), 640 * 480);
    }

    #[test]
    fn test_header_without_fps() {
        let header = PvnHeader::parse("RGB24 4 2\n").unwrap();
        assert_eq!(header.fps, 0.0);
    }

    #[test]
    fn test_header_rejects_bad_fields() {
        assert!(PvnHeader::parse("RGB24 4\n").is_err());
        assert!(PvnHeader::parse("NOPE 4 4 30\n").is_err());
        assert!(PvnHeader::parse("RGB24 0 4 30\n").is_err());
        assert!(PvnHeader::parse("RGB24 4 4 fast\n").is_err());
    }

    #[test]
    fn test_header_rejects_oversized_frames() {
        let err = PvnHeader::parse("RGBA128F 4294967295 4294967295 0\n").unwrap_err();
        assert!(matches!(err, VideoError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_header_display_round_trips() {
        let header = PvnHeader::parse("RGBA32 8 6 25\n").unwrap();
        assert_eq!(PvnHeader::parse(&header.to_string()).unwrap(), header);
    }
}
