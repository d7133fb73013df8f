// SPDX-License-Identifier: GPL-3.0-only

//! Command line video client
//!
//! Opens a uri (or the first working fallback), reports the frame layout
//! and its display mapping, then reads frames until the stream ends, the
//! frame limit is reached or Ctrl+C closes the input.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use std::time::Instant;
use tracing::{info, warn};
use video_input::backends::drivers::pvn::{PvnHeader, PvnWriter};
use video_input::media::convert_frame;
use video_input::{
    CloseHandle, DriverRegistry, GrabOutcome, PixelFormat, VideoError, VideoInput, open_video,
};

pub const USAGE_EXAMPLES: &str = "\
Sample uris:
  test:[size=320x240,fmt=RGB24,fps=30]//
  convert:[fmt=GRAY8]//test://
  files:[fps=10]///home/user/seq/foo%03d.jpeg
  file:[realtime=1]///home/user/video/movie.pvn
  v4l:[size=640x480,fmt=YUYV]///dev/video0          (feature v4l)
  mjpeg://http://127.0.0.1/?action=stream           (feature gstreamer)
  gst://videotestsrc num-buffers=100                (feature gstreamer)";

/// Tried in order when no uri is given
const FALLBACK_URIS: &[&str] = &[
    "dc1394:[fps=30,dma=10,size=640x480,iso=400]//0",
    "convert:[fmt=RGB24]//v4l:///dev/video0",
    "convert:[fmt=RGB24]//v4l:///dev/video1",
    "openni:[img1=rgb]//",
    "test:[size=160x120,n=1,fmt=RGB24]//",
];

pub struct SessionOptions {
    pub frames: u64,
    pub save_dir: Option<PathBuf>,
    pub record: Option<PathBuf>,
    pub json: bool,
    pub block: bool,
}

/// List the schemes compiled into this build
pub fn list_drivers() -> Result<(), Box<dyn std::error::Error>> {
    let registry = DriverRegistry::global();
    println!("Available drivers:");
    for scheme in registry.schemes() {
        let kind = if registry.resolve(scheme)?.is_decorator() {
            "decorator"
        } else {
            "terminal"
        };
        println!("  {:<10} {}", scheme, kind);
    }
    Ok(())
}

/// Open `uri` and read from it
pub fn run(uri: &str, options: &SessionOptions) -> Result<(), Box<dyn std::error::Error>> {
    let input = open_video(uri)?;
    read_session(input, options)
}

/// Try each fallback uri until one opens
pub fn run_fallbacks(options: &SessionOptions) -> Result<(), Box<dyn std::error::Error>> {
    println!("No uri given. {}", USAGE_EXAMPLES);
    println!();

    for uri in FALLBACK_URIS {
        match open_video(uri) {
            Ok(input) => {
                println!("Opened {}", uri);
                return read_session(input, options);
            }
            Err(e) => {
                info!(uri, error = %e, "Fallback uri unavailable");
                println!("Skipping {}: {}", uri, e);
            }
        }
    }
    Err("no fallback video source could be opened".into())
}

/// Route Ctrl+C to whichever input is currently being read
fn install_interrupt(handle: CloseHandle) -> Result<(), ctrlc::Error> {
    static CURRENT: OnceLock<Mutex<Option<CloseHandle>>> = OnceLock::new();

    let mut installed = true;
    let slot = CURRENT.get_or_init(|| {
        installed = false;
        Mutex::new(None)
    });
    *slot.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);

    if !installed {
        ctrlc::set_handler(move || {
            if let Some(handle) = slot.lock().unwrap_or_else(|e| e.into_inner()).as_ref() {
                handle.close();
            }
        })?;
    }
    Ok(())
}

fn read_session(
    mut input: VideoInput,
    options: &SessionOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let descriptor = input.descriptor();
    if options.json {
        println!("{}", serde_json::to_string_pretty(&descriptor)?);
    } else {
        println!("Uri: {}", input.uri());
        println!(
            "Frames: {}x{} {} ({} bytes)",
            descriptor.width, descriptor.height, descriptor.format, descriptor.size_bytes
        );
    }

    // Display hints a viewer would apply to the frame
    let scale = input.uri().get("scale", 1.0f32)?;
    let bias = input.uri().get("bias", 0.0f32)?;
    match input.pixel_format().surface_format() {
        Ok(surface) => println!("Display: {} (scale {}, bias {})", surface, scale, bias),
        Err(e) => println!("Display: unavailable ({})", e),
    }

    if let Some(dir) = &options.save_dir {
        std::fs::create_dir_all(dir)?;
    }
    let mut recorder = match &options.record {
        Some(path) => Some(PvnWriter::create(
            path,
            PvnHeader {
                format: input.pixel_format(),
                width: input.width(),
                height: input.height(),
                fps: 0.0,
            },
        )?),
        None => None,
    };

    install_interrupt(input.close_handle())?;
    println!("Reading... (press Ctrl+C to stop)");

    let start = Instant::now();
    let mut frame = vec![0u8; input.size_bytes()];
    let mut delivered = 0u64;

    loop {
        match input.grab_next(&mut frame, options.block) {
            Ok(GrabOutcome::FrameDelivered(info)) => {
                delivered += 1;
                if let Some(dir) = &options.save_dir {
                    let path = dir.join(format!("frame_{:06}.png", info.sequence));
                    save_png(&path, &frame, input.pixel_format(), input.width(), input.height())?;
                }
                if let Some(recorder) = recorder.as_mut() {
                    recorder.write_frame(&frame)?;
                }
                print!("\rFrame {}", info.sequence);
                std::io::Write::flush(&mut std::io::stdout())?;
                if options.frames > 0 && delivered >= options.frames {
                    break;
                }
            }
            Ok(GrabOutcome::NoFrameYet) => std::thread::sleep(std::time::Duration::from_millis(1)),
            Ok(GrabOutcome::EndOfStream) => {
                println!();
                println!("End of stream");
                break;
            }
            Err(VideoError::SourceClosed) => {
                println!();
                println!("Stopped");
                break;
            }
            Err(e) if e.is_transient() => warn!(error = %e, "Dropped frame"),
            Err(e) => return Err(e.into()),
        }
    }
    input.close();

    let elapsed = start.elapsed().as_secs_f64();
    println!();
    println!(
        "Read {} frames in {:.2}s ({:.1} fps)",
        delivered,
        elapsed,
        if elapsed > 0.0 { delivered as f64 / elapsed } else { 0.0 }
    );
    if let Some(recorder) = recorder {
        let frames = recorder.finish()?;
        println!("Recorded {} frames", frames);
    }
    Ok(())
}

/// Save a frame as PNG, converting formats PNG cannot hold to RGBA
fn save_png(
    path: &Path,
    frame: &[u8],
    format: PixelFormat,
    width: u32,
    height: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let color = match format {
        PixelFormat::GRAY8 => Some(image::ColorType::L8),
        PixelFormat::RGB24 => Some(image::ColorType::Rgb8),
        PixelFormat::RGBA32 => Some(image::ColorType::Rgba8),
        _ => None,
    };
    match color {
        Some(color) => image::save_buffer(path, frame, width, height, color)?,
        None => {
            let mut rgba = vec![0u8; PixelFormat::RGBA32.try_frame_size(width, height)?];
            convert_frame(frame, format, &mut rgba, PixelFormat::RGBA32, width, height)?;
            image::save_buffer(path, &rgba, width, height, image::ColorType::Rgba8)?;
        }
    }
    Ok(())
}
