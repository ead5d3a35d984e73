//! Writing rendered frames to image files, and choosing which frames to
//! write from the command line.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use image::{ImageBuffer, Rgba};
use thiserror::Error;
use tracing::info;

use crate::frame::FrameBuffer;

/// Which frames to write to disk, and where.
#[derive(Debug, Clone, Default)]
pub struct ScreenshotConfig {
    /// Capture is active.
    pub enabled: bool,
    /// Path template; `{}` is replaced by the frame number.
    pub output_pattern: String,
    /// Frame numbers to write.
    pub frames: HashSet<u64>,
    /// Ask the app to stop once the last listed frame is written.
    pub exit_after_capture: bool,
}

impl ScreenshotConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable capture into `pattern`.
    #[must_use]
    pub fn with_output(mut self, pattern: impl Into<String>) -> Self {
        self.enabled = true;
        self.output_pattern = pattern.into();
        self
    }

    /// Enable capture of `frames`.
    #[must_use]
    pub fn with_frames(mut self, frames: impl IntoIterator<Item = u64>) -> Self {
        self.enabled = true;
        self.frames.extend(frames);
        self
    }

    #[must_use]
    pub const fn with_exit_after(mut self, exit: bool) -> Self {
        self.exit_after_capture = exit;
        self
    }

    /// File path for `frame`.
    pub fn output_path(&self, frame: u64) -> PathBuf {
        PathBuf::from(self.output_pattern.replace("{}", &frame.to_string()))
    }

    /// Whether `frame` is one to write.
    pub fn should_capture(&self, frame: u64) -> bool {
        self.enabled && self.frames.contains(&frame)
    }

    /// Whether every listed frame lies before `current_frame`.
    pub fn all_captured(&self, current_frame: u64) -> bool {
        self.enabled
            && self
                .frames
                .iter()
                .max()
                .is_some_and(|&last| current_frame > last)
    }

    /// Read capture flags from the process arguments.
    ///
    /// - `-S`, `--screenshot`: enable capture
    /// - `-o`, `--output <PATTERN>`: path template
    /// - `-f`, `--frames <FRAMES>`: frame list such as `0,5,10-15`
    /// - `--exit-after`: stop after the last listed frame
    pub fn from_args() -> Self {
        let args: Vec<String> = std::env::args().collect();
        Self::parse_args(&args)
    }

    /// Parse capture flags. `args[0]` is the program name; other flags are
    /// skipped.
    pub fn parse_args(args: &[String]) -> Self {
        let mut config = Self::default();

        let mut rest = args.iter().skip(1).map(String::as_str);
        while let Some(flag) = rest.next() {
            match flag {
                "-S" | "--screenshot" => config.enabled = true,
                "--exit-after" => config.exit_after_capture = true,
                "-o" | "--output" => {
                    if let Some(pattern) = rest.next() {
                        config.output_pattern = pattern.to_string();
                    }
                }
                "-f" | "--frames" => {
                    if let Some(frames) = rest.next() {
                        config.frames = parse_frame_indices(frames);
                    }
                }
                _ => {}
            }
        }

        if config.enabled {
            if config.output_pattern.is_empty() {
                config.output_pattern = "screenshot_{}.png".to_string();
            }
            if config.frames.is_empty() {
                config.frames.insert(0);
            }
        }
        config
    }
}

/// Parse a frame list like `0,5,10-15,20`. Ranges are inclusive and
/// malformed parts are ignored.
pub fn parse_frame_indices(s: &str) -> HashSet<u64> {
    let mut frames = HashSet::new();
    for part in s.split(',').map(str::trim) {
        match part.split_once('-') {
            Some((start, end)) => {
                if let (Ok(start), Ok(end)) =
                    (start.trim().parse::<u64>(), end.trim().parse::<u64>())
                {
                    frames.extend(start..=end);
                }
            }
            None => {
                if let Ok(frame) = part.parse() {
                    frames.insert(frame);
                }
            }
        }
    }
    frames
}

/// Write tightly packed RGBA8 pixels to `path`. The image format follows
/// the file extension.
pub fn save_screenshot(
    data: Vec<u8>,
    width: u32,
    height: u32,
    path: impl AsRef<Path>,
) -> Result<(), ScreenshotError> {
    let path = path.as_ref();

    let image = ImageBuffer::<Rgba<u8>, _>::from_raw(width, height, data)
        .ok_or(ScreenshotError::InvalidImageData)?;
    image.save(path)?;

    info!("Screenshot saved: {}", path.display());
    Ok(())
}

/// Write a frame buffer to `path`.
pub fn save_frame(frame: &FrameBuffer, path: impl AsRef<Path>) -> Result<(), ScreenshotError> {
    save_screenshot(frame.to_rgba8(), frame.width(), frame.height(), path)
}

/// Screenshot failures.
#[derive(Debug, Error)]
pub enum ScreenshotError {
    /// Buffer length does not match the dimensions.
    #[error("Pixel buffer does not match image size")]
    InvalidImageData,
    /// Encoding or writing failed.
    #[error("Failed to save screenshot: {0}")]
    SaveFailed(#[from] image::ImageError),
}
