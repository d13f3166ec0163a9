// SPDX-License-Identifier: MIT OR Apache-2.0
//! Footage references and decoded media buffers.

use crate::value::Color;
use reel_time::Rational;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::UNIX_EPOCH;

/// Kind of stream inside a footage file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StreamKind {
    /// Moving pictures
    Video,
    /// A single still image
    Image,
    /// Audio samples
    Audio,
}

/// One stream of a footage file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stream {
    /// Index of the stream inside its file
    pub index: usize,
    /// Stream kind
    pub kind: StreamKind,
    /// Time base of the stream's timestamps
    pub timebase: Rational,
    /// First timestamp of the stream, in `timebase` units
    pub start_time: i64,
    /// Color space name used when decoding pictures
    pub colorspace: String,
    /// Whether picture alpha is already premultiplied
    pub premultiplied_alpha: bool,
}

impl Stream {
    /// Create a stream with default picture settings
    pub fn new(index: usize, kind: StreamKind, timebase: Rational) -> Self {
        Self {
            index,
            kind,
            timebase,
            start_time: 0,
            colorspace: String::from("sRGB"),
            premultiplied_alpha: false,
        }
    }

    /// Whether this stream produces pictures
    pub fn is_picture(&self) -> bool {
        matches!(self.kind, StreamKind::Video | StreamKind::Image)
    }
}

/// A media file on disk and the streams it contains
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Footage {
    /// Path of the file
    pub filename: PathBuf,
    /// Last-modified time in seconds since the Unix epoch
    pub timestamp: i64,
    /// Streams in file order
    pub streams: Vec<Stream>,
}

impl Footage {
    /// Create a footage description
    pub fn new(filename: impl Into<PathBuf>, timestamp: i64, streams: Vec<Stream>) -> Self {
        Self {
            filename: filename.into(),
            timestamp,
            streams,
        }
    }

    /// Describe a file on disk, reading its modification time
    pub fn from_path(path: &Path, streams: Vec<Stream>) -> std::io::Result<Self> {
        let modified = std::fs::metadata(path)?.modified()?;
        let timestamp = modified
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or_default();
        Ok(Self::new(path, timestamp, streams))
    }

    /// Get a stream by index
    pub fn stream(&self, index: usize) -> Option<&Stream> {
        self.streams.iter().find(|s| s.index == index)
    }
}

/// Reference to a single stream of a shared footage description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamRef {
    /// The footage file
    pub footage: Arc<Footage>,
    /// Index of the referenced stream
    pub index: usize,
}

impl StreamRef {
    /// Create a stream reference
    pub fn new(footage: Arc<Footage>, index: usize) -> Self {
        Self { footage, index }
    }

    /// Resolve the referenced stream
    pub fn stream(&self) -> Option<&Stream> {
        self.footage.stream(self.index)
    }
}

/// Output picture size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VideoParams {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl Default for VideoParams {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
        }
    }
}

/// Decoded RGBA picture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    width: u32,
    height: u32,
    pixels: Vec<Color>,
}

impl Frame {
    /// Create a fully transparent frame
    pub fn new(width: u32, height: u32) -> Self {
        Self::filled(width, height, Color::new(0.0, 0.0, 0.0, 0.0))
    }

    /// Create a frame with every pixel set to `color`
    pub fn filled(width: u32, height: u32, color: Color) -> Self {
        Self {
            width,
            height,
            pixels: vec![color; width as usize * height as usize],
        }
    }

    /// Build a frame from row-major pixels, `None` if the count is wrong
    pub fn from_pixels(width: u32, height: u32, pixels: Vec<Color>) -> Option<Self> {
        (pixels.len() == width as usize * height as usize).then_some(Self {
            width,
            height,
            pixels,
        })
    }

    /// Width in pixels
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Pixel at a coordinate
    pub fn pixel(&self, x: u32, y: u32) -> Option<Color> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels.get(y as usize * self.width as usize + x as usize).copied()
    }

    /// Row-major pixels
    pub fn pixels(&self) -> &[Color] {
        &self.pixels
    }

    /// Mutable row-major pixels
    pub fn pixels_mut(&mut self) -> &mut [Color] {
        &mut self.pixels
    }

    /// Fill every pixel with `color`
    pub fn fill(&mut self, color: Color) {
        self.pixels.fill(color);
    }
}

/// Decoded planar audio
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleBuffer {
    sample_rate: u32,
    channels: Vec<Vec<f32>>,
}

impl SampleBuffer {
    /// Create a silent buffer
    pub fn silence(sample_rate: u32, channel_count: usize, sample_count: usize) -> Self {
        Self {
            sample_rate,
            channels: vec![vec![0.0; sample_count]; channel_count],
        }
    }

    /// Build from planar channel data, `None` if channel lengths differ
    pub fn from_channels(sample_rate: u32, channels: Vec<Vec<f32>>) -> Option<Self> {
        let len = channels.first().map_or(0, Vec::len);
        channels
            .iter()
            .all(|c| c.len() == len)
            .then_some(Self {
                sample_rate,
                channels,
            })
    }

    /// Samples per second
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of channels
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Samples per channel
    pub fn sample_count(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    /// Samples of one channel
    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    /// Mutable samples of one channel
    pub fn channel_mut(&mut self, index: usize) -> Option<&mut [f32]> {
        self.channels.get_mut(index).map(Vec::as_mut_slice)
    }
}
