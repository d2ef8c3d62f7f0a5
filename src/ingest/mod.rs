//! Frame sources.
//!
//! - Cameras: `stub://` synthetic devices, V4L2 devices (feature: camera-v4l2)
//! - Local video files: `stub://` synthetic clips, FFmpeg decode (feature: file-ffmpeg)
//!
//! Sources hand out native-resolution RGB images; the capture session stamps
//! sequence numbers and the pipeline normalizes to the working resolution.
//! A source's `read` returns `Ok(None)` at end of stream. Dropping a source
//! releases the underlying device or file handle.

mod camera;
mod file;
#[cfg(feature = "file-ffmpeg")]
pub(crate) mod file_ffmpeg;
#[cfg(feature = "camera-v4l2")]
mod normalize;
mod synthetic;
#[cfg(feature = "camera-v4l2")]
pub(crate) mod v4l2;

use std::fmt;
use std::path::PathBuf;

use anyhow::Result;
use image::RgbImage;

pub use camera::CameraSource;
pub use file::FileSource;

/// What to capture from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceSpec {
    /// Camera device path (e.g. "/dev/video0") or a `stub://` URI.
    Camera(String),
    /// Local video file path or a `stub://` URI.
    File(PathBuf),
}

impl fmt::Display for SourceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceSpec::Camera(device) => write!(f, "camera {}", device),
            SourceSpec::File(path) => write!(f, "file {}", path.display()),
        }
    }
}

/// Capture parameters shared by every source kind.
#[derive(Clone, Debug)]
pub struct SourceSettings {
    /// Preferred capture width (cameras, synthetic sources).
    pub width: u32,
    /// Preferred capture height (cameras, synthetic sources).
    pub height: u32,
    /// Target frame rate requested from cameras.
    pub target_fps: u32,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            target_fps: 30,
        }
    }
}

/// Statistics for an open source.
#[derive(Clone, Debug)]
pub struct SourceStats {
    pub frames_read: u64,
    pub description: String,
}

/// An open camera or file.
pub struct FrameSource {
    kind: SourceKind,
}

enum SourceKind {
    Camera(CameraSource),
    File(FileSource),
}

impl FrameSource {
    pub fn open(spec: &SourceSpec, settings: &SourceSettings) -> Result<Self> {
        let kind = match spec {
            SourceSpec::Camera(device) => SourceKind::Camera(CameraSource::open(device, settings)?),
            SourceSpec::File(path) => SourceKind::File(FileSource::open(path, settings)?),
        };
        Ok(Self { kind })
    }

    /// Next image, or `None` once the stream is over.
    pub fn read(&mut self) -> Result<Option<RgbImage>> {
        match &mut self.kind {
            SourceKind::Camera(source) => source.read(),
            SourceKind::File(source) => source.read(),
        }
    }

    pub fn stats(&self) -> SourceStats {
        match &self.kind {
            SourceKind::Camera(source) => source.stats(),
            SourceKind::File(source) => source.stats(),
        }
    }

    pub fn is_camera(&self) -> bool {
        matches!(self.kind, SourceKind::Camera(_))
    }
}

pub(crate) fn is_stub_uri(value: &str) -> bool {
    value.starts_with("stub://")
}
