//! Local video file source.
//!
//! Reads frames from a local file in order and reports end of stream once
//! the file is exhausted. Remote URLs are refused.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use image::RgbImage;

#[cfg(feature = "file-ffmpeg")]
use super::file_ffmpeg::FfmpegFileSource;
use super::synthetic::SyntheticSource;
use super::{is_stub_uri, SourceSettings, SourceStats};

pub struct FileSource {
    path: PathBuf,
    backend: FileBackend,
}

enum FileBackend {
    Synthetic(SyntheticSource),
    #[cfg(feature = "file-ffmpeg")]
    Ffmpeg(FfmpegFileSource),
}

impl FileSource {
    pub fn open(path: &Path, settings: &SourceSettings) -> Result<Self> {
        let text = path.to_string_lossy();
        if !is_local_file_path(&text) {
            return Err(anyhow!(
                "file source only supports local paths (no URL schemes): {}",
                text
            ));
        }
        let backend = if is_stub_uri(&text) {
            FileBackend::Synthetic(SyntheticSource::from_uri(&text, settings)?)
        } else {
            if !path.is_file() {
                return Err(anyhow!("video file {} does not exist", path.display()));
            }
            open_decoder(path)?
        };
        log::info!("FileSource: opened {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
            backend,
        })
    }

    /// Next decoded frame, `None` at end of file.
    pub fn read(&mut self) -> Result<Option<RgbImage>> {
        match &mut self.backend {
            FileBackend::Synthetic(source) => source.next_frame(),
            #[cfg(feature = "file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.next_frame(),
        }
    }

    pub fn stats(&self) -> SourceStats {
        let frames_read = match &self.backend {
            FileBackend::Synthetic(source) => source.frames_read(),
            #[cfg(feature = "file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.frames_read(),
        };
        SourceStats {
            frames_read,
            description: self.path.display().to_string(),
        }
    }
}

#[cfg(feature = "file-ffmpeg")]
fn open_decoder(path: &Path) -> Result<FileBackend> {
    Ok(FileBackend::Ffmpeg(FfmpegFileSource::open(path)?))
}

#[cfg(not(feature = "file-ffmpeg"))]
fn open_decoder(path: &Path) -> Result<FileBackend> {
    Err(anyhow!(
        "cannot decode {}: built without the file-ffmpeg feature",
        path.display()
    ))
}

fn is_local_file_path(path: &str) -> bool {
    if path.trim().is_empty() {
        return false;
    }
    if is_stub_uri(path) {
        return true;
    }
    !path.contains("://")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_remote_urls() {
        let settings = SourceSettings::default();
        assert!(FileSource::open(Path::new("rtsp://camera.local/stream"), &settings).is_err());
        assert!(FileSource::open(Path::new("https://example.com/clip.mp4"), &settings).is_err());
        assert!(FileSource::open(Path::new(""), &settings).is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.mp4");
        assert!(FileSource::open(&missing, &SourceSettings::default()).is_err());
    }

    #[test]
    fn stub_clip_reads_to_end() -> Result<()> {
        let mut source = FileSource::open(
            Path::new("stub://clip?frames=3&width=16&height=8"),
            &SourceSettings::default(),
        )?;
        let mut count = 0;
        while source.read()?.is_some() {
            count += 1;
        }
        assert_eq!(count, 3);
        assert_eq!(source.stats().frames_read, 3);
        Ok(())
    }
}
