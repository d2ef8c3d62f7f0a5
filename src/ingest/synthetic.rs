//! Synthetic `stub://` sources for tests and demos.
//!
//! URI form: `stub://<name>?frames=N&width=W&height=H&scene=P`
//! - `frames`: end of stream after N frames (default: endless)
//! - `width`/`height`: frame size (default: the capture settings)
//! - `scene`: frames per simulated scene (default 50)
//!
//! Every frame is a flat gray level chosen by the current scene, with the
//! frame index written little-endian into the first eight bytes, so frames
//! are distinguishable while the scene stays steady.

use anyhow::{anyhow, Context, Result};
use image::RgbImage;
use url::Url;

use super::SourceSettings;

const DEFAULT_SCENE_FRAMES: u64 = 50;
/// Gray levels sit in the middle of 8-wide brightness buckets.
const SCENE_LEVELS: [u8; 4] = [44, 92, 140, 188];

pub(crate) struct SyntheticSource {
    uri: String,
    width: u32,
    height: u32,
    limit: Option<u64>,
    scene_frames: u64,
    frame_count: u64,
}

impl SyntheticSource {
    pub(crate) fn from_uri(uri: &str, settings: &SourceSettings) -> Result<Self> {
        let parsed = Url::parse(uri).with_context(|| format!("invalid stub uri {}", uri))?;
        let mut source = Self {
            uri: uri.to_string(),
            width: settings.width,
            height: settings.height,
            limit: None,
            scene_frames: DEFAULT_SCENE_FRAMES,
            frame_count: 0,
        };
        for (key, value) in parsed.query_pairs() {
            let number: u64 = value
                .parse()
                .map_err(|_| anyhow!("stub uri {}: {} must be a number", uri, key))?;
            match key.as_ref() {
                "frames" => source.limit = Some(number),
                "width" => source.width = to_dimension(uri, "width", number)?,
                "height" => source.height = to_dimension(uri, "height", number)?,
                "scene" => source.scene_frames = number.max(1),
                other => return Err(anyhow!("stub uri {}: unknown parameter {}", uri, other)),
            }
        }
        log::info!(
            "synthetic source {} ({}x{}, {})",
            source.uri,
            source.width,
            source.height,
            source
                .limit
                .map(|n| format!("{} frames", n))
                .unwrap_or_else(|| "endless".to_string())
        );
        Ok(source)
    }

    pub(crate) fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        if self.limit.is_some_and(|limit| self.frame_count >= limit) {
            return Ok(None);
        }
        self.frame_count += 1;

        let scene = (self.frame_count - 1) / self.scene_frames;
        let level = SCENE_LEVELS[(scene % SCENE_LEVELS.len() as u64) as usize];
        let mut pixels = vec![level; (self.width as usize) * (self.height as usize) * 3];
        let marker = self.frame_count.to_le_bytes();
        let n = marker.len().min(pixels.len());
        pixels[..n].copy_from_slice(&marker[..n]);

        RgbImage::from_raw(self.width, self.height, pixels)
            .map(Some)
            .ok_or_else(|| anyhow!("synthetic frame buffer size mismatch"))
    }

    pub(crate) fn frames_read(&self) -> u64 {
        self.frame_count
    }
}

fn to_dimension(uri: &str, key: &str, value: u64) -> Result<u32> {
    u32::try_from(value)
        .ok()
        .filter(|v| *v > 0)
        .ok_or_else(|| anyhow!("stub uri {}: {} must be between 1 and {}", uri, key, u32::MAX))
}
