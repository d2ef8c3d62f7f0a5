//! Frames flowing from the capture session into the pipeline.
//!
//! - `Frame`: an RGB pixel buffer plus the sequence number assigned at capture.
//! - `annotate`: draws accepted boxes and the region outline for front-ends.
//!
//! A frame is owned by the pipeline for the duration of one tick and dropped
//! afterwards.

use anyhow::{anyhow, Result};
use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use sha2::{Digest, Sha256};

use crate::detect::DetectedBox;
use crate::region::Rect;

/// Working resolution every processed frame is normalized to.
pub const WORKING_WIDTH: u32 = 1020;
pub const WORKING_HEIGHT: u32 = 500;

const REGION_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const BOX_COLOR: Rgb<u8> = Rgb([0, 0, 255]);

#[derive(Clone, Debug)]
pub struct Frame {
    seq: u64,
    image: RgbImage,
}

impl Frame {
    pub fn new(seq: u64, image: RgbImage) -> Self {
        Self { seq, image }
    }

    /// Build a frame from packed RGB24 bytes.
    pub fn from_rgb(seq: u64, width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if pixels.len() != expected {
            return Err(anyhow!(
                "expected {} RGB bytes for {}x{}, received {}",
                expected,
                width,
                height,
                pixels.len()
            ));
        }
        let image = RgbImage::from_raw(width, height, pixels)
            .ok_or_else(|| anyhow!("pixel buffer does not match {}x{}", width, height))?;
        Ok(Self { seq, image })
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn pixels(&self) -> &[u8] {
        self.image.as_raw()
    }

    pub fn into_image(self) -> RgbImage {
        self.image
    }

    /// SHA-256 of the pixel data. Used to compare frames across sources.
    pub fn fingerprint(&self) -> [u8; 32] {
        Sha256::digest(self.image.as_raw()).into()
    }

    /// Resize to `width`x`height`, keeping the sequence number.
    ///
    /// Frames already at the target size are returned unchanged.
    pub fn normalized(self, width: u32, height: u32) -> Self {
        if self.image.width() == width && self.image.height() == height {
            return self;
        }
        let image = imageops::resize(&self.image, width, height, FilterType::Triangle);
        Self {
            seq: self.seq,
            image,
        }
    }
}

/// Draw the region outline and every accepted box onto a copy of the frame.
pub fn annotate(frame: &Frame, boxes: &[DetectedBox], region: Option<Rect>) -> RgbImage {
    let mut canvas = frame.image.clone();
    if let Some(rect) = region {
        draw_rect(
            &mut canvas,
            rect.top_left.x,
            rect.top_left.y,
            rect.bottom_right.x,
            rect.bottom_right.y,
            REGION_COLOR,
        );
    }
    for b in boxes {
        draw_rect(
            &mut canvas,
            b.top_left.x,
            b.top_left.y,
            b.bottom_right.x,
            b.bottom_right.y,
            BOX_COLOR,
        );
    }
    canvas
}

/// Two-pixel hollow rectangle, clipped to the canvas.
fn draw_rect(canvas: &mut RgbImage, x1: i32, y1: i32, x2: i32, y2: i32, color: Rgb<u8>) {
    let w = i64::from(canvas.width());
    let h = i64::from(canvas.height());
    let (x1, y1, x2, y2) = (i64::from(x1), i64::from(y1), i64::from(x2), i64::from(y2));
    let mut put = |x: i64, y: i64| {
        if x >= 0 && y >= 0 && x < w && y < h {
            canvas.put_pixel(x as u32, y as u32, color);
        }
    };
    // Only the visible part of each edge is walked.
    let (cx1, cx2) = (x1.max(0), x2.min(w - 1));
    let (cy1, cy2) = (y1.max(0), y2.min(h - 1));
    for t in 0..2 {
        for x in cx1..=cx2 {
            put(x, y1 + t);
            put(x, y2 - t);
        }
        for y in cy1..=cy2 {
            put(x1 + t, y);
            put(x2 - t, y);
        }
    }
}
