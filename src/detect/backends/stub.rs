use anyhow::Result;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::RawDetection;
use crate::frame::Frame;

/// Sample every Nth byte when computing the scene signature.
const SAMPLE_STRIDE: usize = 97;

/// Stub backend for demos and tests.
///
/// Tracks a coarse scene signature (quantized mean brightness). When the
/// scene changes between two frames it reports one centered box of the
/// configured class; steady scenes report nothing.
pub struct StubBackend {
    class_id: usize,
    last_signature: Option<u8>,
}

impl StubBackend {
    pub fn new(class_id: usize) -> Self {
        Self {
            class_id,
            last_signature: None,
        }
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new(0)
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<RawDetection>> {
        let signature = scene_signature(frame.pixels());
        let changed = self.last_signature.is_some_and(|prev| prev != signature);
        self.last_signature = Some(signature);

        if !changed {
            return Ok(Vec::new());
        }
        let w = frame.width() as f32;
        let h = frame.height() as f32;
        Ok(vec![RawDetection::new(
            w * 0.25,
            h * 0.25,
            w * 0.75,
            h * 0.75,
            self.class_id,
            0.85,
        )])
    }
}

fn scene_signature(pixels: &[u8]) -> u8 {
    let (sum, count) = pixels
        .iter()
        .step_by(SAMPLE_STRIDE)
        .fold((0u64, 0u64), |(sum, count), &p| (sum + p as u64, count + 1));
    if count == 0 {
        return 0;
    }
    ((sum / count) / 8) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(seq: u64, value: u8) -> Frame {
        Frame::from_rgb(seq, 40, 20, vec![value; 40 * 20 * 3]).unwrap()
    }

    #[test]
    fn stub_backend_reports_scene_changes() {
        let mut backend = StubBackend::new(2);

        assert!(backend.detect(&solid(1, 40)).unwrap().is_empty());
        assert!(backend.detect(&solid(2, 41)).unwrap().is_empty(), "same bucket");

        let changed = backend.detect(&solid(3, 120)).unwrap();
        assert_eq!(changed.len(), 1);
        assert_eq!(changed[0].class_id, 2);
        assert_eq!(changed[0].x1, 10.0);
        assert_eq!(changed[0].y2, 15.0);

        assert!(backend.detect(&solid(4, 120)).unwrap().is_empty());
    }
}
