use anyhow::Result;

use crate::detect::result::RawDetection;
use crate::frame::Frame;

/// Object detector boundary.
///
/// Given one normalized frame, a backend returns zero or more raw tuples
/// `(x1, y1, x2, y2, class_id, confidence)` in frame pixel coordinates. Class
/// ids are resolved against the vocabulary by the caller. Backends must not
/// keep the frame beyond the call.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on a frame.
    fn detect(&mut self, frame: &Frame) -> Result<Vec<RawDetection>>;

    /// Optional warm-up hook, run once on the worker thread before the first
    /// frame.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}

impl DetectorBackend for Box<dyn DetectorBackend> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<RawDetection>> {
        (**self).detect(frame)
    }

    fn warm_up(&mut self) -> Result<()> {
        (**self).warm_up()
    }
}
