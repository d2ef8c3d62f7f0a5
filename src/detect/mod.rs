mod backend;
mod backends;
mod result;
mod timed;

use anyhow::Result;

pub use backend::DetectorBackend;
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use backends::{ScriptedBackend, ScriptedReply, StubBackend};
pub use result::{resolve, DetectedBox, RawDetection};
pub use timed::TimedDetector;

use crate::config::{DetectorKind, DetectorSettings};

/// Build the configured backend.
pub fn build_backend(settings: &DetectorSettings) -> Result<Box<dyn DetectorBackend>> {
    match settings.backend {
        DetectorKind::Stub => Ok(Box::new(StubBackend::new(settings.stub_class_id))),
        #[cfg(feature = "backend-tract")]
        DetectorKind::Tract => {
            let model_path = settings
                .model_path
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("tract detector requires detector.model_path"))?;
            let backend = TractBackend::new(model_path, settings.input_size, settings.input_size)?
                .with_thresholds(settings.confidence, settings.iou);
            Ok(Box::new(backend))
        }
        #[cfg(not(feature = "backend-tract"))]
        DetectorKind::Tract => Err(anyhow::anyhow!(
            "tract detector requires the backend-tract feature"
        )),
    }
}
