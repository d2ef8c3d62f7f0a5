//! Live camera source.
//!
//! `stub://` devices are synthetic; anything else is opened as a V4L2 device
//! node when built with the camera-v4l2 feature.

use anyhow::{anyhow, Result};
use image::RgbImage;

use super::synthetic::SyntheticSource;
#[cfg(feature = "camera-v4l2")]
use super::v4l2::DeviceCamera;
use super::{is_stub_uri, SourceSettings, SourceStats};

pub struct CameraSource {
    device: String,
    backend: CameraBackend,
}

enum CameraBackend {
    Synthetic(SyntheticSource),
    #[cfg(feature = "camera-v4l2")]
    Device(DeviceCamera),
}

impl CameraSource {
    pub fn open(device: &str, settings: &SourceSettings) -> Result<Self> {
        if device.trim().is_empty() {
            return Err(anyhow!("camera device path is empty"));
        }
        let backend = if is_stub_uri(device) {
            CameraBackend::Synthetic(SyntheticSource::from_uri(device, settings)?)
        } else {
            open_device(device, settings)?
        };
        Ok(Self {
            device: device.to_string(),
            backend,
        })
    }

    /// Next captured frame. Synthetic cameras may be finite; real devices
    /// only end by error.
    pub fn read(&mut self) -> Result<Option<RgbImage>> {
        match &mut self.backend {
            CameraBackend::Synthetic(source) => source.next_frame(),
            #[cfg(feature = "camera-v4l2")]
            CameraBackend::Device(source) => source.next_frame().map(Some),
        }
    }

    pub fn stats(&self) -> SourceStats {
        let frames_read = match &self.backend {
            CameraBackend::Synthetic(source) => source.frames_read(),
            #[cfg(feature = "camera-v4l2")]
            CameraBackend::Device(source) => source.frames_read(),
        };
        SourceStats {
            frames_read,
            description: self.device.clone(),
        }
    }
}

#[cfg(feature = "camera-v4l2")]
fn open_device(device: &str, settings: &SourceSettings) -> Result<CameraBackend> {
    Ok(CameraBackend::Device(DeviceCamera::open(device, settings)?))
}

#[cfg(not(feature = "camera-v4l2"))]
fn open_device(device: &str, _settings: &SourceSettings) -> Result<CameraBackend> {
    Err(anyhow!(
        "cannot open camera {}: built without the camera-v4l2 feature",
        device
    ))
}
