//! Capture session lifecycle.
//!
//! A session is Stopped, Running or Paused. It owns at most one open frame
//! source and stamps every frame it hands out with a sequence number that
//! keeps increasing across source switches.

use std::fmt;

use crate::error::CaptureError;
use crate::frame::Frame;
use crate::ingest::{FrameSource, SourceSettings, SourceSpec};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Stopped,
    Running,
    Paused,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SessionState::Stopped => "stopped",
            SessionState::Running => "running",
            SessionState::Paused => "paused",
        };
        f.write_str(label)
    }
}

pub struct CaptureSession {
    settings: SourceSettings,
    state: SessionState,
    source: Option<FrameSource>,
    spec: Option<SourceSpec>,
    next_seq: u64,
    exhausted: bool,
    read_error: Option<CaptureError>,
}

impl CaptureSession {
    pub fn new(settings: SourceSettings) -> Self {
        Self {
            settings,
            state: SessionState::Stopped,
            source: None,
            spec: None,
            next_seq: 0,
            exhausted: false,
            read_error: None,
        }
    }

    /// Release any held source, then open `spec` and start running.
    pub fn start(&mut self, spec: SourceSpec) -> Result<(), CaptureError> {
        self.stop();
        let source = FrameSource::open(&spec, &self.settings).map_err(|err| {
            CaptureError::Resource {
                source_name: spec.to_string(),
                message: format!("{:#}", err),
            }
        })?;
        log::info!("capture started: {}", spec);
        self.source = Some(source);
        self.spec = Some(spec);
        self.state = SessionState::Running;
        Ok(())
    }

    /// Release the source. No-op when already stopped.
    pub fn stop(&mut self) {
        if let Some(source) = self.source.take() {
            let stats = source.stats();
            drop(source);
            log::info!(
                "capture stopped: {} ({} frames read)",
                stats.description,
                stats.frames_read
            );
        }
        self.spec = None;
        self.exhausted = false;
        self.read_error = None;
        self.state = SessionState::Stopped;
    }

    /// Running -> Paused. Returns whether the state changed.
    pub fn pause(&mut self) -> bool {
        if self.state == SessionState::Running {
            self.state = SessionState::Paused;
            true
        } else {
            false
        }
    }

    /// Paused -> Running. Returns whether the state changed.
    pub fn resume(&mut self) -> bool {
        if self.state == SessionState::Paused {
            self.state = SessionState::Running;
            true
        } else {
            false
        }
    }

    /// Flip between Running and Paused; returns the new state.
    pub fn toggle_pause(&mut self) -> SessionState {
        if !self.pause() {
            self.resume();
        }
        self.state
    }

    /// Next frame from the source, only while Running. End of stream and
    /// read failures leave the session Running but exhausted.
    pub fn next_frame(&mut self) -> Option<Frame> {
        if self.state != SessionState::Running || self.exhausted {
            return None;
        }
        let source = self.source.as_mut()?;
        match source.read() {
            Ok(Some(image)) => {
                let frame = Frame::new(self.next_seq, image);
                self.next_seq += 1;
                Some(frame)
            }
            Ok(None) => {
                log::info!("end of stream: {}", source.stats().description);
                self.exhausted = true;
                None
            }
            Err(err) => {
                let error = CaptureError::Read {
                    source_name: source.stats().description,
                    message: format!("{:#}", err),
                };
                log::warn!("{}", error);
                self.read_error = Some(error);
                self.exhausted = true;
                None
            }
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn source_spec(&self) -> Option<&SourceSpec> {
        self.spec.as_ref()
    }

    pub fn is_camera(&self) -> bool {
        self.source.as_ref().is_some_and(FrameSource::is_camera)
    }

    /// True once the current source reported end of stream or failed.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// The read failure that exhausted the source, reported once.
    pub fn take_read_error(&mut self) -> Option<CaptureError> {
        self.read_error.take()
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.stop();
    }
}
