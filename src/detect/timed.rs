//! Detector invocation with a deadline.
//!
//! The backend lives on a dedicated worker thread. Each call hands the frame
//! over a single-slot channel and waits for the answer with `recv_timeout`.
//! A call that misses its deadline is abandoned, not interrupted: until the
//! worker finishes it, later calls fail fast with `DetectorError::Busy`
//! instead of queueing frames behind it.

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TryRecvError};
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{anyhow, Result};

use crate::detect::backend::DetectorBackend;
use crate::detect::result::RawDetection;
use crate::error::DetectorError;
use crate::frame::Frame;

pub const DEFAULT_DETECT_TIMEOUT: Duration = Duration::from_millis(2_000);

type Reply = (Frame, Result<Vec<RawDetection>>);

pub struct TimedDetector {
    name: &'static str,
    timeout: Duration,
    requests: Option<SyncSender<Frame>>,
    replies: Receiver<Reply>,
    in_flight: bool,
    worker: Option<JoinHandle<()>>,
}

impl TimedDetector {
    pub fn new<B: DetectorBackend + 'static>(mut backend: B, timeout: Duration) -> std::io::Result<Self> {
        let name = backend.name();
        let (request_tx, request_rx) = mpsc::sync_channel::<Frame>(1);
        let (reply_tx, reply_rx) = mpsc::channel::<Reply>();

        let worker = std::thread::Builder::new()
            .name(format!("detector-{}", name))
            .spawn(move || {
                if let Err(e) = backend.warm_up() {
                    log::warn!("detector {} warm-up failed: {:#}", name, e);
                }
                while let Ok(frame) = request_rx.recv() {
                    let result = panic::catch_unwind(AssertUnwindSafe(|| backend.detect(&frame)))
                        .unwrap_or_else(|payload| {
                            let reason = panic_reason(payload.as_ref());
                            log::error!(
                                "detector {} panicked on frame {}: {}",
                                name,
                                frame.seq(),
                                reason
                            );
                            Err(anyhow!("detector panicked: {}", reason))
                        });
                    if reply_tx.send((frame, result)).is_err() {
                        break;
                    }
                }
                log::debug!("detector {} worker exiting", name);
            })?;

        Ok(Self {
            name,
            timeout,
            requests: Some(request_tx),
            replies: reply_rx,
            in_flight: false,
            worker: Some(worker),
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run the backend on `frame`. On success the frame is handed back along
    /// with the raw detections.
    pub fn detect(&mut self, frame: Frame) -> Result<(Frame, Vec<RawDetection>), DetectorError> {
        if self.in_flight {
            match self.replies.try_recv() {
                Ok((stale, _)) => {
                    log::debug!(
                        "discarding late detector answer for frame {}",
                        stale.seq()
                    );
                    self.in_flight = false;
                }
                Err(TryRecvError::Empty) => return Err(DetectorError::Busy),
                Err(TryRecvError::Disconnected) => return Err(DetectorError::WorkerGone),
            }
        }

        let requests = self.requests.as_ref().ok_or(DetectorError::WorkerGone)?;
        requests
            .send(frame)
            .map_err(|_| DetectorError::WorkerGone)?;
        self.in_flight = true;

        match self.replies.recv_timeout(self.timeout) {
            Ok((frame, result)) => {
                self.in_flight = false;
                let raw = result.map_err(DetectorError::Backend)?;
                Ok((frame, raw))
            }
            Err(RecvTimeoutError::Timeout) => Err(DetectorError::Timeout(self.timeout)),
            Err(RecvTimeoutError::Disconnected) => {
                self.in_flight = false;
                Err(DetectorError::WorkerGone)
            }
        }
    }
}

fn panic_reason(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl Drop for TimedDetector {
    fn drop(&mut self) {
        // Closing the request channel ends the worker loop.
        self.requests.take();
        if self.in_flight {
            // Never block shutdown on a hung backend.
            return;
        }
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::backends::{ScriptedBackend, ScriptedReply};

    fn frame(seq: u64) -> Frame {
        Frame::from_rgb(seq, 4, 4, vec![0u8; 48]).unwrap()
    }

    fn boxes() -> Vec<RawDetection> {
        vec![RawDetection::new(1.0, 1.0, 2.0, 2.0, 0, 0.5)]
    }

    #[test]
    fn answers_within_deadline_return_the_frame() {
        let mut detector =
            TimedDetector::new(ScriptedBackend::always(boxes()), Duration::from_secs(5)).unwrap();
        let (frame, raw) = detector.detect(frame(3)).unwrap();
        assert_eq!(frame.seq(), 3);
        assert_eq!(raw, boxes());
    }

    #[test]
    fn backend_errors_are_reported_per_frame() {
        let backend = ScriptedBackend::new().then_fail("tensor shape mismatch");
        let mut detector = TimedDetector::new(backend, Duration::from_secs(5)).unwrap();
        assert!(matches!(detector.detect(frame(1)), Err(DetectorError::Backend(_))));
        assert!(detector.detect(frame(2)).is_ok());
    }

    #[test]
    fn backend_panic_fails_one_frame_and_keeps_worker() {
        let backend = ScriptedBackend::always(boxes())
            .then(ScriptedReply::Panic("index out of range".into()));
        let mut detector = TimedDetector::new(backend, Duration::from_secs(5)).unwrap();

        match detector.detect(frame(1)) {
            Err(DetectorError::Backend(err)) => {
                assert!(err.to_string().contains("index out of range"));
            }
            other => panic!("expected backend error, got {:?}", other.map(|(f, _)| f.seq())),
        }
        let (frame, raw) = detector.detect(frame(2)).unwrap();
        assert_eq!(frame.seq(), 2);
        assert_eq!(raw, boxes());
    }

    #[test]
    fn slow_answers_time_out_then_recover() {
        let backend = ScriptedBackend::new().then(ScriptedReply::Slow(
            Duration::from_millis(300),
            boxes(),
        ));
        let mut detector = TimedDetector::new(backend, Duration::from_millis(50)).unwrap();

        assert!(matches!(detector.detect(frame(1)), Err(DetectorError::Timeout(_))));
        assert!(matches!(detector.detect(frame(2)), Err(DetectorError::Busy)));

        std::thread::sleep(Duration::from_millis(500));
        let (frame, raw) = detector.detect(frame(3)).unwrap();
        assert_eq!(frame.seq(), 3);
        assert!(raw.is_empty());
    }
}
