use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};

use crate::detect::backend::DetectorBackend;
use crate::detect::result::RawDetection;
use crate::frame::Frame;

/// One scripted answer.
#[derive(Clone, Debug)]
pub enum ScriptedReply {
    Boxes(Vec<RawDetection>),
    Fail(String),
    /// Sleep before answering with the boxes.
    Slow(Duration, Vec<RawDetection>),
    /// Panic inside the backend call.
    Panic(String),
}

/// Replays queued replies in order, then keeps answering with the fallback
/// (no detections unless set).
///
/// The call counter is shared so callers can observe how often the detector
/// ran after handing the backend to a worker thread.
pub struct ScriptedBackend {
    replies: VecDeque<ScriptedReply>,
    fallback: Vec<RawDetection>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self {
            replies: VecDeque::new(),
            fallback: Vec::new(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Answer every call with the same boxes.
    pub fn always(boxes: Vec<RawDetection>) -> Self {
        Self {
            fallback: boxes,
            ..Self::new()
        }
    }

    pub fn then(mut self, reply: ScriptedReply) -> Self {
        self.replies.push_back(reply);
        self
    }

    pub fn then_boxes(self, boxes: Vec<RawDetection>) -> Self {
        self.then(ScriptedReply::Boxes(boxes))
    }

    pub fn then_fail(self, message: &str) -> Self {
        self.then(ScriptedReply::Fail(message.to_string()))
    }

    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn detect(&mut self, _frame: &Frame) -> Result<Vec<RawDetection>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.replies.pop_front() {
            None => Ok(self.fallback.clone()),
            Some(ScriptedReply::Boxes(boxes)) => Ok(boxes),
            Some(ScriptedReply::Fail(message)) => Err(anyhow!(message)),
            Some(ScriptedReply::Slow(delay, boxes)) => {
                std::thread::sleep(delay);
                Ok(boxes)
            }
            Some(ScriptedReply::Panic(message)) => panic!("{}", message),
        }
    }
}
