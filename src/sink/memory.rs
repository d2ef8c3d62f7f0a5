use std::sync::{Arc, Mutex};

use super::{DetectionRecord, LogSink, Notification, NotificationSink};
use crate::error::SinkError;

/// In-memory log sink. Clones share the same records; `failing` makes every
/// append fail.
#[derive(Clone, Debug, Default)]
pub struct MemoryLogSink {
    records: Arc<Mutex<Vec<DetectionRecord>>>,
    failing: Arc<Mutex<bool>>,
}

impl MemoryLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<DetectionRecord> {
        self.records
            .lock()
            .map(|r| r.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    pub fn set_failing(&self, failing: bool) {
        if let Ok(mut guard) = self.failing.lock() {
            *guard = failing;
        }
    }

    fn is_failing(&self) -> bool {
        self.failing.lock().map(|g| *g).unwrap_or(true)
    }
}

impl LogSink for MemoryLogSink {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn append(&mut self, record: &DetectionRecord) -> Result<(), SinkError> {
        if self.is_failing() {
            return Err(SinkError::log("memory", "sink unavailable"));
        }
        self.records
            .lock()
            .map_err(|_| SinkError::log("memory", "lock poisoned"))?
            .push(record.clone());
        Ok(())
    }
}

/// In-memory notification channel, shared between clones.
#[derive(Clone, Debug, Default)]
pub struct MemoryNotifier {
    sent: Arc<Mutex<Vec<Notification>>>,
    failing: Arc<Mutex<bool>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent
            .lock()
            .map(|s| s.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    pub fn set_failing(&self, failing: bool) {
        if let Ok(mut guard) = self.failing.lock() {
            *guard = failing;
        }
    }
}

impl NotificationSink for MemoryNotifier {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn notify(&mut self, notification: &Notification) -> Result<(), SinkError> {
        if self.failing.lock().map(|g| *g).unwrap_or(true) {
            return Err(SinkError::notify("memory", "channel unavailable"));
        }
        self.sent
            .lock()
            .map_err(|_| SinkError::notify("memory", "lock poisoned"))?
            .push(notification.clone());
        Ok(())
    }
}
