//! Side-effect channels: the detection log and outbound notifications.
//!
//! Both channels are fail-soft. Implementations report delivery problems as
//! `SinkError` and the pipeline records them in the tick outcome.

mod csv;
mod memory;
mod notify;
mod sqlite;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::config::{LogKind, LogSettings, NotifyKind, NotifySettings};
use crate::error::SinkError;

pub use self::csv::CsvLogSink;
pub use memory::{MemoryLogSink, MemoryNotifier};
#[cfg(feature = "notify-pushbullet")]
pub use notify::PushbulletNotifier;
pub use notify::{LogNotifier, MqttNotifier, NullNotifier};
pub use sqlite::SqliteLogSink;

/// One allowed detection event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionRecord {
    /// Local time, `YYYY-MM-DD HH:MM:SS`.
    pub timestamp: String,
    pub class_name: String,
}

impl DetectionRecord {
    pub fn new(timestamp: impl Into<String>, class_name: impl Into<String>) -> Self {
        Self {
            timestamp: timestamp.into(),
            class_name: class_name.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
}

impl Notification {
    pub fn for_detection(record: &DetectionRecord) -> Self {
        Self {
            title: format!("Object Detected: {}", record.class_name),
            body: format!(
                "At {}, {} was detected.",
                record.timestamp, record.class_name
            ),
        }
    }
}

/// Append-only store of detection records.
pub trait LogSink: Send {
    fn name(&self) -> &'static str;

    fn append(&mut self, record: &DetectionRecord) -> Result<(), SinkError>;
}

/// Outbound alert channel.
pub trait NotificationSink: Send {
    fn name(&self) -> &'static str;

    fn notify(&mut self, notification: &Notification) -> Result<(), SinkError>;
}

impl<S: LogSink + ?Sized> LogSink for Box<S> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn append(&mut self, record: &DetectionRecord) -> Result<(), SinkError> {
        (**self).append(record)
    }
}

impl<N: NotificationSink + ?Sized> NotificationSink for Box<N> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn notify(&mut self, notification: &Notification) -> Result<(), SinkError> {
        (**self).notify(notification)
    }
}

/// Open the configured detection log.
pub fn open_log_sink(settings: &LogSettings) -> Result<Box<dyn LogSink>> {
    let sink: Box<dyn LogSink> = match settings.kind {
        LogKind::Csv => Box::new(CsvLogSink::open(&settings.path)?),
        LogKind::Sqlite => Box::new(SqliteLogSink::open(&settings.path)?),
    };
    log::info!(
        "detection log: {} ({})",
        settings.path.display(),
        sink.name()
    );
    Ok(sink)
}

/// Connect the configured notification channel.
pub fn open_notifier(settings: &NotifySettings) -> Result<Box<dyn NotificationSink>> {
    let notifier: Box<dyn NotificationSink> = match settings.kind {
        NotifyKind::None => Box::new(NullNotifier),
        NotifyKind::Log => Box::new(LogNotifier),
        #[cfg(feature = "notify-pushbullet")]
        NotifyKind::Pushbullet => {
            let key = settings
                .pushbullet_api_key
                .clone()
                .ok_or_else(|| anyhow::anyhow!("pushbullet notifications require PUSHBULLET_API_KEY"))?;
            Box::new(PushbulletNotifier::new(key))
        }
        #[cfg(not(feature = "notify-pushbullet"))]
        NotifyKind::Pushbullet => {
            return Err(anyhow::anyhow!(
                "pushbullet notifications require the notify-pushbullet feature"
            ))
        }
        NotifyKind::Mqtt => Box::new(MqttNotifier::connect(
            &settings.broker,
            &settings.client_id,
            &settings.topic,
        )?),
    };
    log::info!("notifications: {}", notifier.name());
    Ok(notifier)
}
