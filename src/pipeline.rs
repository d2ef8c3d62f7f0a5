//! Per-frame detection pipeline.
//!
//! One call to `process_tick` handles at most one frame: throttle, normalize,
//! detect, filter by class and region, then gate each surviving detection
//! through the log and notify limiters before touching the sinks.

use std::time::Duration;

use crate::classes::{ClassFilter, ClassVocabulary};
use crate::clock::{Clock, SystemClock};
use crate::config::WatchConfig;
use crate::detect::{resolve, DetectedBox, TimedDetector};
use crate::error::{DetectorError, SinkError};
use crate::frame::{Frame, WORKING_HEIGHT, WORKING_WIDTH};
use crate::limiter::{RateLimiter, DEFAULT_COOLDOWN};
use crate::region::RegionOfInterest;
use crate::sink::{DetectionRecord, LogSink, Notification, NotificationSink};

#[derive(Clone, Debug)]
pub struct PipelineSettings {
    /// Only every `skip_threshold`-th frame is processed.
    pub skip_threshold: u64,
    pub width: u32,
    pub height: u32,
    pub log_cooldown: Duration,
    pub notify_cooldown: Duration,
}

impl PipelineSettings {
    pub fn from_config(cfg: &WatchConfig) -> Self {
        Self {
            skip_threshold: cfg.capture.frame_skip,
            width: cfg.capture.width,
            height: cfg.capture.height,
            log_cooldown: cfg.log.cooldown,
            notify_cooldown: cfg.notify.cooldown,
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            skip_threshold: 3,
            width: WORKING_WIDTH,
            height: WORKING_HEIGHT,
            log_cooldown: DEFAULT_COOLDOWN,
            notify_cooldown: DEFAULT_COOLDOWN,
        }
    }
}

/// Result of one tick.
#[derive(Debug)]
pub enum PipelineOutcome {
    /// No frame was available.
    Idle,
    /// Dropped by the frame-skip throttle.
    Skipped { seq: u64 },
    Processed(ProcessedFrame),
    /// The detector failed for this frame; nothing was logged or sent.
    Failed { seq: u64, error: DetectorError },
}

#[derive(Debug)]
pub struct ProcessedFrame {
    /// The frame at working resolution.
    pub frame: Frame,
    /// Every box the detector reported.
    pub detections: Vec<DetectedBox>,
    /// Boxes that passed the class and region filters.
    pub accepted: Vec<DetectedBox>,
    /// Records written to the log sink.
    pub logged: Vec<DetectionRecord>,
    /// Notifications delivered.
    pub notified: Vec<Notification>,
    pub sink_errors: Vec<SinkError>,
}

pub struct DetectionFilterPipeline {
    settings: PipelineSettings,
    frames_seen: u64,
    detector: TimedDetector,
    vocabulary: ClassVocabulary,
    log_limiter: RateLimiter,
    notify_limiter: RateLimiter,
    log_sink: Box<dyn LogSink>,
    notifier: Box<dyn NotificationSink>,
    clock: Box<dyn Clock>,
}

impl DetectionFilterPipeline {
    pub fn new(
        settings: PipelineSettings,
        detector: TimedDetector,
        vocabulary: ClassVocabulary,
        log_sink: Box<dyn LogSink>,
        notifier: Box<dyn NotificationSink>,
    ) -> Self {
        let skip_threshold = settings.skip_threshold.max(1);
        Self {
            log_limiter: RateLimiter::new(settings.log_cooldown),
            notify_limiter: RateLimiter::new(settings.notify_cooldown),
            settings: PipelineSettings {
                skip_threshold,
                ..settings
            },
            frames_seen: 0,
            detector,
            vocabulary,
            log_sink,
            notifier,
            clock: Box::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn vocabulary(&self) -> &ClassVocabulary {
        &self.vocabulary
    }

    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }

    pub fn process_tick(
        &mut self,
        frame: Option<Frame>,
        class_filter: &ClassFilter,
        region: &RegionOfInterest,
    ) -> PipelineOutcome {
        let Some(frame) = frame else {
            return PipelineOutcome::Idle;
        };
        let seq = frame.seq();

        self.frames_seen += 1;
        if self.frames_seen % self.settings.skip_threshold != 0 {
            log::debug!("frame {} skipped", seq);
            return PipelineOutcome::Skipped { seq };
        }

        let frame = frame.normalized(self.settings.width, self.settings.height);
        log::debug!(
            "frame {} -> {} ({})",
            seq,
            self.detector.name(),
            hex::encode(&frame.fingerprint()[..8])
        );

        let (frame, detections) = match self
            .detector
            .detect(frame)
            .and_then(|(frame, raw)| Ok((frame, resolve(&raw, &self.vocabulary)?)))
        {
            Ok(result) => result,
            Err(error) => {
                log::warn!("frame {}: {}", seq, error);
                return PipelineOutcome::Failed { seq, error };
            }
        };

        let accepted: Vec<DetectedBox> = detections
            .iter()
            .filter(|b| class_filter.matches(&b.label))
            .filter(|b| region.contains_box(b.top_left, b.bottom_right))
            .cloned()
            .collect();

        let mut processed = ProcessedFrame {
            frame,
            detections,
            accepted: Vec::new(),
            logged: Vec::new(),
            notified: Vec::new(),
            sink_errors: Vec::new(),
        };
        if !accepted.is_empty() {
            let now = self.clock.now();
            let timestamp = self.clock.timestamp();
            for detected in &accepted {
                self.emit(detected, now, &timestamp, &mut processed);
            }
        }
        processed.accepted = accepted;
        PipelineOutcome::Processed(processed)
    }

    fn emit(
        &mut self,
        detected: &DetectedBox,
        now: std::time::Instant,
        timestamp: &str,
        out: &mut ProcessedFrame,
    ) {
        let record = DetectionRecord::new(timestamp, detected.label.as_str());

        if self.log_limiter.try_acquire(now) {
            match self.log_sink.append(&record) {
                Ok(()) => {
                    log::info!("logged {} at {}", record.class_name, record.timestamp);
                    out.logged.push(record.clone());
                }
                Err(err) => {
                    log::warn!("{}", err);
                    out.sink_errors.push(err);
                }
            }
        }

        if self.notify_limiter.try_acquire(now) {
            let notification = Notification::for_detection(&record);
            match self.notifier.notify(&notification) {
                Ok(()) => out.notified.push(notification),
                Err(err) => {
                    log::warn!("{}", err);
                    out.sink_errors.push(err);
                }
            }
        }
    }
}
