//! zonewatch: restricted-area object detection over video frames.
//!
//! Frames come from a camera or a local video file, pass through an object
//! detector, and every detection that falls fully inside the restricted area
//! (and matches the selected class) produces a rate-limited log record and a
//! rate-limited notification.
//!
//! # Module Structure
//!
//! - `session`: capture lifecycle (Stopped / Running / Paused) over `ingest` sources
//! - `pipeline`: frame skip, detection, class and region filters, side effects
//! - `region`: the restricted area, its definition gesture and persistence
//! - `limiter`: cooldown gates for the log and notification channels
//! - `sink`: detection log and notification channels
//! - `detect`: detector backends and the deadline-enforcing worker
//! - `control`: command surface and tick loop for front-ends

pub mod classes;
pub mod clock;
pub mod config;
pub mod control;
pub mod detect;
pub mod error;
pub mod frame;
pub mod ingest;
pub mod limiter;
pub mod pipeline;
pub mod region;
pub mod session;
pub mod sink;

pub use classes::{ClassFilter, ClassVocabulary};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::WatchConfig;
pub use control::{
    run_loop, Controller, IntervalTicker, LoopExit, ManualTicker, SessionCommand, TickSource,
};
pub use detect::{DetectedBox, DetectorBackend, RawDetection, TimedDetector};
pub use error::{CaptureError, DetectorError, RegionError, SinkError};
pub use frame::{annotate, Frame, WORKING_HEIGHT, WORKING_WIDTH};
pub use ingest::{SourceSettings, SourceSpec};
pub use limiter::RateLimiter;
pub use pipeline::{DetectionFilterPipeline, PipelineOutcome, PipelineSettings, ProcessedFrame};
pub use region::{LoadedRegion, Point, Rect, RegionOfInterest};
pub use session::{CaptureSession, SessionState};
pub use sink::{DetectionRecord, LogSink, Notification, NotificationSink};
