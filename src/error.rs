//! Error taxonomy for the capture and detection path.
//!
//! Every error here is contained within a single tick: the controller reports
//! it as a status message and the session keeps running.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Frame source failures.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CaptureError {
    /// The camera or file could not be opened. The session stays stopped.
    #[error("cannot open {source_name}: {message}")]
    Resource {
        /// Human readable source description.
        source_name: String,
        /// Underlying failure.
        message: String,
    },

    /// A read failed mid-session. Treated as end of stream.
    #[error("read from {source_name} failed: {message}")]
    Read {
        source_name: String,
        message: String,
    },
}

/// Failures of a single detector invocation. The frame is skipped.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DetectorError {
    #[error("detector failed: {0:#}")]
    Backend(anyhow::Error),

    /// Output that cannot describe a real box (non-finite or inverted
    /// coordinates, class id outside the vocabulary).
    #[error("malformed detector output: {0}")]
    Malformed(String),

    #[error("detector did not answer within {0:?}")]
    Timeout(Duration),

    /// A previous timed-out invocation is still running.
    #[error("detector still busy with a previous frame")]
    Busy,

    #[error("detector worker is gone")]
    WorkerGone,
}

/// Region persistence failures. The in-memory region is left untouched.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RegionError {
    #[error("no region defined")]
    Undefined,

    #[error("region file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("region file {path} line {line}: {reason}")]
    Malformed {
        path: PathBuf,
        line: usize,
        reason: String,
    },
}

/// Side-effect delivery failures. Caught at the call site, never propagated
/// to the tick loop.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SinkError {
    #[error("log sink {sink}: {message}")]
    Log { sink: &'static str, message: String },

    #[error("notification via {sink}: {message}")]
    Notify { sink: &'static str, message: String },
}

impl SinkError {
    pub fn log(sink: &'static str, err: impl std::fmt::Display) -> Self {
        SinkError::Log {
            sink,
            message: err.to_string(),
        }
    }

    pub fn notify(sink: &'static str, err: impl std::fmt::Display) -> Self {
        SinkError::Notify {
            sink,
            message: err.to_string(),
        }
    }
}
