use std::{panic::Location, path::PathBuf};

use error_location::ErrorLocation;
use thiserror::Error;

/// Capture pipeline errors with source location tracking.
#[derive(Error, Debug)]
pub enum CaptureError {
    /// The session configuration failed validation.
    #[error("Invalid configuration: {reason} {location}")]
    InvalidConfig {
        /// Which field was rejected and why.
        reason: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// The display capture context could not be created.
    #[error("Capture context unavailable: {reason} {location}")]
    CaptureUnavailable {
        /// Description of the capture backend failure.
        reason: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// The display capture context was lost mid-session (e.g. display removed).
    #[error("Capture context lost: {reason} {location}")]
    CaptureLost {
        /// Description of what was lost.
        reason: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// Audio device operation failed.
    #[error("Audio device error: {reason} {location}")]
    DeviceError {
        /// Description of the device error.
        reason: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// Writing or reading an intermediate file failed.
    #[error("Intermediate file error at {path:?}: {source} {location}")]
    Intermediate {
        /// The intermediate file involved.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// A frame could not be converted or compressed.
    #[error("Frame encoding failed: {reason} {location}")]
    FrameEncoding {
        /// Description of the image error.
        reason: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// The external encoder failed to produce an output file.
    #[error("Encoder failed: {reason} {location}")]
    EncoderFailed {
        /// Exit status and stderr tail of the encoder.
        reason: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// The background mux pipeline is no longer accepting work.
    #[error("Mux pipeline unavailable: {reason} {location}")]
    PipelineClosed {
        /// Why the job could not be queued.
        reason: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// IO error outside of intermediate handling.
    #[error("IO error: {source} {location}")]
    Io {
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
        /// Source location where error occurred.
        location: ErrorLocation,
    },
}

impl CaptureError {
    /// Wrap an IO error raised while touching an intermediate file.
    #[track_caller]
    pub(crate) fn intermediate(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CaptureError::Intermediate {
            path: path.into(),
            source,
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<std::io::Error> for CaptureError {
    #[track_caller]
    fn from(source: std::io::Error) -> Self {
        CaptureError::Io {
            source,
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

/// Result type alias using [`CaptureError`].
pub type Result<T> = std::result::Result<T, CaptureError>;
