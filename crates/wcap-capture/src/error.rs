//! Error types for the capture module.

use thiserror::Error;

/// Errors that can occur during capture operations.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The stream pipeline could not be built or started.
    #[error("Pipeline construction failed: {0}")]
    PipelineConstruction(String),

    /// A required GStreamer element is not installed.
    #[error("Required GStreamer element `{0}` is not available")]
    MissingPlugin(String),

    /// Capture already started.
    #[error("Capture already started")]
    AlreadyStarted,

    /// Capture not started.
    #[error("Capture not started")]
    NotStarted,

    /// The session was stopped and cannot be reopened.
    #[error("Capture session stopped")]
    Stopped,

    /// The upstream source ended or failed.
    #[error("Stream ended")]
    StreamEnded,

    /// Frame conversion error.
    #[error("Frame conversion error: {0}")]
    FrameConversion(String),
}
