//! Error types for the capture facade.

use thiserror::Error;

use wcap_capture::CaptureError;
use wcap_portal::PortalError;

/// Errors surfaced by [`crate::ScreenCapture`].
#[derive(Debug, Error)]
pub enum EngineError {
    /// Source negotiation failed.
    #[error("Portal negotiation failed: {0}")]
    Portal(#[from] PortalError),

    /// Stream construction or frame retrieval failed.
    #[error("Capture failed: {0}")]
    Capture(#[from] CaptureError),

    /// No source has been selected yet.
    #[error("No capture source selected")]
    NoSourceSelected,
}

impl EngineError {
    /// Whether the user declined or cancelled the portal dialog.
    pub fn is_denied(&self) -> bool {
        matches!(self, Self::Portal(e) if e.is_denied())
    }

    /// Whether the stream has ended and no more frames will arrive.
    pub fn is_stream_ended(&self) -> bool {
        matches!(self, Self::Capture(CaptureError::StreamEnded))
    }
}
