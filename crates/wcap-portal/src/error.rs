//! Error types for the portal module.

use thiserror::Error;

use crate::request::PortalStep;

/// Errors that can occur while negotiating with the ScreenCast portal.
#[derive(Debug, Error)]
pub enum PortalError {
    /// The portal answered with a non-zero response code.
    #[error("Portal denied {step}: response code {code}")]
    Denied { step: PortalStep, code: u32 },

    /// D-Bus connection or call error.
    #[error("D-Bus error: {0}")]
    Bus(#[from] zbus::Error),

    /// Transport failure not reported by the bus library.
    #[error("Portal transport failure: {0}")]
    Transport(String),

    /// A required key was absent from the response.
    #[error("{step} response is missing `{key}`")]
    MissingResult { step: PortalStep, key: &'static str },

    /// The portal started a session without any stream.
    #[error("Portal started no streams")]
    NoStreams,

    /// The portal returned a zero node id.
    #[error("Portal returned invalid node id {0}")]
    InvalidNode(u32),

    /// No matching response arrived in time.
    #[error("Timed out waiting for {step} response")]
    Timeout { step: PortalStep },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PortalError {
    /// Returns true if the user or the portal refused the request.
    pub fn is_denied(&self) -> bool {
        matches!(self, Self::Denied { .. })
    }
}
