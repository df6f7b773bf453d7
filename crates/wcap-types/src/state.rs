//! Capture session state machine types.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a capture session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// No stream has been opened.
    #[default]
    Idle,

    /// The pipeline is being constructed.
    Opening,

    /// The pipeline is running and frames can be pulled.
    Streaming,

    /// The pipeline has been torn down. Terminal.
    Stopped,
}

impl SessionState {
    /// Returns true if the session is idle.
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Returns true if frames can be pulled.
    pub fn is_streaming(&self) -> bool {
        matches!(self, Self::Streaming)
    }

    /// Returns true if the session has been stopped.
    pub fn is_stopped(&self) -> bool {
        matches!(self, Self::Stopped)
    }

    /// Whether `stop` has anything to tear down from this state.
    pub fn can_stop(&self) -> bool {
        matches!(self, Self::Opening | Self::Streaming)
    }

    /// Returns a simple string representation of the state.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Opening => "Opening",
            Self::Streaming => "Streaming",
            Self::Stopped => "Stopped",
        }
    }
}
