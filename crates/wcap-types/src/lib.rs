//! Shared types for the wcap screen capture workspace.
//!
//! This crate defines the capture selection types, the session state
//! machine, capture statistics and the runtime configuration shared by
//! the portal, capture and engine crates.

mod config;
mod state;
mod stats;
mod types;

pub use config::{CaptureConfig, ConfigError};
pub use state::SessionState;
pub use stats::CaptureStats;
pub use types::{CaptureType, CursorMode, ParseCaptureTypeError};

/// Default number of seconds to wait for each portal response.
pub const DEFAULT_NEGOTIATION_TIMEOUT_SECS: u64 = 300;
