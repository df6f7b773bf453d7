//! Screen and window capture facade.
//!
//! [`ScreenCapture`] asks the desktop portal for a source, opens the
//! PipeWire stream the portal hands out and returns tightly packed frames
//! cropped to the captured content.

mod capture;
mod error;
mod metrics;

pub use capture::ScreenCapture;
pub use error::EngineError;
pub use metrics::MetricsCollector;

pub use wcap_capture::{CropDecision, Frame};
pub use wcap_portal::CaptureSource;
pub use wcap_types::{CaptureConfig, CaptureStats, CaptureType, CursorMode, SessionState};

/// Result type for facade operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Capture through the session bus portal and GStreamer.
#[cfg(feature = "gstreamer")]
pub type SystemCapture = ScreenCapture<wcap_portal::DbusPortal, wcap_capture::GstVideoStream>;

#[cfg(feature = "gstreamer")]
impl SystemCapture {
    /// Create a facade that talks to the real portal and PipeWire.
    pub fn new(config: CaptureConfig) -> Self {
        Self::with_backends(
            config,
            wcap_portal::DbusPortal::connect,
            wcap_capture::GstVideoStream::new,
        )
    }
}
