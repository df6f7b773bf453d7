//! PipeWire stream capture and frame extraction.
//!
//! This crate pulls padded BGRx buffers from a negotiated PipeWire node,
//! finds the rectangle that holds real content and copies it into tightly
//! packed 3-byte pixels.

mod crop;
mod error;
mod extract;
mod frame;
pub mod mock;
mod session;
mod slot;
mod stream;

#[cfg(feature = "gstreamer")]
mod gst;

pub use crop::{content_bounds_or_full, detect_content_bounds};
pub use error::CaptureError;
pub use extract::{choose_crop, FrameExtractor};
pub use frame::{CropDecision, CropRect, Frame, FrameView, RawBuffer};
pub use session::CaptureSession;
pub use slot::{latest_slot, SlotReceiver, SlotSender};
pub use stream::{pipeline_description, VideoStream};

#[cfg(feature = "gstreamer")]
pub use gst::{ensure_initialized, GstVideoStream};

/// Bytes per pixel of the buffers delivered by the stream (BGRx).
pub const SOURCE_BYTES_PER_PIXEL: usize = 4;

/// Bytes per pixel of extracted frames.
pub const FRAME_BYTES_PER_PIXEL: usize = 3;

/// Result type for capture operations.
pub type CaptureResult<T> = Result<T, CaptureError>;
