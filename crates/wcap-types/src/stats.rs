//! Capture statistics.

use serde::{Deserialize, Serialize};

/// Counters describing a capture session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaptureStats {
    /// Frames delivered since the source was selected.
    pub frames: u64,

    /// Pulls that produced no frame.
    pub empty_pulls: u64,

    /// Frames cropped to the producer's rectangle.
    pub producer_crops: u64,

    /// Frames cropped to detected content bounds.
    pub detected_crops: u64,

    /// Frames delivered uncropped because the source is a screen.
    pub full_frames: u64,

    /// Frames delivered uncropped because no usable rectangle was found.
    pub fallback_crops: u64,

    /// Buffers replaced by newer ones before they were pulled.
    pub dropped_buffers: u64,

    /// Bytes held by the extraction scratch buffer.
    pub scratch_bytes: u64,

    /// Time spent pulling and extracting the last frame, in microseconds.
    pub last_frame_micros: u64,

    /// Average frames per second since the source was selected.
    pub fps: f32,

    /// Seconds since the source was selected.
    pub uptime_seconds: u64,
}
