//! The seam between a capture session and the media framework.

use wcap_types::CaptureConfig;

use crate::frame::RawBuffer;
use crate::CaptureResult;

/// A live video stream bound to a PipeWire node.
pub trait VideoStream {
    /// Build and start the stream for `node_id`.
    fn open(&mut self, node_id: u32) -> CaptureResult<()>;

    /// Block until the next buffer arrives and hand it to `f`.
    ///
    /// Returns `CaptureError::StreamEnded` once the source is gone.
    fn pull_with<R>(&mut self, f: impl FnOnce(&RawBuffer<'_>) -> R) -> CaptureResult<R>;

    /// Tear the stream down. Safe to call more than once.
    fn close(&mut self);

    /// Buffers the stream discarded because a newer one arrived first.
    fn dropped_buffers(&self) -> u64 {
        0
    }
}

/// Buffers the sink holds; a newer buffer replaces the pending one.
const SINK_MAX_BUFFERS: u32 = 1;

/// GStreamer launch description for reading `node_id` as BGRx.
pub fn pipeline_description(node_id: u32, config: &CaptureConfig) -> String {
    format!(
        "pipewiresrc path={} do-timestamp={} ! videoconvert ! video/x-raw,format=BGRx ! \
         appsink name=sink drop=true sync=false max-buffers={}",
        node_id, config.do_timestamp, SINK_MAX_BUFFERS
    )
}
