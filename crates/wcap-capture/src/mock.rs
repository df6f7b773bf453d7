//! Scripted video stream for exercising capture without PipeWire.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::CaptureError;
use crate::frame::{CropRect, RawBuffer};
use crate::stream::VideoStream;
use crate::CaptureResult;

const ROW_PADDING: usize = 16;

/// An owned BGRx buffer to be served by [`MockVideoStream`].
#[derive(Debug, Clone)]
pub struct MockBuffer {
    data: Vec<u8>,
    width: u32,
    height: u32,
    stride: usize,
    crop: Option<CropRect>,
}

impl MockBuffer {
    /// Row stride used for a buffer `width` pixels wide.
    pub fn stride_for(width: u32) -> usize {
        width as usize * 4 + ROW_PADDING
    }

    /// An all-black buffer with padded rows.
    pub fn blank(width: u32, height: u32) -> Self {
        let stride = Self::stride_for(width);
        Self {
            data: vec![0u8; stride * height as usize],
            width,
            height,
            stride,
            crop: None,
        }
    }

    /// A buffer whose data is too short for its geometry.
    pub fn malformed() -> Self {
        Self {
            data: vec![0u8; 8],
            width: 4,
            height: 4,
            stride: 16,
            crop: None,
        }
    }

    /// Paint `rect` with one color; the fourth byte is set to 0xff.
    pub fn fill(mut self, rect: CropRect, bgr: [u8; 3]) -> Self {
        for y in rect.y..rect.y + rect.height {
            for x in rect.x..rect.x + rect.width {
                let at = y as usize * self.stride + x as usize * 4;
                self.data[at..at + 3].copy_from_slice(&bgr);
                self.data[at + 3] = 0xff;
            }
        }
        self
    }

    /// Attach a producer crop rectangle.
    pub fn with_crop(mut self, crop: CropRect) -> Self {
        self.crop = Some(crop);
        self
    }
}

/// A [`VideoStream`] that serves a fixed list of buffers, then ends.
#[derive(Debug, Default)]
pub struct MockVideoStream {
    buffers: VecDeque<MockBuffer>,
    failing_opens: usize,
    open_attempts: Arc<AtomicUsize>,
    opened_node: Option<u32>,
    pulls: usize,
    closes: usize,
}

impl MockVideoStream {
    pub fn new(buffers: Vec<MockBuffer>) -> Self {
        Self {
            buffers: buffers.into(),
            ..Default::default()
        }
    }

    /// Fail the first `count` calls to `open`.
    pub fn failing_opens(mut self, count: usize) -> Self {
        self.failing_opens = count;
        self
    }

    /// Shared counter of `open` calls, readable after the stream is moved.
    pub fn open_attempts(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.open_attempts)
    }

    /// Node id of the last successful `open`.
    pub fn opened_node(&self) -> Option<u32> {
        self.opened_node
    }

    /// Calls to `pull_with`, including the one that saw the end.
    pub fn pulls(&self) -> usize {
        self.pulls
    }

    /// Calls to `close` while open.
    pub fn closes(&self) -> usize {
        self.closes
    }
}

impl VideoStream for MockVideoStream {
    fn open(&mut self, node_id: u32) -> CaptureResult<()> {
        let attempt = self.open_attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.failing_opens {
            return Err(CaptureError::PipelineConstruction(format!(
                "scripted failure for node {}",
                node_id
            )));
        }
        self.opened_node = Some(node_id);
        Ok(())
    }

    fn pull_with<R>(&mut self, f: impl FnOnce(&RawBuffer<'_>) -> R) -> CaptureResult<R> {
        self.pulls += 1;
        let buffer = self.buffers.pop_front().ok_or(CaptureError::StreamEnded)?;
        let raw = RawBuffer::new(&buffer.data, buffer.width, buffer.height, buffer.stride)?
            .with_crop(buffer.crop);
        Ok(f(&raw))
    }

    fn close(&mut self) {
        if self.opened_node.take().is_some() {
            self.closes += 1;
        }
    }
}
