//! Raw stream buffers and extracted frames.

use bytes::Bytes;

use crate::error::CaptureError;
use crate::{CaptureResult, FRAME_BYTES_PER_PIXEL, SOURCE_BYTES_PER_PIXEL};

/// A rectangle in pixel coordinates of a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropRect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// The rectangle covering a whole `width` x `height` buffer.
    pub fn full(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Intersect with a `width` x `height` buffer.
    ///
    /// Returns `None` when nothing of the rectangle lies inside the buffer.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<Self> {
        if self.x >= width || self.y >= height {
            return None;
        }
        let clamped = Self::new(
            self.x,
            self.y,
            self.width.min(width - self.x),
            self.height.min(height - self.y),
        );
        (!clamped.is_empty()).then_some(clamped)
    }
}

/// How the crop rectangle of a frame was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CropDecision {
    /// Rectangle attached to the buffer by the producer.
    ProducerMetadata,

    /// Rectangle found by scanning the pixels.
    Detected,

    /// Full frame, because the source is a whole screen.
    #[default]
    FullFrame,

    /// Full frame, because neither metadata nor detection gave a usable rectangle.
    Fallback,
}

/// A borrowed BGRx buffer as delivered by the stream.
///
/// Rows may be padded: `stride` is at least `width * 4`. A producer crop,
/// when present, is kept as delivered and only clamped at extraction.
#[derive(Debug, Clone, Copy)]
pub struct RawBuffer<'a> {
    data: &'a [u8],
    width: u32,
    height: u32,
    stride: usize,
    crop: Option<CropRect>,
}

impl<'a> RawBuffer<'a> {
    /// Wrap `data`, checking that it holds `height` rows of `stride` bytes.
    pub fn new(data: &'a [u8], width: u32, height: u32, stride: usize) -> CaptureResult<Self> {
        if width == 0 || height == 0 {
            return Err(CaptureError::FrameConversion(format!(
                "empty buffer geometry {}x{}",
                width, height
            )));
        }

        let row_bytes = width as usize * SOURCE_BYTES_PER_PIXEL;
        if stride < row_bytes {
            return Err(CaptureError::FrameConversion(format!(
                "stride {} shorter than row of {} bytes",
                stride, row_bytes
            )));
        }

        let required = (height as usize - 1) * stride + row_bytes;
        if data.len() < required {
            return Err(CaptureError::FrameConversion(format!(
                "buffer holds {} bytes, {}x{} with stride {} needs {}",
                data.len(),
                width,
                height,
                stride,
                required
            )));
        }

        Ok(Self {
            data,
            width,
            height,
            stride,
            crop: None,
        })
    }

    /// Attach the producer's crop rectangle.
    pub fn with_crop(mut self, crop: Option<CropRect>) -> Self {
        self.crop = crop;
        self
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn crop(&self) -> Option<CropRect> {
        self.crop
    }

    /// The `width * 4` pixel bytes of row `y`, without padding.
    pub fn row(&self, y: u32) -> &'a [u8] {
        let start = y as usize * self.stride;
        &self.data[start..start + self.width as usize * SOURCE_BYTES_PER_PIXEL]
    }

    /// The 4 bytes of pixel `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> &'a [u8] {
        let start = y as usize * self.stride + x as usize * SOURCE_BYTES_PER_PIXEL;
        &self.data[start..start + SOURCE_BYTES_PER_PIXEL]
    }
}

/// An extracted frame borrowing the extractor's scratch buffer.
///
/// Valid until the next extraction.
#[derive(Debug, Clone, Copy)]
pub struct FrameView<'a> {
    pub width: u32,
    pub height: u32,
    pub data: &'a [u8],
    pub crop: CropRect,
    pub decision: CropDecision,
}

impl FrameView<'_> {
    /// Copy out of the scratch buffer into an owned frame.
    pub fn to_frame(&self, sequence: u64) -> Frame {
        Frame {
            width: self.width,
            height: self.height,
            data: Bytes::copy_from_slice(self.data),
            sequence,
            decision: self.decision,
        }
    }
}

/// A tightly packed frame of 3-byte pixels.
///
/// `data.len() == width * height * 3`. The default value is the empty
/// frame returned when no frame could be produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    /// Frame width in pixels.
    pub width: u32,

    /// Frame height in pixels.
    pub height: u32,

    /// Pixel data, blue-green-red, no row padding.
    pub data: Bytes,

    /// Position of this frame in its capture session, starting at 1.
    pub sequence: u64,

    /// How the crop rectangle was chosen.
    pub decision: CropDecision,
}

impl Frame {
    /// The empty frame.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Bytes per row.
    pub fn stride(&self) -> usize {
        self.width as usize * FRAME_BYTES_PER_PIXEL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_buffer_rejects_short_stride() {
        let data = vec![0u8; 64];
        let err = RawBuffer::new(&data, 4, 4, 12).unwrap_err();
        assert!(matches!(err, CaptureError::FrameConversion(_)));
    }

    #[test]
    fn test_raw_buffer_rejects_short_data() {
        let data = vec![0u8; 63];
        assert!(RawBuffer::new(&data, 4, 4, 16).is_err());
    }

    #[test]
    fn test_raw_buffer_last_row_may_skip_padding() {
        // 3 padded rows of 24 bytes plus an unpadded final row of 16.
        let data = vec![0u8; 3 * 24 + 16];
        let raw = RawBuffer::new(&data, 4, 4, 24).unwrap();
        assert_eq!(raw.row(3).len(), 16);
    }

    #[test]
    fn test_raw_buffer_rejects_zero_geometry() {
        assert!(RawBuffer::new(&[], 0, 0, 0).is_err());
    }

    #[test]
    fn test_pixel_addressing_uses_stride() {
        let mut data = vec![0u8; 2 * 32];
        data[32 + 4] = 9;
        let raw = RawBuffer::new(&data, 2, 2, 32).unwrap();
        assert_eq!(raw.pixel(1, 1)[0], 9);
        assert_eq!(raw.pixel(1, 0)[0], 0);
    }

    #[test]
    fn test_clamp_to_bounds() {
        let rect = CropRect::new(600, 400, 100, 100);
        assert_eq!(
            rect.clamp_to(640, 480),
            Some(CropRect::new(600, 400, 40, 80))
        );
        assert_eq!(CropRect::new(640, 0, 10, 10).clamp_to(640, 480), None);
        assert_eq!(CropRect::new(0, 0, 0, 10).clamp_to(640, 480), None);
    }

    #[test]
    fn test_empty_frame() {
        let frame = Frame::empty();
        assert!(frame.is_empty());
        assert!(frame.data.is_empty());
        assert_eq!(frame.sequence, 0);
    }
}
