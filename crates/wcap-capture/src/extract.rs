//! Cropping and repacking of stream buffers.

use tracing::{debug, trace};

use wcap_types::CaptureType;

use crate::crop::detect_content_bounds;
use crate::error::CaptureError;
use crate::frame::{CropDecision, CropRect, FrameView, RawBuffer};
use crate::{CaptureResult, FRAME_BYTES_PER_PIXEL, SOURCE_BYTES_PER_PIXEL};

/// Pick the rectangle to extract from `raw`.
///
/// A producer crop wins; otherwise non-screen captures are scanned for
/// content and screens use the whole buffer.
pub fn choose_crop(raw: &RawBuffer<'_>, capture_type: CaptureType) -> (CropRect, CropDecision) {
    let full = CropRect::full(raw.width(), raw.height());

    if let Some(crop) = raw.crop() {
        return match crop.clamp_to(raw.width(), raw.height()) {
            Some(clamped) => (clamped, CropDecision::ProducerMetadata),
            None => {
                debug!(?crop, "Producer crop outside buffer, using full frame");
                (full, CropDecision::Fallback)
            }
        };
    }

    if !capture_type.needs_bounds_detection() {
        return (full, CropDecision::FullFrame);
    }

    match detect_content_bounds(raw) {
        Some(bounds) => (bounds, CropDecision::Detected),
        None => {
            debug!("No content found, using full frame");
            (full, CropDecision::Fallback)
        }
    }
}

/// Copies the content of stream buffers into a reusable packed buffer.
///
/// The scratch buffer only grows; a frame no larger than any previous one
/// is extracted without allocating.
#[derive(Debug, Default)]
pub struct FrameExtractor {
    scratch: Vec<u8>,
    grow_count: u64,
}

impl FrameExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes currently held by the scratch buffer.
    pub fn capacity(&self) -> usize {
        self.scratch.len()
    }

    /// How many times the scratch buffer had to grow.
    pub fn grow_count(&self) -> u64 {
        self.grow_count
    }

    /// Crop `raw` and pack it into 3-byte pixels.
    pub fn extract(
        &mut self,
        raw: &RawBuffer<'_>,
        capture_type: CaptureType,
    ) -> CaptureResult<FrameView<'_>> {
        let (crop, decision) = choose_crop(raw, capture_type);
        if crop.x + crop.width > raw.width() || crop.y + crop.height > raw.height() {
            return Err(CaptureError::FrameConversion(format!(
                "crop {:?} exceeds {}x{} buffer",
                crop,
                raw.width(),
                raw.height()
            )));
        }

        let out_stride = crop.width as usize * FRAME_BYTES_PER_PIXEL;
        let needed = out_stride * crop.height as usize;
        if needed > self.scratch.len() {
            self.scratch.resize(needed, 0);
            self.grow_count += 1;
            trace!(bytes = needed, "Scratch buffer grown");
        }

        let first = crop.x as usize * SOURCE_BYTES_PER_PIXEL;
        let last = first + crop.width as usize * SOURCE_BYTES_PER_PIXEL;
        let out = &mut self.scratch[..needed];

        for (y, dst) in (crop.y..crop.y + crop.height).zip(out.chunks_exact_mut(out_stride)) {
            let src = &raw.row(y)[first..last];
            for (packed, pixel) in dst
                .chunks_exact_mut(FRAME_BYTES_PER_PIXEL)
                .zip(src.chunks_exact(SOURCE_BYTES_PER_PIXEL))
            {
                packed.copy_from_slice(&pixel[..FRAME_BYTES_PER_PIXEL]);
            }
        }

        Ok(FrameView {
            width: crop.width,
            height: crop.height,
            data: &self.scratch[..needed],
            crop,
            decision,
        })
    }
}
