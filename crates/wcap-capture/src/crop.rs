//! Content bounds detection.
//!
//! Window streams are delivered at the size of the whole output with the
//! window drawn somewhere inside and everything else black. A pixel counts
//! as content when any of its three color bytes is non-zero; the fourth
//! byte is ignored.

use std::ops::RangeInclusive;

use crate::frame::{CropRect, RawBuffer};
use crate::SOURCE_BYTES_PER_PIXEL;

fn is_content(pixel: &[u8]) -> bool {
    pixel[0] != 0 || pixel[1] != 0 || pixel[2] != 0
}

fn row_has_content(raw: &RawBuffer<'_>, y: u32) -> bool {
    raw.row(y)
        .chunks_exact(SOURCE_BYTES_PER_PIXEL)
        .any(is_content)
}

fn column_has_content(raw: &RawBuffer<'_>, x: u32, rows: RangeInclusive<u32>) -> bool {
    rows.into_iter().any(|y| is_content(raw.pixel(x, y)))
}

/// Find the smallest rectangle containing every content pixel.
///
/// Rows are swept from the top and the bottom first, then columns from the
/// left and the right within the found rows. Returns `None` for a buffer
/// with no content.
pub fn detect_content_bounds(raw: &RawBuffer<'_>) -> Option<CropRect> {
    let (width, height) = (raw.width(), raw.height());

    let min_y = (0..height).find(|&y| row_has_content(raw, y))?;
    let max_y = (min_y..height).rev().find(|&y| row_has_content(raw, y))?;

    let min_x = (0..width).find(|&x| column_has_content(raw, x, min_y..=max_y))?;
    let max_x = (min_x..width)
        .rev()
        .find(|&x| column_has_content(raw, x, min_y..=max_y))?;

    let rect = CropRect::new(min_x, min_y, max_x - min_x + 1, max_y - min_y + 1);
    (!rect.is_empty()).then_some(rect)
}

/// Like [`detect_content_bounds`], but an all-black buffer yields the full frame.
pub fn content_bounds_or_full(raw: &RawBuffer<'_>) -> CropRect {
    detect_content_bounds(raw).unwrap_or_else(|| CropRect::full(raw.width(), raw.height()))
}
