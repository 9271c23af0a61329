//! Image decoding.
//!
//! Accepts raw image bytes (PNG, JPEG) and produces the RGB image every
//! detector backend consumes. Alpha is discarded and grayscale inputs
//! are widened to three channels.

use image::RgbImage;

use crate::types::{Dimensions, PipelineError};

/// Decode raw image bytes into an 8-bit RGB image.
///
/// Supports whatever formats the `image` crate is built with (PNG and
/// JPEG in this workspace).
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the image format is
/// unrecognized or the data is corrupt.
pub fn decode_rgb(bytes: &[u8]) -> Result<RgbImage, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    let img = image::load_from_memory(bytes)?;
    Ok(img.to_rgb8())
}

/// Pixel dimensions of a decoded image.
#[must_use]
pub fn dimensions_of(image: &RgbImage) -> Dimensions {
    Dimensions {
        width: image.width(),
        height: image.height(),
    }
}
