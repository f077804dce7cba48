// src/engine.rs
//
// The core of stepdown-image: an immutable pixel buffer, the step-down
// resampler, and the size-constrained encoder, composed by resize_to_bytes().
//
// This file is a facade that delegates to the decomposed modules in engine/

use crate::error::StepdownError;
use crate::ops::{Dimensions, OutputFormat};
use image::ImageReader;
use std::io::Cursor;

// =============================================================================
// SECURITY LIMITS
// =============================================================================

/// Maximum allowed image dimension (width or height).
/// Images larger than 32768x32768 are rejected to prevent decompression bombs.
/// This is the same limit used by libvips/sharp.
pub const MAX_DIMENSION: u32 = 32768;

/// Maximum allowed total pixels (width * height).
/// 100 megapixels = 400MB uncompressed RGBA. Beyond this is likely malicious.
pub const MAX_PIXELS: u64 = 100_000_000;

// =============================================================================
// MODULE DECOMPOSITION
// =============================================================================

mod common;
mod encoder;
mod resampler;

pub use encoder::{
    encode_constrained, EncodeRequest, EncodeResult, MozjpegEncoder, PngEncoder, QualityEncoder,
    MAX_ATTEMPTS, QUALITY_STEP,
};
pub use resampler::{resample, step_down_plan};

/// Validate dimensions against the security limits.
pub fn check_dimensions(width: u32, height: u32) -> Result<(), StepdownError> {
    if width == 0 || height == 0 {
        return Err(StepdownError::invalid_dimensions(width, height));
    }
    if width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(StepdownError::dimension_exceeds_limit(
            width.max(height),
            MAX_DIMENSION,
        ));
    }
    let pixels = width as u64 * height as u64;
    if pixels > MAX_PIXELS {
        return Err(StepdownError::pixel_count_exceeds_limit(pixels, MAX_PIXELS));
    }
    Ok(())
}

// =============================================================================
// PIXEL BUFFER
// =============================================================================

/// A decoded image: dense row-major RGBA8 samples plus dimensions.
///
/// Immutable once constructed. Each resampling stage produces a new buffer,
/// so no stage ever reads and writes the same allocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Build a buffer from raw RGBA8 bytes. The length must be exactly
    /// `width * height * 4`, and dimensions must pass the security limits.
    pub fn from_rgba8(width: u32, height: u32, data: Vec<u8>) -> Result<Self, StepdownError> {
        check_dimensions(width, height)?;
        let expected = width as usize * height as usize * 4;
        if data.len() != expected {
            return Err(StepdownError::buffer_length_mismatch(
                width,
                height,
                expected,
                data.len(),
            ));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Decode encoded image bytes (format guessed from the header) into a
    /// pixel buffer.
    pub fn decode(bytes: &[u8]) -> Result<Self, StepdownError> {
        let reader = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| StepdownError::decode_failed(format!("failed to read header: {e}")))?;
        let img = reader
            .decode()
            .map_err(|e| StepdownError::decode_failed(e.to_string()))?;
        Self::from_dynamic(&img)
    }

    /// Convert any `image` crate representation into an RGBA8 buffer.
    pub fn from_dynamic(img: &image::DynamicImage) -> Result<Self, StepdownError> {
        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();
        Self::from_rgba8(width, height, rgba.into_raw())
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw RGBA8 samples, row-major, `width * height * 4` bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Copy into an `image` crate buffer for encoding.
    pub(crate) fn to_rgba_image(&self) -> image::RgbaImage {
        // from_raw only fails on a length mismatch, which the constructor
        // invariant rules out
        image::RgbaImage::from_raw(self.width, self.height, self.data.clone())
            .unwrap_or_else(|| image::RgbaImage::new(self.width, self.height))
    }
}

// =============================================================================
// TOP-LEVEL PIPELINE
// =============================================================================

/// Resample to `target` and re-encode: the full
/// source pixels -> resampler -> encoder -> bytes flow.
///
/// `target_bytes` only applies to lossy formats; PNG is encoded once,
/// losslessly, and any budget is reported through the result rather than
/// chased (PNG output size does not respond to a quality parameter).
pub fn resize_to_bytes(
    source: &PixelBuffer,
    target: Dimensions,
    format: &OutputFormat,
    target_bytes: Option<u64>,
) -> Result<EncodeResult, StepdownError> {
    let resized = resample(source, target)?;
    match format {
        OutputFormat::Jpeg { quality } => {
            let request = EncodeRequest::new(*quality, target_bytes)?;
            encode_constrained(&MozjpegEncoder, &resized, &request)
        }
        OutputFormat::Png => {
            let request = EncodeRequest::new(1.0, None)?;
            encode_constrained(&PngEncoder, &resized, &request)
        }
    }
}
