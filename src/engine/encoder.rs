// src/engine/encoder.rs
//
// Encoder operations: JPEG (mozjpeg), PNG (image + oxipng), and the
// size-constrained quality search that walks the lossy quality axis down
// until an output byte budget is met.

use crate::engine::common::run_with_panic_policy;
use crate::engine::{PixelBuffer, MAX_DIMENSION};
use crate::error::StepdownError;
use mozjpeg::{ColorSpace, Compress, ScanMode};
use std::io::Cursor;
use tracing::debug;

type EncoderResult<T> = std::result::Result<T, StepdownError>;

/// Quality is lowered by this much per re-encode attempt.
pub const QUALITY_STEP: f32 = 0.1;

/// Upper bound on re-encode attempts during the budget search. The initial
/// encode at the requested quality does not count against this.
pub const MAX_ATTEMPTS: u32 = 10;

/// The re-encoding oracle: given pixels and a quality parameter, produce
/// encoded bytes. The budget search treats this as opaque - it only observes
/// output sizes.
pub trait QualityEncoder {
    /// Format name used in error messages ("jpeg", "png", ...).
    fn format(&self) -> &'static str;

    /// Encode at `quality` in 0.0..=1.0, where 1.0 is best fidelity.
    /// Lossless encoders may ignore the quality parameter.
    fn encode(&self, pixels: &PixelBuffer, quality: f32) -> EncoderResult<Vec<u8>>;
}

/// Parameters for one size-constrained encode call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EncodeRequest {
    quality: f32,
    target_bytes: Option<u64>,
}

impl EncodeRequest {
    /// `quality` must be finite in 0.0..=1.0; a `target_bytes` of zero is
    /// rejected (no encoder produces empty output).
    pub fn new(quality: f32, target_bytes: Option<u64>) -> Result<Self, StepdownError> {
        if !quality.is_finite() || !(0.0..=1.0).contains(&quality) {
            return Err(StepdownError::invalid_quality(quality));
        }
        if target_bytes == Some(0) {
            return Err(StepdownError::invalid_argument(
                "target_bytes",
                "0",
                "byte budget must be positive",
            ));
        }
        Ok(Self {
            quality,
            target_bytes,
        })
    }

    pub fn quality(&self) -> f32 {
        self.quality
    }

    pub fn target_bytes(&self) -> Option<u64> {
        self.target_bytes
    }
}

/// Outcome of an encode: the bytes plus the quality actually used, which may
/// be lower than requested when a budget forced the search downward.
#[derive(Clone, Debug)]
pub struct EncodeResult {
    pub bytes: Vec<u8>,
    pub quality: f32,
}

impl EncodeResult {
    /// Achieved output size in bytes.
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Whether this result fits the given byte budget. A best-effort result
    /// that exceeds its budget is still a normal result, not an error; the
    /// caller decides whether to surface a warning.
    pub fn meets_budget(&self, target_bytes: u64) -> bool {
        self.size() <= target_bytes
    }
}

/// Encode with an optional byte budget.
///
/// Encodes once at the requested quality; when a budget is given and not yet
/// met, re-encodes at quality lowered by `QUALITY_STEP` per attempt until the
/// budget is met, quality reaches 0, or `MAX_ATTEMPTS` re-encodes have run.
/// Always returns the last attempt's output; over-budget is signalled via
/// `EncodeResult::meets_budget`, never as an error.
///
/// Lower quality usually but not always shrinks the output, so a fixed
/// step-and-cap walk is used instead of a binary search; with 0.1-granularity
/// steps the attempt cap is reached before a bisection would pay off.
pub fn encode_constrained<E: QualityEncoder>(
    oracle: &E,
    pixels: &PixelBuffer,
    request: &EncodeRequest,
) -> EncoderResult<EncodeResult> {
    let mut quality = request.quality();
    let mut bytes = oracle.encode(pixels, quality)?;

    let Some(budget) = request.target_bytes() else {
        return Ok(EncodeResult { bytes, quality });
    };
    if bytes.len() as u64 <= budget {
        return Ok(EncodeResult { bytes, quality });
    }

    for attempt in 1..=MAX_ATTEMPTS {
        // Recompute from the requested quality each time instead of
        // accumulating subtractions, so float drift cannot change the step
        // sequence.
        let next = request.quality() - QUALITY_STEP * attempt as f32;
        let clamped = next < 0.0;
        quality = if clamped { 0.0 } else { next };

        bytes = oracle.encode(pixels, quality)?;
        debug!(
            format = oracle.format(),
            attempt,
            quality,
            size = bytes.len(),
            budget,
            "budget search attempt"
        );

        if clamped || bytes.len() as u64 <= budget {
            break;
        }
    }

    Ok(EncodeResult { bytes, quality })
}

/// JPEG encoding via mozjpeg with web-optimized settings: YCbCr, 4:2:0
/// chroma subsampling, progressive scans, optimized coding.
#[derive(Clone, Copy, Debug, Default)]
pub struct MozjpegEncoder;

impl MozjpegEncoder {
    /// Map the continuous 0.0..=1.0 quality axis onto mozjpeg's 0..=100.
    fn mozjpeg_quality(quality: f32) -> f32 {
        (quality.clamp(0.0, 1.0) * 100.0).round()
    }

    /// Low-quality outputs tolerate more smoothing, which buys size.
    fn smoothing_factor(quality_pct: f32) -> u8 {
        if quality_pct >= 90.0 {
            0
        } else if quality_pct >= 70.0 {
            5
        } else if quality_pct >= 60.0 {
            10
        } else {
            18
        }
    }
}

impl QualityEncoder for MozjpegEncoder {
    fn format(&self) -> &'static str {
        "jpeg"
    }

    fn encode(&self, pixels: &PixelBuffer, quality: f32) -> EncoderResult<Vec<u8>> {
        run_with_panic_policy("encode:jpeg", || {
            let w = pixels.width();
            let h = pixels.height();

            if w > MAX_DIMENSION || h > MAX_DIMENSION {
                return Err(StepdownError::dimension_exceeds_limit(
                    w.max(h),
                    MAX_DIMENSION,
                ));
            }

            // JPEG has no alpha channel; drop it
            let rgb: Vec<u8> = pixels
                .data()
                .chunks_exact(4)
                .flat_map(|px| [px[0], px[1], px[2]])
                .collect();

            let quality_pct = Self::mozjpeg_quality(quality);

            let mut comp = Compress::new(ColorSpace::JCS_RGB);
            comp.set_size(w as usize, h as usize);
            comp.set_color_space(ColorSpace::JCS_YCbCr);
            comp.set_quality(quality_pct);

            comp.set_chroma_sampling_pixel_sizes((2, 2), (2, 2));
            comp.set_progressive_mode();
            comp.set_optimize_coding(true);
            comp.set_optimize_scans(true);
            comp.set_scan_optimization_mode(ScanMode::AllComponentsTogether);
            comp.set_smoothing_factor(Self::smoothing_factor(quality_pct));

            let estimated_size = (w as usize * h as usize * 3 / 10).max(4096);
            let mut output = Vec::with_capacity(estimated_size);

            let mut writer = comp.start_compress(&mut output).map_err(|e| {
                StepdownError::encode_failed(
                    "jpeg",
                    format!("mozjpeg: failed to start compress: {e:?}"),
                )
            })?;

            let stride = w as usize * 3;
            for row in rgb.chunks(stride) {
                writer.write_scanlines(row).map_err(|e| {
                    StepdownError::encode_failed(
                        "jpeg",
                        format!("mozjpeg: failed to write scanlines: {e:?}"),
                    )
                })?;
            }

            writer.finish().map_err(|e| {
                StepdownError::encode_failed("jpeg", format!("mozjpeg: failed to finish: {e:?}"))
            })?;

            Ok(output)
        })
    }
}

/// Lossless PNG encoding via the image crate, recompressed with oxipng.
/// The quality parameter is ignored; PNG does not respond to it, so a byte
/// budget cannot be chased on this axis.
#[derive(Clone, Copy, Debug, Default)]
pub struct PngEncoder;

impl QualityEncoder for PngEncoder {
    fn format(&self) -> &'static str {
        "png"
    }

    fn encode(&self, pixels: &PixelBuffer, _quality: f32) -> EncoderResult<Vec<u8>> {
        run_with_panic_policy("encode:png", || {
            let img = pixels.to_rgba_image();
            let mut buf = Vec::new();
            image::DynamicImage::ImageRgba8(img)
                .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
                .map_err(|e| {
                    StepdownError::encode_failed("png", format!("PNG encode failed: {e}"))
                })?;

            // Lossless recompression
            let options = oxipng::Options::from_preset(4);
            oxipng::optimize_from_memory(&buf, &options).map_err(|e| {
                StepdownError::encode_failed("png", format!("oxipng optimization failed: {e}"))
            })
        })
    }
}
