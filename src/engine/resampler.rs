// src/engine/resampler.rs
//
// Step-down box resampling.
//
// A single direct minification from a large source to a much smaller target
// aliases badly, even under a good convolution filter with a short support
// window. Halving repeatedly keeps each individual scale ratio close to 2:1,
// which the filter handles accurately; the last step is then a small
// adjustment to the exact requested size.

use crate::engine::PixelBuffer;
use crate::error::StepdownError;
use crate::ops::Dimensions;
use fast_image_resize::{self as fir, ImageBufferError, MulDiv, PixelType, ResizeOptions};
use image::RgbaImage;
use tracing::debug;

/// Resample `source` to exactly `target`, stepping down through repeated
/// halvings when both axes shrink.
///
/// - Equal dimensions: returns a pixel-equal copy, no scaling.
/// - Target at-or-above source on both axes: one direct scale.
/// - Both axes strictly smaller: halve while one more halving would still
///   leave both working dimensions strictly above the target, then one final
///   direct scale.
///
/// Mixed-axis targets (one axis growing, one shrinking) never enter the
/// halving loop; both axes must clear the target for a halving to run.
pub fn resample(source: &PixelBuffer, target: Dimensions) -> Result<PixelBuffer, StepdownError> {
    let (src_w, src_h) = (source.width(), source.height());
    let (dst_w, dst_h) = (target.width(), target.height());

    // Reject over-limit upscale targets before allocating anything
    crate::engine::check_dimensions(dst_w, dst_h)?;

    if src_w == dst_w && src_h == dst_h {
        return Ok(source.clone());
    }

    let run = || -> Result<Vec<u8>, String> {
        let mut current_w = src_w;
        let mut current_h = src_h;
        let mut pixels = source.data().to_vec();

        for &(half_w, half_h) in &step_down_plan((src_w, src_h), (dst_w, dst_h)) {
            debug!(
                from_width = current_w,
                from_height = current_h,
                to_width = half_w,
                to_height = half_h,
                "step-down halving"
            );
            pixels = blit(pixels, current_w, current_h, half_w, half_h)?;
            current_w = half_w;
            current_h = half_h;
        }

        // Final direct scale to the exact requested size
        blit(pixels, current_w, current_h, dst_w, dst_h)
    };

    let data = run()
        .map_err(|reason| StepdownError::resample_failed((src_w, src_h), (dst_w, dst_h), reason))?;
    PixelBuffer::from_rgba8(dst_w, dst_h, data)
}

/// Compute the halving schedule for a source/target pair: the sequence of
/// working dimensions each step-down stage produces, excluding the final
/// direct scale.
///
/// The loop condition compares real-valued halves (`current * 0.5 > target`)
/// on BOTH axes, so odd working dimensions and mixed-axis targets behave
/// the same as in a floating-point implementation. An up-or-equal target on
/// either axis yields an empty schedule.
pub fn step_down_plan(source: (u32, u32), target: (u32, u32)) -> Vec<(u32, u32)> {
    let (mut current_w, mut current_h) = (source.0 as f64, source.1 as f64);
    let (target_w, target_h) = (target.0 as f64, target.1 as f64);
    let mut plan = Vec::new();

    while current_w * 0.5 > target_w && current_h * 0.5 > target_h {
        current_w = (current_w * 0.5).floor();
        current_h = (current_h * 0.5).floor();
        plan.push((current_w as u32, current_h as u32));
    }
    plan
}

/// The interpolating blit: draw an RGBA8 buffer into a freshly allocated
/// buffer of another size. Lanczos3 convolution via fast_image_resize, with
/// alpha premultiply handling and an image-crate fallback when fir rejects
/// the buffer.
fn blit(
    mut src_pixels: Vec<u8>,
    src_w: u32,
    src_h: u32,
    dst_w: u32,
    dst_h: u32,
) -> Result<Vec<u8>, String> {
    let pixel_count = (src_w as usize)
        .checked_mul(src_h as usize)
        .ok_or_else(|| "image dimensions overflow during resample".to_string())?;
    let required_bytes = pixel_count
        .checked_mul(PixelType::U8x4.size())
        .ok_or_else(|| "image buffer size overflow during resample".to_string())?;

    if src_pixels.len() < required_bytes {
        return Err(format!(
            "fir source image invalid buffer size. expected {required_bytes} bytes, got {} bytes",
            src_pixels.len()
        ));
    }

    let primary_result = match fir::images::Image::from_slice_u8(
        src_w,
        src_h,
        src_pixels.as_mut_slice(),
        PixelType::U8x4,
    ) {
        Ok(src_image) => blit_with_source_image(src_image, dst_w, dst_h),
        Err(ImageBufferError::InvalidBufferAlignment) => {
            let aligned = copy_pixels_to_aligned_image(src_w, src_h, &src_pixels, required_bytes)?;
            blit_with_source_image(aligned, dst_w, dst_h)
        }
        Err(other) => Err(format!("fir source image error: {other:?}")),
    };

    match primary_result {
        Ok(pixels) => Ok(pixels),
        Err(err) => blit_with_image_crate_fallback(&src_pixels, src_w, src_h, dst_w, dst_h)
            .map_err(|fallback_err| format!("{err}; image crate fallback failed: {fallback_err}")),
    }
}

fn default_resize_options() -> ResizeOptions {
    ResizeOptions::new().resize_alg(fir::ResizeAlg::Convolution(fir::FilterType::Lanczos3))
}

fn blit_with_source_image(
    mut src_image: fir::images::Image<'_>,
    dst_w: u32,
    dst_h: u32,
) -> Result<Vec<u8>, String> {
    let mut dst_image = fir::images::Image::new(dst_w, dst_h, PixelType::U8x4);

    // Skip premultiply/unpremultiply for fully opaque images. Resizing
    // straight-alpha pixels bleeds transparent-pixel color into edges, so
    // the round trip is only skippable when every alpha byte is 255.
    let needs_premultiply = !is_fully_opaque(&src_image);

    let mul_div = MulDiv::default();
    if needs_premultiply {
        mul_div
            .multiply_alpha_inplace(&mut src_image)
            .map_err(|e| format!("failed to premultiply alpha: {e}"))?;
    }

    let mut resizer = fir::Resizer::new();
    resizer
        .resize(&src_image, &mut dst_image, &default_resize_options())
        .map_err(|e| format!("fir resize error: {e:?}"))?;

    if needs_premultiply {
        mul_div
            .divide_alpha_inplace(&mut dst_image)
            .map_err(|e| format!("failed to unpremultiply alpha: {e}"))?;
    }

    Ok(dst_image.into_vec())
}

/// Check if an RGBA image is fully opaque (all alpha values are 255).
///
/// Only scans images ≥1MP - for smaller images, the check overhead exceeds
/// the premultiply cost (SIMD premultiply is very fast for small images).
fn is_fully_opaque(image: &fir::images::Image) -> bool {
    const THRESHOLD_PIXELS: u64 = 1_000_000;
    if (image.width() as u64).saturating_mul(image.height() as u64) < THRESHOLD_PIXELS {
        return false; // Assume not opaque, do premultiply (it's fast anyway)
    }

    let buffer = image.buffer();
    buffer.iter().skip(3).step_by(4).all(|&alpha| alpha == 255)
}

fn copy_pixels_to_aligned_image(
    width: u32,
    height: u32,
    src_pixels: &[u8],
    required_bytes: usize,
) -> Result<fir::images::Image<'static>, String> {
    let mut aligned_image = fir::images::Image::new(width, height, PixelType::U8x4);
    let aligned_buffer = aligned_image.buffer_mut();
    if aligned_buffer.len() != required_bytes {
        return Err(format!(
            "fir alignment fallback buffer mismatch. expected {required_bytes} bytes, got {} bytes",
            aligned_buffer.len()
        ));
    }
    aligned_buffer.copy_from_slice(&src_pixels[..required_bytes]);
    Ok(aligned_image)
}

fn blit_with_image_crate_fallback(
    src_pixels: &[u8],
    src_w: u32,
    src_h: u32,
    dst_w: u32,
    dst_h: u32,
) -> Result<Vec<u8>, String> {
    let rgba = RgbaImage::from_raw(src_w, src_h, src_pixels.to_vec())
        .ok_or_else(|| "failed to build rgba image for fallback resample".to_string())?;
    let resized = image::imageops::resize(&rgba, dst_w, dst_h, image::imageops::FilterType::Lanczos3);
    Ok(resized.into_raw())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::PixelBuffer;

    fn create_test_buffer(width: u32, height: u32) -> PixelBuffer {
        let data = (0..width as usize * height as usize)
            .flat_map(|i| {
                let x = (i % width as usize) as u8;
                let y = (i / width as usize) as u8;
                [x, y, 128, 255]
            })
            .collect();
        PixelBuffer::from_rgba8(width, height, data).unwrap()
    }

    #[test]
    fn test_identity_resample_is_pixel_equal() {
        let src = create_test_buffer(64, 48);
        let target = Dimensions::new(64, 48).unwrap();
        let out = resample(&src, target).unwrap();
        assert_eq!(out.width(), 64);
        assert_eq!(out.height(), 48);
        assert_eq!(out.data(), src.data());
    }

    #[test]
    fn test_downscale_produces_target_dimensions() {
        let src = create_test_buffer(400, 300);
        let out = resample(&src, Dimensions::new(40, 30).unwrap()).unwrap();
        assert_eq!(out.width(), 40);
        assert_eq!(out.height(), 30);
        assert_eq!(out.data().len(), 40 * 30 * 4);
    }

    #[test]
    fn test_upscale_produces_target_dimensions() {
        let src = create_test_buffer(40, 30);
        let out = resample(&src, Dimensions::new(80, 60).unwrap()).unwrap();
        assert_eq!(out.width(), 80);
        assert_eq!(out.height(), 60);
    }

    #[test]
    fn test_mixed_axes_resample() {
        // Width shrinks, height grows: must take the single-scale path.
        let src = create_test_buffer(200, 50);
        let out = resample(&src, Dimensions::new(50, 100).unwrap()).unwrap();
        assert_eq!(out.width(), 50);
        assert_eq!(out.height(), 100);
    }

    #[test]
    fn test_resample_to_1x1() {
        let src = create_test_buffer(256, 256);
        let out = resample(&src, Dimensions::new(1, 1).unwrap()).unwrap();
        assert_eq!(out.data().len(), 4);
    }

    #[test]
    fn test_downscale_preserves_flat_color() {
        // A flat-color opaque image must stay flat through every halving
        // stage; allow one count of fixed-point convolution rounding.
        let data: Vec<u8> = std::iter::repeat([200u8, 200, 200, 255])
            .take(128 * 128)
            .flatten()
            .collect();
        let src = PixelBuffer::from_rgba8(128, 128, data).unwrap();
        let out = resample(&src, Dimensions::new(10, 10).unwrap()).unwrap();
        for px in out.data().chunks_exact(4) {
            for (channel, expected) in px.iter().zip([200u8, 200, 200, 255]) {
                assert!(channel.abs_diff(expected) <= 1, "got {px:?}");
            }
        }
    }

    mod step_down_plan_tests {
        use super::*;

        #[test]
        fn test_4096_to_100_halves_exactly_five_times() {
            let plan = step_down_plan((4096, 4096), (100, 100));
            assert_eq!(
                plan,
                vec![
                    (2048, 2048),
                    (1024, 1024),
                    (512, 512),
                    (256, 256),
                    (128, 128)
                ]
            );
            // 128 * 0.5 = 64 <= 100 stops the loop; 128x128 -> 100x100 is
            // left for the final direct scale.
        }

        #[test]
        fn test_upscale_has_no_halvings() {
            assert!(step_down_plan((100, 100), (200, 200)).is_empty());
            assert!(step_down_plan((100, 100), (100, 100)).is_empty());
        }

        #[test]
        fn test_mixed_axes_never_loop() {
            // Width would clear the target, height would not: AND policy
            // keeps the loop from running.
            assert!(step_down_plan((200, 50), (50, 100)).is_empty());
            assert!(step_down_plan((50, 200), (100, 50)).is_empty());
        }

        #[test]
        fn test_small_downscale_skips_loop() {
            // 120 * 0.5 = 60 is not > 100: no halving, single direct scale.
            assert!(step_down_plan((120, 120), (100, 100)).is_empty());
        }

        #[test]
        fn test_odd_dimensions_use_real_valued_halving() {
            // 201 * 0.5 = 100.5 > 100 enters the loop; floor gives 100.
            let plan = step_down_plan((201, 201), (100, 100));
            assert_eq!(plan, vec![(100, 100)]);
        }

        #[test]
        fn test_non_square_downscale() {
            let plan = step_down_plan((1600, 900), (100, 100));
            assert_eq!(plan, vec![(800, 450), (400, 225), (200, 112)]);
            // 200 * 0.5 = 100 is not > 100: loop stops even though the
            // height axis could still halve.
        }
    }
}
