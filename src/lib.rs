// lib.rs
//
// stepdown-image: high-quality raster downsampling and size-constrained
// re-encoding.
//
// Two pure components, consumed in sequence:
// - Resampler: step-down box resampling. Repeated halving keeps every
//   individual scale ratio near 2:1, where interpolation filters are
//   accurate, then one final direct scale hits the exact target.
// - Size-constrained encoder: a bounded quality walk. Re-encode at
//   decreasing quality until an output byte budget is met, quality
//   bottoms out, or the attempt cap is reached.
//
// No shared mutable state between calls; every invocation is independent
// and reentrant. The caller owns scheduling - nothing here spawns threads
// or defers work.

pub mod engine;
pub mod error;
pub mod ops;

pub use engine::{
    encode_constrained, resample, resize_to_bytes, step_down_plan, EncodeRequest, EncodeResult,
    MozjpegEncoder, PixelBuffer, PngEncoder, QualityEncoder,
};
pub use error::{ErrorCategory, StepdownError};
pub use ops::{Dimensions, LengthUnit, OutputFormat};
