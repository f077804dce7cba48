// src/ops.rs
//
// Request-side types: output format selection, physical-unit conversion,
// and validated target dimensions. These are cheap to create and carry no
// pixel data - the expensive work happens in the engine.

use crate::error::StepdownError;

/// Output format for re-encoding.
///
/// PNG is the lossless target; JPEG carries the lossy quality axis the
/// size-constrained search walks down.
#[derive(Clone, Debug, PartialEq)]
pub enum OutputFormat {
    Jpeg { quality: f32 },
    Png,
}

impl OutputFormat {
    /// Parse a format name. `quality` applies to lossy formats only and
    /// defaults to 0.8 when not given.
    pub fn from_str(format: &str, quality: Option<f32>) -> Result<Self, StepdownError> {
        let q = quality.unwrap_or(0.8);
        match format.to_lowercase().as_str() {
            "jpeg" | "jpg" => Ok(Self::Jpeg { quality: q }),
            "png" => Ok(Self::Png),
            other => Err(StepdownError::invalid_argument(
                "format",
                other.to_string(),
                "expected jpeg or png",
            )),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Jpeg { .. } => "jpeg",
            Self::Png => "png",
        }
    }
}

/// Physical length units convertible to pixel counts at a given DPI.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LengthUnit {
    Pixels,
    Inches,
    Centimeters,
    Millimeters,
}

impl LengthUnit {
    /// Convert a length in this unit to pixels at `dpi`.
    pub fn to_pixels(&self, value: f64, dpi: f64) -> f64 {
        match self {
            Self::Pixels => value,
            Self::Inches => value * dpi,
            Self::Centimeters => value / 2.54 * dpi,
            Self::Millimeters => value / 25.4 * dpi,
        }
    }

    /// Convert a pixel count back to this unit at `dpi`.
    pub fn from_pixels(&self, pixels: f64, dpi: f64) -> f64 {
        match self {
            Self::Pixels => pixels,
            Self::Inches => pixels / dpi,
            Self::Centimeters => pixels / dpi * 2.54,
            Self::Millimeters => pixels / dpi * 25.4,
        }
    }
}

/// Validated target dimensions in pixels.
///
/// Construction rejects zero on either axis, so the engine never sees a
/// degenerate target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Dimensions {
    width: u32,
    height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Result<Self, StepdownError> {
        if width == 0 || height == 0 {
            return Err(StepdownError::invalid_dimensions(width, height));
        }
        Ok(Self { width, height })
    }

    /// Build dimensions from physical lengths, rounding to whole pixels.
    /// Non-finite or non-positive results are rejected.
    pub fn from_physical(
        width: f64,
        height: f64,
        unit: LengthUnit,
        dpi: f64,
    ) -> Result<Self, StepdownError> {
        let w = unit.to_pixels(width, dpi);
        let h = unit.to_pixels(height, dpi);
        if !w.is_finite() || !h.is_finite() || w < 0.5 || h < 0.5 {
            return Err(StepdownError::invalid_argument(
                "physical dimensions",
                format!("{width}x{height} at {dpi} dpi"),
                "must convert to at least one pixel on each axis",
            ));
        }
        Self::new(w.round() as u32, h.round() as u32)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Derive new dimensions with the given width, preserving this aspect
    /// ratio. The original resizer's aspect lock, as pure math.
    pub fn scaled_to_width(&self, width: u32) -> Result<Self, StepdownError> {
        if width == 0 {
            return Err(StepdownError::invalid_dimensions(width, self.height));
        }
        let height = (width as f64 * self.height as f64 / self.width as f64).round() as u32;
        Self::new(width, height.max(1))
    }

    /// Derive new dimensions with the given height, preserving this aspect
    /// ratio.
    pub fn scaled_to_height(&self, height: u32) -> Result<Self, StepdownError> {
        if height == 0 {
            return Err(StepdownError::invalid_dimensions(self.width, height));
        }
        let width = (height as f64 * self.width as f64 / self.height as f64).round() as u32;
        Self::new(width.max(1), height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_str() {
        assert_eq!(
            OutputFormat::from_str("JPG", Some(0.5)).unwrap(),
            OutputFormat::Jpeg { quality: 0.5 }
        );
        assert_eq!(OutputFormat::from_str("png", None).unwrap(), OutputFormat::Png);
        assert!(OutputFormat::from_str("webp", None).is_err());
    }

    #[test]
    fn test_format_default_quality() {
        match OutputFormat::from_str("jpeg", None).unwrap() {
            OutputFormat::Jpeg { quality } => assert!((quality - 0.8).abs() < f32::EPSILON),
            other => panic!("unexpected format: {other:?}"),
        }
    }

    #[test]
    fn test_unit_conversion_inch_round_trip() {
        // 1 inch at 300 DPI is exactly 300 pixels, and back again.
        let px = LengthUnit::Inches.to_pixels(1.0, 300.0);
        assert_eq!(px, 300.0);
        let inches = LengthUnit::Inches.from_pixels(px, 300.0);
        assert!((inches - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_unit_conversion_metric() {
        // 2.54 cm = 1 inch; 25.4 mm = 1 inch.
        let from_cm = LengthUnit::Centimeters.to_pixels(2.54, 300.0);
        assert!((from_cm - 300.0).abs() < 1e-9);
        let from_mm = LengthUnit::Millimeters.to_pixels(25.4, 300.0);
        assert!((from_mm - 300.0).abs() < 1e-9);

        let back = LengthUnit::Millimeters.from_pixels(from_mm, 300.0);
        assert!((back - 25.4).abs() < 1e-9);
    }

    #[test]
    fn test_dimensions_reject_zero() {
        assert!(Dimensions::new(0, 100).is_err());
        assert!(Dimensions::new(100, 0).is_err());
        assert!(Dimensions::new(1, 1).is_ok());
    }

    #[test]
    fn test_dimensions_from_physical() {
        let dims = Dimensions::from_physical(1.0, 2.0, LengthUnit::Inches, 300.0).unwrap();
        assert_eq!(dims.width(), 300);
        assert_eq!(dims.height(), 600);

        assert!(Dimensions::from_physical(0.0, 1.0, LengthUnit::Inches, 300.0).is_err());
        assert!(Dimensions::from_physical(f64::NAN, 1.0, LengthUnit::Inches, 300.0).is_err());
    }

    #[test]
    fn test_aspect_ratio_helpers() {
        let dims = Dimensions::new(1600, 900).unwrap();
        let scaled = dims.scaled_to_width(800).unwrap();
        assert_eq!(scaled.width(), 800);
        assert_eq!(scaled.height(), 450);

        let scaled = dims.scaled_to_height(450).unwrap();
        assert_eq!(scaled.width(), 800);

        // A very wide target never collapses the short axis to zero.
        let thin = Dimensions::new(10000, 1).unwrap();
        let scaled = thin.scaled_to_width(10).unwrap();
        assert_eq!(scaled.height(), 1);
    }
}
