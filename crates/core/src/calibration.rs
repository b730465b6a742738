//! Pixel-to-millimeter calibration
//!
//! A calibration is an immutable value object holding the session's
//! millimeters-per-pixel factor. "Changing calibration" means building a
//! new instance and recalibrating the measurement collection with it.

use crate::geometry::{pixel_distance, PixelPoint};

/// Where a calibration factor came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalibrationSource {
    /// Derived from the page's physical width and rendered pixel width
    Page,
    /// Derived from two user-picked points a known distance apart
    Manual,
}

impl std::fmt::Display for CalibrationSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CalibrationSource::Page => write!(f, "page"),
            CalibrationSource::Manual => write!(f, "manual"),
        }
    }
}

/// Error types for calibration construction
#[derive(Debug, thiserror::Error)]
pub enum CalibrationError {
    #[error("page width must be positive and finite, got {width_mm} mm / {width_px} px")]
    InvalidPageWidth { width_mm: f64, width_px: u32 },

    #[error("known length must be positive and finite, got {0} mm")]
    InvalidKnownLength(f64),

    #[error("reference points coincide, cannot derive a scale")]
    CoincidentPoints,
}

/// Scale factor for converting pixel distances to millimeters
///
/// Invariant: `mm_per_pixel` is strictly positive and finite. Both
/// constructors reject inputs that would break it.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Calibration {
    mm_per_pixel: f64,
    source: CalibrationSource,
    page_index: Option<usize>,
    point1_px: Option<PixelPoint>,
    point2_px: Option<PixelPoint>,
    known_length_mm: Option<f64>,
}

impl Calibration {
    /// Derive a calibration from page geometry
    ///
    /// Assumes the page is rendered at true scale: `mm_per_pixel =
    /// page_width_mm / page_width_px`.
    pub fn from_page_geometry(
        page_width_mm: f64,
        page_width_px: u32,
    ) -> Result<Self, CalibrationError> {
        if page_width_px == 0 || !(page_width_mm > 0.0) || !page_width_mm.is_finite() {
            return Err(CalibrationError::InvalidPageWidth {
                width_mm: page_width_mm,
                width_px: page_width_px,
            });
        }

        Ok(Self {
            mm_per_pixel: page_width_mm / page_width_px as f64,
            source: CalibrationSource::Page,
            page_index: None,
            point1_px: None,
            point2_px: None,
            known_length_mm: None,
        })
    }

    /// Derive a calibration from two points with a known distance
    ///
    /// The reference points are recorded for traceability.
    pub fn from_known_length(
        p1_px: PixelPoint,
        p2_px: PixelPoint,
        known_length_mm: f64,
        page_index: Option<usize>,
    ) -> Result<Self, CalibrationError> {
        if !(known_length_mm > 0.0) || !known_length_mm.is_finite() {
            return Err(CalibrationError::InvalidKnownLength(known_length_mm));
        }

        let distance = pixel_distance(&p1_px, &p2_px);
        if distance <= 0.0 {
            return Err(CalibrationError::CoincidentPoints);
        }

        Ok(Self {
            mm_per_pixel: known_length_mm / distance,
            source: CalibrationSource::Manual,
            page_index,
            point1_px: Some(p1_px),
            point2_px: Some(p2_px),
            known_length_mm: Some(known_length_mm),
        })
    }

    /// The millimeters-per-pixel scale factor
    pub fn mm_per_pixel(&self) -> f64 {
        self.mm_per_pixel
    }

    /// Where this calibration came from
    pub fn source(&self) -> CalibrationSource {
        self.source
    }

    /// Page the manual calibration was picked on, if recorded
    pub fn page_index(&self) -> Option<usize> {
        self.page_index
    }

    /// Reference points of a manual calibration, if recorded
    pub fn reference_points(&self) -> Option<(PixelPoint, PixelPoint)> {
        self.point1_px.zip(self.point2_px)
    }

    /// Known reference length of a manual calibration, if recorded
    pub fn known_length_mm(&self) -> Option<f64> {
        self.known_length_mm
    }

    /// Convert a pixel distance to millimeters
    pub fn pixels_to_mm(&self, pixel_distance: f64) -> f64 {
        pixel_distance * self.mm_per_pixel
    }

    /// Convert a millimeter distance to pixels
    pub fn mm_to_pixels(&self, mm_distance: f64) -> f64 {
        mm_distance / self.mm_per_pixel
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_calibration() {
        let cal = Calibration::from_page_geometry(210.0, 1240).unwrap();
        assert!((cal.mm_per_pixel() - 0.169355).abs() < 1e-6);
        assert_eq!(cal.source(), CalibrationSource::Page);
        assert!(cal.reference_points().is_none());
    }

    #[test]
    fn test_page_calibration_rejects_zero_width() {
        assert!(matches!(
            Calibration::from_page_geometry(210.0, 0),
            Err(CalibrationError::InvalidPageWidth { .. })
        ));
        assert!(matches!(
            Calibration::from_page_geometry(0.0, 1240),
            Err(CalibrationError::InvalidPageWidth { .. })
        ));
        assert!(Calibration::from_page_geometry(f64::NAN, 1240).is_err());
    }

    #[test]
    fn test_manual_calibration() {
        let cal = Calibration::from_known_length(
            PixelPoint::new(0.0, 0.0),
            PixelPoint::new(300.0, 400.0),
            50.0,
            Some(2),
        )
        .unwrap();

        // 3-4-5 triangle: 500 px span, 50 mm known length.
        assert!((cal.mm_per_pixel() - 0.1).abs() < 1e-12);
        assert_eq!(cal.source(), CalibrationSource::Manual);
        assert_eq!(cal.page_index(), Some(2));
        assert_eq!(cal.known_length_mm(), Some(50.0));

        let (p1, p2) = cal.reference_points().unwrap();
        assert_eq!(p1, PixelPoint::new(0.0, 0.0));
        assert_eq!(p2, PixelPoint::new(300.0, 400.0));
    }

    #[test]
    fn test_manual_calibration_rejects_coincident_points() {
        let p = PixelPoint::new(100.0, 100.0);
        assert!(matches!(
            Calibration::from_known_length(p, p, 50.0, None),
            Err(CalibrationError::CoincidentPoints)
        ));
    }

    #[test]
    fn test_manual_calibration_rejects_non_positive_length() {
        let p1 = PixelPoint::new(0.0, 0.0);
        let p2 = PixelPoint::new(10.0, 0.0);
        assert!(matches!(
            Calibration::from_known_length(p1, p2, 0.0, None),
            Err(CalibrationError::InvalidKnownLength(_))
        ));
        assert!(Calibration::from_known_length(p1, p2, -4.0, None).is_err());
    }

    #[test]
    fn test_conversion_round_trip() {
        let cal = Calibration::from_page_geometry(210.0, 1240).unwrap();
        for d in [0.5, 1.0, 123.4, 99999.0] {
            let round_tripped = cal.mm_to_pixels(cal.pixels_to_mm(d));
            assert!((round_tripped - d).abs() < 1e-9 * d.max(1.0));
        }
    }
}
