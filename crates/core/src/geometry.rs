//! Geometry primitives for the two coordinate systems
//!
//! Pixel space is the rendered page bitmap: origin top-left, y increases
//! downward. Millimeter space is rectangle-local: origin at a rectangle's
//! bottom-left pixel corner, y increases upward.

/// A point in pixel space (rendered page bitmap)
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PixelPoint {
    pub x: f64,
    pub y: f64,
}

impl PixelPoint {
    /// Create a new pixel-space point
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point, in pixels
    pub fn distance_to(&self, other: &PixelPoint) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// A point in rectangle-local millimeter space
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MmPoint {
    pub x: f64,
    pub y: f64,
}

impl MmPoint {
    /// Create a new millimeter-space point
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// The origin, also used as the "uncalibrated" sentinel for
    /// projections that have no rectangle or scale factor to work with.
    pub const ZERO: MmPoint = MmPoint { x: 0.0, y: 0.0 };
}

/// Euclidean distance between two pixel-space points
pub fn pixel_distance(p1: &PixelPoint, p2: &PixelPoint) -> f64 {
    p1.distance_to(p2)
}
