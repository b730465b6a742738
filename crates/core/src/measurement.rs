//! Measurement data model and session aggregate
//!
//! All entities keep their pixel coordinates as the durable primary data;
//! millimeter values are derived views recomputed from the current scale
//! factor. [`MeasurementCollection::recalibrate`] is the single code path
//! that refreshes every derived value after the factor changes.

use crate::geometry::{pixel_distance, MmPoint, PixelPoint};

/// Current time as Unix seconds
fn unix_timestamp() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

/// Rectangle slot identifier: one specimen outline before the test, one after
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RectangleGroup {
    Pre,
    Post,
}

impl std::fmt::Display for RectangleGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RectangleGroup::Pre => write!(f, "pre"),
            RectangleGroup::Post => write!(f, "post"),
        }
    }
}

/// Error types for rectangle construction
#[derive(Debug, thiserror::Error)]
pub enum RectangleError {
    #[error("degenerate rectangle: {width_px} x {height_px} px, both dimensions must be positive")]
    Degenerate { width_px: f64, height_px: f64 },
}

/// A specimen outline drawn as two diagonal corner clicks
///
/// Pixel corners are normalized from the two clicks and never change.
/// "Bottom" follows the millimeter-space convention: the larger pixel y
/// (visually lower on screen) is the millimeter-space bottom, and
/// `bottom_left_mm` is pinned to the origin so the rectangle defines its
/// own millimeter frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Rectangle {
    pub(crate) group: RectangleGroup,
    pub(crate) page_index: usize,
    pub(crate) bottom_left_px: PixelPoint,
    pub(crate) bottom_right_px: PixelPoint,
    pub(crate) top_left_px: PixelPoint,
    pub(crate) top_right_px: PixelPoint,
    pub(crate) bottom_left_mm: MmPoint,
    pub(crate) bottom_right_mm: MmPoint,
    pub(crate) top_left_mm: MmPoint,
    pub(crate) top_right_mm: MmPoint,
    pub(crate) width_px: f64,
    pub(crate) height_px: f64,
    pub(crate) width_mm: f64,
    pub(crate) height_mm: f64,
    pub(crate) timestamp: i64,
}

impl Rectangle {
    /// Build a rectangle from two diagonal corner points
    ///
    /// The two points may come in any diagonal order; the result is the
    /// normalized axis-aligned bounding box. Zero-area input (coincident
    /// points, or points sharing an x or y coordinate) is rejected and
    /// nothing is constructed. Without a scale factor the millimeter
    /// fields stay at zero pending calibration.
    pub fn from_corner_points(
        group: RectangleGroup,
        page_index: usize,
        p1_px: PixelPoint,
        p2_px: PixelPoint,
        mm_per_pixel: Option<f64>,
    ) -> Result<Self, RectangleError> {
        let min_x = p1_px.x.min(p2_px.x);
        let max_x = p1_px.x.max(p2_px.x);
        let min_y = p1_px.y.min(p2_px.y);
        let max_y = p1_px.y.max(p2_px.y);

        let width_px = max_x - min_x;
        let height_px = max_y - min_y;
        if !(width_px > 0.0) || !(height_px > 0.0) {
            return Err(RectangleError::Degenerate {
                width_px,
                height_px,
            });
        }

        // Pixel y grows downward, so max_y is the millimeter-space bottom.
        let mut rectangle = Self {
            group,
            page_index,
            bottom_left_px: PixelPoint::new(min_x, max_y),
            bottom_right_px: PixelPoint::new(max_x, max_y),
            top_left_px: PixelPoint::new(min_x, min_y),
            top_right_px: PixelPoint::new(max_x, min_y),
            bottom_left_mm: MmPoint::ZERO,
            bottom_right_mm: MmPoint::ZERO,
            top_left_mm: MmPoint::ZERO,
            top_right_mm: MmPoint::ZERO,
            width_px,
            height_px,
            width_mm: 0.0,
            height_mm: 0.0,
            timestamp: unix_timestamp(),
        };

        if let Some(factor) = mm_per_pixel {
            rectangle.apply_scale(factor);
        }

        Ok(rectangle)
    }

    fn apply_scale(&mut self, mm_per_pixel: f64) {
        self.width_mm = self.width_px * mm_per_pixel;
        self.height_mm = self.height_px * mm_per_pixel;
        self.bottom_left_mm = MmPoint::ZERO;
        self.bottom_right_mm = MmPoint::new(self.width_mm, 0.0);
        self.top_left_mm = MmPoint::new(0.0, self.height_mm);
        self.top_right_mm = MmPoint::new(self.width_mm, self.height_mm);
    }

    /// Recompute the millimeter dimensions and corners from the unchanged
    /// pixel data
    pub fn recalibrate(&mut self, mm_per_pixel: f64) {
        self.apply_scale(mm_per_pixel);
    }

    /// Project a pixel point into this rectangle's millimeter frame
    ///
    /// The frame is anchored at `bottom_left_px`: x grows rightward as in
    /// pixel space, y is inverted (pixel y grows downward, millimeter y
    /// grows upward). The projection is not clipped, so points outside
    /// the rectangle legitimately map to negative or over-range
    /// coordinates.
    pub fn project_point(&self, point_px: &PixelPoint, mm_per_pixel: f64) -> MmPoint {
        let dx_px = point_px.x - self.bottom_left_px.x;
        let dy_px = self.bottom_left_px.y - point_px.y;
        MmPoint::new(dx_px * mm_per_pixel, dy_px * mm_per_pixel)
    }

    pub fn group(&self) -> RectangleGroup {
        self.group
    }

    pub fn page_index(&self) -> usize {
        self.page_index
    }

    pub fn bottom_left_px(&self) -> PixelPoint {
        self.bottom_left_px
    }

    pub fn bottom_right_px(&self) -> PixelPoint {
        self.bottom_right_px
    }

    pub fn top_left_px(&self) -> PixelPoint {
        self.top_left_px
    }

    pub fn top_right_px(&self) -> PixelPoint {
        self.top_right_px
    }

    pub fn bottom_left_mm(&self) -> MmPoint {
        self.bottom_left_mm
    }

    pub fn bottom_right_mm(&self) -> MmPoint {
        self.bottom_right_mm
    }

    pub fn top_left_mm(&self) -> MmPoint {
        self.top_left_mm
    }

    pub fn top_right_mm(&self) -> MmPoint {
        self.top_right_mm
    }

    pub fn width_px(&self) -> f64 {
        self.width_px
    }

    pub fn height_px(&self) -> f64 {
        self.height_px
    }

    pub fn width_mm(&self) -> f64 {
        self.width_mm
    }

    pub fn height_mm(&self) -> f64 {
        self.height_mm
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }
}

/// Project a pixel point into a rectangle's millimeter frame
///
/// Returns the `(0.0, 0.0)` sentinel when the rectangle or the scale
/// factor is absent. The sentinel means "uncalibrated", not a point at
/// the origin.
pub fn project_to_rectangle_mm(
    point_px: &PixelPoint,
    rectangle: Option<&Rectangle>,
    mm_per_pixel: Option<f64>,
) -> MmPoint {
    match (rectangle, mm_per_pixel) {
        (Some(rectangle), Some(factor)) => rectangle.project_point(point_px, factor),
        _ => MmPoint::ZERO,
    }
}

/// A two-point distance annotation
///
/// `pixel_distance` is fixed at creation; `length_mm` is a derived view
/// refreshed on recalibration and absent while uncalibrated.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub(crate) id: u64,
    pub(crate) label: String,
    pub(crate) page_index: usize,
    pub(crate) point1_px: PixelPoint,
    pub(crate) point2_px: PixelPoint,
    pub(crate) pixel_distance: f64,
    pub(crate) length_mm: Option<f64>,
    pub(crate) group: String,
    pub(crate) notes: String,
    pub(crate) timestamp: i64,
}

impl Measurement {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn page_index(&self) -> usize {
        self.page_index
    }

    pub fn point1_px(&self) -> PixelPoint {
        self.point1_px
    }

    pub fn point2_px(&self) -> PixelPoint {
        self.point2_px
    }

    pub fn pixel_distance(&self) -> f64 {
        self.pixel_distance
    }

    pub fn length_mm(&self) -> Option<f64> {
        self.length_mm
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn notes(&self) -> &str {
        &self.notes
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Horizontal displacement in pixels
    pub fn dx_px(&self) -> f64 {
        self.point2_px.x - self.point1_px.x
    }

    /// Vertical displacement in pixels
    pub fn dy_px(&self) -> f64 {
        self.point2_px.y - self.point1_px.y
    }

    /// Angle of the measurement line from horizontal, in degrees
    pub fn angle_degrees(&self) -> f64 {
        self.dy_px().atan2(self.dx_px()).to_degrees()
    }

    pub(crate) fn recalibrate(&mut self, mm_per_pixel: f64) {
        self.length_mm = Some(self.pixel_distance * mm_per_pixel);
    }
}

/// A tracked point observed before and after the test
///
/// Each side is projected into the millimeter frame of the matching
/// rectangle slot. A side with no rectangle (or no calibration) at
/// projection time carries the `(0.0, 0.0)` sentinel until the next
/// recalibration.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticleDisplacement {
    pub(crate) id: u64,
    pub(crate) label: String,
    pub(crate) pre_position_px: PixelPoint,
    pub(crate) post_position_px: PixelPoint,
    pub(crate) pre_position_mm: MmPoint,
    pub(crate) post_position_mm: MmPoint,
    pub(crate) pre_page_index: usize,
    pub(crate) post_page_index: usize,
}

impl ParticleDisplacement {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn pre_position_px(&self) -> PixelPoint {
        self.pre_position_px
    }

    pub fn post_position_px(&self) -> PixelPoint {
        self.post_position_px
    }

    pub fn pre_position_mm(&self) -> MmPoint {
        self.pre_position_mm
    }

    pub fn post_position_mm(&self) -> MmPoint {
        self.post_position_mm
    }

    pub fn pre_page_index(&self) -> usize {
        self.pre_page_index
    }

    pub fn post_page_index(&self) -> usize {
        self.post_page_index
    }

    /// Millimeter-space displacement (post minus pre)
    pub fn displacement_mm(&self) -> (f64, f64) {
        (
            self.post_position_mm.x - self.pre_position_mm.x,
            self.post_position_mm.y - self.pre_position_mm.y,
        )
    }

    /// Magnitude of the millimeter-space displacement
    pub fn displacement_magnitude_mm(&self) -> f64 {
        let (dx, dy) = self.displacement_mm();
        (dx * dx + dy * dy).sqrt()
    }
}

/// Aggregate session state: rectangle slots, measurements, particles
///
/// Id counters are owned by the instance so independent sessions never
/// interfere. Ids are assigned in creation order, never reused within a
/// session, and reset to 1 only by [`MeasurementCollection::clear_all`].
#[derive(Debug, Clone)]
pub struct MeasurementCollection {
    pre_rectangle: Option<Rectangle>,
    post_rectangle: Option<Rectangle>,
    measurements: Vec<Measurement>,
    particles: Vec<ParticleDisplacement>,
    next_measurement_id: u64,
    next_particle_id: u64,
}

impl MeasurementCollection {
    /// Create a new empty collection
    pub fn new() -> Self {
        Self {
            pre_rectangle: None,
            post_rectangle: None,
            measurements: Vec::new(),
            particles: Vec::new(),
            next_measurement_id: 1,
            next_particle_id: 1,
        }
    }

    /// Build a rectangle from two corner clicks and store it in its
    /// group slot
    ///
    /// A successful build replaces any existing rectangle for that group.
    /// A rejected build leaves the slot untouched.
    pub fn add_rectangle(
        &mut self,
        group: RectangleGroup,
        page_index: usize,
        p1_px: PixelPoint,
        p2_px: PixelPoint,
        mm_per_pixel: Option<f64>,
    ) -> Result<&Rectangle, RectangleError> {
        let rectangle = Rectangle::from_corner_points(group, page_index, p1_px, p2_px, mm_per_pixel)?;
        let slot = self.slot_mut(group);
        *slot = Some(rectangle);
        Ok(slot.as_ref().expect("slot was just filled"))
    }

    /// Remove and return the rectangle for a group, if present
    pub fn delete_rectangle(&mut self, group: RectangleGroup) -> Option<Rectangle> {
        self.slot_mut(group).take()
    }

    /// The rectangle currently stored for a group
    pub fn rectangle(&self, group: RectangleGroup) -> Option<&Rectangle> {
        match group {
            RectangleGroup::Pre => self.pre_rectangle.as_ref(),
            RectangleGroup::Post => self.post_rectangle.as_ref(),
        }
    }

    pub fn pre_rectangle(&self) -> Option<&Rectangle> {
        self.pre_rectangle.as_ref()
    }

    pub fn post_rectangle(&self) -> Option<&Rectangle> {
        self.post_rectangle.as_ref()
    }

    fn slot_mut(&mut self, group: RectangleGroup) -> &mut Option<Rectangle> {
        match group {
            RectangleGroup::Pre => &mut self.pre_rectangle,
            RectangleGroup::Post => &mut self.post_rectangle,
        }
    }

    /// Add a new distance measurement
    ///
    /// Any two finite points are valid, including coincident ones (the
    /// pixel distance is then 0). Without a scale factor the millimeter
    /// length stays absent.
    #[allow(clippy::too_many_arguments)]
    pub fn add_measurement(
        &mut self,
        label: impl Into<String>,
        page_index: usize,
        point1_px: PixelPoint,
        point2_px: PixelPoint,
        mm_per_pixel: Option<f64>,
        group: impl Into<String>,
        notes: impl Into<String>,
    ) -> &Measurement {
        let distance = pixel_distance(&point1_px, &point2_px);
        let measurement = Measurement {
            id: self.next_measurement_id,
            label: label.into(),
            page_index,
            point1_px,
            point2_px,
            pixel_distance: distance,
            length_mm: mm_per_pixel.map(|factor| distance * factor),
            group: group.into(),
            notes: notes.into(),
            timestamp: unix_timestamp(),
        };
        self.next_measurement_id += 1;
        self.measurements.push(measurement);
        self.measurements.last().expect("measurement was just pushed")
    }

    /// Add a tracked particle
    ///
    /// Both positions are projected against the collection's current
    /// rectangle slots; a missing slot or missing calibration leaves the
    /// `(0.0, 0.0)` sentinel on that side.
    pub fn add_particle(
        &mut self,
        label: impl Into<String>,
        pre_position_px: PixelPoint,
        post_position_px: PixelPoint,
        pre_page_index: usize,
        post_page_index: usize,
        mm_per_pixel: Option<f64>,
    ) -> &ParticleDisplacement {
        let particle = ParticleDisplacement {
            id: self.next_particle_id,
            label: label.into(),
            pre_position_px,
            post_position_px,
            pre_position_mm: project_to_rectangle_mm(
                &pre_position_px,
                self.pre_rectangle.as_ref(),
                mm_per_pixel,
            ),
            post_position_mm: project_to_rectangle_mm(
                &post_position_px,
                self.post_rectangle.as_ref(),
                mm_per_pixel,
            ),
            pre_page_index,
            post_page_index,
        };
        self.next_particle_id += 1;
        self.particles.push(particle);
        self.particles.last().expect("particle was just pushed")
    }

    /// Remove and return the most recent measurement
    pub fn delete_last_measurement(&mut self) -> Option<Measurement> {
        self.measurements.pop()
    }

    /// Remove and return the most recent particle
    pub fn delete_last_particle(&mut self) -> Option<ParticleDisplacement> {
        self.particles.pop()
    }

    /// Empty both lists, clear both rectangle slots, and reset the id
    /// counters to 1
    pub fn clear_all(&mut self) {
        self.pre_rectangle = None;
        self.post_rectangle = None;
        self.measurements.clear();
        self.particles.clear();
        self.next_measurement_id = 1;
        self.next_particle_id = 1;
    }

    /// Re-derive every stored millimeter value from a new scale factor
    ///
    /// Measurements get a fresh `length_mm`, both rectangle slots get
    /// fresh millimeter dimensions and corners, and every particle is
    /// re-projected against the current slots. Pixel data is never
    /// touched.
    pub fn recalibrate(&mut self, mm_per_pixel: f64) {
        for measurement in &mut self.measurements {
            measurement.recalibrate(mm_per_pixel);
        }

        if let Some(rectangle) = self.pre_rectangle.as_mut() {
            rectangle.recalibrate(mm_per_pixel);
        }
        if let Some(rectangle) = self.post_rectangle.as_mut() {
            rectangle.recalibrate(mm_per_pixel);
        }

        let pre = self.pre_rectangle.as_ref();
        let post = self.post_rectangle.as_ref();
        for particle in &mut self.particles {
            particle.pre_position_mm =
                project_to_rectangle_mm(&particle.pre_position_px, pre, Some(mm_per_pixel));
            particle.post_position_mm =
                project_to_rectangle_mm(&particle.post_position_px, post, Some(mm_per_pixel));
        }
    }

    /// All measurements in creation order
    pub fn measurements(&self) -> &[Measurement] {
        &self.measurements
    }

    /// All particles in creation order
    pub fn particles(&self) -> &[ParticleDisplacement] {
        &self.particles
    }

    /// Measurements tagged with a group, in creation order
    pub fn measurements_by_group(&self, group: &str) -> Vec<&Measurement> {
        self.measurements
            .iter()
            .filter(|m| m.group == group)
            .collect()
    }

    /// Measurements on a page, in creation order
    pub fn measurements_by_page(&self, page_index: usize) -> Vec<&Measurement> {
        self.measurements
            .iter()
            .filter(|m| m.page_index == page_index)
            .collect()
    }

    /// Reinsert a loaded measurement, bumping the id counter past it
    pub(crate) fn restore_measurement(&mut self, measurement: Measurement) {
        self.next_measurement_id = self.next_measurement_id.max(measurement.id + 1);
        self.measurements.push(measurement);
    }

    /// Reinsert a loaded particle, bumping the id counter past it
    pub(crate) fn restore_particle(&mut self, particle: ParticleDisplacement) {
        self.next_particle_id = self.next_particle_id.max(particle.id + 1);
        self.particles.push(particle);
    }

    /// Reinsert a loaded rectangle into its group slot
    pub(crate) fn restore_rectangle(&mut self, rectangle: Rectangle) {
        let slot = self.slot_mut(rectangle.group);
        *slot = Some(rectangle);
    }

    #[cfg(test)]
    pub(crate) fn next_ids(&self) -> (u64, u64) {
        (self.next_measurement_id, self.next_particle_id)
    }
}

impl Default for MeasurementCollection {
    fn default() -> Self {
        Self::new()
    }
}
