//! Interactive session bookkeeping
//!
//! The state an interactive frontend keeps around the measurement
//! collection: the calibration in effect, the active group tag, the
//! auto-assigned labels, and the half-finished click sequences. The
//! frontend delivers raw pixel clicks; everything else happens here.

use crate::calibration::{Calibration, CalibrationError};
use crate::geometry::PixelPoint;
use crate::measurement::{
    Measurement, MeasurementCollection, ParticleDisplacement, Rectangle, RectangleError,
    RectangleGroup,
};

/// Group tags cycled by the group toggle
pub const GROUP_CYCLE: [&str; 5] = ["pre", "post", "fiber", "edge", "other"];

/// A stored first click waiting for its partner
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingClick {
    pub position_px: PixelPoint,
    pub page_index: usize,
}

/// Entity removed by [`MeasureSession::delete_last`]
#[derive(Debug, Clone, PartialEq)]
pub enum Deleted {
    Measurement(Measurement),
    Particle(ParticleDisplacement),
}

/// One interactive measurement session over a document
#[derive(Debug, Clone)]
pub struct MeasureSession {
    collection: MeasurementCollection,
    calibration: Option<Calibration>,
    current_group: String,
    next_measurement_label: u64,
    next_particle_label: u64,
    pending_measure: Option<PendingClick>,
    pending_particle: Option<PendingClick>,
}

impl MeasureSession {
    /// Create a new session with no calibration and the default group
    pub fn new() -> Self {
        Self {
            collection: MeasurementCollection::new(),
            calibration: None,
            current_group: GROUP_CYCLE[0].to_owned(),
            next_measurement_label: 1,
            next_particle_label: 1,
            pending_measure: None,
            pending_particle: None,
        }
    }

    pub fn collection(&self) -> &MeasurementCollection {
        &self.collection
    }

    pub fn calibration(&self) -> Option<&Calibration> {
        self.calibration.as_ref()
    }

    pub fn current_group(&self) -> &str {
        &self.current_group
    }

    pub fn pending_measure(&self) -> Option<PendingClick> {
        self.pending_measure
    }

    pub fn pending_particle(&self) -> Option<PendingClick> {
        self.pending_particle
    }

    fn scale_factor(&self) -> Option<f64> {
        self.calibration.as_ref().map(Calibration::mm_per_pixel)
    }

    /// Replace the calibration with one derived from page geometry and
    /// refresh every stored millimeter value
    pub fn calibrate_from_page(
        &mut self,
        page_width_mm: f64,
        page_width_px: u32,
    ) -> Result<&Calibration, CalibrationError> {
        let calibration = Calibration::from_page_geometry(page_width_mm, page_width_px)?;
        self.install_calibration(calibration);
        Ok(self.calibration.as_ref().expect("calibration was just installed"))
    }

    /// Replace the calibration with one derived from a known reference
    /// length and refresh every stored millimeter value
    pub fn calibrate_from_reference(
        &mut self,
        p1_px: PixelPoint,
        p2_px: PixelPoint,
        known_length_mm: f64,
        page_index: Option<usize>,
    ) -> Result<&Calibration, CalibrationError> {
        let calibration = Calibration::from_known_length(p1_px, p2_px, known_length_mm, page_index)?;
        self.install_calibration(calibration);
        Ok(self.calibration.as_ref().expect("calibration was just installed"))
    }

    fn install_calibration(&mut self, calibration: Calibration) {
        self.collection.recalibrate(calibration.mm_per_pixel());
        self.calibration = Some(calibration);
    }

    /// Record a measurement click
    ///
    /// The first click is held; the second completes a measurement
    /// labeled `M1`, `M2`, ... tagged with the current group. The page of
    /// the first click wins if the two clicks land on different pages.
    pub fn measure_click(
        &mut self,
        page_index: usize,
        position_px: PixelPoint,
    ) -> Option<&Measurement> {
        match self.pending_measure.take() {
            None => {
                self.pending_measure = Some(PendingClick {
                    position_px,
                    page_index,
                });
                None
            }
            Some(first) => {
                let label = format!("M{}", self.next_measurement_label);
                self.next_measurement_label += 1;
                let factor = self.scale_factor();
                let group = self.current_group.clone();
                Some(self.collection.add_measurement(
                    label,
                    first.page_index,
                    first.position_px,
                    position_px,
                    factor,
                    group,
                    "",
                ))
            }
        }
    }

    /// Record a particle-tracking click
    ///
    /// The first click is the pre-test position; the second (possibly on
    /// a different page) is the post-test position and completes a
    /// particle labeled `P1`, `P2`, ...
    pub fn particle_click(
        &mut self,
        page_index: usize,
        position_px: PixelPoint,
    ) -> Option<&ParticleDisplacement> {
        match self.pending_particle.take() {
            None => {
                self.pending_particle = Some(PendingClick {
                    position_px,
                    page_index,
                });
                None
            }
            Some(pre) => {
                let label = format!("P{}", self.next_particle_label);
                self.next_particle_label += 1;
                let factor = self.scale_factor();
                Some(self.collection.add_particle(
                    label,
                    pre.position_px,
                    position_px,
                    pre.page_index,
                    page_index,
                    factor,
                ))
            }
        }
    }

    /// Build a rectangle from two corner clicks using the current
    /// calibration and store it in its group slot
    pub fn set_rectangle(
        &mut self,
        group: RectangleGroup,
        page_index: usize,
        p1_px: PixelPoint,
        p2_px: PixelPoint,
    ) -> Result<&Rectangle, RectangleError> {
        let factor = self.scale_factor();
        self.collection.add_rectangle(group, page_index, p1_px, p2_px, factor)
    }

    /// Drop any half-finished click sequence
    pub fn cancel_pending(&mut self) {
        self.pending_measure = None;
        self.pending_particle = None;
    }

    /// Advance the active group through the cycle and return it
    pub fn cycle_group(&mut self) -> &str {
        let index = GROUP_CYCLE
            .iter()
            .position(|g| *g == self.current_group)
            .map(|i| (i + 1) % GROUP_CYCLE.len())
            .unwrap_or(0);
        self.current_group = GROUP_CYCLE[index].to_owned();
        &self.current_group
    }

    /// Set the active group to an arbitrary tag
    pub fn set_group(&mut self, group: impl Into<String>) {
        self.current_group = group.into();
    }

    /// Delete the most recent measurement, falling back to the most
    /// recent particle when no measurements remain
    pub fn delete_last(&mut self) -> Option<Deleted> {
        if let Some(measurement) = self.collection.delete_last_measurement() {
            return Some(Deleted::Measurement(measurement));
        }
        self.collection.delete_last_particle().map(Deleted::Particle)
    }

    /// Clear the collection, the label counters, and any pending clicks
    ///
    /// The calibration stays in effect.
    pub fn clear_all(&mut self) {
        self.collection.clear_all();
        self.next_measurement_label = 1;
        self.next_particle_label = 1;
        self.cancel_pending();
    }
}

impl Default for MeasureSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_click_measurement_with_auto_label() {
        let mut session = MeasureSession::new();
        session.calibrate_from_page(210.0, 2100).unwrap();

        assert!(session.measure_click(0, PixelPoint::new(0.0, 0.0)).is_none());
        assert!(session.pending_measure().is_some());

        let measurement = session.measure_click(0, PixelPoint::new(300.0, 400.0)).unwrap();
        assert_eq!(measurement.label(), "M1");
        assert_eq!(measurement.pixel_distance(), 500.0);
        assert_eq!(measurement.length_mm(), Some(50.0));
        assert_eq!(measurement.group(), "pre");
        assert!(session.pending_measure().is_none());

        session.measure_click(0, PixelPoint::new(0.0, 0.0));
        let second = session.measure_click(0, PixelPoint::new(10.0, 0.0)).unwrap();
        assert_eq!(second.label(), "M2");
    }

    #[test]
    fn test_first_click_page_wins() {
        let mut session = MeasureSession::new();
        session.measure_click(3, PixelPoint::new(0.0, 0.0));
        let measurement = session.measure_click(4, PixelPoint::new(10.0, 0.0)).unwrap();
        assert_eq!(measurement.page_index(), 3);
    }

    #[test]
    fn test_particle_capture_across_pages() {
        let mut session = MeasureSession::new();
        session.calibrate_from_page(210.0, 2100).unwrap();
        session
            .set_rectangle(
                RectangleGroup::Pre,
                0,
                PixelPoint::new(50.0, 300.0),
                PixelPoint::new(100.0, 50.0),
            )
            .unwrap();

        assert!(session.particle_click(0, PixelPoint::new(60.0, 290.0)).is_none());
        let particle = session.particle_click(1, PixelPoint::new(220.0, 380.0)).unwrap();

        assert_eq!(particle.label(), "P1");
        assert_eq!(particle.pre_page_index(), 0);
        assert_eq!(particle.post_page_index(), 1);
        // Pre side projects against the pre rectangle; post side has no
        // rectangle yet, so it carries the sentinel.
        assert_eq!(particle.pre_position_mm(), crate::geometry::MmPoint::new(1.0, 1.0));
        assert_eq!(particle.post_position_mm(), crate::geometry::MmPoint::ZERO);
    }

    #[test]
    fn test_calibration_replacement_recalibrates_collection() {
        let mut session = MeasureSession::new();
        session.measure_click(0, PixelPoint::new(0.0, 0.0));
        session.measure_click(0, PixelPoint::new(100.0, 0.0));
        assert!(session.collection().measurements()[0].length_mm().is_none());

        session
            .calibrate_from_reference(
                PixelPoint::new(0.0, 0.0),
                PixelPoint::new(300.0, 400.0),
                50.0,
                Some(0),
            )
            .unwrap();

        assert_eq!(session.collection().measurements()[0].length_mm(), Some(10.0));
    }

    #[test]
    fn test_group_cycle() {
        let mut session = MeasureSession::new();
        assert_eq!(session.current_group(), "pre");
        assert_eq!(session.cycle_group(), "post");
        assert_eq!(session.cycle_group(), "fiber");
        assert_eq!(session.cycle_group(), "edge");
        assert_eq!(session.cycle_group(), "other");
        assert_eq!(session.cycle_group(), "pre");

        session.set_group("custom");
        assert_eq!(session.current_group(), "custom");
        // Unknown tags restart the cycle.
        assert_eq!(session.cycle_group(), "pre");
    }

    #[test]
    fn test_delete_last_prefers_measurements() {
        let mut session = MeasureSession::new();
        session.particle_click(0, PixelPoint::new(0.0, 0.0));
        session.particle_click(0, PixelPoint::new(5.0, 5.0));
        session.measure_click(0, PixelPoint::new(0.0, 0.0));
        session.measure_click(0, PixelPoint::new(10.0, 0.0));

        assert!(matches!(session.delete_last(), Some(Deleted::Measurement(_))));
        assert!(matches!(session.delete_last(), Some(Deleted::Particle(_))));
        assert!(session.delete_last().is_none());
    }

    #[test]
    fn test_cancel_pending() {
        let mut session = MeasureSession::new();
        session.measure_click(0, PixelPoint::new(0.0, 0.0));
        session.particle_click(0, PixelPoint::new(1.0, 1.0));
        session.cancel_pending();
        assert!(session.pending_measure().is_none());
        assert!(session.pending_particle().is_none());

        // The next measure click starts a fresh pair.
        assert!(session.measure_click(0, PixelPoint::new(2.0, 2.0)).is_none());
    }

    #[test]
    fn test_clear_all_resets_labels_but_keeps_calibration() {
        let mut session = MeasureSession::new();
        session.calibrate_from_page(210.0, 2100).unwrap();
        session.measure_click(0, PixelPoint::new(0.0, 0.0));
        session.measure_click(0, PixelPoint::new(10.0, 0.0));

        session.clear_all();

        assert!(session.collection().measurements().is_empty());
        assert!(session.calibration().is_some());

        session.measure_click(0, PixelPoint::new(0.0, 0.0));
        let measurement = session.measure_click(0, PixelPoint::new(10.0, 0.0)).unwrap();
        assert_eq!(measurement.label(), "M1");
        assert_eq!(measurement.id(), 1);
    }
}
