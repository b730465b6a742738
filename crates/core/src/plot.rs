//! Millimeter-space view for the plotting collaborator
//!
//! Pure data: the closed outline ring of each rectangle slot plus every
//! particle's labeled position on that side, all in rectangle-local
//! millimeters. Pixel space never reaches the plotting layer.

use crate::geometry::MmPoint;
use crate::measurement::{MeasurementCollection, RectangleGroup};

/// A particle position labeled for display
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledMmPoint {
    pub label: String,
    pub position_mm: MmPoint,
}

/// One rectangle slot prepared for drawing
#[derive(Debug, Clone, PartialEq)]
pub struct RectanglePanel {
    pub group: RectangleGroup,
    pub width_mm: f64,
    pub height_mm: f64,
    /// Closed outline ring: bottom-left, bottom-right, top-right,
    /// top-left, back to bottom-left
    pub outline_mm: [MmPoint; 5],
    /// Particle positions on this side, in creation order
    pub particles: Vec<LabeledMmPoint>,
}

/// Everything a plotting collaborator needs to draw a session
#[derive(Debug, Clone, PartialEq)]
pub struct PlotView {
    /// Panels for the slots that exist, pre before post
    pub panels: Vec<RectanglePanel>,
    pub particle_count: usize,
}

/// Build the millimeter-space view of a collection
pub fn plot_view(collection: &MeasurementCollection) -> PlotView {
    let mut panels = Vec::new();

    for group in [RectangleGroup::Pre, RectangleGroup::Post] {
        let Some(rectangle) = collection.rectangle(group) else {
            continue;
        };

        let width_mm = rectangle.width_mm();
        let height_mm = rectangle.height_mm();
        let particles = collection
            .particles()
            .iter()
            .map(|particle| LabeledMmPoint {
                label: particle.label().to_owned(),
                position_mm: match group {
                    RectangleGroup::Pre => particle.pre_position_mm(),
                    RectangleGroup::Post => particle.post_position_mm(),
                },
            })
            .collect();

        panels.push(RectanglePanel {
            group,
            width_mm,
            height_mm,
            outline_mm: [
                MmPoint::new(0.0, 0.0),
                MmPoint::new(width_mm, 0.0),
                MmPoint::new(width_mm, height_mm),
                MmPoint::new(0.0, height_mm),
                MmPoint::new(0.0, 0.0),
            ],
            particles,
        });
    }

    PlotView {
        panels,
        particle_count: collection.particles().len(),
    }
}
