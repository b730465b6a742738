//! PDF measurement core library
//!
//! Coordinate transform and measurement bookkeeping for clicking physical
//! measurements off rendered PDF pages: pixel-to-millimeter calibration,
//! specimen rectangles with a rectangle-local millimeter frame, tracked
//! particle projection, and the session aggregate that keeps every
//! derived millimeter value consistent when the calibration changes.

pub mod calibration;
pub mod export;
pub mod geometry;
pub mod measurement;
pub mod plot;
pub mod session;

pub use calibration::{Calibration, CalibrationError, CalibrationSource};
pub use export::{
    export_measurements_csv, export_particles_csv, export_rectangles_csv, read_session_json,
    write_session_json, CsvExportConfig, CsvExportError, MeasurementRecord, ParticleRecord,
    RectangleRecord, SessionDocument, SessionIoError,
};
pub use geometry::{pixel_distance, MmPoint, PixelPoint};
pub use measurement::{
    project_to_rectangle_mm, Measurement, MeasurementCollection, ParticleDisplacement, Rectangle,
    RectangleError, RectangleGroup,
};
pub use plot::{plot_view, LabeledMmPoint, PlotView, RectanglePanel};
pub use session::{Deleted, MeasureSession, PendingClick, GROUP_CYCLE};
