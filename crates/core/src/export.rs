//! Flat export views and session serialization
//!
//! Every entity flattens to a record with stable field names so external
//! tooling can round-trip a session. The JSON session document carries
//! the calibration alongside the collection; the CSV writers emit one
//! table per entity kind.

use std::io::{Read, Write};

use crate::calibration::Calibration;
use crate::geometry::{MmPoint, PixelPoint};
use crate::measurement::{
    Measurement, MeasurementCollection, ParticleDisplacement, Rectangle, RectangleGroup,
};

/// Error types for session document I/O
#[derive(Debug, thiserror::Error)]
pub enum SessionIoError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Error types for CSV export
#[derive(Debug, thiserror::Error)]
pub enum CsvExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV serialization error: {0}")]
    Csv(#[from] csv::Error),
}

/// Configuration for CSV export
#[derive(Debug, Clone)]
pub struct CsvExportConfig {
    /// Include column headers in the output
    pub include_headers: bool,

    /// CSV delimiter character
    pub delimiter: u8,

    /// Export only measurements from specific pages (None = all pages)
    pub page_filter: Option<Vec<usize>>,

    /// Export only measurements with this group tag (None = all groups)
    pub group_filter: Option<String>,
}

impl Default for CsvExportConfig {
    fn default() -> Self {
        Self {
            include_headers: true,
            delimiter: b',',
            page_filter: None,
            group_filter: None,
        }
    }
}

/// Flat view of a [`Measurement`]
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MeasurementRecord {
    pub id: u64,
    pub label: String,
    pub group: String,
    pub page: usize,
    pub x1_px: f64,
    pub y1_px: f64,
    pub x2_px: f64,
    pub y2_px: f64,
    pub dx_px: f64,
    pub dy_px: f64,
    pub pixel_distance: f64,
    pub length_mm: Option<f64>,
    pub angle_deg: f64,
    pub timestamp: i64,
    pub notes: String,
}

impl From<&Measurement> for MeasurementRecord {
    fn from(measurement: &Measurement) -> Self {
        Self {
            id: measurement.id(),
            label: measurement.label().to_owned(),
            group: measurement.group().to_owned(),
            page: measurement.page_index(),
            x1_px: measurement.point1_px().x,
            y1_px: measurement.point1_px().y,
            x2_px: measurement.point2_px().x,
            y2_px: measurement.point2_px().y,
            dx_px: measurement.dx_px(),
            dy_px: measurement.dy_px(),
            pixel_distance: measurement.pixel_distance(),
            length_mm: measurement.length_mm(),
            angle_deg: measurement.angle_degrees(),
            timestamp: measurement.timestamp(),
            notes: measurement.notes().to_owned(),
        }
    }
}

impl MeasurementRecord {
    fn into_measurement(self) -> Measurement {
        Measurement {
            id: self.id,
            label: self.label,
            page_index: self.page,
            point1_px: PixelPoint::new(self.x1_px, self.y1_px),
            point2_px: PixelPoint::new(self.x2_px, self.y2_px),
            pixel_distance: self.pixel_distance,
            length_mm: self.length_mm,
            group: self.group,
            notes: self.notes,
            timestamp: self.timestamp,
        }
    }
}

/// Flat view of a [`Rectangle`]
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RectangleRecord {
    pub group: RectangleGroup,
    pub page: usize,
    pub bottom_left_px: PixelPoint,
    pub bottom_right_px: PixelPoint,
    pub top_left_px: PixelPoint,
    pub top_right_px: PixelPoint,
    pub bottom_left_mm: MmPoint,
    pub bottom_right_mm: MmPoint,
    pub top_left_mm: MmPoint,
    pub top_right_mm: MmPoint,
    pub width_px: f64,
    pub height_px: f64,
    pub width_mm: f64,
    pub height_mm: f64,
    pub timestamp: i64,
}

impl From<&Rectangle> for RectangleRecord {
    fn from(rectangle: &Rectangle) -> Self {
        Self {
            group: rectangle.group(),
            page: rectangle.page_index(),
            bottom_left_px: rectangle.bottom_left_px(),
            bottom_right_px: rectangle.bottom_right_px(),
            top_left_px: rectangle.top_left_px(),
            top_right_px: rectangle.top_right_px(),
            bottom_left_mm: rectangle.bottom_left_mm(),
            bottom_right_mm: rectangle.bottom_right_mm(),
            top_left_mm: rectangle.top_left_mm(),
            top_right_mm: rectangle.top_right_mm(),
            width_px: rectangle.width_px(),
            height_px: rectangle.height_px(),
            width_mm: rectangle.width_mm(),
            height_mm: rectangle.height_mm(),
            timestamp: rectangle.timestamp(),
        }
    }
}

impl RectangleRecord {
    fn into_rectangle(self) -> Rectangle {
        Rectangle {
            group: self.group,
            page_index: self.page,
            bottom_left_px: self.bottom_left_px,
            bottom_right_px: self.bottom_right_px,
            top_left_px: self.top_left_px,
            top_right_px: self.top_right_px,
            bottom_left_mm: self.bottom_left_mm,
            bottom_right_mm: self.bottom_right_mm,
            top_left_mm: self.top_left_mm,
            top_right_mm: self.top_right_mm,
            width_px: self.width_px,
            height_px: self.height_px,
            width_mm: self.width_mm,
            height_mm: self.height_mm,
            timestamp: self.timestamp,
        }
    }
}

/// Flat view of a [`ParticleDisplacement`]
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ParticleRecord {
    pub id: u64,
    pub label: String,
    pub pre_x_px: f64,
    pub pre_y_px: f64,
    pub post_x_px: f64,
    pub post_y_px: f64,
    pub pre_x_mm: f64,
    pub pre_y_mm: f64,
    pub post_x_mm: f64,
    pub post_y_mm: f64,
    pub pre_page: usize,
    pub post_page: usize,
}

impl From<&ParticleDisplacement> for ParticleRecord {
    fn from(particle: &ParticleDisplacement) -> Self {
        Self {
            id: particle.id(),
            label: particle.label().to_owned(),
            pre_x_px: particle.pre_position_px().x,
            pre_y_px: particle.pre_position_px().y,
            post_x_px: particle.post_position_px().x,
            post_y_px: particle.post_position_px().y,
            pre_x_mm: particle.pre_position_mm().x,
            pre_y_mm: particle.pre_position_mm().y,
            post_x_mm: particle.post_position_mm().x,
            post_y_mm: particle.post_position_mm().y,
            pre_page: particle.pre_page_index(),
            post_page: particle.post_page_index(),
        }
    }
}

impl ParticleRecord {
    fn into_particle(self) -> ParticleDisplacement {
        ParticleDisplacement {
            id: self.id,
            label: self.label,
            pre_position_px: PixelPoint::new(self.pre_x_px, self.pre_y_px),
            post_position_px: PixelPoint::new(self.post_x_px, self.post_y_px),
            pre_position_mm: MmPoint::new(self.pre_x_mm, self.pre_y_mm),
            post_position_mm: MmPoint::new(self.post_x_mm, self.post_y_mm),
            pre_page_index: self.pre_page,
            post_page_index: self.post_page,
        }
    }
}

/// Session document envelope metadata
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SessionMetadata {
    /// Export time as Unix seconds
    pub exported: i64,
    /// Calibration in effect when the session was written
    pub calibration: Option<Calibration>,
}

/// The two rectangle slots of a session
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RectangleSlots {
    pub pre: Option<RectangleRecord>,
    pub post: Option<RectangleRecord>,
}

/// Complete flat view of a measurement session
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SessionDocument {
    pub metadata: SessionMetadata,
    pub rectangles: RectangleSlots,
    pub measurements: Vec<MeasurementRecord>,
    pub particles: Vec<ParticleRecord>,
}

impl SessionDocument {
    /// Flatten a collection and its calibration into a document
    pub fn from_collection(
        collection: &MeasurementCollection,
        calibration: Option<&Calibration>,
    ) -> Self {
        let exported = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64;

        Self {
            metadata: SessionMetadata {
                exported,
                calibration: calibration.cloned(),
            },
            rectangles: RectangleSlots {
                pre: collection.pre_rectangle().map(RectangleRecord::from),
                post: collection.post_rectangle().map(RectangleRecord::from),
            },
            measurements: collection
                .measurements()
                .iter()
                .map(MeasurementRecord::from)
                .collect(),
            particles: collection.particles().iter().map(ParticleRecord::from).collect(),
        }
    }

    /// Rebuild the collection and calibration from this document
    ///
    /// Id counters are reconstructed as `max(existing ids) + 1` per list.
    pub fn into_collection(self) -> (MeasurementCollection, Option<Calibration>) {
        let mut collection = MeasurementCollection::new();

        if let Some(record) = self.rectangles.pre {
            collection.restore_rectangle(record.into_rectangle());
        }
        if let Some(record) = self.rectangles.post {
            collection.restore_rectangle(record.into_rectangle());
        }
        for record in self.measurements {
            collection.restore_measurement(record.into_measurement());
        }
        for record in self.particles {
            collection.restore_particle(record.into_particle());
        }

        (collection, self.metadata.calibration)
    }
}

/// Write a session document as pretty-printed JSON
pub fn write_session_json<W: Write>(
    writer: W,
    collection: &MeasurementCollection,
    calibration: Option<&Calibration>,
) -> Result<(), SessionIoError> {
    let document = SessionDocument::from_collection(collection, calibration);
    serde_json::to_writer_pretty(writer, &document)?;
    Ok(())
}

/// Read a session document from JSON and rebuild the collection
pub fn read_session_json<R: Read>(
    reader: R,
) -> Result<(MeasurementCollection, Option<Calibration>), SessionIoError> {
    let document: SessionDocument = serde_json::from_reader(reader)?;
    Ok(document.into_collection())
}

fn measurement_passes(config: &CsvExportConfig, record: &MeasurementRecord) -> bool {
    if let Some(ref pages) = config.page_filter {
        if !pages.contains(&record.page) {
            return false;
        }
    }
    if let Some(ref group) = config.group_filter {
        if &record.group != group {
            return false;
        }
    }
    true
}

/// Export measurements to CSV format
///
/// One row per measurement, in creation order. The millimeter length
/// column is empty while uncalibrated.
pub fn export_measurements_csv<W: Write>(
    writer: W,
    collection: &MeasurementCollection,
    config: &CsvExportConfig,
) -> Result<(), CsvExportError> {
    let mut csv_writer = csv::WriterBuilder::new()
        .delimiter(config.delimiter)
        .has_headers(config.include_headers)
        .from_writer(writer);

    if config.include_headers {
        csv_writer.write_record([
            "id",
            "label",
            "group",
            "page",
            "x1_px",
            "y1_px",
            "x2_px",
            "y2_px",
            "dx_px",
            "dy_px",
            "pixel_distance",
            "length_mm",
            "angle_deg",
            "timestamp",
            "notes",
        ])?;
    }

    for measurement in collection.measurements() {
        let record = MeasurementRecord::from(measurement);
        if !measurement_passes(config, &record) {
            continue;
        }

        csv_writer.write_record(&[
            record.id.to_string(),
            record.label,
            record.group,
            record.page.to_string(),
            format!("{:.2}", record.x1_px),
            format!("{:.2}", record.y1_px),
            format!("{:.2}", record.x2_px),
            format!("{:.2}", record.y2_px),
            format!("{:.2}", record.dx_px),
            format!("{:.2}", record.dy_px),
            format!("{:.2}", record.pixel_distance),
            record.length_mm.map(|v| format!("{v:.4}")).unwrap_or_default(),
            format!("{:.2}", record.angle_deg),
            record.timestamp.to_string(),
            record.notes,
        ])?;
    }

    csv_writer.flush()?;
    Ok(())
}

/// Export particle displacements to CSV format
pub fn export_particles_csv<W: Write>(
    writer: W,
    collection: &MeasurementCollection,
    config: &CsvExportConfig,
) -> Result<(), CsvExportError> {
    let mut csv_writer = csv::WriterBuilder::new()
        .delimiter(config.delimiter)
        .has_headers(config.include_headers)
        .from_writer(writer);

    if config.include_headers {
        csv_writer.write_record([
            "id",
            "label",
            "pre_x_px",
            "pre_y_px",
            "post_x_px",
            "post_y_px",
            "pre_x_mm",
            "pre_y_mm",
            "post_x_mm",
            "post_y_mm",
            "pre_page",
            "post_page",
        ])?;
    }

    for particle in collection.particles() {
        let record = ParticleRecord::from(particle);
        csv_writer.write_record(&[
            record.id.to_string(),
            record.label,
            format!("{:.2}", record.pre_x_px),
            format!("{:.2}", record.pre_y_px),
            format!("{:.2}", record.post_x_px),
            format!("{:.2}", record.post_y_px),
            format!("{:.4}", record.pre_x_mm),
            format!("{:.4}", record.pre_y_mm),
            format!("{:.4}", record.post_x_mm),
            format!("{:.4}", record.post_y_mm),
            record.pre_page.to_string(),
            record.post_page.to_string(),
        ])?;
    }

    csv_writer.flush()?;
    Ok(())
}

/// Export the rectangle slots to CSV format
///
/// Corner points are flattened to x/y column pairs.
pub fn export_rectangles_csv<W: Write>(
    writer: W,
    collection: &MeasurementCollection,
    config: &CsvExportConfig,
) -> Result<(), CsvExportError> {
    let mut csv_writer = csv::WriterBuilder::new()
        .delimiter(config.delimiter)
        .has_headers(config.include_headers)
        .from_writer(writer);

    if config.include_headers {
        csv_writer.write_record([
            "group",
            "page",
            "bottom_left_x_px",
            "bottom_left_y_px",
            "bottom_right_x_px",
            "bottom_right_y_px",
            "top_left_x_px",
            "top_left_y_px",
            "top_right_x_px",
            "top_right_y_px",
            "bottom_left_x_mm",
            "bottom_left_y_mm",
            "bottom_right_x_mm",
            "bottom_right_y_mm",
            "top_left_x_mm",
            "top_left_y_mm",
            "top_right_x_mm",
            "top_right_y_mm",
            "width_px",
            "height_px",
            "width_mm",
            "height_mm",
            "timestamp",
        ])?;
    }

    let slots = [collection.pre_rectangle(), collection.post_rectangle()];
    for rectangle in slots.into_iter().flatten() {
        let record = RectangleRecord::from(rectangle);
        csv_writer.write_record(&[
            record.group.to_string(),
            record.page.to_string(),
            format!("{:.2}", record.bottom_left_px.x),
            format!("{:.2}", record.bottom_left_px.y),
            format!("{:.2}", record.bottom_right_px.x),
            format!("{:.2}", record.bottom_right_px.y),
            format!("{:.2}", record.top_left_px.x),
            format!("{:.2}", record.top_left_px.y),
            format!("{:.2}", record.top_right_px.x),
            format!("{:.2}", record.top_right_px.y),
            format!("{:.4}", record.bottom_left_mm.x),
            format!("{:.4}", record.bottom_left_mm.y),
            format!("{:.4}", record.bottom_right_mm.x),
            format!("{:.4}", record.bottom_right_mm.y),
            format!("{:.4}", record.top_left_mm.x),
            format!("{:.4}", record.top_left_mm.y),
            format!("{:.4}", record.top_right_mm.x),
            format!("{:.4}", record.top_right_mm.y),
            format!("{:.2}", record.width_px),
            format!("{:.2}", record.height_px),
            format!("{:.4}", record.width_mm),
            format!("{:.4}", record.height_mm),
            record.timestamp.to_string(),
        ])?;
    }

    csv_writer.flush()?;
    Ok(())
}
