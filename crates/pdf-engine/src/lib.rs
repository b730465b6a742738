//! PDF page geometry and rasterization
//!
//! Supplies the measurement core with what it needs from a document: the
//! physical page size in millimeters and a rendered bitmap at a known
//! DPI, so the pair `(width_mm, width_px)` can drive auto-calibration.
//! The default backend reads page geometry from each page's MediaBox and
//! renders placeholder bitmaps; content-accurate rasterization is out of
//! scope.

use image::{ImageBuffer, Rgba};
use lopdf::Document;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

pub type RgbaImage = ImageBuffer<Rgba<u8>, Vec<u8>>;

/// PDF points per inch
pub const POINTS_PER_INCH: f64 = 72.0;

/// Millimeters per inch
pub const MM_PER_INCH: f64 = 25.4;

/// Default rendering DPI
pub const DEFAULT_DPI: u32 = 150;

/// Convert a length in PDF points to millimeters
pub fn points_to_mm(points: f64) -> f64 {
    points / POINTS_PER_INCH * MM_PER_INCH
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentHandle(u64);

impl DocumentHandle {
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Physical page size
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width_pt: f64,
    pub height_pt: f64,
}

impl PageSize {
    /// Page width in millimeters
    pub fn width_mm(&self) -> f64 {
        points_to_mm(self.width_pt)
    }

    /// Page height in millimeters
    pub fn height_mm(&self) -> f64 {
        points_to_mm(self.height_pt)
    }
}

/// Request to rasterize one page at a resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RasterRequest {
    pub page_index: u32,
    pub dpi: u32,
}

impl Default for RasterRequest {
    fn default() -> Self {
        Self {
            page_index: 0,
            dpi: DEFAULT_DPI,
        }
    }
}

/// A rendered page with the physical metadata the measurement core
/// consumes
#[derive(Debug, Clone)]
pub struct PageRaster {
    pub image: RgbaImage,
    pub width_px: u32,
    pub height_px: u32,
    pub width_mm: f64,
    pub height_mm: f64,
    pub page_index: u32,
    pub dpi: u32,
}

impl PageRaster {
    /// Scale factor implied by the page geometry, assuming true-scale
    /// rendering
    pub fn mm_per_pixel(&self) -> f64 {
        self.width_mm / self.width_px as f64
    }
}

#[derive(Debug, Clone)]
pub enum OpenSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

impl From<PathBuf> for OpenSource {
    fn from(value: PathBuf) -> Self {
        Self::Path(value)
    }
}

impl From<&Path> for OpenSource {
    fn from(value: &Path) -> Self {
        Self::Path(value.to_path_buf())
    }
}

impl From<Vec<u8>> for OpenSource {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PdfEngineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF parse error: {0}")]
    Parse(#[from] lopdf::Error),
    #[error("invalid handle {0}")]
    InvalidHandle(u64),
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("encrypted PDFs are not supported in the default backend")]
    EncryptedUnsupported,
    #[error("backend error: {0}")]
    Backend(String),
}

pub trait PdfEngine {
    fn open(&mut self, source: OpenSource) -> Result<DocumentHandle, PdfEngineError>;
    fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError>;
    fn page_size(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<PageSize, PdfEngineError>;
    fn render_page(
        &self,
        handle: DocumentHandle,
        request: RasterRequest,
    ) -> Result<PageRaster, PdfEngineError>;
    fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError>;
}

#[derive(Debug, Clone)]
struct DocumentRecord {
    page_sizes: Vec<PageSize>,
}

#[derive(Debug, Default)]
pub struct LopdfEngine {
    next_handle: u64,
    docs: HashMap<DocumentHandle, DocumentRecord>,
}

impl LopdfEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn parse_sizes(bytes: &[u8]) -> Result<Vec<PageSize>, PdfEngineError> {
        if bytes.windows("/Encrypt".len()).any(|window| window == b"/Encrypt") {
            return Err(PdfEngineError::EncryptedUnsupported);
        }

        let doc = Document::load_mem(bytes)?;
        let pages = doc.get_pages();
        let mut sizes = Vec::with_capacity(pages.len());

        for (_, object_id) in pages {
            let dict = doc.get_dictionary(object_id)?;
            let size = dict
                .get(b"MediaBox")
                .ok()
                .and_then(|obj| obj.as_array().ok())
                .and_then(|array| {
                    if array.len() != 4 {
                        return None;
                    }
                    let x0 = f64::from(array[0].as_float().ok()?);
                    let y0 = f64::from(array[1].as_float().ok()?);
                    let x1 = f64::from(array[2].as_float().ok()?);
                    let y1 = f64::from(array[3].as_float().ok()?);
                    Some(PageSize {
                        width_pt: (x1 - x0).abs(),
                        height_pt: (y1 - y0).abs(),
                    })
                })
                // US Letter when a page carries no usable MediaBox.
                .unwrap_or(PageSize {
                    width_pt: 612.0,
                    height_pt: 792.0,
                });

            sizes.push(size);
        }

        if sizes.is_empty() {
            return Err(PdfEngineError::Backend("document has no pages".to_owned()));
        }

        Ok(sizes)
    }

    fn record(&self, handle: DocumentHandle) -> Result<&DocumentRecord, PdfEngineError> {
        self.docs.get(&handle).ok_or(PdfEngineError::InvalidHandle(handle.raw()))
    }
}

impl PdfEngine for LopdfEngine {
    fn open(&mut self, source: OpenSource) -> Result<DocumentHandle, PdfEngineError> {
        let bytes = match source {
            OpenSource::Path(path) => fs::read(path)?,
            OpenSource::Bytes(bytes) => bytes,
        };

        let page_sizes = Self::parse_sizes(&bytes)?;

        self.next_handle += 1;
        let handle = DocumentHandle(self.next_handle);
        self.docs.insert(handle, DocumentRecord { page_sizes });

        Ok(handle)
    }

    fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError> {
        Ok(self.record(handle)?.page_sizes.len() as u32)
    }

    fn page_size(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<PageSize, PdfEngineError> {
        let record = self.record(handle)?;
        record.page_sizes.get(page_index as usize).copied().ok_or(PdfEngineError::PageOutOfRange {
            page: page_index,
            page_count: record.page_sizes.len() as u32,
        })
    }

    fn render_page(
        &self,
        handle: DocumentHandle,
        request: RasterRequest,
    ) -> Result<PageRaster, PdfEngineError> {
        let page_size = self.page_size(handle, request.page_index)?;
        let dpi = if request.dpi == 0 { DEFAULT_DPI } else { request.dpi };
        let zoom = dpi as f64 / POINTS_PER_INCH;

        let width = (page_size.width_pt * zoom).round().max(1.0) as u32;
        let height = (page_size.height_pt * zoom).round().max(1.0) as u32;

        let mut image = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));

        if width >= 4 && height >= 4 {
            for x in 0..width {
                image.put_pixel(x, 0, Rgba([220, 220, 220, 255]));
                image.put_pixel(x, height - 1, Rgba([220, 220, 220, 255]));
            }
            for y in 0..height {
                image.put_pixel(0, y, Rgba([220, 220, 220, 255]));
                image.put_pixel(width - 1, y, Rgba([220, 220, 220, 255]));
            }
        }

        Ok(PageRaster {
            image,
            width_px: width,
            height_px: height,
            width_mm: page_size.width_mm(),
            height_mm: page_size.height_mm(),
            page_index: request.page_index,
            dpi,
        })
    }

    fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError> {
        self.docs.remove(&handle).map(|_| ()).ok_or(PdfEngineError::InvalidHandle(handle.raw()))
    }
}

pub fn default_engine() -> LopdfEngine {
    LopdfEngine::new()
}
