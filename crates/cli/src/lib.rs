use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use image::{ImageBuffer, Rgba};
use pdfcaliper_core::{
    export_measurements_csv, export_particles_csv, export_rectangles_csv, plot_view,
    read_session_json, write_session_json, Calibration, CsvExportConfig, PlotView, RectanglePanel,
};
use pdfcaliper_engine::{default_engine, OpenSource, PdfEngine, RasterRequest, DEFAULT_DPI};
use serde::Serialize;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

type RgbaCanvas = ImageBuffer<Rgba<u8>, Vec<u8>>;

#[derive(Debug, Parser)]
#[command(name = "pdfcaliper")]
#[command(about = "PDF measurement session tool")]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print machine-readable page geometry for a PDF.
    Info {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long, default_value_t = DEFAULT_DPI)]
        dpi: u32,
    },
    /// Re-derive every millimeter value in a session from page geometry.
    Calibrate {
        #[arg(value_name = "SESSION")]
        session: PathBuf,
        #[arg(long)]
        page_width_mm: f64,
        #[arg(long)]
        page_width_px: u32,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Export a session to CSV tables.
    Export {
        #[arg(value_name = "SESSION")]
        session: PathBuf,
        #[arg(long, value_name = "DIR")]
        out_dir: PathBuf,
    },
    /// Render the millimeter-space view of a session to a PNG.
    Plot {
        #[arg(value_name = "SESSION")]
        session: PathBuf,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print CLI version.
    Version,
}

#[derive(Debug, Serialize)]
struct InfoOutput {
    path: String,
    page_count: u32,
    first_page: Option<PageInfoOutput>,
}

#[derive(Debug, Serialize)]
struct PageInfoOutput {
    width_pt: f64,
    height_pt: f64,
    width_mm: f64,
    height_mm: f64,
    dpi: u32,
    width_px: u32,
    height_px: u32,
    mm_per_pixel: f64,
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);

    match cli.command {
        Commands::Info { file, dpi } => run_info(&file, dpi),
        Commands::Calibrate { session, page_width_mm, page_width_px, output } => {
            run_calibrate(&session, page_width_mm, page_width_px, output.as_deref())
        }
        Commands::Export { session, out_dir } => run_export(&session, &out_dir),
        Commands::Plot { session, output } => run_plot(&session, output.as_deref()),
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn run_info(file: &Path, dpi: u32) -> Result<()> {
    ensure_file_exists(file)?;

    let mut engine = default_engine();
    let handle = engine.open(OpenSource::from(file)).context("failed to open PDF")?;

    let page_count = engine.page_count(handle)?;
    let first_page = if page_count > 0 {
        let size = engine.page_size(handle, 0)?;
        let raster = engine.render_page(handle, RasterRequest { page_index: 0, dpi })?;
        Some(PageInfoOutput {
            width_pt: size.width_pt,
            height_pt: size.height_pt,
            width_mm: size.width_mm(),
            height_mm: size.height_mm(),
            dpi,
            width_px: raster.width_px,
            height_px: raster.height_px,
            mm_per_pixel: raster.mm_per_pixel(),
        })
    } else {
        None
    };

    let payload = InfoOutput { path: file.display().to_string(), page_count, first_page };

    let json = serde_json::to_string_pretty(&payload)?;
    println!("{json}");

    engine.close(handle)?;

    Ok(())
}

fn run_calibrate(
    session_path: &Path,
    page_width_mm: f64,
    page_width_px: u32,
    output: Option<&Path>,
) -> Result<()> {
    let (mut collection, _) = load_session(session_path)?;

    let calibration = Calibration::from_page_geometry(page_width_mm, page_width_px)
        .context("invalid page geometry")?;
    collection.recalibrate(calibration.mm_per_pixel());

    let output = output.unwrap_or(session_path);
    let file = fs::File::create(output)
        .with_context(|| format!("failed to create {}", output.display()))?;
    write_session_json(file, &collection, Some(&calibration))
        .context("failed to write session")?;

    println!("{}", output.display());

    Ok(())
}

fn run_export(session_path: &Path, out_dir: &Path) -> Result<()> {
    let (collection, _) = load_session(session_path)?;

    fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create {}", out_dir.display()))?;

    let config = CsvExportConfig::default();

    if !collection.measurements().is_empty() {
        let path = out_dir.join("measurements.csv");
        let file = fs::File::create(&path)?;
        export_measurements_csv(file, &collection, &config)
            .context("failed to export measurements")?;
        println!("{}", path.display());
    }

    if !collection.particles().is_empty() {
        let path = out_dir.join("particles.csv");
        let file = fs::File::create(&path)?;
        export_particles_csv(file, &collection, &config).context("failed to export particles")?;
        println!("{}", path.display());
    }

    if collection.pre_rectangle().is_some() || collection.post_rectangle().is_some() {
        let path = out_dir.join("rectangles.csv");
        let file = fs::File::create(&path)?;
        export_rectangles_csv(file, &collection, &config)
            .context("failed to export rectangles")?;
        println!("{}", path.display());
    }

    Ok(())
}

fn run_plot(session_path: &Path, output: Option<&Path>) -> Result<()> {
    let (collection, _) = load_session(session_path)?;

    let view = plot_view(&collection);
    if view.panels.is_empty() {
        anyhow::bail!("session has no rectangles to plot");
    }

    let image = render_plot(&view);
    let output = output.map(ToOwned::to_owned).unwrap_or_else(|| default_plot_output(session_path));

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }

    image
        .save(&output)
        .with_context(|| format!("failed to write image to {}", output.display()))?;

    println!("{}", output.display());

    Ok(())
}

fn load_session(path: &Path) -> Result<(pdfcaliper_core::MeasurementCollection, Option<Calibration>)> {
    ensure_file_exists(path)?;
    let file = fs::File::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    read_session_json(file).context("failed to read session")
}

fn ensure_file_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("file does not exist: {}", path.display());
    }

    if !path.is_file() {
        anyhow::bail!("path is not a file: {}", path.display());
    }

    Ok(())
}

fn default_plot_output(session: &Path) -> PathBuf {
    let stem = session.file_stem().and_then(|name| name.to_str()).unwrap_or("session");

    session.with_file_name(format!("{stem}_plot.png"))
}

const PANEL_SIZE: u32 = 360;
const PANEL_MARGIN: u32 = 24;

const OUTLINE_COLOR: Rgba<u8> = Rgba([0, 0, 0, 255]);
const PARTICLE_COLOR: Rgba<u8> = Rgba([200, 30, 30, 255]);

/// Draw each rectangle panel side by side, outline plus particle dots,
/// millimeter y-axis pointing up
fn render_plot(view: &PlotView) -> RgbaCanvas {
    let panel_count = view.panels.len().max(1) as u32;
    let width = PANEL_MARGIN + panel_count * (PANEL_SIZE + PANEL_MARGIN);
    let height = PANEL_SIZE + 2 * PANEL_MARGIN;

    let mut image = RgbaCanvas::from_pixel(width, height, Rgba([255, 255, 255, 255]));

    for (index, panel) in view.panels.iter().enumerate() {
        let origin_x = PANEL_MARGIN + index as u32 * (PANEL_SIZE + PANEL_MARGIN);
        draw_panel(&mut image, panel, origin_x, PANEL_MARGIN);
    }

    image
}

fn draw_panel(image: &mut RgbaCanvas, panel: &RectanglePanel, origin_x: u32, origin_y: u32) {
    let extent = panel.width_mm.max(panel.height_mm).max(f64::MIN_POSITIVE);
    let scale = PANEL_SIZE as f64 / extent;

    let width = ((panel.width_mm * scale).round() as u32).clamp(1, PANEL_SIZE);
    let height = ((panel.height_mm * scale).round() as u32).clamp(1, PANEL_SIZE);

    // The panel's baseline sits at the bottom; millimeter y grows upward.
    let baseline = (origin_y + PANEL_SIZE) as i64;
    let top = baseline - height as i64;

    for x in 0..width {
        put_pixel_checked(image, origin_x as i64 + x as i64, top, OUTLINE_COLOR);
        put_pixel_checked(image, origin_x as i64 + x as i64, baseline - 1, OUTLINE_COLOR);
    }
    for y in 0..height {
        put_pixel_checked(image, origin_x as i64, top + y as i64, OUTLINE_COLOR);
        put_pixel_checked(image, origin_x as i64 + width as i64 - 1, top + y as i64, OUTLINE_COLOR);
    }

    // Projections are unclipped, so a particle may fall outside its
    // rectangle; bounds-checked drawing just skips off-canvas pixels.
    for particle in &panel.particles {
        let x = origin_x as f64 + particle.position_mm.x * scale;
        let y = baseline as f64 - particle.position_mm.y * scale;
        draw_dot(image, x.round() as i64, y.round() as i64, PARTICLE_COLOR);
    }
}

fn draw_dot(image: &mut RgbaCanvas, cx: i64, cy: i64, color: Rgba<u8>) {
    for dy in -1..=1 {
        for dx in -1..=1 {
            put_pixel_checked(image, cx + dx, cy + dy, color);
        }
    }
}

fn put_pixel_checked(image: &mut RgbaCanvas, x: i64, y: i64, color: Rgba<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < image.width() && (y as u32) < image.height() {
        image.put_pixel(x as u32, y as u32, color);
    }
}
