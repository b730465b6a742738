use assert_cmd::cargo::cargo_bin_cmd;
use lopdf::content::Content;
use lopdf::{dictionary, Document, Object, Stream};
use pdfcaliper_core::{
    read_session_json, write_session_json, Calibration, MeasurementCollection, PixelPoint,
    RectangleGroup,
};
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;

fn write_sample_session(path: &Path) {
    let calibration = Calibration::from_page_geometry(210.0, 2100).unwrap();
    let factor = Some(calibration.mm_per_pixel());

    let mut collection = MeasurementCollection::new();
    collection
        .add_rectangle(
            RectangleGroup::Pre,
            0,
            PixelPoint::new(50.0, 300.0),
            PixelPoint::new(100.0, 50.0),
            factor,
        )
        .unwrap();
    collection.add_measurement(
        "M1",
        0,
        PixelPoint::new(0.0, 0.0),
        PixelPoint::new(300.0, 400.0),
        factor,
        "pre",
        "left edge",
    );
    collection.add_particle(
        "P1",
        PixelPoint::new(60.0, 290.0),
        PixelPoint::new(70.0, 280.0),
        0,
        0,
        factor,
    );

    let file = fs::File::create(path).unwrap();
    write_session_json(file, &collection, Some(&calibration)).unwrap();
}

fn single_page_pdf() -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let content = Content { operations: vec![] };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
    });

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

#[test]
fn export_writes_csv_tables() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let session_path = temp.path().join("session.json");
    write_sample_session(&session_path);

    let out_dir = temp.path().join("out");
    cargo_bin_cmd!("pdfcaliper")
        .arg("export")
        .arg(&session_path)
        .arg("--out-dir")
        .arg(&out_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("measurements.csv"));

    let measurements = fs::read_to_string(out_dir.join("measurements.csv")).unwrap();
    assert!(measurements.starts_with("id,label,group,page"));
    assert!(measurements.contains("M1"));

    let particles = fs::read_to_string(out_dir.join("particles.csv")).unwrap();
    assert!(particles.contains("P1"));

    let rectangles = fs::read_to_string(out_dir.join("rectangles.csv")).unwrap();
    assert!(rectangles.lines().nth(1).unwrap().starts_with("pre,0"));
}

#[test]
fn calibrate_rewrites_millimeter_values() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let session_path = temp.path().join("session.json");
    write_sample_session(&session_path);

    let output_path = temp.path().join("recalibrated.json");
    cargo_bin_cmd!("pdfcaliper")
        .arg("calibrate")
        .arg(&session_path)
        .arg("--page-width-mm")
        .arg("210")
        .arg("--page-width-px")
        .arg("1050")
        .arg("--output")
        .arg(&output_path)
        .assert()
        .success();

    let file = fs::File::open(&output_path).unwrap();
    let (collection, calibration) = read_session_json(file).unwrap();

    // 210 mm over 1050 px doubles the old 0.1 factor.
    assert_eq!(calibration.unwrap().mm_per_pixel(), 0.2);
    assert_eq!(collection.measurements()[0].length_mm(), Some(100.0));
    assert_eq!(collection.pre_rectangle().unwrap().width_mm(), 10.0);
}

#[test]
fn calibrate_rejects_zero_pixel_width() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let session_path = temp.path().join("session.json");
    write_sample_session(&session_path);

    cargo_bin_cmd!("pdfcaliper")
        .arg("calibrate")
        .arg(&session_path)
        .arg("--page-width-mm")
        .arg("210")
        .arg("--page-width-px")
        .arg("0")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid page geometry"));
}

#[test]
fn plot_writes_png_file() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let session_path = temp.path().join("session.json");
    write_sample_session(&session_path);

    let output_path = temp.path().join("plot.png");
    cargo_bin_cmd!("pdfcaliper")
        .arg("plot")
        .arg(&session_path)
        .arg("--output")
        .arg(&output_path)
        .assert()
        .success();

    assert!(output_path.exists(), "plot output file should exist");

    let image = image::open(&output_path).expect("plot should be readable image");
    assert!(image.width() > 0);
    assert!(image.height() > 0);
}

#[test]
fn plot_fails_without_rectangles() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let session_path = temp.path().join("session.json");

    let collection = MeasurementCollection::new();
    let file = fs::File::create(&session_path).unwrap();
    write_session_json(file, &collection, None).unwrap();

    cargo_bin_cmd!("pdfcaliper")
        .arg("plot")
        .arg(&session_path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("no rectangles to plot"));
}

#[test]
fn info_reports_page_geometry() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let pdf_path = temp.path().join("page.pdf");
    fs::write(&pdf_path, single_page_pdf()).unwrap();

    let output = cargo_bin_cmd!("pdfcaliper")
        .arg("info")
        .arg(&pdf_path)
        .arg("--dpi")
        .arg("150")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let value: Value = serde_json::from_slice(&output).expect("stdout should contain valid json");
    assert_eq!(value["page_count"], 1);

    let first_page = &value["first_page"];
    assert_eq!(first_page["width_pt"], 595.0);
    assert_eq!(first_page["width_px"], 1240);

    let mm_per_pixel = first_page["mm_per_pixel"].as_f64().unwrap();
    assert!((mm_per_pixel - 0.1693).abs() < 1e-4);
}

#[test]
fn info_fails_for_missing_file() {
    cargo_bin_cmd!("pdfcaliper")
        .arg("info")
        .arg("missing.pdf")
        .assert()
        .failure()
        .stderr(predicate::str::contains("file does not exist"));
}

#[test]
fn version_prints_package_version() {
    cargo_bin_cmd!("pdfcaliper")
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}
