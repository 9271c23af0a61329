//! Integration test: run the `seedmorph` binary on a scratch directory of
//! synthetic grain images.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use image::{Rgb, RgbImage};
use imageproc::drawing::draw_filled_circle_mut;

const MODEL: &str = r#"{"kind": "threshold", "blur_sigma": 0.0, "threshold": {"fixed": 128}}"#;

fn scratch_dir(test: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("seedmorph-cli-{}-{test}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// A plate with one bright disc in the middle.
fn write_plate(path: &Path) {
    write_plate_with_levels(path, 0, 255);
}

fn write_plate_with_levels(path: &Path, background: u8, grain: u8) {
    let mut img = RgbImage::from_pixel(240, 240, Rgb([background; 3]));
    draw_filled_circle_mut(&mut img, (120, 120), 90, Rgb([grain; 3]));
    img.save(path).expect("write plate image");
}

/// Input directory with two plates and a stray text file, plus a model.
fn setup(test: &str) -> (PathBuf, PathBuf, PathBuf) {
    let root = scratch_dir(test);
    let images = root.join("images");
    std::fs::create_dir_all(&images).unwrap();
    write_plate(&images.join("plate_2.png"));
    write_plate(&images.join("plate_1.png"));
    std::fs::write(images.join("README.txt"), "not an image").unwrap();
    let model = root.join("model.json");
    std::fs::write(&model, MODEL).unwrap();
    (root, images, model)
}

fn run(args: &[&OsStr]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_seedmorph"))
        .args(args)
        .stdin(Stdio::null())
        .output()
        .expect("spawn seedmorph")
}

fn args<'a>(input: &'a Path, output: &'a Path, model: &'a Path) -> Vec<&'a OsStr> {
    vec![
        OsStr::new("--input"),
        input.as_os_str(),
        OsStr::new("--output"),
        output.as_os_str(),
        OsStr::new("--weights"),
        model.as_os_str(),
    ]
}

#[test]
fn writes_one_row_per_plate_in_name_order() {
    let (root, images, model) = setup("rows");
    let out = root.join("results/traits.tsv");

    let result = run(&args(&images, &out, &model));
    assert!(result.status.success(), "{result:?}");

    let table = std::fs::read_to_string(&out).unwrap();
    let lines: Vec<&str> = table.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("file_name\tobject_id\tdetection_score\t"));
    assert!(lines[1].starts_with("plate_1.png\t0\t1.0\t"));
    assert!(lines[2].starts_with("plate_2.png\t0\t1.0\t"));

    std::fs::remove_dir_all(&root).unwrap();
}

#[test]
fn existing_output_needs_force_without_a_terminal() {
    let (root, images, model) = setup("force");
    let out = root.join("traits.tsv");
    std::fs::write(&out, "keep me").unwrap();

    let refused = run(&args(&images, &out, &model));
    assert!(!refused.status.success());
    assert_eq!(std::fs::read_to_string(&out).unwrap(), "keep me");

    let mut forced = args(&images, &out, &model);
    forced.push(OsStr::new("--force"));
    let result = run(&forced);
    assert!(result.status.success(), "{result:?}");
    assert!(std::fs::read_to_string(&out).unwrap().starts_with("file_name"));

    std::fs::remove_dir_all(&root).unwrap();
}

#[test]
fn diagnostics_json_is_written_on_request() {
    let (root, images, model) = setup("diagnostics");
    let out = root.join("traits.tsv");
    let diag = root.join("diag.json");

    let mut a = args(&images, &out, &model);
    a.push(OsStr::new("--diagnostics-json"));
    a.push(diag.as_os_str());
    let result = run(&a);
    assert!(result.status.success(), "{result:?}");

    let json = std::fs::read_to_string(&diag).unwrap();
    assert!(json.contains("\"plate_1.png\""));
    assert!(json.contains("\"rows_kept\": 1"));

    std::fs::remove_dir_all(&root).unwrap();
}

#[test]
fn missing_input_directory_fails() {
    let (root, _images, model) = setup("missing-input");
    let result = run(&args(&root.join("nope"), &root.join("t.tsv"), &model));
    assert!(!result.status.success());
    assert!(String::from_utf8_lossy(&result.stderr).contains("does not exist"));
    std::fs::remove_dir_all(&root).unwrap();
}

#[test]
fn missing_weights_fails() {
    let (root, images, _model) = setup("missing-weights");
    let result = run(&args(&images, &root.join("t.tsv"), &root.join("nope.json")));
    assert!(!result.status.success());
    assert!(!root.join("t.tsv").exists());
    std::fs::remove_dir_all(&root).unwrap();
}

#[test]
fn directory_without_images_fails() {
    let (root, _images, model) = setup("no-images");
    let empty = root.join("empty");
    std::fs::create_dir_all(&empty).unwrap();
    let result = run(&args(&empty, &root.join("t.tsv"), &model));
    assert!(!result.status.success());
    assert!(String::from_utf8_lossy(&result.stderr).contains("no image files"));
    std::fs::remove_dir_all(&root).unwrap();
}

#[test]
fn all_images_failing_fails() {
    let (root, _images, model) = setup("all-fail");
    let broken = root.join("broken");
    std::fs::create_dir_all(&broken).unwrap();
    std::fs::write(broken.join("a.png"), "not really a png").unwrap();
    let result = run(&args(&broken, &root.join("t.tsv"), &model));
    assert!(!result.status.success());
    assert!(!root.join("t.tsv").exists());
    std::fs::remove_dir_all(&root).unwrap();
}

#[test]
fn one_bad_image_does_not_stop_the_batch() {
    let (root, images, model) = setup("one-bad");
    std::fs::write(images.join("plate_0.png"), "corrupt").unwrap();
    let out = root.join("t.tsv");
    let result = run(&args(&images, &out, &model));
    assert!(result.status.success(), "{result:?}");
    assert_eq!(std::fs::read_to_string(&out).unwrap().lines().count(), 3);
    std::fs::remove_dir_all(&root).unwrap();
}

#[test]
fn default_model_measures_unsaturated_plates() {
    let root = scratch_dir("default-model");
    let images = root.join("images");
    std::fs::create_dir_all(&images).unwrap();
    write_plate_with_levels(&images.join("dim.png"), 40, 200);
    write_plate_with_levels(&images.join("soft.png"), 20, 230);
    let model = root.join("model.json");
    std::fs::write(&model, r#"{"kind": "threshold"}"#).unwrap();
    let out = root.join("t.tsv");

    let result = run(&args(&images, &out, &model));
    assert!(result.status.success(), "{result:?}");

    let table = std::fs::read_to_string(&out).unwrap();
    let lines: Vec<&str> = table.lines().collect();
    assert_eq!(lines.len(), 3, "{table}");
    assert!(lines[1].starts_with("dim.png\t0\t1.0\t"), "{table}");
    assert!(lines[2].starts_with("soft.png\t0\t1.0\t"), "{table}");

    std::fs::remove_dir_all(&root).unwrap();
}
