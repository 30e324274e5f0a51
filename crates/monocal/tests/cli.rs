use assert_cmd::Command;
use monocal::core::{camera_matrix, Distortion, DistortionKind};
use monocal::io::CalibrationReport;
use monocal::{CalibrationOptions, ImageSize, IntrinsicModel, PatternShape};
use predicates::prelude::*;

fn monocal() -> Command {
    Command::cargo_bin("monocal").unwrap()
}

fn write_report(path: &std::path::Path) {
    let report = CalibrationReport {
        model: IntrinsicModel::new(
            camera_matrix(80.0, 80.0, 32.0, 24.0),
            Distortion {
                k1: -0.2,
                k2: 0.05,
                ..Distortion::zero(DistortionKind::RadialTangential)
            },
            ImageSize::new(64, 48),
        ),
        options: CalibrationOptions::default(),
        pattern: PatternShape::new(6, 9),
        square_size: 1.0,
        rms_error: 0.2,
        per_view_rms: None,
        poses: Vec::new(),
        image_paths: Vec::new(),
    };
    report.write_json(path).unwrap();
}

fn write_checker(path: &std::path::Path) {
    let img = image::RgbImage::from_fn(64, 48, |x, y| {
        if (x / 8 + y / 8) % 2 == 0 {
            image::Rgb([255, 255, 255])
        } else {
            image::Rgb([0, 0, 0])
        }
    });
    img.save(path).unwrap();
}

#[test]
fn help_lists_subcommands() {
    monocal()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("calibrate"))
        .stdout(predicate::str::contains("undistort"));
}

#[test]
fn calibrate_without_images_fails() {
    monocal()
        .args(["calibrate", "--rows", "6", "--cols", "9"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no calibration images"));
}

#[test]
fn calibrate_without_pattern_fails() {
    monocal()
        .args(["calibrate", "left01.png"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--rows and --cols"));
}

#[test]
fn calibrate_with_unreadable_images_fails() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.png");
    monocal()
        .args(["calibrate", "--rows", "6", "--cols", "9"])
        .arg(&missing)
        .arg("--output")
        .arg(dir.path().join("report.json"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("error:"));
    assert!(!dir.path().join("report.json").exists());
}

#[test]
fn undistort_writes_image_at_calibrated_size() {
    let dir = tempfile::tempdir().unwrap();
    let report = dir.path().join("report.json");
    let input = dir.path().join("in.png");
    let output = dir.path().join("out.png");
    write_report(&report);
    write_checker(&input);

    monocal()
        .arg("undistort")
        .arg("--report")
        .arg(&report)
        .arg("--input")
        .arg(&input)
        .arg("--output")
        .arg(&output)
        .assert()
        .success();

    let out = image::open(&output).unwrap();
    assert_eq!((out.width(), out.height()), (64, 48));
}

#[test]
fn undistort_honors_explicit_size() {
    let dir = tempfile::tempdir().unwrap();
    let report = dir.path().join("report.json");
    let input = dir.path().join("in.png");
    let output = dir.path().join("out.png");
    write_report(&report);
    write_checker(&input);

    monocal()
        .arg("undistort")
        .arg("--report")
        .arg(&report)
        .arg("--input")
        .arg(&input)
        .arg("--output")
        .arg(&output)
        .args(["--width", "32", "--height", "24"])
        .assert()
        .success();

    let out = image::open(&output).unwrap();
    assert_eq!((out.width(), out.height()), (32, 24));
}

#[test]
fn undistort_with_missing_report_fails() {
    let dir = tempfile::tempdir().unwrap();
    monocal()
        .arg("undistort")
        .arg("--report")
        .arg(dir.path().join("absent.json"))
        .arg("--input")
        .arg(dir.path().join("in.png"))
        .arg("--output")
        .arg(dir.path().join("out.png"))
        .assert()
        .failure();
}
