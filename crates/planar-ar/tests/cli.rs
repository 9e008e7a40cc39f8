use assert_cmd::Command;
use planar_ar::core::{warp_perspective_gray, GrayImage, Homography};
use predicates::prelude::*;
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::path::{Path, PathBuf};

fn textured(width: usize, height: usize, seed: u64) -> GrayImage {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut img = GrayImage::from_raw(width, height, vec![128; width * height]).unwrap();
    for _ in 0..140 {
        let w = rng.random_range(8..40usize);
        let h = rng.random_range(8..40usize);
        let x0 = rng.random_range(0..width - w);
        let y0 = rng.random_range(0..height - h);
        let v: u8 = rng.random();
        for y in y0..y0 + h {
            for x in x0..x0 + w {
                img.set(x, y, v);
            }
        }
    }
    img
}

fn save(img: &GrayImage, path: &Path) {
    image::GrayImage::from_raw(img.width as u32, img.height as u32, img.data.clone())
        .unwrap()
        .save(path)
        .unwrap();
}

/// Pattern and two frames (one containing it, one blank) under `dir`.
fn write_inputs(dir: &Path) -> (PathBuf, PathBuf, PathBuf) {
    let pattern = textured(320, 240, 1);
    let h = Homography::from_array([[0.97, 0.06, 75.0], [-0.04, 1.01, 55.0], [4e-5, -2e-5, 1.0]]);
    let frame = warp_perspective_gray(&pattern.view(), h.inverse().unwrap(), 480, 360);
    let blank = GrayImage::from_raw(480, 360, vec![90; 480 * 360]).unwrap();

    let paths = (
        dir.join("pattern.png"),
        dir.join("frame.png"),
        dir.join("blank.png"),
    );
    save(&pattern, &paths.0);
    save(&frame, &paths.1);
    save(&blank, &paths.2);
    paths
}

fn cli() -> Command {
    Command::cargo_bin("planar-ar").unwrap()
}

#[test]
fn missing_pattern_exits_with_1() {
    cli()
        .assert()
        .code(1)
        .stderr(predicate::str::contains("no pattern image given"));
}

#[test]
fn unreadable_pattern_exits_with_2() {
    let dir = tempfile::tempdir().unwrap();
    let bogus = dir.path().join("not-an-image.png");
    std::fs::write(&bogus, b"definitely not a png").unwrap();

    cli().arg(&bogus).assert().code(2);
    cli().arg(dir.path().join("missing.png")).assert().code(2);
}

#[test]
fn bad_arguments_exit_with_3() {
    cli().arg("--no-such-flag").assert().code(3);
    cli()
        .args(["p.png", "--intrinsics", "1,2,3"])
        .assert()
        .code(3);
    cli()
        .args(["p.png", "--intrinsics", "0,500,320,240"])
        .assert()
        .code(3);
}

#[test]
fn help_succeeds() {
    cli()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--config"));
}

#[test]
fn reports_found_and_missing_frames() {
    let dir = tempfile::tempdir().unwrap();
    let (pattern, frame, blank) = write_inputs(dir.path());

    cli()
        .arg(&pattern)
        .arg(&frame)
        .arg(&blank)
        .assert()
        .success()
        .stdout(predicate::str::contains("frame.png: found"))
        .stdout(predicate::str::contains("blank.png: not found"))
        .stdout(predicate::str::contains("1/2 frames contain the pattern"));
}

#[test]
fn json_report_from_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let (pattern, frame, _) = write_inputs(dir.path());
    let out = dir.path().join("report.json");
    let cfg_path = dir.path().join("config.json");
    let cfg = serde_json::json!({
        "pattern_path": pattern,
        "frame_paths": [frame],
        "camera": {"fx": 600.0, "fy": 600.0, "cx": 240.0, "cy": 180.0},
        "detector": {"refine_homography": true},
        "output_path": out,
    });
    std::fs::write(&cfg_path, serde_json::to_string_pretty(&cfg).unwrap()).unwrap();

    let assert = cli()
        .arg("--config")
        .arg(&cfg_path)
        .arg("--json")
        .assert()
        .success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let report: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(report["frames"][0]["found"], serde_json::Value::Bool(true));
    assert_eq!(report["pattern_size"], serde_json::json!([320, 240]));
    assert!(report["frames"][0]["pose"]["translation"][2].as_f64().unwrap() > 0.0);

    let written = planar_ar::tracker::TrackingReport::load_json(&out).unwrap();
    assert_eq!(written.found_count(), 1);
}

#[test]
fn bad_config_exits_with_3() {
    let dir = tempfile::tempdir().unwrap();
    let cfg_path = dir.path().join("config.json");
    std::fs::write(&cfg_path, "{ not json").unwrap();
    cli().arg("--config").arg(&cfg_path).assert().code(3);
}

#[test]
fn zero_focal_length_in_config_exits_with_3() {
    let dir = tempfile::tempdir().unwrap();
    let (pattern, frame, _) = write_inputs(dir.path());
    let cfg_path = dir.path().join("config.json");
    let cfg = serde_json::json!({
        "pattern_path": pattern,
        "frame_paths": [frame],
        "camera": {"fx": 0.0, "fy": 600.0, "cx": 240.0, "cy": 180.0},
    });
    std::fs::write(&cfg_path, serde_json::to_string(&cfg).unwrap()).unwrap();

    cli()
        .arg("--config")
        .arg(&cfg_path)
        .assert()
        .code(3)
        .stderr(predicate::str::contains("non-zero focal lengths"));
}
