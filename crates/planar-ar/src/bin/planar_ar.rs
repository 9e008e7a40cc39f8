//! planar-ar CLI: locate a reference pattern in a list of frames.
//!
//! Exit codes: 0 success, 1 no pattern given, 2 pattern unreadable,
//! 3 invalid arguments or configuration.

use clap::Parser;
use log::{info, warn};
use planar_ar::core::CameraModel;
use planar_ar::detect::{build_pattern, detect_pattern, load_gray};
use planar_ar::tracker::{FrameReport, MatchPolicy, TrackerConfig, TrackingReport};
use planar_ar::PatternError;
use std::path::PathBuf;
use std::process::ExitCode;

#[cfg(feature = "tracing")]
use tracing_log::LogTracer;

const EXIT_NO_PATTERN: u8 = 1;
const EXIT_PATTERN_UNREADABLE: u8 = 2;
const EXIT_BAD_ARGS: u8 = 3;

#[derive(Parser, Debug)]
#[command(name = "planar-ar")]
#[command(about = "Find a planar reference image in frames and report homography and pose")]
#[command(version)]
struct Cli {
    /// Reference pattern image.
    pattern: Option<PathBuf>,

    /// Frames to search.
    frames: Vec<PathBuf>,

    /// JSON tracker config; positional arguments override its paths.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the full report as JSON on stdout.
    #[arg(long)]
    json: bool,

    /// Also write the report to this file.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Use the nearest/second-nearest ratio test instead of cross-checked
    /// nearest neighbours.
    #[arg(long)]
    ratio_test: bool,

    /// Skip the warped second matching pass.
    #[arg(long)]
    no_refine: bool,

    /// Camera intrinsics `fx,fy,cx,cy`.
    #[arg(long, value_delimiter = ',', num_args = 4)]
    intrinsics: Option<Vec<f64>>,
}

fn init_logging() {
    #[cfg(feature = "tracing")]
    {
        let _ = LogTracer::init();
        planar_ar::core::init_tracing(false);
    }
    #[cfg(not(feature = "tracing"))]
    {
        let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
            .try_init();
    }
}

fn fail(code: u8, msg: impl std::fmt::Display) -> ExitCode {
    eprintln!("planar-ar: {msg}");
    ExitCode::from(code)
}

fn resolve_config(cli: &Cli) -> Result<TrackerConfig, ExitCode> {
    let mut cfg = match &cli.config {
        Some(path) => TrackerConfig::load_json(path)
            .map_err(|e| fail(EXIT_BAD_ARGS, format!("config {}: {e}", path.display())))?,
        None => TrackerConfig::new(""),
    };

    if let Some(pattern) = &cli.pattern {
        cfg.pattern_path = pattern.to_string_lossy().into_owned();
    }
    if !cli.frames.is_empty() {
        cfg.frame_paths = cli
            .frames
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect();
    }
    if let Some(out) = &cli.out {
        cfg.output_path = Some(out.to_string_lossy().into_owned());
    }
    if cli.ratio_test {
        cfg.detector.match_policy = MatchPolicy::ratio_test();
    }
    if cli.no_refine {
        cfg.detector.refine_homography = false;
    }
    if let Some(k) = &cli.intrinsics {
        cfg.camera = CameraModel {
            fx: k[0],
            fy: k[1],
            cx: k[2],
            cy: k[3],
            ..cfg.camera
        };
    }
    if !cfg.camera.is_valid() {
        let msg = "camera intrinsics must be finite with non-zero focal lengths";
        return Err(fail(EXIT_BAD_ARGS, msg));
    }
    Ok(cfg)
}

fn print_frame(report: &FrameReport) {
    if let Some(err) = &report.error {
        println!("{}: error: {err}", report.frame);
        return;
    }
    match (&report.projected_quad, &report.pose) {
        (Some(quad), Some(pose)) if report.found => {
            let corners: Vec<String> = quad
                .iter()
                .map(|[x, y]| format!("({x:.1}, {y:.1})"))
                .collect();
            let [tx, ty, tz] = pose.translation;
            println!(
                "{}: found, {} inliers, corners {}, t = ({tx:.3}, {ty:.3}, {tz:.3})",
                report.frame,
                report.stats.rough_inliers,
                corners.join(" ")
            );
        }
        _ => println!(
            "{}: not found ({} keypoints, {} matches)",
            report.frame, report.stats.query_keypoints, report.stats.correspondences
        ),
    }
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if !e.use_stderr() => {
            // --help / --version
            let _ = e.print();
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(EXIT_BAD_ARGS);
        }
    };
    init_logging();

    let cfg = match resolve_config(&cli) {
        Ok(cfg) => cfg,
        Err(code) => return code,
    };
    if cfg.pattern_path.is_empty() {
        return fail(EXIT_NO_PATTERN, "no pattern image given");
    }

    let pattern_img = match load_gray(&cfg.pattern_path) {
        Ok(img) => img,
        Err(e) => {
            return fail(
                EXIT_PATTERN_UNREADABLE,
                format!("cannot read pattern {}: {e}", cfg.pattern_path),
            )
        }
    };

    let mut detector = cfg.build_detector();
    let model = match build_pattern(&detector, &pattern_img) {
        Ok(model) => model,
        Err(e) => {
            return fail(
                EXIT_PATTERN_UNREADABLE,
                format!("cannot use pattern {}: {e}", cfg.pattern_path),
            )
        }
    };
    let (size, keypoints) = (model.size(), model.len());
    match detector.train(model) {
        Ok(()) => info!("pattern {}: {keypoints} keypoints", cfg.pattern_path),
        Err(PatternError::EmptyPattern) => {
            warn!("pattern {} has no features; nothing can be found", cfg.pattern_path)
        }
        Err(e) => return fail(EXIT_PATTERN_UNREADABLE, e),
    }

    let mut report = TrackingReport::new(&cfg, size, keypoints);
    for frame in &cfg.frame_paths {
        let entry = match load_gray(frame) {
            Ok(img) => FrameReport::from_detect(frame.as_str(), detect_pattern(&detector, &img)),
            Err(e) => FrameReport::from_error(frame.as_str(), e),
        };
        if !cli.json {
            print_frame(&entry);
        }
        report.frames.push(entry);
    }

    if cli.json {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{json}"),
            Err(e) => return fail(EXIT_BAD_ARGS, e),
        }
    } else {
        println!(
            "{}/{} frames contain the pattern",
            report.found_count(),
            report.frames.len()
        );
    }

    if cfg.output_path.is_some() {
        let path = cfg.output_path();
        if let Err(e) = report.write_json(&path) {
            return fail(EXIT_BAD_ARGS, format!("cannot write {}: {e}", path.display()));
        }
        info!("report written to {}", path.display());
    }

    ExitCode::SUCCESS
}
