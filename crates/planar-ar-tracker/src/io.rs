//! JSON configuration and report helpers for pattern tracking runs.

use crate::{DetectError, DetectionStats, DetectorParams, PatternDetector, TrackingResult};
use nalgebra::Point2;
use planar_ar_core::{CameraModel, Pose};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

#[derive(thiserror::Error, Debug)]
pub enum TrackerIoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// One tracking run: a pattern image, the frames to search and the settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerConfig {
    pub pattern_path: String,
    #[serde(default)]
    pub frame_paths: Vec<String>,
    #[serde(default)]
    pub camera: CameraModel,
    #[serde(default)]
    pub detector: DetectorParams,
    #[serde(default)]
    pub output_path: Option<String>,
}

impl TrackerConfig {
    pub fn new(pattern_path: impl Into<String>) -> Self {
        Self {
            pattern_path: pattern_path.into(),
            frame_paths: Vec::new(),
            camera: CameraModel::default(),
            detector: DetectorParams::default(),
            output_path: None,
        }
    }

    /// Load a JSON config from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, TrackerIoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), TrackerIoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Resolve the output report path.
    pub fn output_path(&self) -> PathBuf {
        self.output_path
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("planar_ar_report.json"))
    }

    /// Untrained detector for this config's camera and parameters.
    pub fn build_detector(&self) -> PatternDetector {
        PatternDetector::new(self.camera, self.detector.clone())
    }
}

/// Pose in report form: row-major rotation plus translation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoseReport {
    pub rotation: [[f64; 3]; 3],
    pub translation: [f64; 3],
    /// Camera centre expressed in pattern coordinates.
    pub camera_position: [f64; 3],
}

impl From<&Pose> for PoseReport {
    fn from(pose: &Pose) -> Self {
        let r = &pose.rotation;
        let eye = pose.inverse().translation;
        Self {
            rotation: std::array::from_fn(|i| std::array::from_fn(|j| r[(i, j)])),
            translation: [pose.translation.x, pose.translation.y, pose.translation.z],
            camera_position: [eye.x, eye.y, eye.z],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameReport {
    pub frame: String,
    pub found: bool,
    #[serde(default)]
    pub homography: Option<[[f64; 3]; 3]>,
    #[serde(default)]
    pub projected_quad: Option<[[f32; 2]; 4]>,
    #[serde(default)]
    pub pose: Option<PoseReport>,
    #[serde(default)]
    pub stats: DetectionStats,
    #[serde(default)]
    pub error: Option<String>,
}

impl FrameReport {
    /// Report for a completed `detect` call. Geometry is only filled in when
    /// the pattern was found.
    pub fn from_result(frame: impl Into<String>, res: &TrackingResult) -> Self {
        let quad = |q: &[Point2<f32>; 4]| q.map(|p| [p.x, p.y]);
        Self {
            frame: frame.into(),
            found: res.found,
            homography: res.found.then(|| res.homography.to_array()),
            projected_quad: res.found.then(|| quad(&res.projected_quad)),
            pose: res.found.then(|| PoseReport::from(&res.pose)),
            stats: res.stats,
            error: None,
        }
    }

    /// Report for a frame that could not be processed.
    pub fn from_error(frame: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self {
            frame: frame.into(),
            found: false,
            homography: None,
            projected_quad: None,
            pose: None,
            stats: DetectionStats::default(),
            error: Some(err.to_string()),
        }
    }

    pub fn from_detect(frame: impl Into<String>, res: Result<TrackingResult, DetectError>) -> Self {
        match res {
            Ok(r) => Self::from_result(frame, &r),
            Err(e) => Self::from_error(frame, e),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingReport {
    pub pattern_path: String,
    pub pattern_size: [usize; 2],
    pub pattern_keypoints: usize,
    pub camera: CameraModel,
    pub frames: Vec<FrameReport>,
}

impl TrackingReport {
    pub fn new(
        cfg: &TrackerConfig,
        pattern_size: (usize, usize),
        pattern_keypoints: usize,
    ) -> Self {
        Self {
            pattern_path: cfg.pattern_path.clone(),
            pattern_size: [pattern_size.0, pattern_size.1],
            pattern_keypoints,
            camera: cfg.camera,
            frames: Vec::new(),
        }
    }

    pub fn found_count(&self) -> usize {
        self.frames.iter().filter(|f| f.found).count()
    }

    /// Load a report from JSON on disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, TrackerIoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this report to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), TrackerIoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}
