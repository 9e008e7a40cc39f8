use log::debug;
use planar_ar_core::{CameraModel, FrameView, Pose};
use planar_ar_tracker::{DetectError, DetectorParams, PatternDetector, PatternError, TrackingResult};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// One trained detector plus the most recent tracking result.
///
/// Frames are processed one at a time; the result is a snapshot the caller
/// may read between calls. When a frame misses the pattern, the pose of the
/// last successful frame is kept so a renderer can hold its overlay.
#[derive(Debug)]
pub struct ArPipeline {
    detector: PatternDetector,
    result: TrackingResult,
}

impl ArPipeline {
    /// Build and train on `pattern` with default detector parameters.
    pub fn new(pattern: &FrameView<'_>, camera: CameraModel) -> Result<Self, PatternError> {
        Self::with_params(pattern, camera, DetectorParams::default())
    }

    pub fn with_params(
        pattern: &FrameView<'_>,
        camera: CameraModel,
        params: DetectorParams,
    ) -> Result<Self, PatternError> {
        let mut detector = PatternDetector::new(camera, params);
        let model = detector.build_pattern(pattern)?;
        detector.train(model)?;
        Ok(Self::from_detector(detector))
    }

    /// Wrap an already trained detector.
    pub fn from_detector(detector: PatternDetector) -> Self {
        Self {
            detector,
            result: TrackingResult::default(),
        }
    }

    /// Run detection on the next frame and report whether the pattern was
    /// found.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, frame), fields(w = frame.width, h = frame.height))
    )]
    pub fn process_frame(&mut self, frame: &FrameView<'_>) -> Result<bool, DetectError> {
        let mut res = self.detector.detect(frame)?;
        if !res.found {
            res.pose = self.result.pose;
        }
        debug!("pipeline: found={}", res.found);
        self.result = res;
        Ok(self.result.found)
    }

    pub fn result(&self) -> &TrackingResult {
        &self.result
    }

    /// Pattern -> camera pose from the last frame that found the pattern.
    pub fn pattern_location(&self) -> &Pose {
        &self.result.pose
    }

    pub fn detector(&self) -> &PatternDetector {
        &self.detector
    }

    pub fn detector_mut(&mut self) -> &mut PatternDetector {
        &mut self.detector
    }
}
