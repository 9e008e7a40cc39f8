//! Per-frame pattern detection.
//!
//! Extraction, matching and robust fitting run once on the frame; when
//! refinement is enabled they run again on the frame warped back into pattern
//! space, and the two homographies are composed.

mod error;
mod params;
mod pipeline;
mod result;

pub use error::{DetectError, PatternError};
pub use params::{DetectorParams, MatchPolicy, PyramidParams};
pub use pipeline::PatternDetector;
pub use result::{DetectionStats, TrackingResult};
