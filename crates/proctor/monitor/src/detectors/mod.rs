//! Detectors.
//!
//! Each detector samples one signal source on a fixed period and turns it into typed
//! observation values. Detectors never decide policy; that is the evaluator's job.
//!
//! A tick has three possible outcomes:
//! - `Ok(values)` with at least one value: the sample is forwarded to the controller
//! - `Ok(vec![])`: no sample available (source not ready); silently skipped
//! - `Err(_)`: unexpected failure; the tick is aborted and the next one proceeds

mod audio;
mod face;
mod focus;
mod motion;
mod object;

pub use audio::{mean_level, AudioLevelDetector};
pub use face::FaceDetector;
pub use focus::FocusDetector;
pub use motion::{motion_score, MotionDetector};
pub use object::ObjectDetector;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use proctor_types::{ObservationValue, ProctorConfig};
use serde::{Deserialize, Serialize};

use crate::error::ProctorResult;
use crate::media::{FocusSource, MediaSet};
use crate::vision::VisionBackend;

/// Built-in detector kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorKind {
    Face,
    Audio,
    Motion,
    Focus,
    Object,
}

impl fmt::Display for DetectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectorKind::Face => write!(f, "face"),
            DetectorKind::Audio => write!(f, "audio"),
            DetectorKind::Motion => write!(f, "motion"),
            DetectorKind::Focus => write!(f, "focus"),
            DetectorKind::Object => write!(f, "object"),
        }
    }
}

/// Trait for periodic signal samplers.
#[async_trait]
pub trait Detector: Send {
    /// Detector kind, for logs and error reports.
    fn kind(&self) -> DetectorKind;

    /// Sampling period.
    fn interval(&self) -> Duration;

    /// Take one sample.
    async fn sample(&mut self) -> ProctorResult<Vec<ObservationValue>>;
}

/// Build the standard detector set for a session's media.
///
/// The focus detector is only included when the host provides a focus source.
pub fn standard_detectors(
    config: &ProctorConfig,
    media: &MediaSet,
    vision: Arc<dyn VisionBackend>,
    focus: Option<Arc<dyn FocusSource>>,
) -> Vec<Box<dyn Detector>> {
    let mut detectors: Vec<Box<dyn Detector>> = vec![
        Box::new(FaceDetector::new(
            media.camera.clone(),
            vision.clone(),
            config.thresholds.face_confidence_min,
            config.intervals.face(),
        )),
        Box::new(ObjectDetector::new(
            media.camera.clone(),
            vision,
            config.thresholds.clone(),
            config.intervals.object(),
        )),
        Box::new(AudioLevelDetector::new(
            media.microphone.clone(),
            config.intervals.audio(),
        )),
        Box::new(MotionDetector::new(
            media.camera.clone(),
            config.thresholds.motion_pixel_skip,
            config.thresholds.motion_pixel_diff,
            config.intervals.motion(),
        )),
    ];

    if let Some(focus) = focus {
        detectors.push(Box::new(FocusDetector::new(focus, config.intervals.focus())));
    }

    detectors
}
