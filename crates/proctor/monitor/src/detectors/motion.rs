//! Motion detector.
//!
//! Compares each frame with the previously sampled one over a strided pixel grid. Exactly
//! one previous frame is retained, so memory stays bounded for the whole session.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use proctor_types::ObservationValue;
use tracing::debug;

use super::{Detector, DetectorKind};
use crate::error::ProctorResult;
use crate::media::{CameraFeed, Frame};

/// Frame-difference motion detector.
pub struct MotionDetector {
    camera: Arc<dyn CameraFeed>,
    pixel_skip: usize,
    pixel_diff: u32,
    interval: Duration,
    previous: Option<Frame>,
}

impl MotionDetector {
    pub fn new(
        camera: Arc<dyn CameraFeed>,
        pixel_skip: usize,
        pixel_diff: u32,
        interval: Duration,
    ) -> Self {
        Self {
            camera,
            pixel_skip: pixel_skip.max(1),
            pixel_diff,
            interval,
            previous: None,
        }
    }
}

/// Ratio of changed pixels among every `pixel_skip`th pixel, in [0, 1].
///
/// A pixel has changed when the summed absolute RGB difference exceeds `pixel_diff`.
pub fn motion_score(previous: &Frame, current: &Frame, pixel_skip: usize, pixel_diff: u32) -> f64 {
    let stride = 4 * pixel_skip.max(1);
    let len = previous.rgba.len().min(current.rgba.len());

    let mut sampled = 0u64;
    let mut changed = 0u64;
    for i in (0..len.saturating_sub(3)).step_by(stride) {
        let diff: u32 = (0..3)
            .map(|c| u32::from(previous.rgba[i + c].abs_diff(current.rgba[i + c])))
            .sum();
        sampled += 1;
        if diff > pixel_diff {
            changed += 1;
        }
    }

    if sampled == 0 {
        0.0
    } else {
        (changed as f64 / sampled as f64).clamp(0.0, 1.0)
    }
}

#[async_trait]
impl Detector for MotionDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Motion
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn sample(&mut self) -> ProctorResult<Vec<ObservationValue>> {
        let Some(frame) = self.camera.capture().await else {
            return Ok(Vec::new());
        };

        let score = match &self.previous {
            Some(previous) if previous.same_dimensions(&frame) => Some(motion_score(
                previous,
                &frame,
                self.pixel_skip,
                self.pixel_diff,
            )),
            Some(_) => {
                debug!("Frame dimensions changed, resetting motion baseline");
                None
            }
            None => None,
        };

        self.previous = Some(frame);
        Ok(score.map(ObservationValue::MotionScore).into_iter().collect())
    }
}
