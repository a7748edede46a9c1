//! Audio level detector.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use proctor_types::ObservationValue;

use super::{Detector, DetectorKind};
use crate::error::ProctorResult;
use crate::media::MicrophoneFeed;

/// Samples the microphone analyser and reports the rounded mean bin magnitude.
pub struct AudioLevelDetector {
    microphone: Arc<dyn MicrophoneFeed>,
    interval: Duration,
}

impl AudioLevelDetector {
    pub fn new(microphone: Arc<dyn MicrophoneFeed>, interval: Duration) -> Self {
        Self {
            microphone,
            interval,
        }
    }
}

/// Rounded mean of frequency-bin magnitudes, `None` for an empty buffer.
pub fn mean_level(bins: &[u8]) -> Option<f64> {
    if bins.is_empty() {
        return None;
    }
    let sum: u64 = bins.iter().map(|b| u64::from(*b)).sum();
    Some((sum as f64 / bins.len() as f64).round())
}

#[async_trait]
impl Detector for AudioLevelDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Audio
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn sample(&mut self) -> ProctorResult<Vec<ObservationValue>> {
        let level = self
            .microphone
            .frequency_data()
            .await
            .and_then(|bins| mean_level(&bins));

        Ok(level.map(ObservationValue::NoiseLevel).into_iter().collect())
    }
}
