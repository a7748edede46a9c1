//! Prohibited-object detector.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use proctor_types::{DetectedObject, ObservationValue, ThresholdConfig};
use tracing::debug;

use super::{Detector, DetectorKind};
use crate::error::{ProctorError, ProctorResult};
use crate::media::CameraFeed;
use crate::vision::VisionBackend;

/// Reports prohibited objects visible to the camera. An empty scan is a clean sample.
pub struct ObjectDetector {
    camera: Arc<dyn CameraFeed>,
    vision: Arc<dyn VisionBackend>,
    thresholds: ThresholdConfig,
    interval: Duration,
}

impl ObjectDetector {
    pub fn new(
        camera: Arc<dyn CameraFeed>,
        vision: Arc<dyn VisionBackend>,
        thresholds: ThresholdConfig,
        interval: Duration,
    ) -> Self {
        Self {
            camera,
            vision,
            thresholds,
            interval,
        }
    }
}

#[async_trait]
impl Detector for ObjectDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Object
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn sample(&mut self) -> ProctorResult<Vec<ObservationValue>> {
        let Some(frame) = self.camera.capture().await else {
            return Ok(Vec::new());
        };

        let entities = self
            .vision
            .detect(&frame)
            .await
            .map_err(|e| ProctorError::DetectorFailed {
                detector: DetectorKind::Object,
                reason: e.to_string(),
            })?;

        let objects: Vec<DetectedObject> = entities
            .into_iter()
            .filter(|e| {
                e.confidence >= self.thresholds.object_confidence_min
                    && self.thresholds.is_prohibited(&e.label)
            })
            .map(|e| DetectedObject::new(e.label, e.confidence))
            .collect();

        if !objects.is_empty() {
            debug!(count = objects.len(), "Prohibited objects in frame");
        }

        Ok(vec![ObservationValue::ObjectScan(objects)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{SceneVision, StaticCamera};
    use crate::vision::DetectedEntity;

    #[tokio::test]
    async fn test_filters_by_list_and_confidence() {
        let camera = Arc::new(StaticCamera::ready());
        let vision = Arc::new(SceneVision::new(vec![
            DetectedEntity::face(0.99),
            DetectedEntity::new("cell phone", 0.85),
            DetectedEntity::new("book", 0.65),
            DetectedEntity::new("cup", 0.99),
        ]));
        let mut detector = ObjectDetector::new(
            camera,
            vision,
            ThresholdConfig::default(),
            Duration::from_secs(1),
        );

        let values = detector.sample().await.unwrap();
        assert_eq!(
            values,
            vec![ObservationValue::ObjectScan(vec![DetectedObject::new(
                "cell phone",
                0.85
            )])]
        );
    }

    #[tokio::test]
    async fn test_clean_frame_is_empty_scan() {
        let camera = Arc::new(StaticCamera::ready());
        let vision = Arc::new(SceneVision::new(vec![DetectedEntity::face(0.9)]));
        let mut detector = ObjectDetector::new(
            camera,
            vision,
            ThresholdConfig::default(),
            Duration::from_secs(1),
        );

        assert_eq!(
            detector.sample().await.unwrap(),
            vec![ObservationValue::ObjectScan(vec![])]
        );
    }
}
