//! Face detector.
//!
//! Counts faces in the current camera frame. When exactly one face is present and the
//! backend supplied eye landmarks, it also reports both eye aspect ratios.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use proctor_types::ObservationValue;
use tracing::{debug, instrument};

use super::{Detector, DetectorKind};
use crate::error::{ProctorError, ProctorResult};
use crate::media::CameraFeed;
use crate::vision::{eye_aspect_ratio, VisionBackend};

/// Face-count detector backed by a vision backend.
pub struct FaceDetector {
    camera: Arc<dyn CameraFeed>,
    vision: Arc<dyn VisionBackend>,
    min_confidence: f64,
    interval: Duration,
}

impl FaceDetector {
    pub fn new(
        camera: Arc<dyn CameraFeed>,
        vision: Arc<dyn VisionBackend>,
        min_confidence: f64,
        interval: Duration,
    ) -> Self {
        Self {
            camera,
            vision,
            min_confidence: min_confidence.clamp(0.0, 1.0),
            interval,
        }
    }
}

#[async_trait]
impl Detector for FaceDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Face
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    #[instrument(skip(self), level = "debug")]
    async fn sample(&mut self) -> ProctorResult<Vec<ObservationValue>> {
        let Some(frame) = self.camera.capture().await else {
            debug!("Camera frame not ready");
            return Ok(Vec::new());
        };

        let entities = self
            .vision
            .detect(&frame)
            .await
            .map_err(|e| ProctorError::DetectorFailed {
                detector: DetectorKind::Face,
                reason: e.to_string(),
            })?;

        let faces: Vec<_> = entities
            .iter()
            .filter(|e| e.is_face() && e.confidence >= self.min_confidence)
            .collect();

        let mut values = vec![ObservationValue::FaceCount(faces.len() as u32)];

        if let [face] = faces.as_slice() {
            if let Some(eyes) = &face.eyes {
                if let (Some(left), Some(right)) =
                    (eye_aspect_ratio(&eyes.left), eye_aspect_ratio(&eyes.right))
                {
                    values.push(ObservationValue::EyeAspect { left, right });
                }
            }
        }

        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{SceneVision, StaticCamera};
    use crate::vision::{DetectedEntity, EyeLandmarks, Point};

    fn detector(camera: Arc<StaticCamera>, vision: Arc<SceneVision>) -> FaceDetector {
        FaceDetector::new(camera, vision, 0.5, Duration::from_secs(1))
    }

    fn open_eye() -> [Point; 6] {
        [
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.6),
            Point::new(2.0, 0.6),
            Point::new(3.0, 0.0),
            Point::new(2.0, -0.6),
            Point::new(1.0, -0.6),
        ]
    }

    #[tokio::test]
    async fn test_counts_confident_faces() {
        let camera = Arc::new(StaticCamera::ready());
        let vision = Arc::new(SceneVision::new(vec![
            DetectedEntity::face(0.9),
            DetectedEntity::face(0.3),
            DetectedEntity::new("book", 0.95),
        ]));
        let mut detector = detector(camera, vision);

        let values = detector.sample().await.unwrap();
        assert_eq!(values, vec![ObservationValue::FaceCount(1)]);
    }

    #[tokio::test]
    async fn test_no_frame_yields_no_sample() {
        let camera = Arc::new(StaticCamera::not_ready());
        let vision = Arc::new(SceneVision::new(vec![DetectedEntity::face(0.9)]));
        let mut detector = detector(camera, vision);

        assert!(detector.sample().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_single_face_with_landmarks_reports_eye_aspect() {
        let eyes = EyeLandmarks {
            left: open_eye(),
            right: open_eye(),
        };
        let camera = Arc::new(StaticCamera::ready());
        let vision = Arc::new(SceneVision::new(vec![
            DetectedEntity::face(0.9).with_eyes(eyes)
        ]));
        let mut detector = detector(camera, vision);

        let values = detector.sample().await.unwrap();
        assert_eq!(values.len(), 2);
        match values[1] {
            ObservationValue::EyeAspect { left, right } => {
                assert!((left - 0.4).abs() < 1e-9);
                assert!((right - 0.4).abs() < 1e-9);
            }
            ref other => panic!("unexpected value {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_backend_failure_is_detector_error() {
        let camera = Arc::new(StaticCamera::ready());
        let vision = Arc::new(SceneVision::failing("model not loaded"));
        let mut detector = detector(camera, vision);

        let err = detector.sample().await.unwrap_err();
        assert!(matches!(
            err,
            ProctorError::DetectorFailed {
                detector: DetectorKind::Face,
                ..
            }
        ));
    }
}
