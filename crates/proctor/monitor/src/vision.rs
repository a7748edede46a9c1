//! Vision backend contract
//!
//! Face and object recognition are external capabilities. A backend receives a frame and
//! returns labelled entities with a confidence; face entities may carry eye landmarks.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::media::Frame;

/// Label the face detector counts
pub const FACE_LABEL: &str = "face";

/// Backend failure
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("vision backend error: {0}")]
pub struct VisionError(pub String);

/// Image-space point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// Six landmarks per eye, ordered outer corner, two upper lid points, inner corner, two
/// lower lid points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EyeLandmarks {
    pub left: [Point; 6],
    pub right: [Point; 6],
}

/// One entity found in a frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedEntity {
    pub label: String,
    pub confidence: f64,
    #[serde(default)]
    pub eyes: Option<EyeLandmarks>,
}

impl DetectedEntity {
    pub fn new(label: impl Into<String>, confidence: f64) -> Self {
        Self {
            label: label.into(),
            confidence,
            eyes: None,
        }
    }

    pub fn face(confidence: f64) -> Self {
        Self::new(FACE_LABEL, confidence)
    }

    pub fn with_eyes(mut self, eyes: EyeLandmarks) -> Self {
        self.eyes = Some(eyes);
        self
    }

    pub fn is_face(&self) -> bool {
        self.label.eq_ignore_ascii_case(FACE_LABEL)
    }
}

/// Pluggable frame analyser
#[async_trait]
pub trait VisionBackend: Send + Sync {
    async fn detect(&self, frame: &Frame) -> Result<Vec<DetectedEntity>, VisionError>;

    fn name(&self) -> &str;
}

/// Eye aspect ratio `(|p1-p5| + |p2-p4|) / (2 |p0-p3|)`.
///
/// `None` when the horizontal span is degenerate.
pub fn eye_aspect_ratio(eye: &[Point; 6]) -> Option<f64> {
    let horizontal = eye[0].distance(&eye[3]);
    if horizontal <= f64::EPSILON {
        return None;
    }
    let vertical = eye[1].distance(&eye[5]) + eye[2].distance(&eye[4]);
    Some(vertical / (2.0 * horizontal))
}
