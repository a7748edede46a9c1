//! Detector observations
//!
//! An observation is one timestamped sample produced by a detector tick. Observations are
//! immutable once created and are kept for the lifetime of the session so the end-of-session
//! report can summarize them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of signal an observation measures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObservationKind {
    /// Number of faces in the camera frame
    FaceCount,
    /// Scalar microphone level on a 0-255 scale
    NoiseLevel,
    /// Frame-to-frame pixel difference ratio in [0, 1]
    MotionScore,
    /// Whether the host page holds input focus
    FocusState,
    /// Prohibited objects visible in the camera frame
    ObjectScan,
    /// Eye aspect ratios derived from face landmarks
    EyeAspect,
}

impl fmt::Display for ObservationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ObservationKind::FaceCount => "face_count",
            ObservationKind::NoiseLevel => "noise_level",
            ObservationKind::MotionScore => "motion_score",
            ObservationKind::FocusState => "focus_state",
            ObservationKind::ObjectScan => "object_scan",
            ObservationKind::EyeAspect => "eye_aspect",
        };
        f.write_str(name)
    }
}

/// An object reported by the vision backend that matched the prohibited list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedObject {
    /// Backend label, e.g. "cell phone"
    pub label: String,
    /// Backend confidence in [0, 1]
    pub confidence: f64,
}

impl DetectedObject {
    pub fn new(label: impl Into<String>, confidence: f64) -> Self {
        Self {
            label: label.into(),
            confidence,
        }
    }
}

/// Typed value carried by an observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ObservationValue {
    FaceCount(u32),
    NoiseLevel(f64),
    MotionScore(f64),
    FocusState(bool),
    ObjectScan(Vec<DetectedObject>),
    EyeAspect { left: f64, right: f64 },
}

impl ObservationValue {
    pub fn kind(&self) -> ObservationKind {
        match self {
            ObservationValue::FaceCount(_) => ObservationKind::FaceCount,
            ObservationValue::NoiseLevel(_) => ObservationKind::NoiseLevel,
            ObservationValue::MotionScore(_) => ObservationKind::MotionScore,
            ObservationValue::FocusState(_) => ObservationKind::FocusState,
            ObservationValue::ObjectScan(_) => ObservationKind::ObjectScan,
            ObservationValue::EyeAspect { .. } => ObservationKind::EyeAspect,
        }
    }

    /// Short human-readable rendering used in evidence payloads and logs
    pub fn summary(&self) -> String {
        match self {
            ObservationValue::FaceCount(n) => format!("{} face(s)", n),
            ObservationValue::NoiseLevel(level) => format!("noise level {:.0}", level),
            ObservationValue::MotionScore(score) => format!("motion score {:.2}", score),
            ObservationValue::FocusState(true) => "page focused".to_string(),
            ObservationValue::FocusState(false) => "page unfocused".to_string(),
            ObservationValue::ObjectScan(objects) if objects.is_empty() => {
                "no prohibited objects".to_string()
            }
            ObservationValue::ObjectScan(objects) => {
                let labels: Vec<_> = objects.iter().map(|o| o.label.as_str()).collect();
                format!("prohibited objects: {}", labels.join(", "))
            }
            ObservationValue::EyeAspect { left, right } => {
                format!("eye aspect ratio left {:.2} right {:.2}", left, right)
            }
        }
    }
}

/// One timestamped detector sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub value: ObservationValue,
    /// Question index active when the sample was ingested
    pub question_index: Option<usize>,
    pub timestamp: DateTime<Utc>,
}

impl Observation {
    pub fn new(
        value: ObservationValue,
        question_index: Option<usize>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            value,
            question_index,
            timestamp,
        }
    }

    pub fn kind(&self) -> ObservationKind {
        self.value.kind()
    }
}
