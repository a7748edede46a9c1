//! Malpractice categories and warnings

use crate::ids::WarningId;
use crate::observation::{Observation, ObservationKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of malpractice categories the evaluator can raise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MalpracticeCategory {
    NoFace,
    MultipleFaces,
    HighNoise,
    SuspiciousMotion,
    TabUnfocused,
    ProhibitedObjectDetected,
    EyeAway,
}

impl MalpracticeCategory {
    pub const ALL: [MalpracticeCategory; 7] = [
        MalpracticeCategory::NoFace,
        MalpracticeCategory::MultipleFaces,
        MalpracticeCategory::HighNoise,
        MalpracticeCategory::SuspiciousMotion,
        MalpracticeCategory::TabUnfocused,
        MalpracticeCategory::ProhibitedObjectDetected,
        MalpracticeCategory::EyeAway,
    ];

    /// Wire code sent to the logging and interview collaborators
    pub fn code(&self) -> &'static str {
        match self {
            MalpracticeCategory::NoFace => "NO_FACE",
            MalpracticeCategory::MultipleFaces => "MULTIPLE_FACES",
            MalpracticeCategory::HighNoise => "HIGH_NOISE",
            MalpracticeCategory::SuspiciousMotion => "SUSPICIOUS_MOTION",
            MalpracticeCategory::TabUnfocused => "TAB_UNFOCUSED",
            MalpracticeCategory::ProhibitedObjectDetected => "PROHIBITED_OBJECT",
            MalpracticeCategory::EyeAway => "EYE_AWAY",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.code() == code)
    }

    /// The observation kind whose samples drive this category's run counter
    pub fn governing_kind(&self) -> ObservationKind {
        match self {
            MalpracticeCategory::NoFace | MalpracticeCategory::MultipleFaces => {
                ObservationKind::FaceCount
            }
            MalpracticeCategory::HighNoise => ObservationKind::NoiseLevel,
            MalpracticeCategory::SuspiciousMotion => ObservationKind::MotionScore,
            MalpracticeCategory::TabUnfocused => ObservationKind::FocusState,
            MalpracticeCategory::ProhibitedObjectDetected => ObservationKind::ObjectScan,
            MalpracticeCategory::EyeAway => ObservationKind::EyeAspect,
        }
    }

    /// Categories that pause an active session as soon as they are raised
    pub fn pauses_session(&self) -> bool {
        matches!(
            self,
            MalpracticeCategory::NoFace
                | MalpracticeCategory::MultipleFaces
                | MalpracticeCategory::ProhibitedObjectDetected
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            MalpracticeCategory::NoFace => "No face detected",
            MalpracticeCategory::MultipleFaces => "Multiple faces detected",
            MalpracticeCategory::HighNoise => "High background noise",
            MalpracticeCategory::SuspiciousMotion => "Suspicious movement",
            MalpracticeCategory::TabUnfocused => "Assessment window lost focus",
            MalpracticeCategory::ProhibitedObjectDetected => "Prohibited object detected",
            MalpracticeCategory::EyeAway => "Looking away from the screen",
        }
    }
}

impl fmt::Display for MalpracticeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// How a warning weighs on the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningSeverity {
    /// Recorded and reported, but does not count toward the termination cutoff
    Advisory,
    /// Counts toward the termination cutoff
    #[default]
    Violation,
}

impl WarningSeverity {
    pub fn counts_toward_cutoff(&self) -> bool {
        matches!(self, WarningSeverity::Violation)
    }
}

/// A threshold violation decided by the evaluator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Warning {
    pub id: WarningId,
    pub category: MalpracticeCategory,
    pub severity: WarningSeverity,
    pub timestamp: DateTime<Utc>,
    /// Consecutive qualifying ticks when the warning was raised
    pub run_length: u32,
    /// The observation that completed the qualifying run
    pub evidence: Observation,
}

impl Warning {
    pub fn new(
        category: MalpracticeCategory,
        severity: WarningSeverity,
        run_length: u32,
        evidence: Observation,
    ) -> Self {
        Self {
            id: WarningId::generate(),
            category,
            severity,
            timestamp: evidence.timestamp,
            run_length,
            evidence,
        }
    }

    pub fn question_index(&self) -> Option<usize> {
        self.evidence.question_index
    }

    /// Evidence rendered as the `data` object of an activity log entry
    pub fn evidence_data(&self) -> serde_json::Value {
        serde_json::json!({
            "category": self.category.code(),
            "severity": self.severity,
            "runLength": self.run_length,
            "detail": self.evidence.value.summary(),
            "observation": self.evidence.value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observation::ObservationValue;

    #[test]
    fn test_codes_round_trip() {
        for category in MalpracticeCategory::ALL {
            assert_eq!(MalpracticeCategory::from_code(category.code()), Some(category));
        }
        assert_eq!(MalpracticeCategory::from_code("UNKNOWN"), None);
    }

    #[test]
    fn test_pausing_categories() {
        let pausing: Vec<_> = MalpracticeCategory::ALL
            .into_iter()
            .filter(|c| c.pauses_session())
            .collect();
        assert_eq!(
            pausing,
            vec![
                MalpracticeCategory::NoFace,
                MalpracticeCategory::MultipleFaces,
                MalpracticeCategory::ProhibitedObjectDetected,
            ]
        );
    }

    #[test]
    fn test_warning_takes_evidence_timestamp() {
        let observation = Observation::new(ObservationValue::NoiseLevel(80.0), Some(2), Utc::now());
        let warning = Warning::new(
            MalpracticeCategory::HighNoise,
            WarningSeverity::Violation,
            3,
            observation.clone(),
        );
        assert_eq!(warning.timestamp, observation.timestamp);
        assert_eq!(warning.question_index(), Some(2));
        assert_eq!(warning.evidence_data()["category"], "HIGH_NOISE");
        assert_eq!(warning.evidence_data()["detail"], "noise level 80");
    }
}
