//! Malpractice evaluator: debounced thresholds and per-category cool-down.
//!
//! Every observation updates the run counters of the categories its kind governs:
//! - a qualifying observation increments the category's consecutive-run counter
//! - a non-qualifying observation of the same kind resets it to zero
//! - observations of other kinds leave it untouched
//!
//! Once a counter is at or above the category's run length, each further qualifying tick
//! is a warning candidate. A candidate raised within the cool-down window of the last
//! emitted warning of the same category is suppressed and does not move the window.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use proctor_types::{
    MalpracticeCategory, Observation, ObservationValue, ProctorConfig, Warning,
};
use tracing::debug;

// ── Evaluation result ───────────────────────────────────────────────────

/// Outcome of evaluating one observation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Evaluation {
    /// Warnings emitted by this tick.
    pub warnings: Vec<Warning>,
    /// Candidates dropped by the cool-down window.
    pub suppressed: Vec<MalpracticeCategory>,
    /// Categories whose condition currently holds (non-zero run), after this tick.
    pub violating: BTreeSet<MalpracticeCategory>,
}

impl Evaluation {
    /// No category holds a non-zero run.
    pub fn is_clean(&self) -> bool {
        self.violating.is_empty()
    }

    /// None of the session-pausing categories holds a non-zero run.
    pub fn pausing_clear(&self) -> bool {
        !self.violating.iter().any(|c| c.pauses_session())
    }
}

// ── Evaluator ───────────────────────────────────────────────────────────

/// Stateful threshold evaluator.
#[derive(Debug, Clone)]
pub struct MalpracticeEvaluator {
    config: ProctorConfig,
    cooldown: chrono::Duration,
    runs: BTreeMap<MalpracticeCategory, u32>,
    last_emitted: BTreeMap<MalpracticeCategory, DateTime<Utc>>,
    suppressed_total: u64,
}

impl MalpracticeEvaluator {
    pub fn new(config: ProctorConfig) -> Self {
        let cooldown = chrono::Duration::milliseconds(
            i64::try_from(config.debounce.cooldown_ms).unwrap_or(i64::MAX),
        );
        Self {
            config,
            cooldown,
            runs: BTreeMap::new(),
            last_emitted: BTreeMap::new(),
            suppressed_total: 0,
        }
    }

    /// Evaluate one observation.
    pub fn evaluate(&mut self, observation: &Observation) -> Evaluation {
        let mut evaluation = Evaluation::default();

        for (category, holds) in self.conditions(&observation.value) {
            if !holds {
                self.runs.insert(category, 0);
                continue;
            }

            let run = self.runs.entry(category).or_insert(0);
            *run = run.saturating_add(1);
            let run = *run;

            if run < self.config.run_length(category) {
                continue;
            }

            if self.in_cooldown(category, observation.timestamp) {
                debug!(%category, run, "Warning suppressed by cool-down");
                self.suppressed_total += 1;
                evaluation.suppressed.push(category);
                continue;
            }

            self.last_emitted.insert(category, observation.timestamp);
            evaluation.warnings.push(Warning::new(
                category,
                self.config.severity(category),
                run,
                observation.clone(),
            ));
        }

        evaluation.violating = self
            .runs
            .iter()
            .filter(|(_, run)| **run > 0)
            .map(|(category, _)| *category)
            .collect();

        evaluation
    }

    /// Current consecutive-run length for a category.
    pub fn run_length(&self, category: MalpracticeCategory) -> u32 {
        self.runs.get(&category).copied().unwrap_or(0)
    }

    /// Total candidates dropped by the cool-down window.
    pub fn suppressed_total(&self) -> u64 {
        self.suppressed_total
    }

    /// Forget all runs and cool-down windows.
    pub fn reset(&mut self) {
        self.runs.clear();
        self.last_emitted.clear();
    }

    fn in_cooldown(&self, category: MalpracticeCategory, at: DateTime<Utc>) -> bool {
        self.last_emitted
            .get(&category)
            .is_some_and(|last| at - *last < self.cooldown)
    }

    /// Categories governed by this value and whether each one's condition holds.
    fn conditions(&self, value: &ObservationValue) -> Vec<(MalpracticeCategory, bool)> {
        let thresholds = &self.config.thresholds;
        match value {
            ObservationValue::FaceCount(count) => vec![
                (MalpracticeCategory::NoFace, *count == 0),
                (MalpracticeCategory::MultipleFaces, *count > 1),
            ],
            ObservationValue::NoiseLevel(level) => vec![(
                MalpracticeCategory::HighNoise,
                *level > thresholds.noise_threshold,
            )],
            ObservationValue::MotionScore(score) => vec![(
                MalpracticeCategory::SuspiciousMotion,
                *score > thresholds.motion_threshold,
            )],
            ObservationValue::FocusState(focused) => {
                vec![(MalpracticeCategory::TabUnfocused, !*focused)]
            }
            ObservationValue::ObjectScan(objects) => vec![(
                MalpracticeCategory::ProhibitedObjectDetected,
                !objects.is_empty(),
            )],
            ObservationValue::EyeAspect { left, right } => vec![(
                MalpracticeCategory::EyeAway,
                *left < thresholds.eye_aspect_ratio_min || *right < thresholds.eye_aspect_ratio_min,
            )],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use proctor_types::{DetectedObject, WarningSeverity};

    fn at(start: DateTime<Utc>, secs: i64) -> DateTime<Utc> {
        start + Duration::seconds(secs)
    }

    fn obs(value: ObservationValue, timestamp: DateTime<Utc>) -> Observation {
        Observation::new(value, Some(0), timestamp)
    }

    #[test]
    fn test_no_face_run_of_five() {
        let start = Utc::now();
        let mut evaluator = MalpracticeEvaluator::new(ProctorConfig::default());

        let mut emitted_at = Vec::new();
        for tick in 1..=5 {
            let evaluation =
                evaluator.evaluate(&obs(ObservationValue::FaceCount(0), at(start, tick)));
            if !evaluation.warnings.is_empty() {
                emitted_at.push(tick);
            }
        }

        assert_eq!(emitted_at, vec![3]);
        assert_eq!(evaluator.suppressed_total(), 2);
    }

    #[test]
    fn test_noise_fixture() {
        let start = Utc::now();
        let levels = [40.0, 70.0, 72.0, 68.0, 40.0, 71.0, 73.0, 74.0];

        let run = |cooldown_ms: u64| {
            let mut config = ProctorConfig::default();
            config.debounce.cooldown_ms = cooldown_ms;
            let mut evaluator = MalpracticeEvaluator::new(config);
            levels
                .iter()
                .enumerate()
                .filter_map(|(i, level)| {
                    let evaluation = evaluator.evaluate(&obs(
                        ObservationValue::NoiseLevel(*level),
                        at(start, i as i64),
                    ));
                    (!evaluation.warnings.is_empty()).then_some(i)
                })
                .collect::<Vec<_>>()
        };

        // second run completes at index 7, four seconds after the first warning
        assert_eq!(run(5000), vec![3]);
        assert_eq!(run(3000), vec![3, 7]);
    }

    #[test]
    fn test_interruption_resets_run() {
        let start = Utc::now();
        let mut evaluator = MalpracticeEvaluator::new(ProctorConfig::default());

        for (i, count) in [0, 0, 1, 0, 0].into_iter().enumerate() {
            let evaluation =
                evaluator.evaluate(&obs(ObservationValue::FaceCount(count), at(start, i as i64)));
            assert!(evaluation.warnings.is_empty());
        }
        assert_eq!(evaluator.run_length(MalpracticeCategory::NoFace), 2);
    }

    #[test]
    fn test_other_kinds_do_not_reset_runs() {
        let start = Utc::now();
        let mut evaluator = MalpracticeEvaluator::new(ProctorConfig::default());

        evaluator.evaluate(&obs(ObservationValue::FaceCount(2), at(start, 0)));
        evaluator.evaluate(&obs(ObservationValue::NoiseLevel(10.0), at(start, 0)));
        evaluator.evaluate(&obs(ObservationValue::FaceCount(2), at(start, 1)));
        evaluator.evaluate(&obs(ObservationValue::FocusState(true), at(start, 1)));
        let evaluation = evaluator.evaluate(&obs(ObservationValue::FaceCount(2), at(start, 2)));

        assert_eq!(evaluation.warnings.len(), 1);
        assert_eq!(
            evaluation.warnings[0].category,
            MalpracticeCategory::MultipleFaces
        );
        assert_eq!(evaluation.warnings[0].run_length, 3);
    }

    #[test]
    fn test_cooldown_expiry_allows_second_warning() {
        let start = Utc::now();
        let mut evaluator = MalpracticeEvaluator::new(ProctorConfig::default());

        let mut emitted = Vec::new();
        for tick in 1..=9 {
            let evaluation =
                evaluator.evaluate(&obs(ObservationValue::FocusState(false), at(start, tick)));
            emitted.extend(evaluation.warnings.iter().map(|_| tick));
        }

        // sustained violation re-raises once the window has elapsed
        assert_eq!(emitted, vec![3, 8]);
    }

    #[test]
    fn test_clean_and_pausing_clear() {
        let start = Utc::now();
        let mut evaluator = MalpracticeEvaluator::new(ProctorConfig::default());

        let evaluation = evaluator.evaluate(&obs(ObservationValue::NoiseLevel(90.0), at(start, 0)));
        assert!(!evaluation.is_clean());
        assert!(evaluation.pausing_clear());

        let evaluation = evaluator.evaluate(&obs(
            ObservationValue::ObjectScan(vec![DetectedObject::new("book", 0.9)]),
            at(start, 0),
        ));
        assert!(!evaluation.pausing_clear());

        evaluator.evaluate(&obs(ObservationValue::NoiseLevel(20.0), at(start, 1)));
        let evaluation =
            evaluator.evaluate(&obs(ObservationValue::ObjectScan(vec![]), at(start, 1)));
        assert!(evaluation.is_clean());
    }

    #[test]
    fn test_eye_away_either_eye() {
        let mut config = ProctorConfig::default();
        config.debounce.run_length = 1;
        let mut evaluator = MalpracticeEvaluator::new(config);

        let evaluation = evaluator.evaluate(&obs(
            ObservationValue::EyeAspect {
                left: 0.31,
                right: 0.12,
            },
            Utc::now(),
        ));
        assert_eq!(evaluation.warnings.len(), 1);
        assert_eq!(evaluation.warnings[0].category, MalpracticeCategory::EyeAway);
    }

    #[test]
    fn test_severity_follows_config() {
        let mut config = ProctorConfig::default();
        config.debounce.run_length = 1;
        config
            .session
            .advisory_categories
            .push(MalpracticeCategory::SuspiciousMotion);
        let mut evaluator = MalpracticeEvaluator::new(config);

        let evaluation = evaluator.evaluate(&obs(ObservationValue::MotionScore(0.8), Utc::now()));
        assert_eq!(evaluation.warnings[0].severity, WarningSeverity::Advisory);
    }

    #[test]
    fn test_reset_clears_state() {
        let start = Utc::now();
        let mut evaluator = MalpracticeEvaluator::new(ProctorConfig::default());
        for tick in 0..3 {
            evaluator.evaluate(&obs(ObservationValue::FaceCount(0), at(start, tick)));
        }
        evaluator.reset();
        assert_eq!(evaluator.run_length(MalpracticeCategory::NoFace), 0);

        // window cleared too: a fresh run warns immediately on reaching the length
        let mut warned = false;
        for tick in 3..6 {
            warned |= !evaluator
                .evaluate(&obs(ObservationValue::FaceCount(0), at(start, tick)))
                .warnings
                .is_empty();
        }
        assert!(warned);
    }
}
