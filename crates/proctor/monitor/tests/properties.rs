//! Property tests: debounce, cool-down deduplication, score bounds and terminal absorption.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use proctor_monitor::{
    compute_score, DeviceCheck, MalpracticeEvaluator, ManualClock, MemorySink, QuestionPlan,
    ScoreInputs, SessionController,
};
use proctor_types::{
    MalpracticeCategory, Observation, ObservationValue, PauseReason, ProctorConfig,
    ScoringConfig, SessionStatus, SubjectId, TerminationReason,
};
use proptest::prelude::*;

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

/// Noise levels that are either clearly quiet or clearly loud.
fn arb_noise_sequence() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(prop_oneof![0.0f64..=65.0, 65.5f64..=255.0], 0..60)
}

fn arb_category() -> impl Strategy<Value = MalpracticeCategory> {
    prop::sample::select(MalpracticeCategory::ALL.to_vec())
}

fn arb_score_inputs() -> impl Strategy<Value = ScoreInputs> {
    (
        prop::collection::btree_map(arb_category(), 0u32..500, 0..7),
        0.0f64..=100.0,
        0.0f64..=255.0,
    )
        .prop_map(|(warning_counts, normal_face_pct, average_noise)| ScoreInputs {
            warning_counts,
            normal_face_pct,
            average_noise,
        })
}

fn arb_scoring() -> impl Strategy<Value = ScoringConfig> {
    (1u32..=10, 0u32..=100).prop_map(|(warning_weight, warning_penalty_cap)| ScoringConfig {
        warning_weight,
        warning_penalty_cap,
        ..ScoringConfig::default()
    })
}

#[derive(Debug, Clone)]
enum Op {
    Ingest(ObservationValue),
    Pause,
    Resume,
    Terminate,
    Complete,
    Advance,
    Clock,
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u32..4).prop_map(|n| Op::Ingest(ObservationValue::FaceCount(n))),
        (0.0f64..255.0).prop_map(|l| Op::Ingest(ObservationValue::NoiseLevel(l))),
        any::<bool>().prop_map(|f| Op::Ingest(ObservationValue::FocusState(f))),
        Just(Op::Pause),
        Just(Op::Resume),
        Just(Op::Terminate),
        Just(Op::Complete),
        Just(Op::Advance),
        Just(Op::Clock),
    ]
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Indices at which the evaluator emitted a HighNoise warning, one tick per second.
fn emitted_indices(levels: &[f64], cooldown_ms: u64) -> Vec<usize> {
    let mut config = ProctorConfig::default();
    config.debounce.cooldown_ms = cooldown_ms;
    let mut evaluator = MalpracticeEvaluator::new(config);
    let start = Utc::now();

    levels
        .iter()
        .enumerate()
        .filter_map(|(i, level)| {
            let observation = Observation::new(
                ObservationValue::NoiseLevel(*level),
                None,
                start + chrono::Duration::seconds(i as i64),
            );
            (!evaluator.evaluate(&observation).warnings.is_empty()).then_some(i)
        })
        .collect()
}

/// Consecutive loud ticks ending at each index.
fn runs(levels: &[f64]) -> Vec<u32> {
    let mut run = 0;
    levels
        .iter()
        .map(|level| {
            run = if *level > 65.0 { run + 1 } else { 0 };
            run
        })
        .collect()
}

fn apply(controller: &mut SessionController, op: Op) {
    match op {
        Op::Ingest(value) => {
            controller.ingest(value);
        }
        Op::Pause => {
            controller.pause(PauseReason::Manual {
                reason: "property".into(),
            });
        }
        Op::Resume => {
            controller.resume();
        }
        Op::Terminate => {
            controller.terminate(TerminationReason::Manual {
                reason: "property".into(),
            });
        }
        Op::Complete => {
            controller.complete();
        }
        Op::Advance => {
            controller.advance_question();
        }
        Op::Clock => controller.on_clock(),
    }
}

// ---------------------------------------------------------------------------
// Property Tests
// ---------------------------------------------------------------------------

proptest! {
    /// Without a cool-down, a warning is emitted exactly on ticks that complete a run of three.
    #[test]
    fn warnings_follow_consecutive_runs(levels in arb_noise_sequence()) {
        let expected: Vec<usize> = runs(&levels)
            .into_iter()
            .enumerate()
            .filter_map(|(i, run)| (run >= 3).then_some(i))
            .collect();
        prop_assert_eq!(emitted_indices(&levels, 0), expected);
    }

    /// Every emitted warning sits on a run of at least three; short runs never warn.
    #[test]
    fn cooldown_only_removes_warnings(levels in arb_noise_sequence()) {
        let runs = runs(&levels);
        let emitted = emitted_indices(&levels, 5000);
        for i in &emitted {
            prop_assert!(runs[*i] >= 3);
        }
        if runs.iter().all(|r| *r < 3) {
            prop_assert!(emitted.is_empty());
        }
    }

    /// Two qualifying runs closer than the cool-down count once; farther apart they count twice.
    #[test]
    fn runs_within_cooldown_are_deduplicated(gap_ms in 4i64..15_000) {
        let mut evaluator = MalpracticeEvaluator::new(ProctorConfig::default());
        let start = Utc::now();
        let at = |ms: i64| start + chrono::Duration::milliseconds(ms);
        let obs = |count: u32, ms: i64| {
            Observation::new(ObservationValue::FaceCount(count), None, at(ms))
        };

        let mut emitted = 0;
        for ms in [0, 1000, 2000] {
            emitted += evaluator.evaluate(&obs(2, ms)).warnings.len();
        }
        evaluator.evaluate(&obs(1, 2001));
        let second = 2000 + gap_ms;
        for ms in [second - 2, second - 1, second] {
            emitted += evaluator.evaluate(&obs(2, ms)).warnings.len();
        }

        let expected = if gap_ms < 5000 { 1 } else { 2 };
        prop_assert_eq!(emitted, expected);
    }

    /// The score is bounded for any inputs and any weights.
    #[test]
    fn score_is_bounded(inputs in arb_score_inputs(), scoring in arb_scoring()) {
        let score = compute_score(&scoring, &inputs);
        prop_assert!(score <= 100);
        if inputs.warning_counts.values().all(|c| *c == 0)
            && inputs.normal_face_pct >= 90.0
            && inputs.average_noise <= 50.0
        {
            prop_assert_eq!(score, 100);
        }
    }

    /// Once terminal, no operation changes the status or logs anything.
    #[test]
    fn terminal_states_are_absorbing(
        before in prop::collection::vec(arb_op(), 0..30),
        after in prop::collection::vec(arb_op(), 1..30),
    ) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let sink = Arc::new(MemorySink::new());
        let mut controller = SessionController::new(
            ProctorConfig::default(),
            SubjectId::new("prop"),
            QuestionPlan::new(2, Duration::from_secs(30)),
            sink.clone(),
            clock.clone(),
        );
        controller.environment_check(DeviceCheck::passed()).unwrap();

        for op in before {
            clock.advance(Duration::from_millis(700));
            apply(&mut controller, op);
        }
        controller.terminate(TerminationReason::Manual { reason: "end".into() });
        let status = controller.status();
        prop_assert!(status == SessionStatus::Terminated || status == SessionStatus::Completed);
        let logged = sink.len();
        let report = controller.report().cloned();

        for op in after {
            clock.advance(Duration::from_millis(700));
            apply(&mut controller, op);
        }
        prop_assert_eq!(controller.status(), status);
        prop_assert_eq!(sink.len(), logged);
        prop_assert_eq!(controller.report().cloned(), report);
    }
}
