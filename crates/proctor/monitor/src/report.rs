//! Score and report generation.
//!
//! Runs once per session, at the first terminal transition. The score starts at 100 and loses
//! points for warnings (weighted per category and capped), poor face presence, elevated average
//! noise, prohibited objects and repeated eye-away warnings. It is clamped to `0..=100`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use proctor_types::{
    format_duration, AnswerAnalysis, AnswerReview, FaceSummary, MalpracticeCategory,
    NoiseSummary, ObservationValue, ProctorConfig, QuestionStatus, QuestionSummary,
    ScoringConfig, SessionOutcome, SessionReport, Verdict,
};

use crate::session::Session;

// ── Score inputs ────────────────────────────────────────────────────────

/// Aggregates the score is computed from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreInputs {
    pub warning_counts: BTreeMap<MalpracticeCategory, u32>,
    /// Share of face samples with exactly one face, in percent.
    pub normal_face_pct: f64,
    pub average_noise: f64,
}

impl ScoreInputs {
    fn count(&self, category: MalpracticeCategory) -> u32 {
        self.warning_counts.get(&category).copied().unwrap_or(0)
    }
}

/// Compute the bounded session score.
pub fn compute_score(scoring: &ScoringConfig, inputs: &ScoreInputs) -> u8 {
    let warning_penalty: u64 = inputs
        .warning_counts
        .iter()
        .map(|(category, count)| u64::from(scoring.weight(*category)) * u64::from(*count))
        .sum();
    let mut score = 100.0 - warning_penalty.min(u64::from(scoring.warning_penalty_cap)) as f64;

    if inputs.normal_face_pct < scoring.face_normal_soft_pct {
        score -= f64::from(scoring.face_penalty);
    }
    if inputs.normal_face_pct < scoring.face_normal_hard_pct {
        score -= f64::from(scoring.face_penalty);
    }

    if inputs.average_noise > scoring.noise_average_soft {
        score -= f64::from(scoring.noise_soft_penalty);
    }
    if inputs.average_noise > scoring.noise_average_hard {
        score -= f64::from(scoring.noise_hard_penalty);
    }

    if inputs.count(MalpracticeCategory::ProhibitedObjectDetected) > 0 {
        score -= f64::from(scoring.prohibited_penalty);
    }
    if inputs.count(MalpracticeCategory::EyeAway) > scoring.eye_away_allowance {
        score -= f64::from(scoring.eye_away_penalty);
    }

    score.clamp(0.0, 100.0).round() as u8
}

// ── Generator ───────────────────────────────────────────────────────────

/// Builds the end-of-session report from a session's observations and warnings.
#[derive(Debug, Clone)]
pub struct ReportGenerator {
    config: ProctorConfig,
}

impl ReportGenerator {
    pub fn new(config: ProctorConfig) -> Self {
        Self { config }
    }

    pub fn generate(&self, session: &Session, now: DateTime<Utc>) -> SessionReport {
        let warning_counts = warning_counts(session);
        let total_warnings = session.warnings().len() as u32;
        let face = self.face_summary(session);
        let noise = self.noise_summary(session);

        let score = compute_score(
            &self.config.scoring,
            &ScoreInputs {
                warning_counts: warning_counts.clone(),
                normal_face_pct: face.normal_pct,
                average_noise: noise.average_level,
            },
        );
        let verdict = Verdict::from_score(score);
        let mut feedback = verdict.feedback().to_string();
        if total_warnings > 0 {
            feedback.push_str(&format!(
                " {} malpractice warning(s) were recorded during this session.",
                total_warnings
            ));
        }

        let ended_at = session.ended_at().unwrap_or(now);
        let started = session.started_at().unwrap_or_else(|| session.created_at());
        let duration_secs = u64::try_from((ended_at - started).num_seconds()).unwrap_or(0);

        SessionReport {
            session_id: session.id(),
            subject: session.subject().clone(),
            outcome: session
                .outcome()
                .cloned()
                .unwrap_or(SessionOutcome::Completed),
            score,
            verdict,
            feedback,
            started_at: session.started_at(),
            ended_at,
            duration_secs,
            duration: format_duration(duration_secs),
            recommendations: self.recommendations(score, &warning_counts, &face, &noise),
            questions: question_summaries(session),
            warning_counts,
            total_warnings,
            face,
            noise,
            answers: answer_reviews(session),
        }
    }

    fn face_summary(&self, session: &Session) -> FaceSummary {
        let counts: Vec<u32> = session
            .observations()
            .iter()
            .filter_map(|o| match o.value {
                ObservationValue::FaceCount(n) => Some(n),
                _ => None,
            })
            .collect();

        if counts.is_empty() {
            return FaceSummary {
                samples: 0,
                normal_pct: 100.0,
                no_face_pct: 0.0,
                multiple_faces_pct: 0.0,
            };
        }

        let pct = |pred: fn(u32) -> bool| {
            counts.iter().filter(|n| pred(**n)).count() as f64 * 100.0 / counts.len() as f64
        };
        FaceSummary {
            samples: counts.len(),
            normal_pct: pct(|n| n == 1),
            no_face_pct: pct(|n| n == 0),
            multiple_faces_pct: pct(|n| n > 1),
        }
    }

    fn noise_summary(&self, session: &Session) -> NoiseSummary {
        let levels: Vec<f64> = session
            .observations()
            .iter()
            .filter_map(|o| match o.value {
                ObservationValue::NoiseLevel(level) => Some(level),
                _ => None,
            })
            .collect();

        if levels.is_empty() {
            return NoiseSummary {
                samples: 0,
                average_level: 0.0,
                high_noise_pct: 0.0,
            };
        }

        let threshold = self.config.thresholds.noise_threshold;
        let high = levels.iter().filter(|l| **l > threshold).count();
        NoiseSummary {
            samples: levels.len(),
            average_level: levels.iter().sum::<f64>() / levels.len() as f64,
            high_noise_pct: high as f64 * 100.0 / levels.len() as f64,
        }
    }

    fn recommendations(
        &self,
        score: u8,
        counts: &BTreeMap<MalpracticeCategory, u32>,
        face: &FaceSummary,
        noise: &NoiseSummary,
    ) -> Vec<String> {
        let count = |c: MalpracticeCategory| counts.get(&c).copied().unwrap_or(0);
        let mut out = Vec::new();

        if face.no_face_pct > 10.0 {
            out.push("Keep your face clearly visible in the camera frame throughout the session.");
        }
        if face.multiple_faces_pct > 5.0 {
            out.push("Make sure no other people are visible in the camera frame.");
        }
        if noise.high_noise_pct > 15.0 {
            out.push("Find a quieter place to take your assessment.");
        }
        if count(MalpracticeCategory::EyeAway) > 2 {
            out.push("Maintain eye contact with the screen and avoid looking away.");
        }
        if count(MalpracticeCategory::SuspiciousMotion) > 2 {
            out.push("Limit unnecessary movement during the session.");
        }
        if count(MalpracticeCategory::ProhibitedObjectDetected) > 0 {
            out.push("Remove phones, books and other prohibited items from your surroundings.");
        }
        if score < 70 {
            out.push("Practice more in a distraction-free environment before your next attempt.");
        }
        if out.is_empty() {
            out.push("Excellent conduct. Keep following the same setup in future sessions.");
        }

        out.into_iter().map(String::from).collect()
    }
}

fn warning_counts(session: &Session) -> BTreeMap<MalpracticeCategory, u32> {
    let mut counts = BTreeMap::new();
    for warning in session.warnings() {
        *counts.entry(warning.category).or_insert(0) += 1;
    }
    counts
}

fn question_summaries(session: &Session) -> Vec<QuestionSummary> {
    (0..session.plan().total_questions)
        .map(|index| {
            let malpractice_count = session
                .warnings()
                .iter()
                .filter(|w| w.question_index() == Some(index))
                .count() as u32;
            QuestionSummary {
                index,
                malpractice_count,
                status: QuestionStatus::from_count(malpractice_count),
            }
        })
        .collect()
}

fn answer_reviews(session: &Session) -> Vec<AnswerReview> {
    session
        .answers()
        .iter()
        .map(|a| AnswerReview {
            question_index: a.question_index,
            question: session.plan().prompt(a.question_index).map(String::from),
            answer: a.answer.clone(),
            analysis: AnswerAnalysis::unscored(),
        })
        .collect()
}
