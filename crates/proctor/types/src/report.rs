//! End-of-session report types

use crate::ids::{SessionId, SubjectId};
use crate::status::SessionOutcome;
use crate::warning::MalpracticeCategory;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Qualitative verdict selected by score bracket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Excellent,
    Good,
    Fair,
    NeedsImprovement,
}

impl Verdict {
    pub fn from_score(score: u8) -> Self {
        match score {
            90.. => Verdict::Excellent,
            75..=89 => Verdict::Good,
            60..=74 => Verdict::Fair,
            _ => Verdict::NeedsImprovement,
        }
    }

    pub fn feedback(&self) -> &'static str {
        match self {
            Verdict::Excellent => {
                "Excellent session! You stayed focused and followed the assessment rules throughout."
            }
            Verdict::Good => {
                "Good session. A few moments drew attention, but overall conduct was solid."
            }
            Verdict::Fair => {
                "Fair session. Several issues were detected; review the recommendations before your next attempt."
            }
            Verdict::NeedsImprovement => {
                "This session needs improvement. Multiple monitoring issues affected the result."
            }
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Verdict::Excellent => "excellent",
            Verdict::Good => "good",
            Verdict::Fair => "fair",
            Verdict::NeedsImprovement => "needs improvement",
        };
        f.write_str(label)
    }
}

/// Per-question conduct status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionStatus {
    Good,
    Fair,
    Poor,
}

impl QuestionStatus {
    pub fn from_count(malpractice_count: u32) -> Self {
        match malpractice_count {
            0 => QuestionStatus::Good,
            1..=2 => QuestionStatus::Fair,
            _ => QuestionStatus::Poor,
        }
    }
}

impl fmt::Display for QuestionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            QuestionStatus::Good => "good",
            QuestionStatus::Fair => "fair",
            QuestionStatus::Poor => "poor",
        };
        f.write_str(label)
    }
}

/// Malpractice tally for one question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionSummary {
    pub index: usize,
    pub malpractice_count: u32,
    pub status: QuestionStatus,
}

/// Face-presence ratios over all face samples
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceSummary {
    pub samples: usize,
    pub normal_pct: f64,
    pub no_face_pct: f64,
    pub multiple_faces_pct: f64,
}

/// Noise statistics over all audio samples
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoiseSummary {
    pub samples: usize,
    pub average_level: f64,
    pub high_noise_pct: f64,
}

/// Output of an answer analyzer
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AnswerAnalysis {
    /// Bounded score in 0..=100, absent when the analyzer does not score
    pub score: Option<u8>,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
}

impl AnswerAnalysis {
    pub fn unscored() -> Self {
        Self::default()
    }

    pub fn scored(score: u8, strengths: Vec<String>, weaknesses: Vec<String>) -> Self {
        Self {
            score: Some(score.min(100)),
            strengths,
            weaknesses,
        }
    }
}

/// A submitted answer and its analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerReview {
    pub question_index: usize,
    pub question: Option<String>,
    pub answer: String,
    pub analysis: AnswerAnalysis,
}

/// End-of-session summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub session_id: SessionId,
    pub subject: SubjectId,
    pub outcome: SessionOutcome,
    pub score: u8,
    pub verdict: Verdict,
    pub feedback: String,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: DateTime<Utc>,
    pub duration_secs: u64,
    /// Duration rendered as `"{m}m {s}s"`
    pub duration: String,
    pub warning_counts: BTreeMap<MalpracticeCategory, u32>,
    pub total_warnings: u32,
    pub questions: Vec<QuestionSummary>,
    pub face: FaceSummary,
    pub noise: NoiseSummary,
    pub recommendations: Vec<String>,
    pub answers: Vec<AnswerReview>,
}

impl SessionReport {
    pub fn warning_count(&self, category: MalpracticeCategory) -> u32 {
        self.warning_counts.get(&category).copied().unwrap_or(0)
    }
}

/// Render whole seconds as `"{m}m {s}s"`
pub fn format_duration(secs: u64) -> String {
    format!("{}m {}s", secs / 60, secs % 60)
}
