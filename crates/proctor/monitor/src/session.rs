//! The session aggregate.
//!
//! A [`Session`] is owned by exactly one [`SessionController`](crate::SessionController).
//! Its observation and warning sequences are append-only; status changes only through the
//! controller's transition methods.

use std::time::Duration;

use chrono::{DateTime, Utc};
use proctor_types::{
    MalpracticeCategory, Observation, PauseReason, SessionId, SessionOutcome, SessionStatus,
    SubjectId, Warning,
};
use serde::{Deserialize, Serialize};

/// Questions scheduled for the session and the answer time for each.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionPlan {
    pub total_questions: usize,
    pub answer_time: Duration,
    /// Optional prompt text, by question index
    #[serde(default)]
    pub prompts: Vec<String>,
}

impl QuestionPlan {
    pub fn new(total_questions: usize, answer_time: Duration) -> Self {
        Self {
            total_questions: total_questions.max(1),
            answer_time,
            prompts: Vec::new(),
        }
    }

    pub fn with_prompts(prompts: Vec<String>, answer_time: Duration) -> Self {
        Self {
            total_questions: prompts.len().max(1),
            answer_time,
            prompts,
        }
    }

    pub fn prompt(&self, index: usize) -> Option<&str> {
        self.prompts.get(index).map(String::as_str)
    }
}

/// An answer submitted for one question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmittedAnswer {
    pub question_index: usize,
    pub answer: String,
    pub submitted_at: DateTime<Utc>,
}

/// One monitored attempt.
#[derive(Debug, Clone)]
pub struct Session {
    id: SessionId,
    subject: SubjectId,
    status: SessionStatus,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
    devices_verified: bool,
    plan: QuestionPlan,
    current_question: usize,
    pause_reason: Option<PauseReason>,
    outcome: Option<SessionOutcome>,
    observations: Vec<Observation>,
    warnings: Vec<Warning>,
    counted_warnings: u32,
    answers: Vec<SubmittedAnswer>,
}

impl Session {
    pub fn new(subject: SubjectId, plan: QuestionPlan, created_at: DateTime<Utc>) -> Self {
        Self {
            id: SessionId::generate(),
            subject,
            status: SessionStatus::NotStarted,
            created_at,
            started_at: None,
            ended_at: None,
            devices_verified: false,
            plan,
            current_question: 0,
            pause_reason: None,
            outcome: None,
            observations: Vec::new(),
            warnings: Vec::new(),
            counted_warnings: 0,
            answers: Vec::new(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn subject(&self) -> &SubjectId {
        &self.subject
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    pub fn devices_verified(&self) -> bool {
        self.devices_verified
    }

    pub fn plan(&self) -> &QuestionPlan {
        &self.plan
    }

    pub fn current_question(&self) -> usize {
        self.current_question
    }

    pub fn is_last_question(&self) -> bool {
        self.current_question + 1 >= self.plan.total_questions
    }

    pub fn pause_reason(&self) -> Option<&PauseReason> {
        self.pause_reason.as_ref()
    }

    pub fn outcome(&self) -> Option<&SessionOutcome> {
        self.outcome.as_ref()
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Warnings whose severity counts toward the cutoff.
    pub fn counted_warnings(&self) -> u32 {
        self.counted_warnings
    }

    pub fn warnings_of(&self, category: MalpracticeCategory) -> usize {
        self.warnings
            .iter()
            .filter(|w| w.category == category)
            .count()
    }

    pub fn answers(&self) -> &[SubmittedAnswer] {
        &self.answers
    }

    // ── Mutation (controller only) ──────────────────────────────────────

    pub(crate) fn set_status(&mut self, status: SessionStatus) {
        self.status = status;
    }

    pub(crate) fn mark_devices_verified(&mut self) {
        self.devices_verified = true;
    }

    pub(crate) fn mark_started(&mut self, at: DateTime<Utc>) {
        self.started_at.get_or_insert(at);
    }

    pub(crate) fn finish(&mut self, outcome: SessionOutcome, at: DateTime<Utc>) {
        self.ended_at = Some(at);
        self.outcome = Some(outcome);
        self.pause_reason = None;
    }

    pub(crate) fn set_pause_reason(&mut self, reason: Option<PauseReason>) {
        self.pause_reason = reason;
    }

    pub(crate) fn set_current_question(&mut self, index: usize) {
        self.current_question = index;
    }

    pub(crate) fn push_observation(&mut self, observation: Observation) {
        self.observations.push(observation);
    }

    /// Append a warning; returns the counted total afterwards.
    pub(crate) fn push_warning(&mut self, warning: Warning) -> u32 {
        if warning.severity.counts_toward_cutoff() {
            self.counted_warnings += 1;
        }
        self.warnings.push(warning);
        self.counted_warnings
    }

    pub(crate) fn push_answer(&mut self, answer: SubmittedAnswer) {
        self.answers.push(answer);
    }
}
