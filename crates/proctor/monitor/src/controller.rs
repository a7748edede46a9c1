//! Session controller.
//!
//! The controller owns the [`Session`] aggregate and is the only place its status changes.
//!
//! ```text
//! NotStarted ──devices ok──▶ EnvironmentCheck ──clean face cycle──▶ Active ◀──▶ Paused
//!                                                                     │           │
//!                                                                     ▼           ▼
//!                                                             Completed | Terminated
//! ```
//!
//! Every transition makes exactly one call to the activity sink and publishes one
//! [`ProctorEvent::StatusChanged`]. Terminal states absorb every further call; the report is
//! computed once, at the first terminal transition, and cached.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use proctor_types::{
    ActivityKind, ActivityRecord, AnswerReview, NoticeLevel, Observation,
    ObservationKind, ObservationValue, PauseReason, ProctorConfig, ProctorEvent, SessionOutcome,
    SessionReport, SessionStatus, SubjectId, TerminationReason, Warning,
};
use serde_json::json;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::clock::{to_chrono, Clock};
use crate::error::{ProctorError, ProctorResult};
use crate::evaluator::MalpracticeEvaluator;
use crate::media::DeviceKind;
use crate::report::ReportGenerator;
use crate::session::{QuestionPlan, Session, SubmittedAnswer};
use crate::sink::ActivitySink;

const EVENT_CAPACITY: usize = 256;

/// Result of acquiring the session's devices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceCheck {
    pub camera: Result<(), String>,
    pub microphone: Result<(), String>,
}

impl DeviceCheck {
    /// Both devices acquired.
    pub fn passed() -> Self {
        Self {
            camera: Ok(()),
            microphone: Ok(()),
        }
    }
}

// ── Answer timer ────────────────────────────────────────────────────────

/// Per-question countdown that only runs while the session is Active.
#[derive(Debug, Clone)]
struct AnswerTimer {
    remaining: Duration,
    last_tick: Option<DateTime<Utc>>,
    fired: bool,
}

impl AnswerTimer {
    fn new(answer_time: Duration) -> Self {
        Self {
            remaining: answer_time,
            last_tick: None,
            fired: false,
        }
    }

    fn restart(&mut self, answer_time: Duration, now: DateTime<Utc>) {
        self.remaining = answer_time;
        self.last_tick = Some(now);
        self.fired = false;
    }

    /// Account for time since the last call. Time only counts while `running`.
    fn sync(&mut self, now: DateTime<Utc>, running: bool) {
        if running {
            if let Some(last) = self.last_tick {
                let elapsed = (now - last).to_std().unwrap_or(Duration::ZERO);
                self.remaining = self.remaining.saturating_sub(elapsed);
            }
        }
        self.last_tick = Some(now);
    }

    /// Sync, then report expiry exactly once.
    fn advance(&mut self, now: DateTime<Utc>, running: bool) -> bool {
        self.sync(now, running);
        if running && !self.fired && self.remaining.is_zero() {
            self.fired = true;
            return true;
        }
        false
    }
}

// ── Controller ──────────────────────────────────────────────────────────

/// Drives one session through its lifecycle.
pub struct SessionController {
    session: Session,
    config: ProctorConfig,
    evaluator: MalpracticeEvaluator,
    reports: ReportGenerator,
    sink: Arc<dyn ActivitySink>,
    clock: Arc<dyn Clock>,
    events: broadcast::Sender<ProctorEvent>,
    no_face_since: Option<DateTime<Utc>>,
    answer_timer: AnswerTimer,
    last_heartbeat: Option<DateTime<Utc>>,
    report: Option<SessionReport>,
}

impl SessionController {
    pub fn new(
        config: ProctorConfig,
        subject: SubjectId,
        plan: QuestionPlan,
        sink: Arc<dyn ActivitySink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let answer_timer = AnswerTimer::new(plan.answer_time);
        Self {
            session: Session::new(subject, plan, clock.now()),
            evaluator: MalpracticeEvaluator::new(config.clone()),
            reports: ReportGenerator::new(config.clone()),
            config,
            sink,
            clock,
            events,
            no_face_since: None,
            answer_timer,
            last_heartbeat: None,
            report: None,
        }
    }

    /// Subscribe to host notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<ProctorEvent> {
        self.events.subscribe()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn status(&self) -> SessionStatus {
        self.session.status()
    }

    pub fn config(&self) -> &ProctorConfig {
        &self.config
    }

    /// The cached report, once the session is terminal.
    pub fn report(&self) -> Option<&SessionReport> {
        self.report.as_ref()
    }

    /// When the current no-face stretch began, if one is running.
    pub fn no_face_since(&self) -> Option<DateTime<Utc>> {
        self.no_face_since
    }

    /// Time left on the current question.
    pub fn answer_time_remaining(&self) -> Duration {
        self.answer_timer.remaining
    }

    // ── Environment check ───────────────────────────────────────────────

    /// Record the outcome of acquiring camera and microphone.
    ///
    /// A failed device keeps the session in NotStarted; the host may retry.
    pub fn environment_check(&mut self, check: DeviceCheck) -> ProctorResult<()> {
        match self.session.status() {
            SessionStatus::NotStarted => {}
            SessionStatus::EnvironmentCheck => return Ok(()),
            status => {
                return Err(ProctorError::InvalidState {
                    action: "run the environment check",
                    status,
                })
            }
        }

        for (device, result) in [
            (DeviceKind::Camera, &check.camera),
            (DeviceKind::Microphone, &check.microphone),
        ] {
            if let Err(reason) = result {
                warn!(session_id = %self.session.id(), %device, %reason, "Device unavailable");
                self.notify(
                    NoticeLevel::Error,
                    format!(
                        "Unable to access {}: {}. Check permissions and retry.",
                        device, reason
                    ),
                );
                return Err(ProctorError::DeviceUnavailable {
                    device,
                    reason: reason.clone(),
                });
            }
        }

        self.session.mark_devices_verified();
        self.transition(
            SessionStatus::EnvironmentCheck,
            ActivityKind::EnvironmentCheckStarted,
            Some(json!({ "camera": true, "microphone": true })),
        );
        Ok(())
    }

    // ── Observations ────────────────────────────────────────────────────

    /// Feed one detector sample. Returns the warnings it raised.
    pub fn ingest(&mut self, value: ObservationValue) -> Vec<Warning> {
        let status = self.session.status();
        if status.is_terminal() || status == SessionStatus::NotStarted {
            debug!(%status, kind = %value.kind(), "Observation ignored");
            return Vec::new();
        }

        let now = self.clock.now();
        let question = status
            .is_monitoring()
            .then(|| self.session.current_question());
        let observation = Observation::new(value, question, now);
        let evaluation = self.evaluator.evaluate(&observation);

        if status == SessionStatus::EnvironmentCheck {
            if observation.kind() == ObservationKind::FaceCount && evaluation.is_clean() {
                self.activate(now);
            }
            return Vec::new();
        }

        self.track_no_face(&observation.value, now);
        let kind = observation.kind();
        self.session.push_observation(observation);
        if self.check_grace_period(now) {
            return Vec::new();
        }

        let pausing_clear = evaluation.pausing_clear();
        let mut raised = Vec::with_capacity(evaluation.warnings.len());
        for warning in evaluation.warnings {
            if self.session.status().is_terminal() {
                break;
            }
            raised.push(warning.clone());
            self.record_warning(warning);
        }

        let resumable = matches!(
            self.session.pause_reason(),
            Some(PauseReason::Malpractice { .. })
        );
        if self.session.status() == SessionStatus::Paused
            && resumable
            && matches!(kind, ObservationKind::FaceCount | ObservationKind::ObjectScan)
            && pausing_clear
        {
            self.resume();
        }

        raised
    }

    /// Session clock tick: grace period, camera heartbeat and answer timer.
    pub fn on_clock(&mut self) {
        let status = self.session.status();
        if !status.is_monitoring() {
            return;
        }
        let now = self.clock.now();

        if self.check_grace_period(now) {
            return;
        }

        let heartbeat_due = self
            .last_heartbeat
            .map_or(true, |last| now - last >= to_chrono(self.config.intervals.heartbeat()));
        if heartbeat_due {
            self.last_heartbeat = Some(now);
            self.log(ActivityKind::CameraHeartbeat, None, now);
        }

        if self
            .answer_timer
            .advance(now, status == SessionStatus::Active)
        {
            let index = self.session.current_question();
            info!(session_id = %self.session.id(), question = index, "Answer time expired");
            self.log(
                ActivityKind::AnswerTimeExpired,
                Some(json!({ "answerTimeSecs": self.session.plan().answer_time.as_secs() })),
                now,
            );
            self.notify(
                NoticeLevel::Info,
                format!("Time is up for question {}.", index + 1),
            );
            self.advance_question();
        }
    }

    // ── Transitions ─────────────────────────────────────────────────────

    /// Pause an active session. While already paused this only re-logs.
    pub fn pause(&mut self, reason: PauseReason) -> bool {
        match self.session.status() {
            SessionStatus::Active => {
                self.session.set_pause_reason(Some(reason.clone()));
                self.notify(NoticeLevel::Warning, format!("Session paused: {}", reason));
                self.transition(
                    SessionStatus::Paused,
                    ActivityKind::SessionPaused,
                    Some(json!({ "reason": reason })),
                );
                true
            }
            SessionStatus::Paused => {
                let now = self.clock.now();
                self.log(
                    ActivityKind::SessionPaused,
                    Some(json!({ "reason": reason })),
                    now,
                );
                false
            }
            status => {
                debug!(%status, "Pause ignored");
                false
            }
        }
    }

    /// Resume a paused session. No-op unless Paused.
    pub fn resume(&mut self) -> bool {
        if self.session.status() != SessionStatus::Paused {
            return false;
        }
        self.session.set_pause_reason(None);
        self.transition(SessionStatus::Active, ActivityKind::SessionResumed, None);
        true
    }

    /// Terminate the session. No-op once terminal.
    pub fn terminate(&mut self, reason: TerminationReason) -> bool {
        if self.session.status().is_terminal() {
            debug!(session_id = %self.session.id(), "Terminate ignored, session already ended");
            return false;
        }

        let now = self.clock.now();
        warn!(session_id = %self.session.id(), %reason, "Terminating session");
        self.notify(NoticeLevel::Error, format!("Session terminated: {}", reason));
        let data = json!({
            "reason": reason,
            "message": reason.to_string(),
            "warnings": self.session.counted_warnings(),
        });
        self.session
            .finish(SessionOutcome::Terminated { reason }, now);
        self.transition(
            SessionStatus::Terminated,
            ActivityKind::SessionTerminated,
            Some(data),
        );
        self.finalize(now);
        true
    }

    /// Complete a running session. No-op unless Active or Paused.
    pub fn complete(&mut self) -> bool {
        let status = self.session.status();
        if !status.is_monitoring() {
            debug!(%status, "Complete ignored");
            return false;
        }

        let now = self.clock.now();
        let data = json!({
            "warnings": self.session.counted_warnings(),
            "questions": self.session.plan().total_questions,
        });
        self.session.finish(SessionOutcome::Completed, now);
        self.transition(
            SessionStatus::Completed,
            ActivityKind::SessionCompleted,
            Some(data),
        );
        self.finalize(now);
        true
    }

    /// Move to the next question, or complete after the last one.
    pub fn advance_question(&mut self) -> bool {
        if !self.session.status().is_monitoring() {
            return false;
        }
        if self.session.is_last_question() {
            return self.complete();
        }

        let now = self.clock.now();
        let from = self.session.current_question();
        let to = from + 1;
        self.session.set_current_question(to);
        self.answer_timer
            .restart(self.session.plan().answer_time, now);
        self.log(
            ActivityKind::QuestionChanged,
            Some(json!({ "from": from, "to": to })),
            now,
        );
        self.emit(ProctorEvent::QuestionChanged {
            session_id: self.session.id(),
            index: to,
            total: self.session.plan().total_questions,
        });
        true
    }

    /// Record an answer for the current question and move on.
    pub fn submit_answer(&mut self, answer: impl Into<String>) -> ProctorResult<()> {
        let status = self.session.status();
        if !status.is_monitoring() {
            return Err(ProctorError::InvalidState {
                action: "submit an answer",
                status,
            });
        }
        self.session.push_answer(SubmittedAnswer {
            question_index: self.session.current_question(),
            answer: answer.into(),
            submitted_at: self.clock.now(),
        });
        self.advance_question();
        Ok(())
    }

    /// Replace the cached report's answer reviews once analysis has finished.
    pub fn attach_answer_reviews(&mut self, reviews: Vec<AnswerReview>) -> bool {
        let Some(report) = self.report.as_mut() else {
            return false;
        };
        report.answers = reviews;
        let report = Box::new(report.clone());
        self.emit(ProctorEvent::ReportReady {
            session_id: self.session.id(),
            report,
        });
        true
    }

    // ── Internals ───────────────────────────────────────────────────────

    fn activate(&mut self, now: DateTime<Utc>) {
        self.evaluator.reset();
        self.session.mark_started(now);
        self.answer_timer
            .restart(self.session.plan().answer_time, now);
        self.last_heartbeat = Some(now);
        self.transition(
            SessionStatus::Active,
            ActivityKind::SessionStarted,
            Some(json!({
                "preset": self.config.preset,
                "totalQuestions": self.session.plan().total_questions,
            })),
        );
        self.emit(ProctorEvent::QuestionChanged {
            session_id: self.session.id(),
            index: 0,
            total: self.session.plan().total_questions,
        });
    }

    fn record_warning(&mut self, warning: Warning) {
        let category = warning.category;
        let counted = self.session.push_warning(warning.clone());
        let cutoff = self.config.session.warning_cutoff;
        warn!(
            session_id = %self.session.id(),
            %category,
            severity = ?warning.severity,
            counted,
            cutoff,
            "Malpractice warning"
        );

        self.emit(ProctorEvent::WarningRaised {
            session_id: self.session.id(),
            warning: warning.clone(),
            counted_total: counted,
        });
        self.log(
            ActivityKind::WarningRaised,
            Some(warning.evidence_data()),
            warning.timestamp,
        );

        if warning.severity.counts_toward_cutoff() && counted >= cutoff {
            self.terminate(TerminationReason::WarningCutoff {
                count: counted,
                cutoff,
            });
        } else if category.pauses_session() {
            self.pause(PauseReason::Malpractice { category });
        }
    }

    fn track_no_face(&mut self, value: &ObservationValue, now: DateTime<Utc>) {
        match value {
            ObservationValue::FaceCount(0) => {
                self.no_face_since.get_or_insert(now);
            }
            ObservationValue::FaceCount(_) => self.no_face_since = None,
            _ => {}
        }
    }

    /// Terminate when the no-face stretch has lasted the whole grace period.
    fn check_grace_period(&mut self, now: DateTime<Utc>) -> bool {
        let (Some(grace), Some(since)) = (self.config.session.no_face_grace(), self.no_face_since)
        else {
            return false;
        };
        let elapsed = now - since;
        if elapsed < to_chrono(grace) {
            return false;
        }
        self.no_face_since = None;
        self.terminate(TerminationReason::NoFaceGracePeriod {
            elapsed_secs: u64::try_from(elapsed.num_seconds()).unwrap_or(0),
        })
    }

    fn transition(
        &mut self,
        to: SessionStatus,
        kind: ActivityKind,
        data: Option<serde_json::Value>,
    ) {
        let from = self.session.status();
        let now = self.clock.now();
        self.answer_timer
            .sync(now, from == SessionStatus::Active);
        self.session.set_status(to);

        info!(session_id = %self.session.id(), %from, %to, "Session status changed");
        self.log(kind, data, now);
        self.emit(ProctorEvent::StatusChanged {
            session_id: self.session.id(),
            from,
            to,
            at: now,
        });
    }

    fn finalize(&mut self, now: DateTime<Utc>) {
        if self.report.is_some() {
            return;
        }
        let report = self.reports.generate(&self.session, now);
        info!(
            session_id = %self.session.id(),
            score = report.score,
            verdict = %report.verdict,
            warnings = report.total_warnings,
            "Session report ready"
        );
        self.emit(ProctorEvent::ReportReady {
            session_id: self.session.id(),
            report: Box::new(report.clone()),
        });
        self.report = Some(report);
    }

    fn log(&self, kind: ActivityKind, data: Option<serde_json::Value>, at: DateTime<Utc>) {
        let question = self
            .session
            .started_at()
            .map(|_| self.session.current_question());
        self.sink.submit(ActivityRecord::new(
            kind,
            self.session.subject().clone(),
            self.session.id(),
            question,
            data,
            at,
        ));
    }

    fn notify(&self, level: NoticeLevel, message: String) {
        self.emit(ProctorEvent::Notice {
            session_id: self.session.id(),
            level,
            message,
        });
    }

    fn emit(&self, event: ProctorEvent) {
        let _ = self.events.send(event);
    }
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("session_id", &self.session.id())
            .field("status", &self.session.status())
            .field("warnings", &self.session.warnings().len())
            .finish()
    }
}
