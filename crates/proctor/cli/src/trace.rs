//! Observation trace replay.
//!
//! A trace is a recorded sequence of detector samples and host commands with millisecond
//! offsets. Replay drives a [`SessionController`] on a manual clock, firing the session clock
//! at every interval boundary between events, so timers behave exactly as in a live session.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use proctor_monitor::{
    ActivityLogger, ActivitySink, ChannelSink, Clock, DeviceCheck, ForwarderStats, LogForwarder,
    ManualClock, MemorySink, QuestionPlan, SessionController,
};
use proctor_types::{
    ActivityRecord, ObservationValue, PauseReason, ProctorConfig, ProctorPreset, SessionReport,
    SubjectId, TerminationReason,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{CliError, CliResult};

/// Largest event or run-until offset a trace may carry: one day.
pub const MAX_TRACE_OFFSET_MS: u64 = 24 * 60 * 60 * 1000;

// ── Trace format ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trace {
    pub subject: String,

    /// Preset the trace was recorded under; the CLI flag wins when both are given.
    #[serde(default)]
    pub preset: Option<ProctorPreset>,

    /// Wall-clock time of offset 0. Defaults to the replay time.
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,

    /// Question prompts, in order.
    #[serde(default)]
    pub questions: Vec<String>,

    /// Question count when no prompts are given.
    #[serde(default)]
    pub total_questions: Option<usize>,

    /// Keep the clock running until this offset from `started_at`.
    #[serde(default)]
    pub run_until_ms: Option<u64>,

    pub events: Vec<TraceEvent>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEvent {
    pub at_ms: u64,
    #[serde(flatten)]
    pub action: TraceAction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceAction {
    DeviceCheck(TraceDeviceCheck),
    Sample(ObservationValue),
    Command(TraceCommand),
}

/// Device acquisition result; an error string means the device was denied.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraceDeviceCheck {
    #[serde(default)]
    pub camera_error: Option<String>,
    #[serde(default)]
    pub microphone_error: Option<String>,
}

impl From<&TraceDeviceCheck> for DeviceCheck {
    fn from(check: &TraceDeviceCheck) -> Self {
        DeviceCheck {
            camera: check.camera_error.clone().map_or(Ok(()), Err),
            microphone: check.microphone_error.clone().map_or(Ok(()), Err),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TraceCommand {
    Pause {
        #[serde(default)]
        reason: Option<String>,
    },
    Resume,
    Terminate {
        #[serde(default)]
        reason: Option<String>,
    },
    Complete,
    AdvanceQuestion,
    SubmitAnswer {
        answer: String,
    },
}

impl Trace {
    /// Load a JSON or YAML trace, chosen by file extension.
    pub fn load(path: &Path) -> CliResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| CliError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Ok(serde_json::from_str(&text)?),
            _ => Ok(serde_yaml::from_str(&text)?),
        }
    }

    fn validate(&self) -> CliResult<()> {
        if self.subject.trim().is_empty() {
            return Err(CliError::Trace("subject must not be empty".into()));
        }
        let offsets = self.events.iter().map(|e| e.at_ms).chain(self.run_until_ms);
        if let Some(ms) = offsets.filter(|ms| *ms > MAX_TRACE_OFFSET_MS).max() {
            return Err(CliError::Trace(format!(
                "offset {} ms exceeds the {} ms limit",
                ms, MAX_TRACE_OFFSET_MS
            )));
        }
        for (i, pair) in self.events.windows(2).enumerate() {
            if pair[1].at_ms < pair[0].at_ms {
                return Err(CliError::Trace(format!(
                    "event {} at {} ms precedes the previous event at {} ms",
                    i + 1,
                    pair[1].at_ms,
                    pair[0].at_ms
                )));
            }
        }
        Ok(())
    }

    fn plan(&self, answer_time: Duration) -> QuestionPlan {
        if self.questions.is_empty() {
            QuestionPlan::new(self.total_questions.unwrap_or(1), answer_time)
        } else {
            QuestionPlan::with_prompts(self.questions.clone(), answer_time)
        }
    }
}

// ── Replay ──────────────────────────────────────────────────────────────

/// An event the controller refused.
#[derive(Debug, Clone, Serialize)]
pub struct RejectedEvent {
    pub index: usize,
    pub at_ms: u64,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplayOutcome {
    pub report: SessionReport,
    pub activities: Vec<ActivityRecord>,
    pub rejected: Vec<RejectedEvent>,
    #[serde(skip)]
    pub forwarded: Option<ForwarderStats>,
}

/// Sends each record to every inner sink.
struct FanoutSink(Vec<Arc<dyn ActivitySink>>);

impl ActivitySink for FanoutSink {
    fn submit(&self, record: ActivityRecord) {
        for sink in &self.0 {
            sink.submit(record.clone());
        }
    }
}

pub async fn replay(
    trace: &Trace,
    config: ProctorConfig,
    logger: Option<Arc<dyn ActivityLogger>>,
) -> CliResult<ReplayOutcome> {
    trace.validate()?;
    config.validate()?;

    let start = trace.started_at.unwrap_or_else(Utc::now);
    let clock = Arc::new(ManualClock::new(start));
    let memory = Arc::new(MemorySink::new());
    let mut sinks: Vec<Arc<dyn ActivitySink>> = vec![memory.clone()];

    let forwarder = logger.map(|logger| {
        let (sink, rx) = ChannelSink::new();
        sinks.push(Arc::new(sink));
        LogForwarder::new(
            logger,
            config.collaborator.retry_capacity,
            config.collaborator.retry_interval(),
        )
        .spawn(rx)
    });

    let tick = config.intervals.clock();
    let mut controller = SessionController::new(
        config.clone(),
        SubjectId::new(trace.subject.clone()),
        trace.plan(config.session.answer_time()),
        Arc::new(FanoutSink(sinks)),
        clock.clone(),
    );
    info!(
        session_id = %controller.session().id(),
        subject = %trace.subject,
        events = trace.events.len(),
        "Replaying trace"
    );

    let mut ticker = Ticker::new(start, tick);
    let mut rejected = Vec::new();

    for (index, event) in trace.events.iter().enumerate() {
        if controller.status().is_terminal() {
            debug!(index, "Session ended, remaining events ignored");
            break;
        }
        ticker.advance_to(offset(start, event.at_ms)?, &clock, &mut controller);

        if let Err(reason) = apply(&mut controller, &event.action) {
            warn!(index, at_ms = event.at_ms, %reason, "Trace event rejected");
            rejected.push(RejectedEvent {
                index,
                at_ms: event.at_ms,
                reason,
            });
        }
    }

    if let Some(until) = trace.run_until_ms {
        ticker.advance_to(offset(start, until)?, &clock, &mut controller);
    }

    if !controller.status().is_terminal() {
        if controller.status().is_monitoring() {
            controller.complete();
        } else {
            controller.terminate(TerminationReason::Manual {
                reason: "trace ended before monitoring started".into(),
            });
        }
    }

    let report = controller
        .report()
        .cloned()
        .ok_or_else(|| CliError::Trace("session ended without a report".into()))?;
    drop(controller);

    let forwarded = match forwarder {
        Some(handle) => Some(
            handle
                .await
                .map_err(|e| CliError::Trace(format!("log forwarder failed: {}", e)))?,
        ),
        None => None,
    };

    Ok(ReplayOutcome {
        report,
        activities: memory.records(),
        rejected,
        forwarded,
    })
}

fn apply(controller: &mut SessionController, action: &TraceAction) -> Result<(), String> {
    match action {
        TraceAction::DeviceCheck(check) => controller
            .environment_check(check.into())
            .map_err(|e| e.to_string()),
        TraceAction::Sample(value) => {
            controller.ingest(value.clone());
            Ok(())
        }
        TraceAction::Command(command) => {
            let applied = match command {
                TraceCommand::Pause { reason } => controller.pause(PauseReason::Manual {
                    reason: reason.clone().unwrap_or_else(|| "paused by host".into()),
                }),
                TraceCommand::Resume => controller.resume(),
                TraceCommand::Terminate { reason } => {
                    controller.terminate(TerminationReason::Manual {
                        reason: reason.clone().unwrap_or_else(|| "terminated by host".into()),
                    })
                }
                TraceCommand::Complete => controller.complete(),
                TraceCommand::AdvanceQuestion => controller.advance_question(),
                TraceCommand::SubmitAnswer { answer } => controller
                    .submit_answer(answer.clone())
                    .map(|_| true)
                    .map_err(|e| e.to_string())?,
            };
            if applied {
                Ok(())
            } else {
                Err(format!("{:?} ignored in status {}", command, controller.status()))
            }
        }
    }
}

fn offset(start: DateTime<Utc>, ms: u64) -> CliResult<DateTime<Utc>> {
    i64::try_from(ms)
        .ok()
        .and_then(chrono::Duration::try_milliseconds)
        .and_then(|delta| start.checked_add_signed(delta))
        .ok_or_else(|| CliError::Trace(format!("offset {} ms is out of range", ms)))
}

/// Fires the session clock at every interval boundary up to a target instant.
struct Ticker {
    next: DateTime<Utc>,
    period: chrono::Duration,
}

impl Ticker {
    fn new(start: DateTime<Utc>, period: Duration) -> Self {
        let period = chrono::Duration::from_std(period).unwrap_or(chrono::Duration::seconds(1));
        Self {
            next: start + period,
            period,
        }
    }

    fn advance_to(
        &mut self,
        target: DateTime<Utc>,
        clock: &ManualClock,
        controller: &mut SessionController,
    ) {
        while self.next <= target && !controller.status().is_terminal() {
            clock.set(self.next);
            controller.on_clock();
            self.next += self.period;
        }
        if target > clock.now() {
            clock.set(target);
        }
    }
}
