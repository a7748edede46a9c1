//! Async session runtime.
//!
//! [`ProctorSession`] acquires the media devices and, once started, runs:
//! - one task per detector, each on its own interval
//! - the session clock task
//! - a driver task that owns the [`SessionController`] and applies samples, clock ticks and
//!   host commands one at a time
//!
//! The host talks to the driver through a [`SessionHandle`]. On the first terminal transition
//! the driver cancels every scheduled task and stops every media track.

use std::ops::ControlFlow;
use std::sync::Arc;

use proctor_types::{
    ObservationValue, PauseReason, ProctorConfig, ProctorEvent, SessionId, SessionReport,
    SessionStatus, SubjectId, TerminationReason,
};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

use crate::analyzer::{review_answers, AnswerAnalyzer, UnscoredAnalyzer};
use crate::clock::{Clock, TokioClock};
use crate::controller::{DeviceCheck, SessionController};
use crate::detectors::{standard_detectors, Detector, DetectorKind};
use crate::error::{ProctorError, ProctorResult};
use crate::media::{FocusSource, MediaDevices, MediaLease, MediaSet};
use crate::scheduler::TaskScheduler;
use crate::session::QuestionPlan;
use crate::sink::{
    ActivityLogger, ActivitySink, ChannelSink, ForwarderStats, LogForwarder, TracingSink,
};
use crate::vision::VisionBackend;

const SAMPLE_BUFFER: usize = 256;
const COMMAND_BUFFER: usize = 32;

/// Host commands applied by the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    Pause(String),
    Resume,
    Terminate(String),
    Complete,
    AdvanceQuestion,
    SubmitAnswer(String),
}

/// One value produced by a detector tick.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorSample {
    pub detector: DetectorKind,
    pub value: ObservationValue,
}

// ── Builder ─────────────────────────────────────────────────────────────

/// Builder for [`ProctorSession`].
pub struct ProctorSessionBuilder {
    config: ProctorConfig,
    subject: SubjectId,
    devices: Arc<dyn MediaDevices>,
    vision: Arc<dyn VisionBackend>,
    plan: Option<QuestionPlan>,
    focus: Option<Arc<dyn FocusSource>>,
    sink: Option<Arc<dyn ActivitySink>>,
    logger: Option<Arc<dyn ActivityLogger>>,
    analyzer: Arc<dyn AnswerAnalyzer>,
    clock: Option<Arc<dyn Clock>>,
}

impl ProctorSessionBuilder {
    pub fn plan(mut self, plan: QuestionPlan) -> Self {
        self.plan = Some(plan);
        self
    }

    pub fn focus(mut self, focus: Arc<dyn FocusSource>) -> Self {
        self.focus = Some(focus);
        self
    }

    /// Report activities to this sink. Ignored when a logger is set.
    pub fn sink(mut self, sink: Arc<dyn ActivitySink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Deliver activities to a logging collaborator through a background forwarder.
    pub fn logger(mut self, logger: Arc<dyn ActivityLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn analyzer(mut self, analyzer: Arc<dyn AnswerAnalyzer>) -> Self {
        self.analyzer = analyzer;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> ProctorResult<ProctorSession> {
        self.config.validate()?;

        let plan = self
            .plan
            .unwrap_or_else(|| QuestionPlan::new(1, self.config.session.answer_time()));
        let clock = self.clock.unwrap_or_else(|| Arc::new(TokioClock::new()));

        let (sink, forwarder): (Arc<dyn ActivitySink>, _) = match self.logger {
            Some(logger) => {
                let (sink, rx) = ChannelSink::new();
                let forwarder = LogForwarder::new(
                    logger,
                    self.config.collaborator.retry_capacity,
                    self.config.collaborator.retry_interval(),
                );
                (Arc::new(sink), Some((forwarder, rx)))
            }
            None => (self.sink.unwrap_or_else(|| Arc::new(TracingSink)), None),
        };

        let controller =
            SessionController::new(self.config.clone(), self.subject, plan, sink, clock);

        Ok(ProctorSession {
            controller,
            config: self.config,
            devices: self.devices,
            vision: self.vision,
            focus: self.focus,
            analyzer: self.analyzer,
            media: None,
            forwarder,
        })
    }
}

// ── Session ─────────────────────────────────────────────────────────────

/// A session that has not started monitoring yet.
pub struct ProctorSession {
    controller: SessionController,
    config: ProctorConfig,
    devices: Arc<dyn MediaDevices>,
    vision: Arc<dyn VisionBackend>,
    focus: Option<Arc<dyn FocusSource>>,
    analyzer: Arc<dyn AnswerAnalyzer>,
    media: Option<MediaLease>,
    forwarder: Option<(LogForwarder, mpsc::UnboundedReceiver<proctor_types::ActivityRecord>)>,
}

impl ProctorSession {
    pub fn builder(
        config: ProctorConfig,
        subject: SubjectId,
        devices: Arc<dyn MediaDevices>,
        vision: Arc<dyn VisionBackend>,
    ) -> ProctorSessionBuilder {
        ProctorSessionBuilder {
            config,
            subject,
            devices,
            vision,
            plan: None,
            focus: None,
            sink: None,
            logger: None,
            analyzer: Arc::new(UnscoredAnalyzer),
            clock: None,
        }
    }

    pub fn id(&self) -> SessionId {
        self.controller.session().id()
    }

    pub fn status(&self) -> SessionStatus {
        self.controller.status()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProctorEvent> {
        self.controller.subscribe()
    }

    /// Acquire camera and microphone. May be retried after a DeviceUnavailable error.
    #[instrument(skip(self), fields(session_id = %self.id()))]
    pub async fn check_environment(&mut self) -> ProctorResult<()> {
        if self.media.is_some() {
            return Ok(());
        }

        let camera = self.devices.open_camera().await;
        let microphone = self.devices.open_microphone().await;
        let check = DeviceCheck {
            camera: camera.as_ref().map(|_| ()).map_err(|e| e.to_string()),
            microphone: microphone.as_ref().map(|_| ()).map_err(|e| e.to_string()),
        };

        match (camera, microphone) {
            (Ok(camera), Ok(microphone)) => {
                let lease = MediaLease::new(MediaSet { camera, microphone });
                self.controller.environment_check(check)?;
                self.media = Some(lease);
                Ok(())
            }
            (camera, microphone) => {
                // release whichever device was acquired
                if let Ok(camera) = camera {
                    camera.stop();
                }
                if let Ok(microphone) = microphone {
                    microphone.stop();
                }
                self.controller.environment_check(check)
            }
        }
    }

    /// Start monitoring. Requires a passed environment check.
    #[instrument(skip(self), fields(session_id = %self.id()))]
    pub async fn start(mut self) -> ProctorResult<SessionHandle> {
        let status = self.controller.status();
        let media = match (self.media.take(), status) {
            (Some(media), SessionStatus::EnvironmentCheck) => media,
            _ => {
                return Err(ProctorError::InvalidState {
                    action: "start monitoring",
                    status,
                })
            }
        };

        let session_id = self.id();
        let (sample_tx, sample_rx) = mpsc::channel(SAMPLE_BUFFER);
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (tick_tx, tick_rx) = mpsc::channel(1);
        let (status_tx, status_rx) = watch::channel(status);
        let events = self.controller.subscribe();

        let mut scheduler = TaskScheduler::new();
        for detector in standard_detectors(&self.config, media.media(), self.vision, self.focus) {
            let name = format!("{}-detector", detector.kind());
            scheduler.spawn(name, detector_loop(detector, sample_tx.clone()));
        }
        drop(sample_tx);

        scheduler.every("session-clock", self.config.intervals.clock(), move || {
            match tick_tx.try_send(()) {
                Err(mpsc::error::TrySendError::Closed(_)) => ControlFlow::Break(()),
                _ => ControlFlow::Continue(()),
            }
        });

        let forwarder = self
            .forwarder
            .map(|(forwarder, rx)| forwarder.spawn(rx));

        info!(%session_id, tasks = scheduler.active_count(), "Monitoring started");

        let driver = Driver {
            controller: self.controller,
            scheduler,
            media,
            analyzer: self.analyzer,
            samples: sample_rx,
            commands: command_rx,
            ticks: tick_rx,
            status: status_tx,
        };

        Ok(SessionHandle {
            session_id,
            commands: command_tx,
            events,
            status: status_rx,
            driver: tokio::spawn(driver.run()),
            forwarder,
        })
    }
}

async fn detector_loop(mut detector: Box<dyn Detector>, tx: mpsc::Sender<DetectorSample>) {
    let kind = detector.kind();
    let mut interval = tokio::time::interval(detector.interval());
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        interval.tick().await;
        match detector.sample().await {
            Ok(values) if values.is_empty() => debug!(detector = %kind, "No sample available"),
            Ok(values) => {
                for value in values {
                    if tx.send(DetectorSample { detector: kind, value }).await.is_err() {
                        return;
                    }
                }
            }
            Err(e) => warn!(detector = %kind, error = %e, "Detector tick aborted"),
        }
    }
}

// ── Driver ──────────────────────────────────────────────────────────────

/// Owns the controller once monitoring starts. Dropping the driver, including when its task is
/// aborted, releases the media lease.
struct Driver {
    controller: SessionController,
    scheduler: TaskScheduler,
    media: MediaLease,
    analyzer: Arc<dyn AnswerAnalyzer>,
    samples: mpsc::Receiver<DetectorSample>,
    commands: mpsc::Receiver<SessionCommand>,
    ticks: mpsc::Receiver<()>,
    status: watch::Sender<SessionStatus>,
}

impl Driver {
    async fn run(mut self) -> ProctorResult<SessionReport> {
        while !self.controller.status().is_terminal() {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.apply(command),
                    None => {
                        self.controller.terminate(TerminationReason::Manual {
                            reason: "session handle dropped".into(),
                        });
                    }
                },
                Some(sample) = self.samples.recv() => {
                    self.controller.ingest(sample.value);
                }
                Some(()) = self.ticks.recv() => self.controller.on_clock(),
            }
            self.status.send_replace(self.controller.status());
        }

        let cancelled = self.scheduler.cancel_all();
        self.media.release();
        info!(
            session_id = %self.controller.session().id(),
            cancelled,
            "Monitoring stopped, media released"
        );

        let report = self
            .controller
            .report()
            .cloned()
            .ok_or_else(|| ProctorError::Internal("terminal session without report".into()))?;
        if report.answers.is_empty() {
            return Ok(report);
        }

        let reviews = review_answers(self.analyzer.as_ref(), report.answers).await;
        self.controller.attach_answer_reviews(reviews);
        self.controller
            .report()
            .cloned()
            .ok_or_else(|| ProctorError::Internal("report lost after analysis".into()))
    }

    fn apply(&mut self, command: SessionCommand) {
        debug!(?command, "Applying host command");
        match command {
            SessionCommand::Pause(reason) => {
                self.controller.pause(PauseReason::Manual { reason });
            }
            SessionCommand::Resume => {
                self.controller.resume();
            }
            SessionCommand::Terminate(reason) => {
                self.controller
                    .terminate(TerminationReason::Manual { reason });
            }
            SessionCommand::Complete => {
                self.controller.complete();
            }
            SessionCommand::AdvanceQuestion => {
                self.controller.advance_question();
            }
            SessionCommand::SubmitAnswer(answer) => {
                if let Err(e) = self.controller.submit_answer(answer) {
                    warn!(error = %e, "Answer rejected");
                }
            }
        }
    }
}

// ── Handle ──────────────────────────────────────────────────────────────

/// Host-side handle to a running session.
///
/// Dropping the handle terminates the session.
pub struct SessionHandle {
    session_id: SessionId,
    commands: mpsc::Sender<SessionCommand>,
    events: broadcast::Receiver<ProctorEvent>,
    status: watch::Receiver<SessionStatus>,
    driver: JoinHandle<ProctorResult<SessionReport>>,
    forwarder: Option<JoinHandle<ForwarderStats>>,
}

impl SessionHandle {
    pub fn id(&self) -> SessionId {
        self.session_id
    }

    pub fn status(&self) -> SessionStatus {
        *self.status.borrow()
    }

    /// Status updates, one per applied input.
    pub fn watch_status(&self) -> watch::Receiver<SessionStatus> {
        self.status.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProctorEvent> {
        self.events.resubscribe()
    }

    pub async fn pause(&self, reason: impl Into<String>) -> ProctorResult<()> {
        self.send(SessionCommand::Pause(reason.into())).await
    }

    pub async fn resume(&self) -> ProctorResult<()> {
        self.send(SessionCommand::Resume).await
    }

    pub async fn terminate(&self, reason: impl Into<String>) -> ProctorResult<()> {
        self.send(SessionCommand::Terminate(reason.into())).await
    }

    pub async fn complete(&self) -> ProctorResult<()> {
        self.send(SessionCommand::Complete).await
    }

    pub async fn advance_question(&self) -> ProctorResult<()> {
        self.send(SessionCommand::AdvanceQuestion).await
    }

    pub async fn submit_answer(&self, answer: impl Into<String>) -> ProctorResult<()> {
        self.send(SessionCommand::SubmitAnswer(answer.into())).await
    }

    /// Wait for the session to end and return its report.
    pub async fn finished(self) -> ProctorResult<SessionReport> {
        let SessionHandle {
            session_id,
            commands,
            driver,
            forwarder,
            ..
        } = self;

        let report = driver
            .await
            .map_err(|e| ProctorError::Internal(format!("session driver failed: {}", e)))??;
        drop(commands);

        if let Some(forwarder) = forwarder {
            match forwarder.await {
                Ok(stats) => debug!(%session_id, ?stats, "Activity forwarding finished"),
                Err(e) => warn!(%session_id, error = %e, "Log forwarder failed"),
            }
        }

        Ok(report)
    }

    async fn send(&self, command: SessionCommand) -> ProctorResult<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| ProctorError::SessionClosed)
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("session_id", &self.session_id)
            .field("status", &self.status())
            .finish()
    }
}
