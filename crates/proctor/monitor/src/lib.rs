//! # Proctor Monitor - Heuristic Proctoring Engine
//!
//! This crate watches a monitored assessment through the host's camera, microphone and focus
//! signals, turns raw samples into debounced malpractice warnings and drives the session
//! through its lifecycle.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐  samples   ┌────────────────────┐  warnings  ┌───────────────────┐
//! │  Detectors   │──────────▶ │ MalpracticeEval.   │──────────▶ │ SessionController │
//! │ face/object  │            │ debounce+cool-down │            │  state machine    │
//! │ audio/motion │            └────────────────────┘            └─────────┬─────────┘
//! │ focus        │                                                        │
//! └──────────────┘                                   ActivitySink ◀───────┤
//!        ▲                                           ProctorEvent ◀───────┤
//!        │ TaskScheduler                          ReportGenerator ◀───────┘
//! ```
//!
//! ## Key Components
//!
//! - [`SessionController`]: synchronous state machine; usable directly with a [`ManualClock`]
//! - [`ProctorSession`] / [`SessionHandle`]: async runtime over tokio tasks
//! - [`MalpracticeEvaluator`]: consecutive-run debounce with per-category cool-down
//! - [`ReportGenerator`]: bounded score, summaries and recommendations
//! - [`LogForwarder`]: delivery to the logging collaborator with a bounded retry buffer
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use proctor_monitor::testing::{FakeDevices, SceneVision, StaticCamera, StaticMicrophone};
//! use proctor_monitor::ProctorSession;
//! use proctor_types::{ProctorConfig, ProctorPreset, SubjectId};
//!
//! # async fn example() -> proctor_monitor::ProctorResult<()> {
//! let devices = Arc::new(FakeDevices::new(
//!     Arc::new(StaticCamera::ready()),
//!     Arc::new(StaticMicrophone::silent()),
//! ));
//! let mut session = ProctorSession::builder(
//!     ProctorConfig::for_preset(ProctorPreset::Quiz),
//!     SubjectId::new("alice"),
//!     devices,
//!     Arc::new(SceneVision::single_face()),
//! )
//! .build()?;
//!
//! session.check_environment().await?;
//! let handle = session.start().await?;
//! handle.complete().await?;
//! let report = handle.finished().await?;
//! println!("score: {}", report.score);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]

pub mod analyzer;
pub mod clock;
pub mod controller;
pub mod detectors;
pub mod error;
pub mod evaluator;
pub mod media;
pub mod report;
pub mod runtime;
pub mod scheduler;
pub mod session;
pub mod sink;
pub mod testing;
pub mod vision;

pub use analyzer::{review_answers, AnswerAnalyzer, UnscoredAnalyzer};
pub use clock::{Clock, ManualClock, SystemClock, TokioClock};
pub use controller::{DeviceCheck, SessionController};
pub use detectors::{standard_detectors, Detector, DetectorKind};
pub use error::{LogDeliveryError, ProctorError, ProctorResult};
pub use evaluator::{Evaluation, MalpracticeEvaluator};
pub use media::{
    CameraFeed, DeviceError, DeviceKind, FocusSource, Frame, MediaDevices, MediaLease, MediaSet,
    MediaTrack, MicrophoneFeed,
};
pub use report::{compute_score, ReportGenerator, ScoreInputs};
pub use runtime::{
    DetectorSample, ProctorSession, ProctorSessionBuilder, SessionCommand, SessionHandle,
};
pub use scheduler::TaskScheduler;
pub use session::{QuestionPlan, Session, SubmittedAnswer};
pub use sink::{
    ActivityLogger, ActivitySink, ChannelSink, ForwarderStats, LogForwarder, MemorySink,
    RetryBuffer, TracingSink,
};
pub use vision::{eye_aspect_ratio, DetectedEntity, EyeLandmarks, Point, VisionBackend, VisionError};
