//! Session lifecycle states and transition reasons

use crate::warning::MalpracticeCategory;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a monitored session
///
/// ```text
/// NotStarted -> EnvironmentCheck -> Active <-> Paused -> Completed | Terminated
/// ```
///
/// `Completed` and `Terminated` are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    NotStarted,
    EnvironmentCheck,
    Active,
    Paused,
    Terminated,
    Completed,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Terminated | SessionStatus::Completed)
    }

    /// Active or paused: detectors are running and warnings count
    pub fn is_monitoring(&self) -> bool {
        matches!(self, SessionStatus::Active | SessionStatus::Paused)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionStatus::NotStarted => "not_started",
            SessionStatus::EnvironmentCheck => "environment_check",
            SessionStatus::Active => "active",
            SessionStatus::Paused => "paused",
            SessionStatus::Terminated => "terminated",
            SessionStatus::Completed => "completed",
        };
        f.write_str(name)
    }
}

/// Why a session was paused
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PauseReason {
    Malpractice { category: MalpracticeCategory },
    Manual { reason: String },
}

impl fmt::Display for PauseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PauseReason::Malpractice { category } => write!(f, "{}", category),
            PauseReason::Manual { reason } => f.write_str(reason),
        }
    }
}

/// Why a session was terminated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TerminationReason {
    /// Counted warnings reached the configured cutoff
    WarningCutoff { count: u32, cutoff: u32 },
    /// No face was seen for the whole grace period
    NoFaceGracePeriod { elapsed_secs: u64 },
    /// Host-initiated termination
    Manual { reason: String },
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationReason::WarningCutoff { count, cutoff } => {
                write!(f, "malpractice warning limit reached ({}/{})", count, cutoff)
            }
            TerminationReason::NoFaceGracePeriod { elapsed_secs } => {
                write!(f, "no face detected for {} seconds", elapsed_secs)
            }
            TerminationReason::Manual { reason } => f.write_str(reason),
        }
    }
}

/// Final outcome of a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SessionOutcome {
    Completed,
    Terminated { reason: TerminationReason },
}

impl SessionOutcome {
    pub fn status(&self) -> SessionStatus {
        match self {
            SessionOutcome::Completed => SessionStatus::Completed,
            SessionOutcome::Terminated { .. } => SessionStatus::Terminated,
        }
    }
}
