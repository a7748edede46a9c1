//! Error types for the proctoring monitor.

use proctor_types::{ConfigError, SessionStatus};
use thiserror::Error;

use crate::detectors::DetectorKind;
use crate::media::DeviceKind;

/// Errors that can occur while running a monitored session.
#[derive(Debug, Error)]
pub enum ProctorError {
    /// Camera or microphone could not be acquired.
    #[error("{device} unavailable: {reason}")]
    DeviceUnavailable {
        /// Device that failed.
        device: DeviceKind,
        /// Reason reported by the media layer.
        reason: String,
    },

    /// A detector tick failed unexpectedly.
    #[error("{detector} detector failed: {reason}")]
    DetectorFailed {
        /// Detector whose tick was aborted.
        detector: DetectorKind,
        /// Failure detail.
        reason: String,
    },

    /// The requested operation is not valid in the current state.
    #[error("cannot {action} while session is {status}")]
    InvalidState {
        /// Operation attempted.
        action: &'static str,
        /// Status at the time of the attempt.
        status: SessionStatus,
    },

    /// Configuration was rejected.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The session runtime has already shut down.
    #[error("session runtime has stopped")]
    SessionClosed,

    /// Answer analysis failed.
    #[error("answer analysis failed: {0}")]
    Analysis(String),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type for monitor operations.
pub type ProctorResult<T> = Result<T, ProctorError>;

/// Failure delivering an activity record to the logging collaborator.
///
/// Always caught by the log forwarder; never reaches session logic.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("log delivery failed: {0}")]
pub struct LogDeliveryError(pub String);

impl LogDeliveryError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}
