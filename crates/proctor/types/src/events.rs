//! Notifications published to the host while a session runs

use crate::ids::SessionId;
use crate::report::SessionReport;
use crate::status::SessionStatus;
use crate::warning::Warning;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How prominently the host should surface a notice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// Events emitted by the session controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProctorEvent {
    StatusChanged {
        session_id: SessionId,
        from: SessionStatus,
        to: SessionStatus,
        at: DateTime<Utc>,
    },

    WarningRaised {
        session_id: SessionId,
        warning: Warning,
        counted_total: u32,
    },

    /// Non-blocking banner text for the user
    Notice {
        session_id: SessionId,
        level: NoticeLevel,
        message: String,
    },

    QuestionChanged {
        session_id: SessionId,
        index: usize,
        total: usize,
    },

    ReportReady {
        session_id: SessionId,
        report: Box<SessionReport>,
    },
}

impl ProctorEvent {
    pub fn session_id(&self) -> SessionId {
        match self {
            ProctorEvent::StatusChanged { session_id, .. }
            | ProctorEvent::WarningRaised { session_id, .. }
            | ProctorEvent::Notice { session_id, .. }
            | ProctorEvent::QuestionChanged { session_id, .. }
            | ProctorEvent::ReportReady { session_id, .. } => *session_id,
        }
    }
}
