//! Activity records sent to the logging collaborator

use crate::ids::{SessionId, SubjectId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Collaborator endpoint an activity is delivered to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityChannel {
    /// Session lifecycle (`POST /quiz/log`)
    Quiz,
    /// Camera-side findings and heartbeats (`POST /camera/log`)
    Camera,
}

impl ActivityChannel {
    pub fn path(&self) -> &'static str {
        match self {
            ActivityChannel::Quiz => "/quiz/log",
            ActivityChannel::Camera => "/camera/log",
        }
    }
}

/// Activities the controller reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    EnvironmentCheckStarted,
    SessionStarted,
    SessionPaused,
    SessionResumed,
    SessionTerminated,
    SessionCompleted,
    QuestionChanged,
    AnswerTimeExpired,
    WarningRaised,
    CameraHeartbeat,
}

impl ActivityKind {
    /// Activity string used on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::EnvironmentCheckStarted => "Environment Check Started",
            ActivityKind::SessionStarted => "Session Started",
            ActivityKind::SessionPaused => "Session Paused",
            ActivityKind::SessionResumed => "Session Resumed",
            ActivityKind::SessionTerminated => "Session Terminated",
            ActivityKind::SessionCompleted => "Session Completed",
            ActivityKind::QuestionChanged => "Question Changed",
            ActivityKind::AnswerTimeExpired => "Answer Time Expired",
            ActivityKind::WarningRaised => "Malpractice Warning",
            ActivityKind::CameraHeartbeat => "Camera Active",
        }
    }

    pub fn from_wire(activity: &str) -> Option<Self> {
        use ActivityKind::*;
        [
            EnvironmentCheckStarted,
            SessionStarted,
            SessionPaused,
            SessionResumed,
            SessionTerminated,
            SessionCompleted,
            QuestionChanged,
            AnswerTimeExpired,
            WarningRaised,
            CameraHeartbeat,
        ]
        .into_iter()
        .find(|kind| kind.as_str() == activity)
    }

    pub fn channel(&self) -> ActivityChannel {
        match self {
            ActivityKind::WarningRaised | ActivityKind::CameraHeartbeat => ActivityChannel::Camera,
            _ => ActivityChannel::Quiz,
        }
    }

    /// Whether this activity records a lifecycle state transition
    pub fn is_transition(&self) -> bool {
        matches!(
            self,
            ActivityKind::EnvironmentCheckStarted
                | ActivityKind::SessionStarted
                | ActivityKind::SessionPaused
                | ActivityKind::SessionResumed
                | ActivityKind::SessionTerminated
                | ActivityKind::SessionCompleted
        )
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of a log call, exactly as the collaborator expects it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEntry {
    pub username: SubjectId,
    pub session_id: SessionId,
    pub activity: String,
    pub question_index: Option<usize>,
    pub data: Option<serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

/// An activity entry together with the channel it is routed to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub channel: ActivityChannel,
    pub entry: ActivityEntry,
}

impl ActivityRecord {
    pub fn new(
        kind: ActivityKind,
        username: SubjectId,
        session_id: SessionId,
        question_index: Option<usize>,
        data: Option<serde_json::Value>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            channel: kind.channel(),
            entry: ActivityEntry {
                username,
                session_id,
                activity: kind.as_str().to_string(),
                question_index,
                data,
                timestamp,
            },
        }
    }

    pub fn kind(&self) -> Option<ActivityKind> {
        ActivityKind::from_wire(&self.entry.activity)
    }
}
