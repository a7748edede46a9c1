//! Proctor Collab - HTTP clients for external collaborators
//!
//! - [`HttpActivityLogger`]: delivers activity records to the logging collaborator
//!   (`/quiz/log`, `/camera/log`); plug it into a session through
//!   [`ProctorSessionBuilder::logger`](proctor_monitor::ProctorSessionBuilder::logger)
//! - [`InterviewClient`]: starts interviews, submits answers and reports malpractice
//! - [`InterviewMalpracticeLogger`]: routes warning activities to the interview backend

#![deny(unsafe_code)]

pub mod error;
mod http;
pub mod interview;
pub mod logger;

pub use error::{CollabError, CollabResult};
pub use interview::{
    evidence_class, AnswerOutcome, InterviewClient, InterviewId, InterviewMalpracticeLogger,
    StartedInterview,
};
pub use logger::HttpActivityLogger;
