//! Proctor Types
//!
//! Core type definitions shared by the proctoring monitor, its collaborators and tooling.
//!
//! # Key Types
//!
//! - [`SessionId`], [`SubjectId`]: who and which attempt is being monitored
//! - [`Observation`]: one timestamped detector sample
//! - [`Warning`]: a debounced threshold violation in a [`MalpracticeCategory`]
//! - [`SessionStatus`]: lifecycle state, with [`TerminationReason`] for terminal exits
//! - [`ActivityRecord`]: body of a call to the logging collaborator
//! - [`ProctorConfig`]: every tunable policy value, with named [`ProctorPreset`]s
//! - [`SessionReport`]: end-of-session score and feedback

#![deny(unsafe_code)]

pub mod activity;
pub mod config;
pub mod events;
pub mod ids;
pub mod observation;
pub mod report;
pub mod status;
pub mod warning;

pub use activity::*;
pub use config::*;
pub use events::*;
pub use ids::*;
pub use observation::*;
pub use report::*;
pub use status::*;
pub use warning::*;
