//! Proctoring configuration.
//!
//! Every numeric policy the monitor applies lives here as tunable configuration. The three
//! named presets reconcile the quiz, strict object-detection and interview variants.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::warning::{MalpracticeCategory, WarningSeverity};

/// Configuration validation errors.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    /// A field holds a value outside its allowed range.
    #[error("invalid value for {field}: {reason}")]
    Invalid {
        /// Dotted path of the offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },

    /// Unknown preset name.
    #[error("unknown preset: {0}")]
    UnknownPreset(String),
}

/// Named policy presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProctorPreset {
    /// Quiz sessions: 5 warnings, 60 second no-face grace period.
    #[default]
    Quiz,
    /// Object-detection path: 2 warnings end the session.
    Strict,
    /// Mock interviews: 5 warnings, no grace-period termination, longer answers.
    Interview,
}

impl ProctorPreset {
    pub const ALL: [ProctorPreset; 3] = [
        ProctorPreset::Quiz,
        ProctorPreset::Strict,
        ProctorPreset::Interview,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProctorPreset::Quiz => "quiz",
            ProctorPreset::Strict => "strict",
            ProctorPreset::Interview => "interview",
        }
    }
}

impl fmt::Display for ProctorPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProctorPreset {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "quiz" => Ok(ProctorPreset::Quiz),
            "strict" | "object-detection" | "object_detection" => Ok(ProctorPreset::Strict),
            "interview" => Ok(ProctorPreset::Interview),
            other => Err(ConfigError::UnknownPreset(other.to_string())),
        }
    }
}

/// Complete proctoring configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ProctorConfig {
    /// Preset these values were derived from.
    pub preset: ProctorPreset,

    /// Detector and evaluator thresholds.
    pub thresholds: ThresholdConfig,

    /// Sampling periods.
    pub intervals: IntervalConfig,

    /// Debounce and cool-down policy.
    pub debounce: DebounceConfig,

    /// Session-level policy.
    pub session: SessionConfig,

    /// Score deductions.
    pub scoring: ScoringConfig,

    /// Logging collaborator delivery.
    pub collaborator: CollaboratorConfig,
}

impl ProctorConfig {
    /// Create config for a named preset.
    pub fn for_preset(preset: ProctorPreset) -> Self {
        let mut config = Self {
            preset,
            ..Self::default()
        };

        match preset {
            ProctorPreset::Quiz => {}
            ProctorPreset::Strict => {
                config.session.warning_cutoff = 2;
            }
            ProctorPreset::Interview => {
                config.session.no_face_grace_secs = None;
                config.session.answer_time_secs = 60;
            }
        }

        config
    }

    /// Check every field is inside its allowed range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.thresholds.validate()?;
        self.intervals.validate()?;
        self.debounce.validate()?;
        self.session.validate()?;
        Ok(())
    }

    /// Consecutive qualifying ticks needed before a category raises a warning.
    pub fn run_length(&self, category: MalpracticeCategory) -> u32 {
        self.debounce.run_length(category)
    }

    pub fn severity(&self, category: MalpracticeCategory) -> WarningSeverity {
        if self.session.advisory_categories.contains(&category) {
            WarningSeverity::Advisory
        } else {
            WarningSeverity::Violation
        }
    }
}

/// Detector and evaluator thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    /// Noise level (0-255) above which a tick qualifies as high noise.
    pub noise_threshold: f64,

    /// Motion score above which a tick qualifies as suspicious motion.
    pub motion_threshold: f64,

    /// Summed RGB difference above which a sampled pixel counts as changed.
    pub motion_pixel_diff: u32,

    /// Only every Nth pixel is compared.
    pub motion_pixel_skip: usize,

    /// Eye aspect ratio below which an eye counts as looking away.
    pub eye_aspect_ratio_min: f64,

    /// Minimum backend confidence for a face entity.
    pub face_confidence_min: f64,

    /// Minimum backend confidence for a prohibited object.
    pub object_confidence_min: f64,

    /// Labels that count as prohibited objects.
    pub prohibited_objects: Vec<String>,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            noise_threshold: 65.0,
            motion_threshold: 0.3,
            motion_pixel_diff: 30,
            motion_pixel_skip: 10,
            eye_aspect_ratio_min: 0.2,
            face_confidence_min: 0.5,
            object_confidence_min: 0.70,
            prohibited_objects: [
                "cell phone",
                "laptop",
                "tv",
                "remote",
                "book",
                "keyboard",
                "phone",
                "paper",
                "device",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

impl ThresholdConfig {
    pub fn is_prohibited(&self, label: &str) -> bool {
        self.prohibited_objects
            .iter()
            .any(|item| item.eq_ignore_ascii_case(label))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=255.0).contains(&self.noise_threshold) {
            return Err(invalid("thresholds.noise_threshold", "must be within 0..=255"));
        }
        if !(0.0..=1.0).contains(&self.motion_threshold) {
            return Err(invalid("thresholds.motion_threshold", "must be within 0..=1"));
        }
        if self.motion_pixel_skip == 0 {
            return Err(invalid("thresholds.motion_pixel_skip", "must be at least 1"));
        }
        for (field, value) in [
            ("thresholds.face_confidence_min", self.face_confidence_min),
            ("thresholds.object_confidence_min", self.object_confidence_min),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid(field, "must be within 0..=1"));
            }
        }
        Ok(())
    }
}

/// Sampling periods, in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntervalConfig {
    pub face_ms: u64,
    pub audio_ms: u64,
    pub motion_ms: u64,
    pub focus_ms: u64,
    pub object_ms: u64,
    /// Session clock: answer timer, grace timer and heartbeat checks.
    pub clock_ms: u64,
    /// Camera heartbeat log period.
    pub heartbeat_ms: u64,
}

impl Default for IntervalConfig {
    fn default() -> Self {
        Self {
            face_ms: 1000,
            audio_ms: 1000,
            motion_ms: 1500,
            focus_ms: 1000,
            object_ms: 1000,
            clock_ms: 1000,
            heartbeat_ms: 10_000,
        }
    }
}

impl IntervalConfig {
    pub fn face(&self) -> Duration {
        Duration::from_millis(self.face_ms)
    }

    pub fn audio(&self) -> Duration {
        Duration::from_millis(self.audio_ms)
    }

    pub fn motion(&self) -> Duration {
        Duration::from_millis(self.motion_ms)
    }

    pub fn focus(&self) -> Duration {
        Duration::from_millis(self.focus_ms)
    }

    pub fn object(&self) -> Duration {
        Duration::from_millis(self.object_ms)
    }

    pub fn clock(&self) -> Duration {
        Duration::from_millis(self.clock_ms)
    }

    pub fn heartbeat(&self) -> Duration {
        Duration::from_millis(self.heartbeat_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("intervals.face_ms", self.face_ms),
            ("intervals.audio_ms", self.audio_ms),
            ("intervals.motion_ms", self.motion_ms),
            ("intervals.focus_ms", self.focus_ms),
            ("intervals.object_ms", self.object_ms),
            ("intervals.clock_ms", self.clock_ms),
            ("intervals.heartbeat_ms", self.heartbeat_ms),
        ] {
            if value == 0 {
                return Err(invalid(field, "interval must be non-zero"));
            }
        }
        Ok(())
    }
}

/// Debounce and deduplication policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebounceConfig {
    /// Consecutive qualifying ticks before a warning, unless overridden.
    pub run_length: u32,

    /// Per-category run lengths.
    pub run_length_overrides: BTreeMap<MalpracticeCategory, u32>,

    /// Minimum time between two counted warnings of the same category.
    pub cooldown_ms: u64,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            run_length: 3,
            run_length_overrides: BTreeMap::new(),
            cooldown_ms: 5000,
        }
    }
}

impl DebounceConfig {
    pub fn run_length(&self, category: MalpracticeCategory) -> u32 {
        self.run_length_overrides
            .get(&category)
            .copied()
            .unwrap_or(self.run_length)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.run_length == 0 || self.run_length_overrides.values().any(|n| *n == 0) {
            return Err(invalid("debounce.run_length", "run length must be at least 1"));
        }
        Ok(())
    }
}

/// Session-level policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Counted warnings that terminate the session.
    pub warning_cutoff: u32,

    /// Continuous no-face time that terminates the session. `None` disables the path.
    pub no_face_grace_secs: Option<u64>,

    /// Answer time per question.
    pub answer_time_secs: u64,

    /// Categories recorded as advisory, which never count toward the cutoff.
    pub advisory_categories: Vec<MalpracticeCategory>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            warning_cutoff: 5,
            no_face_grace_secs: Some(60),
            answer_time_secs: 30,
            advisory_categories: Vec::new(),
        }
    }
}

impl SessionConfig {
    pub fn no_face_grace(&self) -> Option<Duration> {
        self.no_face_grace_secs.map(Duration::from_secs)
    }

    pub fn answer_time(&self) -> Duration {
        Duration::from_secs(self.answer_time_secs)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.warning_cutoff == 0 {
            return Err(invalid("session.warning_cutoff", "cutoff must be at least 1"));
        }
        if self.no_face_grace_secs == Some(0) {
            return Err(invalid(
                "session.no_face_grace_secs",
                "grace period must be non-zero when set",
            ));
        }
        if self.answer_time_secs == 0 {
            return Err(invalid("session.answer_time_secs", "must be non-zero"));
        }
        Ok(())
    }
}

/// Score deductions applied by the report generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Points deducted per warning, unless overridden.
    pub warning_weight: u32,

    /// Per-category weights.
    pub weight_overrides: BTreeMap<MalpracticeCategory, u32>,

    /// Cap on the total warning deduction.
    pub warning_penalty_cap: u32,

    /// Deduction when the normal-face percentage falls below `face_normal_soft_pct`.
    pub face_penalty: u32,
    pub face_normal_soft_pct: f64,
    pub face_normal_hard_pct: f64,

    /// Deduction when the average noise exceeds `noise_average_soft`.
    pub noise_soft_penalty: u32,
    pub noise_average_soft: f64,

    /// Additional deduction when the average noise exceeds `noise_average_hard`.
    pub noise_hard_penalty: u32,
    pub noise_average_hard: f64,

    /// Deduction when any prohibited object warning was raised.
    pub prohibited_penalty: u32,

    /// Deduction when EyeAway warnings exceed `eye_away_allowance`.
    pub eye_away_penalty: u32,
    pub eye_away_allowance: u32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            warning_weight: 3,
            weight_overrides: BTreeMap::new(),
            warning_penalty_cap: 40,
            face_penalty: 10,
            face_normal_soft_pct: 90.0,
            face_normal_hard_pct: 75.0,
            noise_soft_penalty: 5,
            noise_average_soft: 50.0,
            noise_hard_penalty: 10,
            noise_average_hard: 65.0,
            prohibited_penalty: 15,
            eye_away_penalty: 10,
            eye_away_allowance: 3,
        }
    }
}

impl ScoringConfig {
    pub fn weight(&self, category: MalpracticeCategory) -> u32 {
        self.weight_overrides
            .get(&category)
            .copied()
            .unwrap_or(self.warning_weight)
    }
}

/// Delivery settings for the logging collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollaboratorConfig {
    /// Base URL of the logging collaborator. Activities are only traced when unset.
    pub base_url: Option<String>,

    /// Bearer token sent with every log call.
    pub auth_token: Option<String>,

    /// Per-request timeout.
    pub request_timeout_ms: u64,

    /// Failed records kept for retry.
    pub retry_capacity: usize,

    /// Period between retry-buffer flush attempts.
    pub retry_interval_ms: u64,
}

impl Default for CollaboratorConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            auth_token: None,
            request_timeout_ms: 5000,
            retry_capacity: 256,
            retry_interval_ms: 30_000,
        }
    }
}

impl CollaboratorConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_string(),
    }
}
