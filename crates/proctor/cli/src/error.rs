//! CLI error types

use std::path::PathBuf;

use thiserror::Error;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid proctoring configuration: {0}")]
    Policy(#[from] proctor_types::ConfigError),

    #[error("Session error: {0}")]
    Session(#[from] proctor_monitor::ProctorError),

    #[error("Collaborator error: {0}")]
    Collab(#[from] proctor_collab::CollabError),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid trace: {0}")]
    Trace(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
