//! CLI configuration
//!
//! Layers, lowest first: preset defaults, optional file, `PROCTOR_` environment variables.
//! Nested keys use `__` in environment names, e.g. `PROCTOR_SESSION__WARNING_CUTOFF=2`.

use proctor_types::{ProctorConfig, ProctorPreset};
use serde::{Deserialize, Serialize};

use crate::error::CliResult;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    #[serde(flatten)]
    pub proctor: ProctorConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl CliConfig {
    pub fn load(path: Option<&str>, preset: ProctorPreset) -> CliResult<Self> {
        let defaults = CliConfig {
            proctor: ProctorConfig::for_preset(preset),
            logging: LoggingConfig::default(),
        };

        let mut builder =
            config::Config::builder().add_source(config::Config::try_from(&defaults)?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(true));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("PROCTOR")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let loaded: CliConfig = builder.build()?.try_deserialize()?;
        loaded.proctor.validate()?;
        Ok(loaded)
    }
}
