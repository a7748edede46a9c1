//! Proctor CLI - Session trace replay and configuration tooling
//!
//! - Replay recorded observation traces through the session controller
//! - Inspect the named presets and the effective configuration
//! - Forward replayed activities to a live logging collaborator

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use proctor_collab::HttpActivityLogger;
use proctor_monitor::ActivityLogger;
use proctor_types::{ProctorConfig, ProctorPreset};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod error;
mod output;
mod trace;

use config::CliConfig;
use output::OutputFormat;
use trace::Trace;

#[derive(Parser)]
#[command(name = "proctor")]
#[command(about = "Proctor - session monitoring heuristics for online assessments", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "PROCTOR_CONFIG")]
    config: Option<String>,

    /// Policy preset (quiz, strict, interview)
    #[arg(short, long, env = "PROCTOR_PRESET")]
    preset: Option<ProctorPreset>,

    /// Output format (table, json, yaml)
    #[arg(short, long, default_value = "table")]
    output: OutputFormat,

    /// Log level
    #[arg(long, env = "PROCTOR_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, env = "PROCTOR_LOG_JSON")]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay an observation trace and print the session report
    Replay {
        /// Trace file (JSON or YAML)
        trace: PathBuf,

        /// Also deliver activities to this logging collaborator
        #[arg(long, env = "PROCTOR_LOG_ENDPOINT")]
        log_endpoint: Option<String>,
    },

    /// Show the named presets
    Presets {
        /// Only this preset
        #[arg(short, long)]
        name: Option<ProctorPreset>,
    },

    /// Show the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // a trace's own preset applies when no flag is given
    let trace = match &cli.command {
        Commands::Replay { trace, .. } => Some(
            Trace::load(trace).with_context(|| format!("loading trace {}", trace.display()))?,
        ),
        _ => None,
    };
    let preset = cli
        .preset
        .or_else(|| trace.as_ref().and_then(|t| t.preset))
        .unwrap_or_default();

    let config =
        CliConfig::load(cli.config.as_deref(), preset).context("loading configuration")?;
    init_tracing(
        cli.log_level.as_deref().unwrap_or(&config.logging.level),
        cli.json || config.logging.json,
    );

    if let Err(e) = run(cli.command, cli.output, config, trace).await {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
    Ok(())
}

async fn run(
    command: Commands,
    format: OutputFormat,
    config: CliConfig,
    trace: Option<Trace>,
) -> anyhow::Result<()> {
    match command {
        Commands::Replay { log_endpoint, .. } => {
            let trace = trace.context("trace was not loaded")?;
            let logger: Option<Arc<dyn ActivityLogger>> =
                match log_endpoint.or_else(|| config.proctor.collaborator.base_url.clone()) {
                    Some(endpoint) => {
                        info!(%endpoint, "Forwarding activities to logging collaborator");
                        Some(Arc::new(HttpActivityLogger::new(
                            &endpoint,
                            &config.proctor.collaborator,
                        )?))
                    }
                    None => None,
                };

            let outcome = trace::replay(&trace, config.proctor, logger).await?;
            output::print_replay(&outcome, format)?;
            if matches!(format, OutputFormat::Table) {
                output::print_success(&format!(
                    "replayed {} events for {}",
                    trace.events.len(),
                    trace.subject
                ));
            }
        }
        Commands::Presets { name } => {
            let presets: Vec<ProctorConfig> = match name {
                Some(preset) => vec![ProctorConfig::for_preset(preset)],
                None => ProctorPreset::ALL
                    .iter()
                    .map(|p| ProctorConfig::for_preset(*p))
                    .collect(),
            };
            output::print_presets(&presets, format)?;
        }
        Commands::Config => {
            let format = match format {
                OutputFormat::Table => OutputFormat::Yaml,
                other => other,
            };
            output::print_single(&config, format)?;
        }
    }
    Ok(())
}

fn init_tracing(level: &str, json: bool) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| level.to_string().into());

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
