//! Output formatting utilities

use colored::*;
use proctor_types::{ProctorConfig, SessionOutcome, SessionReport, Verdict};
use serde::Serialize;
use tabled::{Table, Tabled};

use crate::error::CliResult;
use crate::trace::ReplayOutcome;

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed table format
    #[default]
    Table,
    /// JSON format
    Json,
    /// YAML format
    Yaml,
}

#[derive(Tabled)]
struct FieldRow {
    #[tabled(rename = "Field")]
    field: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

#[derive(Tabled)]
struct CountRow {
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Warnings")]
    count: u32,
}

#[derive(Tabled)]
struct QuestionRow {
    #[tabled(rename = "Question")]
    index: usize,
    #[tabled(rename = "Warnings")]
    warnings: u32,
    #[tabled(rename = "Status")]
    status: String,
}

#[derive(Tabled)]
struct PresetRow {
    #[tabled(rename = "Preset")]
    preset: String,
    #[tabled(rename = "Cutoff")]
    cutoff: u32,
    #[tabled(rename = "No-face grace")]
    grace: String,
    #[tabled(rename = "Answer time")]
    answer_time: String,
    #[tabled(rename = "Cool-down")]
    cooldown: String,
}

/// Print a single item as JSON or YAML.
pub fn print_single<T: Serialize>(data: &T, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Table | OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(data)?);
        }
        OutputFormat::Yaml => {
            print!("{}", serde_yaml::to_string(data)?);
        }
    }
    Ok(())
}

pub fn print_replay(outcome: &ReplayOutcome, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Table => {
            print_report_table(&outcome.report);
            for rejected in &outcome.rejected {
                print_warning(&format!(
                    "event {} at {} ms rejected: {}",
                    rejected.index, rejected.at_ms, rejected.reason
                ));
            }
            if let Some(stats) = &outcome.forwarded {
                print_info(&format!(
                    "{} activities delivered, {} pending, {} dropped",
                    stats.delivered, stats.pending, stats.dropped
                ));
            }
            Ok(())
        }
        _ => print_single(outcome, format),
    }
}

fn print_report_table(report: &SessionReport) {
    let outcome = match &report.outcome {
        SessionOutcome::Completed => "completed".green().to_string(),
        SessionOutcome::Terminated { reason } => {
            format!("terminated: {}", reason).red().to_string()
        }
    };
    let rows = vec![
        FieldRow {
            field: "Session",
            value: report.session_id.to_string(),
        },
        FieldRow {
            field: "Subject",
            value: report.subject.to_string(),
        },
        FieldRow {
            field: "Outcome",
            value: outcome,
        },
        FieldRow {
            field: "Score",
            value: format!("{} ({})", report.score, verdict_label(report.verdict)),
        },
        FieldRow {
            field: "Duration",
            value: report.duration.clone(),
        },
        FieldRow {
            field: "Warnings",
            value: report.total_warnings.to_string(),
        },
        FieldRow {
            field: "Face",
            value: format!(
                "{:.0}% normal, {:.0}% none, {:.0}% multiple",
                report.face.normal_pct, report.face.no_face_pct, report.face.multiple_faces_pct
            ),
        },
        FieldRow {
            field: "Noise",
            value: format!(
                "avg {:.1}, {:.0}% high",
                report.noise.average_level, report.noise.high_noise_pct
            ),
        },
    ];
    println!("{}", Table::new(rows));

    if !report.warning_counts.is_empty() {
        let counts = report.warning_counts.iter().map(|(category, count)| CountRow {
            category: category.label().to_string(),
            count: *count,
        });
        println!("{}", Table::new(counts));
    }

    let questions = report.questions.iter().map(|q| QuestionRow {
        index: q.index + 1,
        warnings: q.malpractice_count,
        status: q.status.to_string(),
    });
    println!("{}", Table::new(questions));

    println!("{}", report.feedback.bold());
    for recommendation in &report.recommendations {
        println!("  {} {}", "•".cyan(), recommendation);
    }
}

fn verdict_label(verdict: Verdict) -> ColoredString {
    let label = verdict.to_string();
    match verdict {
        Verdict::Excellent | Verdict::Good => label.green(),
        Verdict::Fair => label.yellow(),
        Verdict::NeedsImprovement => label.red(),
    }
}

pub fn print_presets(configs: &[ProctorConfig], format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Table => {
            println!("{}", Table::new(configs.iter().map(preset_row)));
            Ok(())
        }
        _ => print_single(&configs, format),
    }
}

fn preset_row(c: &ProctorConfig) -> PresetRow {
    PresetRow {
        preset: c.preset.to_string(),
        cutoff: c.session.warning_cutoff,
        grace: c
            .session
            .no_face_grace_secs
            .map_or_else(|| "off".to_string(), |s| format!("{}s", s)),
        answer_time: format!("{}s", c.session.answer_time_secs),
        cooldown: format!("{}ms", c.debounce.cooldown_ms),
    }
}

pub fn print_success(message: &str) {
    println!("{} {}", "✓".green(), message);
}

pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red(), message);
}

pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow(), message);
}

pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue(), message);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_default() {
        assert!(matches!(OutputFormat::default(), OutputFormat::Table));
    }

    #[test]
    fn test_preset_rows_render() {
        let configs: Vec<_> = proctor_types::ProctorPreset::ALL
            .iter()
            .map(|p| ProctorConfig::for_preset(*p))
            .collect();
        let table = Table::new(configs.iter().map(preset_row)).to_string();
        assert!(table.contains("interview"));
        assert!(table.contains("off"));
    }
}
