mod report;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};

use grade_lens::data::filter::{ALL_LABEL, ALL_LABEL_FEMININE};
use grade_lens::state::{StatusLevel, ViewerState};

/// Filter and summarise a `;`-delimited grade export.
#[derive(Parser)]
#[command(name = "grade-lens", version)]
struct Cli {
    /// Export file to load
    file: PathBuf,

    /// Course to show ("Todos" for every course)
    #[arg(long, default_value = ALL_LABEL)]
    course: String,

    /// Group to show ("Todos" for every group)
    #[arg(long, default_value = ALL_LABEL)]
    group: String,

    /// Evaluation period to show ("Todas" for every period)
    #[arg(long, default_value = ALL_LABEL_FEMININE)]
    evaluation: String,

    /// Output format
    #[arg(long, value_enum, default_value = "table")]
    format: OutputFormat,

    /// Print pass-rate and mean statistics instead of the student table
    #[arg(long)]
    stats: bool,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Aligned plain text
    Table,
    /// `;`-delimited text
    Csv,
    /// Pretty-printed JSON
    Json,
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    let raw = std::fs::read_to_string(&cli.file)
        .with_context(|| format!("reading {}", cli.file.display()))?;
    let text = raw.strip_prefix('\u{feff}').unwrap_or(&raw);

    let mut state = ViewerState::new();
    let loaded = state.load_with_progress(text, |p| {
        log::debug!("Processing... {:.0}%", p.percent());
    });
    if let Err(err) = loaded {
        bail!("{}: {err}", cli.file.display());
    }
    report_status(&state);

    let mut out = std::io::stdout().lock();

    if cli.stats {
        let stats = match state.statistics() {
            Ok(stats) => stats,
            Err(_) => {
                report_status(&state);
                return Ok(());
            }
        };
        report::write_statistics(&mut out, &stats, cli.format)?;
        return Ok(());
    }

    state.set_course(&cli.course);
    state.set_group(&cli.group);
    state.set_evaluation(&cli.evaluation);

    match &state.current {
        Some(result) if !result.is_empty() => {
            report::write_table(&mut out, &result.table(), cli.format)?;
        }
        _ => eprintln!("No rows match the selected filters."),
    }

    Ok(())
}

fn report_status(state: &ViewerState) {
    if let Some(status) = &state.status {
        match status.level {
            StatusLevel::Success => log::info!("{}", status.text),
            StatusLevel::Warning => eprintln!("warning: {}", status.text),
        }
    }
}
