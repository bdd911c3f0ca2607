//! CLI output formatting

use crate::{
    core::TopologyReport,
    execution::{ExecutionEvent, RunSummary, Strategy},
};
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");
pub static WAVE: Emoji<'_, '_> = Emoji("🌊 ", "# ");

const PROGRESS_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}";

/// Create a progress bar over `total` steps
pub fn create_progress_bar(total: usize) -> ProgressBar {
    let progress = ProgressBar::new(total as u64);
    let style = ProgressStyle::default_bar()
        .template(PROGRESS_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    progress.set_style(style);
    progress.enable_steady_tick(Duration::from_millis(100));
    progress
}

/// Human name for the executor that ran a pipeline
pub fn format_strategy(strategy: Option<Strategy>) -> String {
    match strategy {
        Some(strategy) => style(strategy).cyan().to_string(),
        None => style("sequential").dim().to_string(),
    }
}

/// Format an execution event for display
pub fn format_execution_event(event: &ExecutionEvent) -> String {
    match event {
        ExecutionEvent::PipelineStarted {
            execution_id,
            pipeline_name,
            started_at,
        } => format!(
            "{} Starting pipeline {} ({}) at {}",
            ROCKET,
            style(pipeline_name).bold(),
            style(short_id(execution_id)).dim(),
            style(started_at.format("%H:%M:%S")).dim()
        ),
        ExecutionEvent::StrategySelected { strategy } => {
            format!("{} Strategy: {}", INFO, format_strategy(*strategy))
        }
        ExecutionEvent::WaveStarted { index, steps } => format!(
            "{} Wave {}: {}",
            WAVE,
            index + 1,
            style(steps.join(", ")).cyan()
        ),
        ExecutionEvent::StepStarted { step } => format!("{} {}", SPINNER, style(step).cyan()),
        ExecutionEvent::StepCompleted { step } => format!("{} {}", CHECK, style(step).green()),
        ExecutionEvent::StepFailed { step, error } => {
            format!("{} {}: {}", CROSS, style(step).red(), style(error).dim())
        }
        ExecutionEvent::WaveCompleted { index } => {
            format!("{} Wave {} finished", INFO, index + 1)
        }
        ExecutionEvent::PipelineCompleted {
            execution_id,
            success,
        } => {
            let status = if *success {
                format!("{} completed", style("successfully").green())
            } else {
                style("failed").red().to_string()
            };
            format!(
                "{} Pipeline ({}) {}",
                INFO,
                style(short_id(execution_id)).dim(),
                status
            )
        }
    }
}

/// One-line summary of a finished run
pub fn format_run_summary(summary: &RunSummary) -> String {
    format!(
        "{} {} via {} in {}",
        CHECK,
        style(&summary.pipeline_name).bold(),
        format_strategy(summary.strategy),
        style(format_duration(summary.duration)).dim()
    )
}

/// Topology analysis lines for `validate`
pub fn format_topology(report: &TopologyReport) -> Vec<String> {
    let yes_no = |flag: bool| {
        if flag {
            style("yes").green().to_string()
        } else {
            style("no").yellow().to_string()
        }
    };
    vec![
        format!("  Linear: {}", yes_no(report.linear)),
        format!("  Progress signal: {}", yes_no(report.requires_progress)),
    ]
}

pub fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    let secs = duration.as_secs();
    if secs == 0 {
        format!("{}ms", millis)
    } else if secs < 60 {
        format!("{}.{:01}s", secs, duration.subsec_millis() / 100)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

fn short_id(id: &uuid::Uuid) -> String {
    id.to_string()[..8].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(format_duration(Duration::from_millis(2500)), "2.5s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m 5s");
        assert_eq!(format_duration(Duration::from_secs(3725)), "1h 2m 5s");
    }

    #[test]
    fn test_format_events_mention_names() {
        console::set_colors_enabled(false);
        let wave = format_execution_event(&ExecutionEvent::WaveStarted {
            index: 0,
            steps: vec!["source".to_string(), "sink".to_string()],
        });
        assert!(wave.contains("Wave 1: source, sink"));

        let failed = format_execution_event(&ExecutionEvent::StepFailed {
            step: "fail".to_string(),
            error: "exit status 42".to_string(),
        });
        assert!(failed.contains("fail: exit status 42"));

        let id = Uuid::new_v4();
        let done = format_execution_event(&ExecutionEvent::PipelineCompleted {
            execution_id: id,
            success: false,
        });
        assert!(done.contains(&id.to_string()[..8]));
        assert!(done.contains("failed"));
    }

    #[test]
    fn test_sequential_strategy_label() {
        console::set_colors_enabled(false);
        assert_eq!(format_strategy(None), "sequential");
        assert_eq!(format_strategy(Some(Strategy::ShellPipe)), "shell-pipe");
    }
}
