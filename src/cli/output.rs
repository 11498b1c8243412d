//! CLI output formatting
//!
//! Progress markers are the only thing the launcher writes to stdout while
//! a sequence runs. Status lines go to stderr next to the logs.

use crate::{
    core::{HandoffMode, Sequence, SequenceState, StartupStatus},
    execution::ExecutionEvent,
    image::{DependencyManifest, PrepareReport},
    persistence::StartupSummary,
};
use console::Emoji;
use std::io::Write;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "! ");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");

/// Write a progress marker to stdout and flush it before the phase starts
pub fn print_marker(marker: &str) {
    let mut stdout = std::io::stdout().lock();
    // A closed stdout must not stop the sequence
    let _ = writeln!(stdout, "{}", marker);
    let _ = stdout.flush();
}

/// Console handler for engine events
pub fn print_execution_event(event: &ExecutionEvent) {
    match event {
        ExecutionEvent::PhaseStarted { marker, .. } => print_marker(marker),
        other => {
            if let Some(line) = format_execution_event(other) {
                eprintln!("{}", line);
            }
        }
    }
}

/// Format a sequence state for display
pub fn format_state(state: &SequenceState) -> String {
    match state {
        SequenceState::Init => style("INIT").dim().to_string(),
        SequenceState::Migrating | SequenceState::Importing | SequenceState::Running => {
            style(state.to_string()).yellow().to_string()
        }
        SequenceState::Exited { code: 0 } => style(state.to_string()).green().to_string(),
        SequenceState::Exited { .. } | SequenceState::Failed { .. } => {
            style(state.to_string()).red().to_string()
        }
    }
}

/// Format a history status for display
pub fn format_status(status: StartupStatus) -> String {
    match status {
        StartupStatus::Running => style("RUNNING").yellow().to_string(),
        StartupStatus::HandedOff => style("HANDED OFF").cyan().to_string(),
        StartupStatus::Exited => style("EXITED").green().to_string(),
        StartupStatus::Failed => style("FAILED").red().to_string(),
    }
}

/// Format an execution event for the status stream.
///
/// Returns `None` for events that only produce a marker.
pub fn format_execution_event(event: &ExecutionEvent) -> Option<String> {
    let line = match event {
        ExecutionEvent::SequenceStarted { run_id, name } => format!(
            "{}Starting {} ({})",
            ROCKET,
            style(name).bold(),
            style(short_id(run_id)).dim()
        ),
        ExecutionEvent::PreflightFailed { missing } => format!(
            "{}Missing required environment: {}",
            CROSS,
            style(missing.join(", ")).red()
        ),
        ExecutionEvent::PhaseStarted { .. } => return None,
        ExecutionEvent::PhaseCompleted { phase, .. } => {
            format!("{}{}", CHECK, style(phase).green())
        }
        ExecutionEvent::PhaseFailed {
            phase,
            exit_code,
            error,
        } => format!(
            "{}{} (exit {}): {}",
            CROSS,
            style(phase).red(),
            exit_code,
            style(error).dim()
        ),
        ExecutionEvent::HandingOff { mode, command } => {
            let how = match mode {
                HandoffMode::Exec => "exec",
                HandoffMode::Supervise => "supervising",
            };
            format!("{}{} {}", INFO, how, style(command).cyan())
        }
        ExecutionEvent::SequenceFinished { state, .. } => {
            format!("{}Sequence {}", INFO, format_state(state))
        }
    };
    Some(line)
}

/// Format a history record on one line
pub fn format_summary(summary: &StartupSummary) -> String {
    let icon = match summary.status {
        StartupStatus::Exited if summary.exit_code == Some(0) => CHECK,
        StartupStatus::Exited | StartupStatus::Failed => CROSS,
        _ => INFO,
    };

    let mut line = format!(
        "{}{} - {} - {} - {}",
        icon,
        style(short_id(&summary.run_id)).dim(),
        style(&summary.sequence_name).bold(),
        format_status(summary.status),
        style(summary.started_at.format("%Y-%m-%d %H:%M:%S")).dim()
    );
    if let Some(phase) = summary.failed_phase {
        line.push_str(&format!(" in {}", style(phase).red()));
    }
    if let Some(code) = summary.exit_code {
        line.push_str(&format!(" (exit {})", code));
    }
    line
}

/// Dry-run listing of the resolved commands
pub fn format_plan(sequence: &Sequence) -> String {
    let mut lines = vec![format!(
        "{}{} (handoff: {:?})",
        INFO,
        style(&sequence.name).bold(),
        sequence.handoff
    )];
    for phase in sequence.phases() {
        let invocation = sequence.invocation(phase.kind);
        let mut line = format!(
            "  {}: {}  {}",
            style(phase.kind).bold(),
            style(invocation.display()).cyan(),
            style(format!("# {}", phase.marker)).dim()
        );
        if let Some(timeout) = invocation.timeout {
            line.push_str(&format!(" (timeout {}s)", timeout.as_secs()));
        }
        lines.push(line);
    }
    lines.join("\n")
}

/// Report what `prepare` did
pub fn format_prepare_report(report: &PrepareReport) -> String {
    let mut lines = Vec::new();
    for path in &report.normalized {
        lines.push(format!("{}normalized {}", CHECK, style(path.display()).dim()));
    }
    if report.installed {
        lines.push(format!("{}dependencies installed", CHECK));
    }
    if let Some(path) = &report.executable {
        lines.push(format!("{}{} is executable", CHECK, style(path.display()).dim()));
    }
    if lines.is_empty() {
        lines.push(format!("{}nothing to do", INFO));
    }
    lines.join("\n")
}

/// Summarize a parsed manifest
pub fn format_manifest(manifest: &DependencyManifest) -> String {
    let unpinned = manifest.unpinned();
    let mut lines = vec![format!(
        "  Requirements: {} ({} pinned)",
        style(manifest.requirements.len()).cyan(),
        style(manifest.requirements.len() - unpinned.len()).cyan()
    )];
    for requirement in unpinned {
        lines.push(format!(
            "  {}line {}: {} is not pinned",
            WARN,
            requirement.line,
            style(requirement).yellow()
        ));
    }
    lines.join("\n")
}

fn short_id(id: &uuid::Uuid) -> String {
    id.to_string()[..8].to_string()
}
