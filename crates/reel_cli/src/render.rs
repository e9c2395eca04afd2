//! Terminal rendering for sessions, step results and reports.

use console::{StyledObject, style};
use reel_replay::{
    ReplayReport, ReplaySession, ReplayStep, ReplayStepResult, StepStatus, truncate_content,
};
use std::fmt::Write;

const PREVIEW_CHARS: usize = 60;

pub fn ok_mark() -> StyledObject<&'static str> {
    style("ok").green().bold()
}

fn status_label(status: StepStatus) -> StyledObject<&'static str> {
    match status {
        StepStatus::Completed => style("done").green(),
        StepStatus::Skipped => style("skip").dim(),
        StepStatus::Failed => style("fail").red().bold(),
    }
}

fn step_line(step: &ReplayStep) -> String {
    let mut line = format!("{:>4}  {:<20}", step.step_number, step.kind.as_str());
    if let Some(path) = step.file_path() {
        let _ = write!(line, " {}", style(path).cyan());
    }
    if !step.description.is_empty() {
        let _ = write!(
            line,
            " {}",
            style(truncate_content(&step.description, PREVIEW_CHARS)).dim()
        );
    }
    line
}

/// Summary header followed by one line per step
pub fn session_overview(session: &ReplaySession) -> String {
    let summary = session.summary();
    let mut out = String::new();

    let _ = writeln!(out, "{} {}", style("session").bold(), summary.id);
    let _ = writeln!(out, "  status:        {:?}", summary.status);
    let _ = writeln!(out, "  format:        {}", session.version);
    if let Some(prompt) = &summary.initial_prompt {
        let _ = writeln!(out, "  prompt:        {}", truncate_content(prompt, PREVIEW_CHARS));
    }
    let _ = writeln!(out, "  steps:         {}", summary.total_steps);
    let _ = writeln!(out, "  model calls:   {}", summary.model_calls);
    let _ = writeln!(
        out,
        "  tokens:        {} in / {} out",
        summary.input_tokens, summary.output_tokens
    );
    let _ = writeln!(out, "  file steps:    {}", summary.file_steps);
    if let Some(ms) = summary.duration_ms {
        let _ = writeln!(out, "  duration:      {} ms", ms);
    }
    if summary.has_errors {
        let _ = writeln!(out, "  {}", style("recorded run contains errors").yellow());
    }
    let _ = writeln!(out);

    for step in &session.steps {
        let _ = writeln!(out, "{}", step_line(step));
    }
    out
}

/// One replayed step with its changes and divergence
pub fn step_result(result: &ReplayStepResult<'_>) -> String {
    let mut out = format!("[{}] {}\n", status_label(result.status), step_line(result.step));

    for change in &result.file_changes {
        let _ = writeln!(
            out,
            "       {} {} ({} -> {} bytes)",
            style("~").yellow(),
            change.path,
            change.old_content.len(),
            change.new_content.len()
        );
    }
    if let Some(divergence) = &result.divergence {
        let _ = writeln!(
            out,
            "       {} {}",
            style("divergence:").red().bold(),
            divergence.description
        );
        let _ = writeln!(out, "         expected: {:?}", divergence.expected);
        let _ = writeln!(out, "         actual:   {:?}", divergence.actual);
    }
    if let Some(error) = &result.error {
        let _ = writeln!(out, "       {} {}", style("error:").red(), error);
    }
    out
}

/// Run summary
pub fn report(report: &ReplayReport) -> String {
    let mut out = String::new();
    let verdict = if report.is_clean() {
        style("clean").green().bold()
    } else {
        style("attention").yellow().bold()
    };

    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "{} {} ({} mode): {}",
        style("replay").bold(),
        report.session_id,
        report.mode,
        verdict
    );
    let _ = writeln!(
        out,
        "  {} completed, {} skipped, {} failed, {} divergences in {} ms",
        report.completed_count,
        report.skipped_count,
        report.failed_count,
        report.divergence_count(),
        report.total_time.as_millis()
    );
    let _ = writeln!(out, "  cursor at step {}", report.cursor);

    if !report.applied_changes.is_empty() {
        let _ = writeln!(out, "  paths to apply:");
        for path in &report.applied_changes {
            let _ = writeln!(out, "    {}", path);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use reel_replay::{
        ReplayDiff, ReplayExecutor, ReplayFileSnapshot, ReplayMode, ReplayOptions, StepKind,
    };

    fn session() -> ReplaySession {
        let mut session = ReplaySession::new("render")
            .with_initial_snapshot(ReplayFileSnapshot::from_content("a.txt", "q"));
        session.initial_prompt = Some("add a feature".to_string());
        session
            .with_step(ReplayStep::new(0, StepKind::UserPrompt).with_description("ask"))
            .with_step(
                ReplayStep::new(0, StepKind::FileDiff)
                    .with_file_diff(ReplayDiff::new("a.txt", "x", "y")),
            )
            .with_step(ReplayStep::new(0, StepKind::Error).with_error("boom"))
    }

    #[test]
    fn test_session_overview_lists_steps() {
        console::set_colors_enabled(false);
        let text = session_overview(&session());

        assert!(text.contains("session render"));
        assert!(text.contains("add a feature"));
        assert!(text.contains("file_diff"));
        assert!(text.contains("a.txt"));
        assert!(text.contains("recorded run contains errors"));
    }

    #[test]
    fn test_step_result_shows_divergence_and_error() {
        console::set_colors_enabled(false);
        let session = session();
        let mut executor =
            ReplayExecutor::with_options(&session, ReplayOptions::new(ReplayMode::Simulate));
        let results = executor.run_to_end().into_result().unwrap();

        let diff = step_result(&results[1]);
        assert!(diff.starts_with("[done]"));
        assert!(diff.contains("divergence: File content differs from recorded state: a.txt"));
        assert!(diff.contains("expected: \"x\""));

        let failed = step_result(&results[2]);
        assert!(failed.starts_with("[fail]"));
        assert!(failed.contains("error: boom"));

        let summary = report(&ReplayReport::from_results(executor.state(), &results));
        assert!(summary.contains("attention"));
        assert!(summary.contains("1 divergences"));
    }
}
