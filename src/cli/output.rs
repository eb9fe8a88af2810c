//! Rendering of runs and progress for the terminal

use std::fmt::Write;

use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use super::OutputFormat;
use crate::domain::workflow::{ProgressEvent, RunDetails, StepDefinition, WorkflowRun};
use crate::infrastructure::progress::BroadcastProgressHub;

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_details(
    details: &RunDetails,
    format: OutputFormat,
    snapshots: bool,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => print_json(details),
        OutputFormat::Text => {
            print!("{}", render_details(details, snapshots));
            Ok(())
        }
    }
}

pub fn print_runs(runs: &[WorkflowRun], format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => print_json(runs),
        OutputFormat::Text => {
            for run in runs {
                println!("{}", run_line(run));
            }
            Ok(())
        }
    }
}

pub fn print_steps(definitions: &[StepDefinition], format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => print_json(definitions),
        OutputFormat::Text => {
            for d in definitions {
                let llm = if d.uses_llm { "llm" } else { "" };
                println!("{}. {:<20} {:<4} {}", d.order, d.name, llm, d.description);
            }
            Ok(())
        }
    }
}

fn run_line(run: &WorkflowRun) -> String {
    let mut line = format!(
        "{}  {:<9}  {}",
        run.id(),
        run.status(),
        run.created_at().format("%Y-%m-%d %H:%M:%S")
    );
    if let Some(step) = run.rerun_from_step() {
        let _ = write!(line, "  rerun from {}", step);
    }
    line
}

pub fn render_details(details: &RunDetails, snapshots: bool) -> String {
    let run = &details.run;
    let mut out = String::new();

    let _ = writeln!(out, "Run {} ({})", run.id(), run.status());
    let options = run.options();
    let _ = writeln!(
        out,
        "  options: audience={} tone={} strict={}",
        options.audience, options.tone, options.strict_compliance
    );
    if let Some(parent) = run.parent_run_id() {
        let _ = writeln!(out, "  parent: {}  root: {}", parent, run.root_run_id());
    }
    if let Some(step) = run.rerun_from_step() {
        let _ = writeln!(out, "  rerun from: {}", step);
    }
    if let Some(ms) = run.total_duration_ms() {
        let _ = writeln!(out, "  duration: {} ms", ms);
    }
    if let Some(error) = run.error() {
        let _ = writeln!(out, "  error: {}", error);
    }

    let _ = writeln!(out);
    for step in &details.steps {
        let duration = step
            .duration_ms()
            .map(|ms| format!("{} ms", ms))
            .unwrap_or_default();
        let _ = writeln!(
            out,
            "  {}. {:<20} {:<9} {:>9}",
            step.step_order(),
            step.step_name(),
            step.status(),
            duration
        );

        for warning in step.warnings() {
            let _ = writeln!(out, "       warning: {}", warning);
        }
        if let Some(error) = step.error() {
            let _ = writeln!(out, "       error: {}", error);
        }

        if snapshots {
            for (label, snapshot) in [
                ("input", step.input_snapshot()),
                ("output", step.output_snapshot()),
            ] {
                if let Some(s) = snapshot {
                    let note = if s.is_truncated {
                        format!(" (truncated from {} chars)", s.full_length)
                    } else {
                        String::new()
                    };
                    let _ = writeln!(out, "       {}{}:\n{}", label, note, s.text);
                }
            }
        }
    }

    out
}

/// Print progress events to stderr until aborted
pub fn spawn_progress_printer(hub: &BroadcastProgressHub) -> JoinHandle<()> {
    let mut rx = hub.subscribe();

    tokio::spawn(async move {
        let mut streaming = false;
        loop {
            let event = match rx.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            };

            if let ProgressEvent::LlmStream { partial_text, .. } = &event {
                eprint!("{}", partial_text);
                streaming = true;
                continue;
            }
            if streaming {
                eprintln!();
                streaming = false;
            }
            if let Some(line) = progress_line(&event) {
                eprintln!("{}", line);
            }
        }
    })
}

fn progress_line(event: &ProgressEvent) -> Option<String> {
    match event {
        ProgressEvent::StepStarted { step_name, .. } => Some(format!("> {}", step_name)),
        ProgressEvent::StepCompleted {
            step_name,
            duration_ms,
            ..
        } => Some(format!("  {} done in {} ms", step_name, duration_ms)),
        ProgressEvent::StepFailed {
            step_name, error, ..
        } => Some(format!("  {} failed: {}", step_name, error)),
        ProgressEvent::RunCompleted { success, error, .. } => Some(match (success, error) {
            (true, _) => "Run completed".to_string(),
            (false, Some(e)) => format!("Run ended: {}", e),
            (false, None) => "Run ended".to_string(),
        }),
        ProgressEvent::StepStatus { .. } | ProgressEvent::LlmStream { .. } => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::workflow::{truncate, RunId, WorkflowOptions, WorkflowStepRun};

    fn details() -> RunDetails {
        let mut run = WorkflowRun::new("text", WorkflowOptions::default());
        run.mark_running().unwrap();
        run.mark_failed("Step 'summarize' failed: boom", 40).unwrap();

        let mut intake = WorkflowStepRun::pending(run.id(), "intake-normalize", 1);
        intake.mark_running(truncate("in", 100)).unwrap();
        intake
            .mark_completed(truncate("x".repeat(50).as_str(), 20), vec!["short".to_string()], 3)
            .unwrap();

        let mut summarize = WorkflowStepRun::pending(run.id(), "summarize", 2);
        summarize.mark_running(truncate("in", 100)).unwrap();
        summarize.mark_failed("boom", 30).unwrap();

        RunDetails {
            run,
            steps: vec![intake, summarize],
        }
    }

    #[test]
    fn test_render_details() {
        let text = render_details(&details(), false);

        assert!(text.contains("(failed)"));
        assert!(text.contains("error: Step 'summarize' failed: boom"));
        assert!(text.contains("intake-normalize"));
        assert!(text.contains("warning: short"));
        assert!(!text.contains("output"));
    }

    #[test]
    fn test_render_snapshots_notes_truncation() {
        let text = render_details(&details(), true);
        assert!(text.contains("output (truncated from 50 chars)"));
    }

    #[test]
    fn test_progress_lines() {
        let run_id = RunId::generate();
        let started = ProgressEvent::StepStarted {
            run_id,
            step_name: "summarize".to_string(),
        };
        assert_eq!(progress_line(&started).unwrap(), "> summarize");

        let status = ProgressEvent::StepStatus {
            run_id,
            step_name: "summarize".to_string(),
            message: "Preparing".to_string(),
            percent: Some(0),
        };
        assert!(progress_line(&status).is_none());
    }
}
