//! `run` and `rerun` commands

use std::io::Read;
use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use tracing::{info, warn};

use super::output::{print_details, spawn_progress_printer};
use super::{ExecutionArgs, InputSource, OutputFormat, RerunArgs, RunArgs};
use crate::config::AppConfig;
use crate::domain::samples::{all_samples, sample_by_id};
use crate::domain::workflow::{RunDetails, RunId, RunStatus, WorkflowOptions};
use crate::infrastructure::progress::{
    BroadcastProgressHub, CompositeProgressHub, LoggingProgressHub,
};
use crate::infrastructure::workflow::WorkflowOrchestrator;

const POLL_INTERVAL: Duration = Duration::from_millis(200);

pub async fn run(config: &AppConfig, args: RunArgs, format: OutputFormat) -> anyhow::Result<()> {
    let input = read_input(&args.source)?;
    let options = WorkflowOptions::new(args.audience, args.tone, args.strict);

    let (orchestrator, progress) = build(config).await?;
    let run_id = orchestrator.create_run(&input, options).await?;
    info!(run_id = %run_id, "Run started");

    execute(&orchestrator, &progress, run_id, &args.execution, format).await
}

pub async fn rerun(config: &AppConfig, args: RerunArgs, format: OutputFormat) -> anyhow::Result<()> {
    let (orchestrator, progress) = build(config).await?;
    let run_id = orchestrator.rerun(&args.run_id, &args.from_step).await?;
    info!(run_id = %run_id, parent_run_id = %args.run_id, "Rerun started");

    execute(&orchestrator, &progress, run_id, &args.execution, format).await
}

async fn build(config: &AppConfig) -> anyhow::Result<(WorkflowOrchestrator, BroadcastProgressHub)> {
    let llm = crate::create_llm_client(config, true)?;
    let progress = BroadcastProgressHub::new();
    let hub = CompositeProgressHub::new()
        .with(Arc::new(progress.clone()))
        .with(Arc::new(LoggingProgressHub));

    let orchestrator = crate::create_orchestrator(config, llm, Arc::new(hub)).await?;
    Ok((orchestrator, progress))
}

async fn execute(
    orchestrator: &WorkflowOrchestrator,
    progress: &BroadcastProgressHub,
    run_id: RunId,
    execution: &ExecutionArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let printer = execution.watch.then(|| spawn_progress_printer(progress));
    let details = await_run(orchestrator, run_id).await;
    if let Some(printer) = printer {
        printer.abort();
    }
    let details = details?;

    if let (Some(path), Some(html)) = (&execution.html, details.run.final_output_html()) {
        tokio::fs::write(path, html)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!(path = %path.display(), "Final HTML written");
    }

    print_details(&details, format, false)?;

    match details.run.status() {
        RunStatus::Completed => Ok(()),
        status => bail!("Run {} ended {}", run_id, status),
    }
}

/// Wait for the background run to leave the live registry. Ctrl-C cancels
/// it at the next step boundary.
async fn await_run(orchestrator: &WorkflowOrchestrator, run_id: RunId) -> anyhow::Result<RunDetails> {
    let mut ctrl_c = pin!(tokio::signal::ctrl_c());
    let mut interval = tokio::time::interval(POLL_INTERVAL);
    let mut interrupted = false;

    loop {
        tokio::select! {
            result = &mut ctrl_c, if !interrupted => {
                result.context("Failed to listen for Ctrl-C")?;
                interrupted = true;
                warn!(run_id = %run_id, "Interrupted, canceling run");
                if let Err(e) = orchestrator.cancel(&run_id).await {
                    warn!(run_id = %run_id, error = %e, "Cancel request failed");
                }
            }
            _ = interval.tick() => {
                if !orchestrator.is_live(&run_id).await {
                    return Ok(orchestrator.get_run(&run_id).await?);
                }
            }
        }
    }
}

fn read_input(source: &InputSource) -> anyhow::Result<String> {
    if let Some(text) = &source.text {
        return Ok(text.clone());
    }

    if let Some(path) = &source.file {
        if path.as_os_str() == "-" {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read draft from stdin")?;
            return Ok(text);
        }
        return std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()));
    }

    if let Some(id) = &source.sample {
        return match sample_by_id(id) {
            Some(sample) => Ok(sample.input_text.to_string()),
            None => {
                let known: Vec<_> = all_samples().iter().map(|s| s.id).collect();
                bail!("Unknown sample '{}' (available: {})", id, known.join(", "))
            }
        };
    }

    bail!("No input given: pass --text, --file or --sample")
}
