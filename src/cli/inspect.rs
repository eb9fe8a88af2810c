//! Read-only commands plus `cancel`

use std::sync::Arc;

use anyhow::bail;

use super::output::{print_details, print_json, print_runs, print_steps};
use super::OutputFormat;
use crate::config::AppConfig;
use crate::domain::samples::{all_samples, sample_by_id};
use crate::domain::workflow::RunId;
use crate::infrastructure::progress::LoggingProgressHub;
use crate::infrastructure::workflow::WorkflowOrchestrator;

async fn orchestrator(config: &AppConfig) -> anyhow::Result<WorkflowOrchestrator> {
    let llm = crate::create_llm_client(config, false)?;
    crate::create_orchestrator(config, llm, Arc::new(LoggingProgressHub)).await
}

pub async fn show(
    config: &AppConfig,
    run_id: RunId,
    snapshots: bool,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let details = orchestrator(config).await?.get_run(&run_id).await?;
    print_details(&details, format, snapshots)
}

pub async fn list(
    config: &AppConfig,
    skip: usize,
    take: usize,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let page = orchestrator(config).await?.list_runs(skip, take).await?;

    match format {
        OutputFormat::Json => print_json(&page),
        OutputFormat::Text => {
            print_runs(&page.runs, format)?;
            println!(
                "({} of {} runs, skipping {})",
                page.runs.len(),
                page.total,
                page.skip
            );
            Ok(())
        }
    }
}

pub async fn lineage(config: &AppConfig, run_id: RunId, format: OutputFormat) -> anyhow::Result<()> {
    let runs = orchestrator(config).await?.lineage(&run_id).await?;
    print_runs(&runs, format)
}

pub async fn cancel(config: &AppConfig, run_id: RunId) -> anyhow::Result<()> {
    orchestrator(config).await?.cancel(&run_id).await?;
    println!("Run {} canceled", run_id);
    Ok(())
}

pub async fn steps(config: &AppConfig, format: OutputFormat) -> anyhow::Result<()> {
    let definitions = orchestrator(config).await?.list_step_definitions();
    print_steps(&definitions, format)
}

pub fn samples(id: Option<&str>, format: OutputFormat) -> anyhow::Result<()> {
    let Some(id) = id else {
        return match format {
            OutputFormat::Json => print_json(all_samples()),
            OutputFormat::Text => {
                for sample in all_samples() {
                    println!("{:<18} {}: {}", sample.id, sample.name, sample.description);
                }
                Ok(())
            }
        };
    };

    let Some(sample) = sample_by_id(id) else {
        bail!("Unknown sample '{}'", id);
    };

    match format {
        OutputFormat::Json => print_json(sample),
        OutputFormat::Text => {
            print!("{}", sample.input_text);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_steps_work_without_llm_configuration() {
        let config = AppConfig::default();
        let definitions = orchestrator(&config).await.unwrap().list_step_definitions();
        assert_eq!(definitions.len(), 6);
    }

    #[test]
    fn test_unknown_sample() {
        assert!(samples(Some("missing"), OutputFormat::Text).is_err());
        assert!(samples(Some("hr-policy"), OutputFormat::Json).is_ok());
    }
}
