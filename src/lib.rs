//! Policy Pack workflow engine
//!
//! Turns a raw policy or communication draft into a compliant, tone-adjusted
//! HTML document through a fixed pipeline of steps:
//! - PII redaction before anything is stored
//! - Per-step persistence of bounded input/output snapshots
//! - Reruns from any completed step, reusing earlier outputs
//! - Cooperative cancellation and fire-and-forget progress events

pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use std::sync::Arc;

use domain::workflow::{LlmClient, ProgressHub};
use infrastructure::{
    compliance::{RegexPiiRedactor, StaticComplianceRules},
    llm::LlmFactory,
    storage::RunStoreFactory,
    workflow::{Pipeline, WorkflowOrchestrator},
};
use tracing::{info, warn};

/// Build the LLM client from configuration.
///
/// With `required` unset a missing endpoint or key yields a client that fails
/// on first use, which is enough for read-only commands.
pub fn create_llm_client(config: &AppConfig, required: bool) -> anyhow::Result<Arc<dyn LlmClient>> {
    match LlmFactory::create(&config.llm) {
        Ok(client) => Ok(client),
        Err(e) if !required => {
            warn!(error = %e, "LLM client not configured");
            Ok(LlmFactory::unconfigured(e.to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

/// Wire the orchestrator: run store from the `storage` section, the standard
/// pipeline over `llm`, regex redaction and the static rules engine
pub async fn create_orchestrator(
    config: &AppConfig,
    llm: Arc<dyn LlmClient>,
    hub: Arc<dyn ProgressHub>,
) -> anyhow::Result<WorkflowOrchestrator> {
    let store = RunStoreFactory::create(&config.storage).await?;
    let pipeline = Pipeline::standard(llm, Arc::new(StaticComplianceRules::new()));

    info!(
        storage = ?config.storage.storage_type,
        steps = pipeline.len(),
        snapshot_max_length = config.workflow.snapshot_max_length,
        "Workflow orchestrator ready"
    );

    Ok(
        WorkflowOrchestrator::new(store, pipeline, Arc::new(RegexPiiRedactor::new()), hub)
            .with_snapshot_max_length(config.workflow.snapshot_max_length),
    )
}
