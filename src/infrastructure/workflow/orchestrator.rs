//! Sequences the pipeline for a run, persists every step transition and
//! handles reruns and cancellation

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

use super::pipeline::Pipeline;
use crate::domain::compliance::PiiRedactor;
use crate::domain::DomainError;
use crate::domain::workflow::{
    cancellation_pair, truncate, CancellationHandle, CancellationSignal, ProgressHub,
    ProgressReporter, RunDetails, RunId, RunPage, RunStatus, RunStore, StepDefinition, StepError,
    StepScope, StepStatus, WorkflowContext, WorkflowError, WorkflowOptions, WorkflowRun,
    WorkflowStep, WorkflowStepRun, DEFAULT_MAX_LENGTH,
};
use crate::infrastructure::observability::{record_run, record_step};

const CANCELED_MESSAGE: &str = "Run was canceled";

/// A run whose rows are written and which is ready to execute
struct PreparedRun {
    run: WorkflowRun,
    steps: Vec<WorkflowStepRun>,
    context: WorkflowContext,
    start_index: usize,
}

/// How a single step ended
enum StepOutcome {
    Completed(WorkflowContext),
    Failed(String),
    Canceled,
}

/// Runs the pipeline against a [`RunStore`].
///
/// `create_run` and `rerun` return as soon as the rows are written and drive
/// the steps on a spawned task; the `*_and_wait` variants drive them inline.
/// Live runs are tracked in a registry so `cancel` can reach them.
#[derive(Debug, Clone)]
pub struct WorkflowOrchestrator {
    store: Arc<dyn RunStore>,
    pipeline: Pipeline,
    redactor: Arc<dyn PiiRedactor>,
    hub: Arc<dyn ProgressHub>,
    snapshot_max_length: usize,
    live: Arc<Mutex<HashMap<RunId, CancellationHandle>>>,
}

impl WorkflowOrchestrator {
    pub fn new(
        store: Arc<dyn RunStore>,
        pipeline: Pipeline,
        redactor: Arc<dyn PiiRedactor>,
        hub: Arc<dyn ProgressHub>,
    ) -> Self {
        Self {
            store,
            pipeline,
            redactor,
            hub,
            snapshot_max_length: DEFAULT_MAX_LENGTH,
            live: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Bound applied to every persisted snapshot
    pub fn with_snapshot_max_length(mut self, max_length: usize) -> Self {
        self.snapshot_max_length = max_length;
        self
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Start a run in the background and return its id
    #[instrument(skip(self, input_text), fields(input_length = input_text.len()))]
    pub async fn create_run(
        &self,
        input_text: &str,
        options: WorkflowOptions,
    ) -> Result<RunId, WorkflowError> {
        let prepared = self.prepare_run(input_text, options).await?;
        Ok(self.spawn(prepared).await)
    }

    /// Run to completion and return the final state
    #[instrument(skip(self, input_text), fields(input_length = input_text.len()))]
    pub async fn create_run_and_wait(
        &self,
        input_text: &str,
        options: WorkflowOptions,
    ) -> Result<RunDetails, WorkflowError> {
        let prepared = self.prepare_run(input_text, options).await?;
        self.drive_inline(prepared).await
    }

    /// Start a rerun of `parent_id` from `from_step` in the background
    #[instrument(skip(self), fields(parent_run_id = %parent_id))]
    pub async fn rerun(&self, parent_id: &RunId, from_step: &str) -> Result<RunId, WorkflowError> {
        let prepared = self.prepare_rerun(parent_id, from_step).await?;
        Ok(self.spawn(prepared).await)
    }

    #[instrument(skip(self), fields(parent_run_id = %parent_id))]
    pub async fn rerun_and_wait(
        &self,
        parent_id: &RunId,
        from_step: &str,
    ) -> Result<RunDetails, WorkflowError> {
        let prepared = self.prepare_rerun(parent_id, from_step).await?;
        self.drive_inline(prepared).await
    }

    /// Signal a live run, or mark a run that nothing is executing as
    /// canceled. Finished runs cannot be canceled.
    #[instrument(skip(self), fields(run_id = %run_id))]
    pub async fn cancel(&self, run_id: &RunId) -> Result<(), WorkflowError> {
        if let Some(handle) = self.live.lock().await.get(run_id) {
            info!("Cancellation requested for live run");
            handle.cancel();
            return Ok(());
        }

        let mut run = self
            .store
            .get(run_id)
            .await?
            .ok_or_else(|| WorkflowError::run_not_found(run_id.to_string()))?;

        if run.status().is_terminal() {
            return Err(WorkflowError::cannot_cancel(format!(
                "run {} is already {}",
                run_id,
                run.status()
            )));
        }

        run.mark_canceled(None)?;
        match self.store.update(&run).await {
            Ok(_) => {}
            Err(DomainError::Conflict { message }) => {
                return Err(WorkflowError::cannot_cancel(message));
            }
            Err(e) => return Err(e.into()),
        }
        record_run(RunStatus::Canceled, run.is_rerun(), Duration::ZERO);
        info!("Run without an executor marked canceled");
        Ok(())
    }

    pub async fn get_run(&self, run_id: &RunId) -> Result<RunDetails, WorkflowError> {
        let run = self
            .store
            .get(run_id)
            .await?
            .ok_or_else(|| WorkflowError::run_not_found(run_id.to_string()))?;
        let steps = self.store.list_for_run(run_id).await?;
        Ok(RunDetails { run, steps })
    }

    pub fn list_step_definitions(&self) -> Vec<StepDefinition> {
        self.pipeline.definitions()
    }

    pub async fn list_runs(&self, skip: usize, take: usize) -> Result<RunPage, WorkflowError> {
        let runs = self.store.list(skip, take).await?;
        let total = self.store.count().await?;
        Ok(RunPage {
            runs,
            total,
            skip,
            take,
        })
    }

    /// Every run descending from the same origin as `run_id`, oldest first
    pub async fn lineage(&self, run_id: &RunId) -> Result<Vec<WorkflowRun>, WorkflowError> {
        let run = self
            .store
            .get(run_id)
            .await?
            .ok_or_else(|| WorkflowError::run_not_found(run_id.to_string()))?;
        Ok(self.store.lineage(&run.root_run_id()).await?)
    }

    /// Whether a run is currently executing in this process
    pub async fn is_live(&self, run_id: &RunId) -> bool {
        self.live.lock().await.contains_key(run_id)
    }

    async fn prepare_run(
        &self,
        input_text: &str,
        options: WorkflowOptions,
    ) -> Result<PreparedRun, WorkflowError> {
        let redaction = self.redactor.redact(input_text);
        if !redaction.items.is_empty() {
            info!(redacted_items = redaction.items.len(), "Redacted personal data from input");
        }

        let run = self
            .store
            .create(WorkflowRun::new(&redaction.redacted_text, options))
            .await?;

        let mut steps = Vec::with_capacity(self.pipeline.len());
        for step in self.pipeline.steps() {
            let pending = WorkflowStepRun::pending(run.id(), step.name(), step.order());
            steps.push(self.store.create_step(pending).await?);
        }

        let context = WorkflowContext::new(redaction.redacted_text.clone(), options)
            .with_original_input(Some(input_text.to_string()))
            .with_redacted_items(redaction.audit_items());

        Ok(PreparedRun {
            run,
            steps,
            context,
            start_index: 0,
        })
    }

    async fn prepare_rerun(
        &self,
        parent_id: &RunId,
        from_step: &str,
    ) -> Result<PreparedRun, WorkflowError> {
        let parent = self
            .store
            .get(parent_id)
            .await?
            .ok_or_else(|| WorkflowError::run_not_found(parent_id.to_string()))?;

        let reject = |reason: String| WorkflowError::invalid_rerun(parent_id.to_string(), from_step, reason);

        if !parent.status().is_terminal() {
            return Err(reject(format!("parent run is still {}", parent.status())));
        }

        let start_index = self
            .pipeline
            .position_of(from_step)
            .ok_or_else(|| WorkflowError::unknown_step(from_step))?;

        let parent_steps = self.store.list_for_run(parent_id).await?;
        let parent_step = |name: &str| parent_steps.iter().find(|s| s.step_name() == name);

        match parent_step(from_step) {
            Some(step) if step.status() == StepStatus::Completed => {}
            Some(step) => {
                return Err(reject(format!("step was {} in the parent run", step.status())));
            }
            None => return Err(reject("step did not run in the parent run".to_string())),
        }

        let mut copied = Vec::with_capacity(start_index);
        for step in &self.pipeline.steps()[..start_index] {
            match parent_step(step.name()) {
                Some(s) if s.status().has_output() => copied.push(s),
                _ => {
                    return Err(reject(format!(
                        "earlier step '{}' has no output to reuse",
                        step.name()
                    )));
                }
            }
        }

        let context = match copied.last() {
            Some(previous) => {
                let snapshot = previous.output_snapshot().ok_or_else(|| {
                    reject(format!("step '{}' has no output snapshot", previous.step_name()))
                })?;
                if snapshot.is_truncated {
                    return Err(reject(format!(
                        "output of step '{}' was truncated and cannot be restored",
                        previous.step_name()
                    )));
                }
                let mut restored = WorkflowContext::from_snapshot_json(&snapshot.text)?;
                restored.options = parent.options();
                restored
            }
            None => WorkflowContext::new(parent.input_text_redacted(), parent.options()),
        };

        let run = self
            .store
            .create(WorkflowRun::rerun_of(&parent, from_step))
            .await?;

        let mut steps = Vec::with_capacity(self.pipeline.len());
        for (index, step) in self.pipeline.steps().iter().enumerate() {
            let record = match copied.get(index) {
                Some(previous) => WorkflowStepRun::skipped_from(run.id(), previous),
                None => WorkflowStepRun::pending(run.id(), step.name(), step.order()),
            };
            steps.push(self.store.create_step(record).await?);
        }

        info!(run_id = %run.id(), from_step, skipped = start_index, "Prepared rerun");

        Ok(PreparedRun {
            run,
            steps,
            context,
            start_index,
        })
    }

    async fn register(&self, run_id: RunId) -> CancellationSignal {
        let (handle, signal) = cancellation_pair();
        self.live.lock().await.insert(run_id, handle);
        signal
    }

    async fn spawn(&self, prepared: PreparedRun) -> RunId {
        let run_id = prepared.run.id();
        let signal = self.register(run_id).await;
        let this = self.clone();

        tokio::spawn(async move {
            if let Err(e) = this.execute(prepared, signal).await {
                error!(run_id = %run_id, error = %e, "Run aborted");
                this.mark_aborted(&run_id, &e).await;
            }
            this.live.lock().await.remove(&run_id);
        });

        run_id
    }

    async fn drive_inline(&self, prepared: PreparedRun) -> Result<RunDetails, WorkflowError> {
        let run_id = prepared.run.id();
        let signal = self.register(run_id).await;
        let result = self.execute(prepared, signal).await;
        self.live.lock().await.remove(&run_id);

        result?;
        self.get_run(&run_id).await
    }

    /// Best-effort failure marker after a persistence error escaped `execute`
    async fn mark_aborted(&self, run_id: &RunId, cause: &WorkflowError) {
        let Ok(Some(mut run)) = self.store.get(run_id).await else {
            return;
        };
        if run.status() != RunStatus::Running {
            return;
        }
        let duration_ms = run.elapsed_ms().unwrap_or_default();
        if run.mark_failed(cause.to_string(), duration_ms).is_ok() {
            if let Err(e) = self.store.update(&run).await {
                warn!(run_id = %run_id, error = %e, "Could not record aborted run");
            }
        }
    }

    /// Write the run unless the stored copy is already finished. Returns
    /// `false` when another writer got there first.
    async fn persist_run(&self, run: &WorkflowRun) -> Result<bool, WorkflowError> {
        match self.store.update(run).await {
            Ok(_) => Ok(true),
            Err(DomainError::Conflict { message }) => {
                debug!(reason = %message, "Stored run is already finished");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Whether the stored run was canceled by a writer other than this executor
    async fn canceled_in_store(&self, run_id: &RunId) -> Result<bool, WorkflowError> {
        Ok(self
            .store
            .get(run_id)
            .await?
            .is_some_and(|run| run.status() == RunStatus::Canceled))
    }

    /// Report the stored outcome of a run that was finished elsewhere
    async fn adopt_stored_outcome(
        &self,
        run_id: &RunId,
        reporter: &ProgressReporter,
    ) -> Result<WorkflowRun, WorkflowError> {
        let stored = self
            .store
            .get(run_id)
            .await?
            .ok_or_else(|| WorkflowError::run_not_found(run_id.to_string()))?;

        let error = match stored.status() {
            RunStatus::Canceled => Some(CANCELED_MESSAGE),
            RunStatus::Completed => None,
            _ => stored.error(),
        };
        reporter
            .run_completed(stored.status() == RunStatus::Completed, error)
            .await;
        warn!(status = %stored.status(), "Run was finished by another writer");

        Ok(stored)
    }

    #[instrument(skip_all, fields(run_id = %prepared.run.id()))]
    async fn execute(
        &self,
        prepared: PreparedRun,
        signal: CancellationSignal,
    ) -> Result<WorkflowRun, WorkflowError> {
        let PreparedRun {
            mut run,
            mut steps,
            mut context,
            start_index,
        } = prepared;

        let started = Instant::now();
        let reporter = ProgressReporter::new(self.hub.clone(), run.id());

        run.mark_running()?;
        if !self.persist_run(&run).await? {
            return self.adopt_stored_outcome(&run.id(), &reporter).await;
        }
        info!(steps = self.pipeline.len() - start_index, "Run started");

        let mut failure: Option<String> = None;
        let mut canceled = false;

        for (step, record) in self
            .pipeline
            .steps()
            .iter()
            .zip(steps.iter_mut())
            .skip(start_index)
        {
            if signal.is_cancelled() || self.canceled_in_store(&run.id()).await? {
                canceled = true;
                break;
            }

            match self
                .run_step(step.as_ref(), record, &context, &reporter, &signal)
                .await?
            {
                StepOutcome::Completed(next) => context = next,
                StepOutcome::Failed(message) => {
                    failure = Some(format!("Step '{}' failed: {}", step.name(), message));
                    break;
                }
                StepOutcome::Canceled => {
                    canceled = true;
                    break;
                }
            }
        }

        let elapsed = started.elapsed();
        let duration_ms = elapsed.as_millis() as u64;

        if canceled {
            run.mark_canceled(Some(duration_ms))?;
        } else if let Some(error) = &failure {
            run.mark_failed(error, duration_ms)?;
        } else {
            run.mark_completed(context.final_html.take(), duration_ms)?;
        }

        if !self.persist_run(&run).await? {
            let stored = self.adopt_stored_outcome(&run.id(), &reporter).await?;
            record_run(stored.status(), stored.is_rerun(), elapsed);
            return Ok(stored);
        }

        match (run.status(), failure) {
            (RunStatus::Canceled, _) => {
                reporter.run_completed(false, Some(CANCELED_MESSAGE)).await;
                warn!(duration_ms, "Run canceled");
            }
            (_, Some(error)) => {
                reporter.run_completed(false, Some(error.as_str())).await;
                warn!(duration_ms, error = %error, "Run failed");
            }
            _ => {
                reporter.run_completed(true, None).await;
                info!(duration_ms, "Run completed");
            }
        }

        record_run(run.status(), run.is_rerun(), elapsed);
        Ok(run)
    }

    #[instrument(skip_all, fields(step = step.name()))]
    async fn run_step(
        &self,
        step: &dyn WorkflowStep,
        record: &mut WorkflowStepRun,
        context: &WorkflowContext,
        reporter: &ProgressReporter,
        signal: &CancellationSignal,
    ) -> Result<StepOutcome, WorkflowError> {
        let name = step.name();
        let started = Instant::now();

        record.mark_running(truncate(
            context.to_snapshot_json().as_str(),
            self.snapshot_max_length,
        ))?;
        self.store.update_step(record).await?;

        reporter.step_started(name).await;
        reporter
            .step_status(name, &format!("Preparing {}...", name), Some(0))
            .await;

        let scope = StepScope::new(name, signal.clone(), reporter.clone());
        let mut working = context.fork();

        reporter
            .step_status(name, &format!("Initializing {}...", name), Some(10))
            .await;
        let executing = if step.uses_llm() {
            format!("Executing {} with LLM...", name)
        } else {
            format!("Executing {}...", name)
        };
        reporter.step_status(name, &executing, Some(30)).await;

        debug!("Executing step");
        let result = step.execute(&mut working, &scope).await;
        let elapsed = started.elapsed();
        let duration_ms = elapsed.as_millis() as u64;

        match result {
            Ok(()) => {
                reporter
                    .step_status(name, &format!("Processing results from {}...", name), Some(70))
                    .await;
                let output = truncate(
                    working.to_snapshot_json().as_str(),
                    self.snapshot_max_length,
                );

                reporter
                    .step_status(name, &format!("Saving {} results...", name), Some(90))
                    .await;
                record.mark_completed(output, working.warnings.clone(), duration_ms)?;
                self.store.update_step(record).await?;

                reporter
                    .step_status(name, &format!("{} completed", name), Some(100))
                    .await;
                reporter.step_completed(name, duration_ms).await;
                record_step(name, StepStatus::Completed, elapsed);
                info!(duration_ms, warnings = working.warnings.len(), "Step completed");

                Ok(StepOutcome::Completed(working))
            }
            Err(e) => {
                let message = e.to_string();
                record.mark_failed(&message, duration_ms)?;
                self.store.update_step(record).await?;

                reporter.step_failed(name, &message).await;
                record_step(name, StepStatus::Failed, elapsed);

                if e == StepError::Cancelled {
                    info!(duration_ms, "Step stopped by cancellation");
                    Ok(StepOutcome::Canceled)
                } else {
                    warn!(duration_ms, error = %message, "Step failed");
                    Ok(StepOutcome::Failed(message))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tokio_test::{assert_err, assert_ok};

    use crate::domain::workflow::{
        FailingProgressHub, RecordingProgressHub, ScriptedLlmClient, WorkflowRunRepository,
    };
    use crate::infrastructure::compliance::{RegexPiiRedactor, StaticComplianceRules};
    use crate::infrastructure::storage::InMemoryRunStore;
    use crate::infrastructure::workflow::steps::{
        IntakeNormalizeStep, COMPLIANCE_CHECK, EXTRACT_FACTS, INTAKE_NORMALIZE,
        RENDER_FINAL_HTML, SUMMARIZE, TONE_REWRITE,
    };

    const INPUT: &str = "My email is a@b.com, refund my $50 charge";

    const FACTS: &str = r#"{"entities": [], "key_points": ["Customer wants a refund"], "risks": [], "required_disclaimers": []}"#;
    const CLEAN_REVIEW: &str = r#"{"issues": [], "fixed_text": ""}"#;

    fn scripted() -> ScriptedLlmClient {
        ScriptedLlmClient::new()
            .on("document analysis expert", FACTS)
            .on("communications writer", "The customer asks for a refund of a $50 charge.")
            .on("compliance reviewer", CLEAN_REVIEW)
            .on("brand voice specialist", "We are processing your refund of $50.")
    }

    struct Harness {
        orchestrator: WorkflowOrchestrator,
        store: Arc<InMemoryRunStore>,
        llm: Arc<ScriptedLlmClient>,
        hub: Arc<RecordingProgressHub>,
    }

    fn harness(llm: ScriptedLlmClient) -> Harness {
        let store = Arc::new(InMemoryRunStore::new());
        let llm = Arc::new(llm);
        let hub = Arc::new(RecordingProgressHub::new());
        let pipeline = Pipeline::standard(llm.clone(), Arc::new(StaticComplianceRules::new()));
        let orchestrator = WorkflowOrchestrator::new(
            store.clone(),
            pipeline,
            Arc::new(RegexPiiRedactor::new()),
            hub.clone(),
        );

        Harness {
            orchestrator,
            store,
            llm,
            hub,
        }
    }

    #[tokio::test]
    async fn test_run_redacts_and_completes_all_steps() {
        let h = harness(scripted());

        let details = h
            .orchestrator
            .create_run_and_wait(INPUT, WorkflowOptions::default())
            .await
            .unwrap();

        assert_eq!(details.run.status(), RunStatus::Completed);
        assert_eq!(details.steps.len(), 6);
        assert_eq!(details.count_with_status(StepStatus::Completed), 6);
        assert!(details.run.final_output_html().unwrap().contains("<html"));
        assert!(details.run.total_duration_ms().is_some());

        assert!(details.run.input_text_redacted().contains("[EMAIL_1]"));
        assert!(!details.run.input_text_redacted().contains("a@b.com"));

        let intake = details.step(INTAKE_NORMALIZE).unwrap();
        let input = &intake.input_snapshot().unwrap().text;
        assert_eq!(input.matches("\"type\": \"email\"").count(), 1);

        for step in &details.steps {
            assert!(!step.input_snapshot().unwrap().text.contains("a@b.com"));
            assert!(!step.output_snapshot().unwrap().text.contains("a@b.com"));
        }
        assert!(!h.orchestrator.is_live(&details.run.id()).await);
    }

    #[tokio::test]
    async fn test_progress_events_in_order() {
        let h = harness(scripted());
        h.orchestrator
            .create_run_and_wait(INPUT, WorkflowOptions::default())
            .await
            .unwrap();

        let kinds = h.hub.kinds();
        assert_eq!(kinds.first(), Some(&"step_started"));
        assert_eq!(kinds.last(), Some(&"run_completed"));
        assert_eq!(kinds.iter().filter(|k| **k == "step_started").count(), 6);
        assert_eq!(kinds.iter().filter(|k| **k == "step_completed").count(), 6);
        assert!(kinds.contains(&"llm_stream"));

        let percents: Vec<u8> = h
            .hub
            .events()
            .into_iter()
            .filter_map(|e| match e {
                crate::domain::workflow::ProgressEvent::StepStatus {
                    step_name, percent, ..
                } if step_name == INTAKE_NORMALIZE => percent,
                _ => None,
            })
            .collect();
        assert_eq!(percents, vec![0, 10, 30, 70, 90, 100]);
    }

    #[tokio::test]
    async fn test_rerun_skips_earlier_steps() {
        let h = harness(scripted());
        let parent = h
            .orchestrator
            .create_run_and_wait(INPUT, WorkflowOptions::default())
            .await
            .unwrap();

        let rerun = h
            .orchestrator
            .rerun_and_wait(&parent.run.id(), SUMMARIZE)
            .await
            .unwrap();

        assert_eq!(rerun.run.status(), RunStatus::Completed);
        assert_eq!(rerun.run.rerun_from_step(), Some(SUMMARIZE));
        assert_eq!(rerun.run.parent_run_id(), Some(parent.run.id()));
        assert_eq!(rerun.run.root_run_id(), parent.run.id());

        for name in [INTAKE_NORMALIZE, EXTRACT_FACTS] {
            let copied = rerun.step(name).unwrap();
            let original = parent.step(name).unwrap();
            assert_eq!(copied.status(), StepStatus::Skipped);
            assert_eq!(copied.output_snapshot(), original.output_snapshot());
            assert_eq!(copied.input_snapshot(), original.input_snapshot());
            assert_eq!(copied.warnings(), original.warnings());
        }
        for name in [SUMMARIZE, COMPLIANCE_CHECK, TONE_REWRITE, RENDER_FINAL_HTML] {
            assert_eq!(rerun.step_status(name), Some(StepStatus::Completed));
        }

        // Facts were not extracted a second time
        assert_eq!(h.llm.calls_matching("document analysis expert"), 1);
        assert_eq!(h.llm.calls_matching("communications writer"), 2);
    }

    #[tokio::test]
    async fn test_rerun_from_first_step_runs_everything() {
        let h = harness(scripted());
        let parent = h
            .orchestrator
            .create_run_and_wait(INPUT, WorkflowOptions::default())
            .await
            .unwrap();

        let rerun = h
            .orchestrator
            .rerun_and_wait(&parent.run.id(), INTAKE_NORMALIZE)
            .await
            .unwrap();

        assert_eq!(rerun.count_with_status(StepStatus::Completed), 6);
        assert_eq!(rerun.count_with_status(StepStatus::Skipped), 0);
        assert_eq!(
            rerun.run.input_text_redacted(),
            parent.run.input_text_redacted()
        );
    }

    #[tokio::test]
    async fn test_rerun_unknown_step_writes_nothing() {
        let h = harness(scripted());
        let parent = h
            .orchestrator
            .create_run_and_wait(INPUT, WorkflowOptions::default())
            .await
            .unwrap();

        let result = h.orchestrator.rerun(&parent.run.id(), "bogus-step").await;

        assert_eq!(result, Err(WorkflowError::unknown_step("bogus-step")));
        assert_eq!(h.store.count().await.unwrap(), 1);
        assert!(h.store.children(&parent.run.id()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rerun_missing_parent() {
        let h = harness(scripted());
        let result = h.orchestrator.rerun(&RunId::generate(), SUMMARIZE).await;
        assert!(matches!(result, Err(WorkflowError::RunNotFound(_))));
    }

    #[tokio::test]
    async fn test_invalid_json_fails_run_and_leaves_later_steps_pending() {
        let h = harness(
            ScriptedLlmClient::new()
                .on("document analysis expert", FACTS)
                .on("compliance reviewer", "Sorry, I cannot produce JSON today."),
        );

        let details = h
            .orchestrator
            .create_run_and_wait(INPUT, WorkflowOptions::default())
            .await
            .unwrap();

        assert_eq!(details.run.status(), RunStatus::Failed);
        assert!(details.run.error().unwrap().contains(COMPLIANCE_CHECK));

        let failed = details.step(COMPLIANCE_CHECK).unwrap();
        assert_eq!(failed.status(), StepStatus::Failed);
        assert!(!failed.error().unwrap_or_default().is_empty());

        assert_eq!(details.step_status(TONE_REWRITE), Some(StepStatus::Pending));
        assert_eq!(details.step_status(RENDER_FINAL_HTML), Some(StepStatus::Pending));
        assert_eq!(details.count_with_status(StepStatus::Completed), 3);
        assert_eq!(details.count_with_status(StepStatus::Skipped), 0);

        assert!(h.hub.kinds().contains(&"step_failed"));
    }

    #[tokio::test]
    async fn test_rerun_rejects_failed_or_unreached_step() {
        let h = harness(
            ScriptedLlmClient::new()
                .on("document analysis expert", FACTS)
                .on("compliance reviewer", "not json"),
        );
        let parent = h
            .orchestrator
            .create_run_and_wait(INPUT, WorkflowOptions::default())
            .await
            .unwrap();

        for step in [COMPLIANCE_CHECK, TONE_REWRITE] {
            let result = h.orchestrator.rerun(&parent.run.id(), step).await;
            assert!(matches!(result, Err(WorkflowError::InvalidRerun { .. })));
        }
        assert_eq!(h.store.count().await.unwrap(), 1);

        let retried = h
            .orchestrator
            .rerun_and_wait(&parent.run.id(), SUMMARIZE)
            .await
            .unwrap();
        assert_eq!(retried.run.status(), RunStatus::Failed);
        assert_eq!(retried.step_status(INTAKE_NORMALIZE), Some(StepStatus::Skipped));
    }

    #[tokio::test]
    async fn test_rerun_rejects_truncated_predecessor() {
        let mut h = harness(scripted());
        h.orchestrator = h.orchestrator.clone().with_snapshot_max_length(64);

        let parent = h
            .orchestrator
            .create_run_and_wait(INPUT, WorkflowOptions::default())
            .await
            .unwrap();
        let snapshot = parent.step(EXTRACT_FACTS).unwrap().output_snapshot().unwrap();
        assert!(snapshot.is_truncated);
        assert_eq!(snapshot.text.chars().count(), 64);

        let result = h.orchestrator.rerun(&parent.run.id(), SUMMARIZE).await;
        assert!(matches!(result, Err(WorkflowError::InvalidRerun { .. })));
    }

    #[tokio::test]
    async fn test_failing_hub_does_not_fail_run() {
        let store = Arc::new(InMemoryRunStore::new());
        let llm: Arc<ScriptedLlmClient> = Arc::new(scripted());
        let orchestrator = WorkflowOrchestrator::new(
            store,
            Pipeline::standard(llm, Arc::new(StaticComplianceRules::new())),
            Arc::new(RegexPiiRedactor::new()),
            Arc::new(FailingProgressHub),
        );

        let details = orchestrator
            .create_run_and_wait(INPUT, WorkflowOptions::default())
            .await
            .unwrap();
        assert_eq!(details.run.status(), RunStatus::Completed);
    }

    #[tokio::test]
    async fn test_lineage_shares_root() {
        let h = harness(scripted());
        let origin = h
            .orchestrator
            .create_run_and_wait(INPUT, WorkflowOptions::default())
            .await
            .unwrap();
        let first = h
            .orchestrator
            .rerun_and_wait(&origin.run.id(), TONE_REWRITE)
            .await
            .unwrap();
        let second = h
            .orchestrator
            .rerun_and_wait(&first.run.id(), RENDER_FINAL_HTML)
            .await
            .unwrap();

        assert_eq!(second.run.parent_run_id(), Some(first.run.id()));
        assert_eq!(second.run.root_run_id(), origin.run.id());

        let lineage = h.orchestrator.lineage(&second.run.id()).await.unwrap();
        let ids: Vec<_> = lineage.iter().map(WorkflowRun::id).collect();
        assert_eq!(ids, vec![origin.run.id(), first.run.id(), second.run.id()]);
    }

    #[tokio::test]
    async fn test_list_runs_and_definitions() {
        let h = harness(scripted());
        for _ in 0..3 {
            h.orchestrator
                .create_run_and_wait("Short note", WorkflowOptions::default())
                .await
                .unwrap();
        }

        let page = h.orchestrator.list_runs(1, 1).await.unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.runs.len(), 1);

        let names: Vec<_> = h
            .orchestrator
            .list_step_definitions()
            .iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(
            names,
            vec![
                INTAKE_NORMALIZE,
                EXTRACT_FACTS,
                SUMMARIZE,
                COMPLIANCE_CHECK,
                TONE_REWRITE,
                RENDER_FINAL_HTML
            ]
        );
    }

    #[tokio::test]
    async fn test_cancel_finished_or_unknown_run() {
        let h = harness(scripted());
        let details = h
            .orchestrator
            .create_run_and_wait(INPUT, WorkflowOptions::default())
            .await
            .unwrap();

        let err = assert_err!(h.orchestrator.cancel(&details.run.id()).await);
        assert!(matches!(err, WorkflowError::CannotCancel(_)));

        let err = assert_err!(h.orchestrator.cancel(&RunId::generate()).await);
        assert!(matches!(err, WorkflowError::RunNotFound(_)));
    }

    #[tokio::test]
    async fn test_cancel_orphaned_pending_run() {
        let h = harness(scripted());
        let orphan = WorkflowRun::new("text", WorkflowOptions::default());
        h.store.create(orphan.clone()).await.unwrap();

        assert_ok!(h.orchestrator.cancel(&orphan.id()).await);

        let run = h.store.get(&orphan.id()).await.unwrap().unwrap();
        assert_eq!(run.status(), RunStatus::Canceled);
    }

    /// Holds the pipeline until the run is canceled, then finishes normally
    #[derive(Debug)]
    struct WaitForCancel;

    #[async_trait]
    impl WorkflowStep for WaitForCancel {
        fn name(&self) -> &'static str {
            "wait"
        }

        fn order(&self) -> u32 {
            2
        }

        fn description(&self) -> &'static str {
            "Blocks until canceled"
        }

        fn uses_llm(&self) -> bool {
            false
        }

        async fn execute(
            &self,
            _ctx: &mut WorkflowContext,
            scope: &StepScope,
        ) -> Result<(), StepError> {
            scope.cancel().cancelled().await;
            Ok(())
        }
    }

    #[derive(Debug)]
    struct NeverReached;

    #[async_trait]
    impl WorkflowStep for NeverReached {
        fn name(&self) -> &'static str {
            "never"
        }

        fn order(&self) -> u32 {
            3
        }

        fn description(&self) -> &'static str {
            "Must not run after cancellation"
        }

        fn uses_llm(&self) -> bool {
            false
        }

        async fn execute(
            &self,
            _ctx: &mut WorkflowContext,
            _scope: &StepScope,
        ) -> Result<(), StepError> {
            Err(StepError::collaborator("ran after cancellation"))
        }
    }

    async fn wait_for<F>(orchestrator: &WorkflowOrchestrator, run_id: &RunId, done: F) -> RunDetails
    where
        F: Fn(&RunDetails) -> bool,
    {
        for _ in 0..400 {
            let details = orchestrator.get_run(run_id).await.unwrap();
            if done(&details) {
                return details;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("run {} never reached the expected state", run_id);
    }

    #[tokio::test]
    async fn test_cancel_live_run_at_step_boundary() {
        let store = Arc::new(InMemoryRunStore::new());
        let hub = Arc::new(RecordingProgressHub::new());
        let pipeline = Pipeline::new(vec![
            Arc::new(IntakeNormalizeStep),
            Arc::new(WaitForCancel),
            Arc::new(NeverReached),
        ])
        .unwrap();
        let orchestrator = WorkflowOrchestrator::new(
            store,
            pipeline,
            Arc::new(RegexPiiRedactor::new()),
            hub.clone(),
        );

        let run_id = orchestrator
            .create_run(INPUT, WorkflowOptions::default())
            .await
            .unwrap();
        wait_for(&orchestrator, &run_id, |d| {
            d.step_status("wait") == Some(StepStatus::Running)
        })
        .await;
        assert!(orchestrator.is_live(&run_id).await);

        orchestrator.cancel(&run_id).await.unwrap();

        let details = wait_for(&orchestrator, &run_id, |d| d.run.status().is_terminal()).await;
        assert_eq!(details.run.status(), RunStatus::Canceled);
        assert_eq!(details.step_status(INTAKE_NORMALIZE), Some(StepStatus::Completed));
        assert_eq!(details.step_status("wait"), Some(StepStatus::Completed));
        assert_eq!(details.step_status("never"), Some(StepStatus::Pending));

        // The registry entry goes away once the task exits
        for _ in 0..100 {
            if !orchestrator.is_live(&run_id).await {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(!orchestrator.is_live(&run_id).await);
        assert!(hub.events().iter().any(|e| matches!(
            e,
            crate::domain::workflow::ProgressEvent::RunCompleted { success: false, .. }
        )));
    }

    /// Gives another writer time to act while the step is running
    #[derive(Debug)]
    struct SlowStep;

    #[async_trait]
    impl WorkflowStep for SlowStep {
        fn name(&self) -> &'static str {
            "slow"
        }

        fn order(&self) -> u32 {
            1
        }

        fn description(&self) -> &'static str {
            "Sleeps for 200 ms"
        }

        fn uses_llm(&self) -> bool {
            false
        }

        async fn execute(
            &self,
            _ctx: &mut WorkflowContext,
            _scope: &StepScope,
        ) -> Result<(), StepError> {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(())
        }
    }

    fn orchestrator_over(
        store: Arc<InMemoryRunStore>,
        steps: Vec<Arc<dyn WorkflowStep>>,
        hub: Arc<dyn ProgressHub>,
    ) -> WorkflowOrchestrator {
        WorkflowOrchestrator::new(
            store,
            Pipeline::new(steps).unwrap(),
            Arc::new(RegexPiiRedactor::new()),
            hub,
        )
    }

    async fn wait_until_idle(orchestrator: &WorkflowOrchestrator, run_id: &RunId) {
        for _ in 0..200 {
            if !orchestrator.is_live(run_id).await {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("run {} is still executing", run_id);
    }

    #[tokio::test]
    async fn test_cancel_from_other_process_survives_finalization() {
        let store = Arc::new(InMemoryRunStore::new());
        let hub = Arc::new(RecordingProgressHub::new());
        let executor = orchestrator_over(store.clone(), vec![Arc::new(SlowStep)], hub.clone());
        let other = orchestrator_over(
            store.clone(),
            vec![Arc::new(SlowStep)],
            Arc::new(RecordingProgressHub::new()),
        );

        let run_id = executor
            .create_run(INPUT, WorkflowOptions::default())
            .await
            .unwrap();
        wait_for(&other, &run_id, |d| d.step_status("slow") == Some(StepStatus::Running)).await;
        assert!(!other.is_live(&run_id).await);

        assert_ok!(other.cancel(&run_id).await);
        wait_until_idle(&executor, &run_id).await;

        let details = other.get_run(&run_id).await.unwrap();
        assert_eq!(details.run.status(), RunStatus::Canceled);
        assert_eq!(details.run.final_output_html(), None);
        assert!(hub.events().iter().any(|e| matches!(
            e,
            crate::domain::workflow::ProgressEvent::RunCompleted { success: false, .. }
        )));
    }

    #[tokio::test]
    async fn test_cancel_from_other_process_stops_at_next_step() {
        let store = Arc::new(InMemoryRunStore::new());
        let steps: Vec<Arc<dyn WorkflowStep>> = vec![Arc::new(SlowStep), Arc::new(WaitForCancel)];
        let executor = orchestrator_over(
            store.clone(),
            steps.clone(),
            Arc::new(RecordingProgressHub::new()),
        );
        let other = orchestrator_over(store, steps, Arc::new(RecordingProgressHub::new()));

        let run_id = executor
            .create_run(INPUT, WorkflowOptions::default())
            .await
            .unwrap();
        wait_for(&other, &run_id, |d| d.step_status("slow") == Some(StepStatus::Running)).await;

        assert_ok!(other.cancel(&run_id).await);
        wait_until_idle(&executor, &run_id).await;

        let details = other.get_run(&run_id).await.unwrap();
        assert_eq!(details.run.status(), RunStatus::Canceled);
        assert_eq!(details.step_status("slow"), Some(StepStatus::Completed));
        assert_eq!(details.step_status("wait"), Some(StepStatus::Pending));
    }

    #[tokio::test]
    async fn test_cancel_before_executor_registers() {
        let h = harness(scripted());
        let prepared = h
            .orchestrator
            .prepare_run(INPUT, WorkflowOptions::default())
            .await
            .unwrap();
        let run_id = prepared.run.id();

        assert_ok!(h.orchestrator.cancel(&run_id).await);
        let details = h.orchestrator.drive_inline(prepared).await.unwrap();

        assert_eq!(details.run.status(), RunStatus::Canceled);
        assert_eq!(details.count_with_status(StepStatus::Pending), 6);
        assert_eq!(h.llm.total_calls(), 0);
    }

    /// Cancels its run through the orchestrator when the compliance step is
    /// about to call the model
    #[derive(Debug, Default)]
    struct CancelBeforeReview {
        orchestrator: std::sync::OnceLock<WorkflowOrchestrator>,
    }

    #[async_trait]
    impl ProgressHub for CancelBeforeReview {
        async fn publish(
            &self,
            event: crate::domain::workflow::ProgressEvent,
        ) -> Result<(), DomainError> {
            if let crate::domain::workflow::ProgressEvent::StepStatus {
                run_id, message, ..
            } = &event
            {
                let orchestrator = self.orchestrator.get();
                if let Some(orchestrator) =
                    orchestrator.filter(|_| message.starts_with("Reviewing compliance"))
                {
                    orchestrator
                        .cancel(run_id)
                        .await
                        .map_err(|e| DomainError::notification(e.to_string()))?;
                }
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_cancel_during_step_before_model_call_cancels_run() {
        let llm = Arc::new(scripted());
        let hub = Arc::new(CancelBeforeReview::default());
        let orchestrator = orchestrator_over(
            Arc::new(InMemoryRunStore::new()),
            Pipeline::standard(llm.clone(), Arc::new(StaticComplianceRules::new()))
                .steps()
                .to_vec(),
            hub.clone(),
        );
        hub.orchestrator.set(orchestrator.clone()).unwrap();

        let details = orchestrator
            .create_run_and_wait(INPUT, WorkflowOptions::default())
            .await
            .unwrap();

        assert_eq!(details.run.status(), RunStatus::Canceled);
        let step = details.step(COMPLIANCE_CHECK).unwrap();
        assert_eq!(step.status(), StepStatus::Failed);
        assert_eq!(step.error(), Some("Step was cancelled"));
        assert_eq!(details.step_status(TONE_REWRITE), Some(StepStatus::Pending));
        assert_eq!(llm.calls_matching("compliance reviewer"), 0);
    }

    #[tokio::test]
    async fn test_aborted_run_records_elapsed_time() {
        let h = harness(scripted());
        let mut run = WorkflowRun::new("x", WorkflowOptions::default());
        run.mark_running().unwrap();
        h.store.create(run.clone()).await.unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        h.orchestrator
            .mark_aborted(&run.id(), &WorkflowError::configuration("database went away"))
            .await;

        let stored = h.store.get(&run.id()).await.unwrap().unwrap();
        assert_eq!(stored.status(), RunStatus::Failed);
        assert!(stored.total_duration_ms().unwrap() >= 20);
    }

    #[tokio::test]
    async fn test_background_run_completes() {
        let h = harness(scripted());
        let run_id = h
            .orchestrator
            .create_run(INPUT, WorkflowOptions::default())
            .await
            .unwrap();

        let details = wait_for(&h.orchestrator, &run_id, |d| d.run.status().is_terminal()).await;
        assert_eq!(details.run.status(), RunStatus::Completed);
    }
}
