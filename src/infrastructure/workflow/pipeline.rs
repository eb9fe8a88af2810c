//! Fixed, ordered list of pipeline steps

use std::sync::Arc;

use crate::domain::compliance::ComplianceRules;
use crate::domain::workflow::{LlmClient, StepDefinition, WorkflowError, WorkflowStep};

use super::steps::{
    ComplianceCheckStep, ExtractFactsStep, IntakeNormalizeStep, RenderFinalHtmlStep,
    SummarizeStep, ToneRewriteStep,
};

#[derive(Debug, Clone)]
pub struct Pipeline {
    steps: Vec<Arc<dyn WorkflowStep>>,
}

impl Pipeline {
    /// Steps must be given in order with orders `1..=n` and distinct names
    pub fn new(steps: Vec<Arc<dyn WorkflowStep>>) -> Result<Self, WorkflowError> {
        if steps.is_empty() {
            return Err(WorkflowError::configuration("A pipeline needs at least one step"));
        }

        for (index, step) in steps.iter().enumerate() {
            let expected = index as u32 + 1;
            if step.order() != expected {
                return Err(WorkflowError::configuration(format!(
                    "Step '{}' has order {} but is at position {}",
                    step.name(),
                    step.order(),
                    expected
                )));
            }

            if steps[..index].iter().any(|s| s.name() == step.name()) {
                return Err(WorkflowError::configuration(format!(
                    "Duplicate step name '{}'",
                    step.name()
                )));
            }
        }

        Ok(Self { steps })
    }

    /// intake-normalize, extract-facts, summarize, compliance-check,
    /// tone-rewrite, render-final-html
    pub fn standard(llm: Arc<dyn LlmClient>, rules: Arc<dyn ComplianceRules>) -> Self {
        Self {
            steps: vec![
                Arc::new(IntakeNormalizeStep),
                Arc::new(ExtractFactsStep::new(llm.clone())),
                Arc::new(SummarizeStep::new(llm.clone())),
                Arc::new(ComplianceCheckStep::new(llm.clone(), rules)),
                Arc::new(ToneRewriteStep::new(llm)),
                Arc::new(RenderFinalHtmlStep),
            ],
        }
    }

    pub fn steps(&self) -> &[Arc<dyn WorkflowStep>] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn definitions(&self) -> Vec<StepDefinition> {
        self.steps.iter().map(|s| s.definition()).collect()
    }

    /// Zero-based index of the named step
    pub fn position_of(&self, name: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.name() == name)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn WorkflowStep>> {
        self.steps.iter().find(|s| s.name() == name)
    }
}
