use std::sync::Arc;

use async_trait::async_trait;

use super::{stream_completion, SUMMARIZE};
use crate::domain::workflow::{LlmClient, StepError, StepScope, WorkflowContext, WorkflowStep};

#[derive(Debug)]
pub struct SummarizeStep {
    llm: Arc<dyn LlmClient>,
}

impl SummarizeStep {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    fn system_message(ctx: &WorkflowContext) -> String {
        format!(
            "You are a professional communications writer. Create a concise, clear summary of \
             this policy/communication.\n\n\
             Requirements:\n\
             - Write for {}\n\
             - Use plain English, avoid jargon\n\
             - Be concise (max 300 words)\n\
             - Highlight key takeaways\n\
             - Maintain accuracy to source material\n\
             - Structure with clear sections if appropriate\n\
             - Do not invent information not present in the source",
            ctx.options.audience.description()
        )
    }

    fn prompt(ctx: &WorkflowContext) -> String {
        format!(
            "Create a summary of the following policy document:\n\n\
             --- ORIGINAL DOCUMENT ---\n{}\n--- END DOCUMENT ---\n\n\
             --- EXTRACTED FACTS ---\n{}\n--- END FACTS ---\n\n\
             Write a clear, concise summary suitable for the target audience.",
            ctx.normalized_input,
            ctx.extracted_facts_json.as_deref().unwrap_or("{}")
        )
    }
}

#[async_trait]
impl WorkflowStep for SummarizeStep {
    fn name(&self) -> &'static str {
        SUMMARIZE
    }

    fn order(&self) -> u32 {
        3
    }

    fn description(&self) -> &'static str {
        "Draft an audience-specific summary"
    }

    fn uses_llm(&self) -> bool {
        true
    }

    async fn execute(&self, ctx: &mut WorkflowContext, scope: &StepScope) -> Result<(), StepError> {
        let summary = stream_completion(
            self.llm.as_ref(),
            &Self::prompt(ctx),
            &Self::system_message(ctx),
            scope,
        )
        .await?;

        ctx.draft_summary = Some(summary);
        Ok(())
    }
}
