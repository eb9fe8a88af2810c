use std::sync::Arc;

use async_trait::async_trait;

use super::{stream_completion, TONE_REWRITE};
use crate::domain::workflow::{LlmClient, StepError, StepScope, WorkflowContext, WorkflowStep};

#[derive(Debug)]
pub struct ToneRewriteStep {
    llm: Arc<dyn LlmClient>,
}

impl ToneRewriteStep {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    fn system_message(ctx: &WorkflowContext) -> String {
        format!(
            "You are a brand voice specialist. Rewrite the text to match the target tone while \
             preserving all content.\n\n\
             TARGET TONE: {}\n\n\
             You MUST:\n\
             1. Preserve ALL factual content and meaning exactly\n\
             2. Keep ALL disclaimers exactly as written - do not modify, summarize, or remove them\n\
             3. Maintain ALL legal/compliance language unchanged\n\
             4. Only adjust style, word choice, and phrasing around the protected content",
            ctx.options.tone.guidance()
        )
    }

    fn prompt(ctx: &WorkflowContext, text: &str) -> String {
        format!(
            "Rewrite the following text to match the {} tone:\n\n\
             --- TEXT TO REWRITE ---\n{}\n--- END TEXT ---\n\n\
             Preserve all facts, disclaimers, and compliance language. Only adjust the tone and \
             style.\n\n\
             Output ONLY the rewritten text, no explanations or preamble.",
            ctx.options.tone, text
        )
    }
}

#[async_trait]
impl WorkflowStep for ToneRewriteStep {
    fn name(&self) -> &'static str {
        TONE_REWRITE
    }

    fn order(&self) -> u32 {
        5
    }

    fn description(&self) -> &'static str {
        "Rewrite the compliant text in the requested brand tone"
    }

    fn uses_llm(&self) -> bool {
        true
    }

    async fn execute(&self, ctx: &mut WorkflowContext, scope: &StepScope) -> Result<(), StepError> {
        let source = ctx
            .compliant_text
            .clone()
            .or_else(|| ctx.draft_summary.clone())
            .ok_or_else(|| StepError::collaborator("No compliant text to rewrite"))?;

        let rewritten = stream_completion(
            self.llm.as_ref(),
            &Self::prompt(ctx, &source),
            &Self::system_message(ctx),
            scope,
        )
        .await?;

        ctx.tone_rewritten_text = Some(rewritten);
        Ok(())
    }
}
