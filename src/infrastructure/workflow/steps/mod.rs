//! The six pipeline steps

mod compliance_check;
mod extract_facts;
mod intake_normalize;
mod render_final_html;
mod summarize;
mod tone_rewrite;

pub use compliance_check::{ComplianceCheckStep, ComplianceReview};
pub use extract_facts::{ExtractFactsStep, ExtractedEntity, ExtractedFacts};
pub use intake_normalize::{normalize_text, IntakeNormalizeStep};
pub use render_final_html::RenderFinalHtmlStep;
pub use summarize::SummarizeStep;
pub use tone_rewrite::ToneRewriteStep;

use futures::StreamExt;

use crate::domain::workflow::{LlmClient, StepError, StepScope};

pub const INTAKE_NORMALIZE: &str = "intake-normalize";
pub const EXTRACT_FACTS: &str = "extract-facts";
pub const SUMMARIZE: &str = "summarize";
pub const COMPLIANCE_CHECK: &str = "compliance-check";
pub const TONE_REWRITE: &str = "tone-rewrite";
pub const RENDER_FINAL_HTML: &str = "render-final-html";

/// Stream a free-text completion, forwarding each delta to the progress hub.
/// Cancellation is checked between deltas.
async fn stream_completion(
    llm: &dyn LlmClient,
    prompt: &str,
    system: &str,
    scope: &StepScope,
) -> Result<String, StepError> {
    scope.ensure_not_cancelled()?;

    let mut stream = llm
        .invoke_stream(prompt, Some(system), scope.cancel())
        .await?;

    let mut text = String::new();
    while let Some(delta) = stream.next().await {
        scope.ensure_not_cancelled()?;
        let delta = delta?;
        scope.stream_token(&delta).await;
        text.push_str(&delta);
    }

    let text = text.trim().to_string();
    if text.is_empty() {
        return Err(StepError::llm("Model returned an empty response"));
    }
    Ok(text)
}
