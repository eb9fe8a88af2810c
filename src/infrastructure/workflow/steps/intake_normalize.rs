use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use super::INTAKE_NORMALIZE;
use crate::domain::workflow::{StepError, StepScope, WorkflowContext, WorkflowStep};

static EXCESSIVE_NEWLINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());
static REPEATED_SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]{2,}").unwrap());
static CONTROL_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\x00-\x08\x0B\x0C\x0E-\x1F]").unwrap());

const SHORT_INPUT_CHARS: usize = 50;

/// Whitespace and control-character cleanup applied before any model sees
/// the text
pub fn normalize_text(input: &str) -> String {
    let text = input.replace("\r\n", "\n").replace('\r', "\n");
    let text = EXCESSIVE_NEWLINES.replace_all(&text, "\n\n");
    let text = REPEATED_SPACES.replace_all(&text, " ");

    let text = text.split('\n').map(str::trim).collect::<Vec<_>>().join("\n");
    let text = CONTROL_CHARS.replace_all(&text, "");

    text.trim().to_string()
}

#[derive(Debug, Default)]
pub struct IntakeNormalizeStep;

#[async_trait]
impl WorkflowStep for IntakeNormalizeStep {
    fn name(&self) -> &'static str {
        INTAKE_NORMALIZE
    }

    fn order(&self) -> u32 {
        1
    }

    fn description(&self) -> &'static str {
        "Normalize line endings, whitespace and control characters"
    }

    fn uses_llm(&self) -> bool {
        false
    }

    async fn execute(&self, ctx: &mut WorkflowContext, scope: &StepScope) -> Result<(), StepError> {
        scope.ensure_not_cancelled()?;

        let normalized = normalize_text(&ctx.normalized_input);

        if normalized.is_empty() {
            ctx.add_warning("Input text is empty after normalization.");
        } else if normalized.chars().count() < SHORT_INPUT_CHARS {
            ctx.add_warning(
                "Input text is very short (less than 50 characters). Results may be limited.",
            );
        }

        ctx.normalized_input = normalized;
        Ok(())
    }
}
