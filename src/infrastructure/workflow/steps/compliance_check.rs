use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::COMPLIANCE_CHECK;
use crate::domain::compliance::{ComplianceIssue, ComplianceReport, ComplianceRules};
use crate::domain::workflow::{LlmClient, StepError, StepScope, WorkflowContext, WorkflowStep};

const JSON_EXAMPLE: &str = r#"{"issues": [{"type": "restricted_phrase|missing_disclaimer|ambiguous|legal_risk", "detail": "Description", "severity": "low|med|high"}], "fixed_text": "The corrected text with all issues addressed"}"#;

/// The model's review of the draft
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceReview {
    pub issues: Vec<ComplianceIssue>,
    pub fixed_text: String,
}

impl ComplianceReview {
    pub fn parse(json: &str) -> Result<Self, StepError> {
        serde_json::from_str(json).map_err(|e| {
            StepError::invalid_json(format!("Compliance response is not a valid review: {}", e))
        })
    }
}

/// Rules-engine check followed by a model review. The model's fixed text is
/// adopted only when it reported at least one issue.
#[derive(Debug)]
pub struct ComplianceCheckStep {
    llm: Arc<dyn LlmClient>,
    rules: Arc<dyn ComplianceRules>,
}

impl ComplianceCheckStep {
    pub fn new(llm: Arc<dyn LlmClient>, rules: Arc<dyn ComplianceRules>) -> Self {
        Self { llm, rules }
    }

    fn system_message(&self, report: &ComplianceReport, strict: bool) -> String {
        let restricted = serde_json::to_string(&self.rules.restricted_phrases())
            .unwrap_or_else(|_| "[]".to_string());

        let strict_instruction = if strict {
            format!(
                "STRICT MODE ENABLED: You MUST ensure ALL of the following disclaimers are \
                 included in the fixed_text, word for word: {}",
                report.required_disclaimers.join("; ")
            )
        } else {
            "Include appropriate disclaimers based on the content type.".to_string()
        };

        format!(
            "You are a compliance reviewer. Analyze the text for compliance issues and fix them.\n\n\
             Check for:\n\
             - Restricted phrases that could be misleading: {}\n\
             - Missing required disclaimers\n\
             - Unclear or ambiguous language\n\
             - Potential legal risks\n\
             - Overpromising or absolute guarantees\n\n\
             Output STRICT JSON only. Example format:\n{}\n\n{}\n\n\
             IMPORTANT: fixed_text must be the complete corrected text, not a description of \
             the changes.",
            restricted, JSON_EXAMPLE, strict_instruction
        )
    }

    fn prompt(text: &str, report: &ComplianceReport) -> String {
        let bullets = |items: &[String]| {
            items
                .iter()
                .map(|d| format!("- {}", d))
                .collect::<Vec<_>>()
                .join("\n")
        };

        format!(
            "Review and fix the following text for compliance:\n\n\
             --- TEXT TO REVIEW ---\n{}\n--- END TEXT ---\n\n\
             Required disclaimers for this audience:\n{}\n\n\
             Currently missing disclaimers:\n{}\n\n\
             Output the compliance analysis and fixed text as JSON.",
            text,
            bullets(&report.required_disclaimers),
            bullets(&report.missing_disclaimers)
        )
    }
}

#[async_trait]
impl WorkflowStep for ComplianceCheckStep {
    fn name(&self) -> &'static str {
        COMPLIANCE_CHECK
    }

    fn order(&self) -> u32 {
        4
    }

    fn description(&self) -> &'static str {
        "Check the summary against compliance rules and fix reported issues"
    }

    fn uses_llm(&self) -> bool {
        true
    }

    async fn execute(&self, ctx: &mut WorkflowContext, scope: &StepScope) -> Result<(), StepError> {
        scope.ensure_not_cancelled()?;

        let draft = ctx
            .draft_summary
            .clone()
            .unwrap_or_else(|| ctx.normalized_input.clone());
        let options = ctx.options;

        let report = self
            .rules
            .check(&draft, options.audience, options.strict_compliance);
        for issue in &report.issues {
            ctx.add_warning(format!(
                "Compliance: {} (Severity: {})",
                issue.detail, issue.severity
            ));
        }

        scope.status("Reviewing compliance with the model", None).await;
        let response = self
            .llm
            .invoke_for_json(
                &Self::prompt(&draft, &report),
                Some(&self.system_message(&report, options.strict_compliance)),
                scope.cancel(),
            )
            .await?;

        let review = ComplianceReview::parse(&response)?;

        ctx.compliant_text = if !review.issues.is_empty() && !review.fixed_text.trim().is_empty() {
            Some(review.fixed_text)
        } else {
            Some(draft)
        };
        ctx.compliance_issues_json = Some(response);

        Ok(())
    }
}
