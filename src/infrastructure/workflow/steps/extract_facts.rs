use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::EXTRACT_FACTS;
use crate::domain::workflow::{LlmClient, StepError, StepScope, WorkflowContext, WorkflowStep};

const SYSTEM_MESSAGE: &str = r#"You are a document analysis expert. Extract structured information from the policy or communication text.

Output STRICT JSON only with this exact schema:
{
  "entities": [{"type": "person|organization|date|amount|product|contact", "value": "..."}],
  "key_points": ["Main point 1", "Main point 2"],
  "risks": ["Potential risk or unclear area"],
  "required_disclaimers": ["Any legally required disclaimers based on content type"]
}

Guidelines:
- Contact details appear as placeholders such as [EMAIL_1] or [PHONE_1]; keep them as placeholders
- Identify the key policy points readers need to understand
- Flag risks or unclear language that could cause confusion
- Suggest disclaimers that should be included based on the content type

Do not include any text outside the JSON object."#;

/// Structured facts the model extracts from the input
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractedFacts {
    pub entities: Vec<ExtractedEntity>,
    pub key_points: Vec<String>,
    pub risks: Vec<String>,
    pub required_disclaimers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedEntity {
    #[serde(rename = "type")]
    pub entity_type: String,
    pub value: String,
}

impl ExtractedFacts {
    /// Parse a model response, requiring a JSON object
    pub fn parse(json: &str) -> Result<Self, StepError> {
        let value: serde_json::Value = serde_json::from_str(json)
            .map_err(|e| StepError::invalid_json(format!("Facts response is not JSON: {}", e)))?;

        if !value.is_object() {
            return Err(StepError::invalid_json("Facts response must be a JSON object"));
        }

        serde_json::from_value(value).map_err(|e| {
            StepError::invalid_json(format!("Facts response does not match the schema: {}", e))
        })
    }
}

#[derive(Debug)]
pub struct ExtractFactsStep {
    llm: Arc<dyn LlmClient>,
}

impl ExtractFactsStep {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    fn prompt(ctx: &WorkflowContext) -> String {
        format!(
            "Analyze the following policy/communication text and extract structured information:\n\n\
             ---\n{}\n---\n\n\
             Remember: Output only valid JSON matching the specified schema.",
            ctx.normalized_input
        )
    }
}

#[async_trait]
impl WorkflowStep for ExtractFactsStep {
    fn name(&self) -> &'static str {
        EXTRACT_FACTS
    }

    fn order(&self) -> u32 {
        2
    }

    fn description(&self) -> &'static str {
        "Extract entities, key points, risks and disclaimers as JSON"
    }

    fn uses_llm(&self) -> bool {
        true
    }

    async fn execute(&self, ctx: &mut WorkflowContext, scope: &StepScope) -> Result<(), StepError> {
        scope.ensure_not_cancelled()?;

        let response = self
            .llm
            .invoke_for_json(&Self::prompt(ctx), Some(SYSTEM_MESSAGE), scope.cancel())
            .await?;

        let facts = ExtractedFacts::parse(&response)?;
        if facts.key_points.is_empty() {
            ctx.add_warning("No key points were extracted from the input.");
        }

        ctx.extracted_facts_json = Some(response);
        Ok(())
    }
}
