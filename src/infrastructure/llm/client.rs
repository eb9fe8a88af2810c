//! Adapts an [`LlmProvider`] deployment to the workflow's [`LlmClient`]

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::StreamExt;
use tracing::debug;

use crate::domain::workflow::{CancellationSignal, LlmClient, TextStream};
use crate::domain::{DomainError, LlmProvider, LlmRequest, LlmResponse};
use crate::infrastructure::observability::{record_llm_request, LlmRequestMetricParams};

const JSON_INSTRUCTION: &str =
    "Respond with a single valid JSON object only. Do not wrap it in Markdown or add commentary.";

/// Sampling settings applied to every request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationSettings {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            max_tokens: 2000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProviderLlmClient {
    provider: Arc<dyn LlmProvider>,
    deployment: String,
    settings: GenerationSettings,
}

impl ProviderLlmClient {
    pub fn new(provider: Arc<dyn LlmProvider>, deployment: impl Into<String>) -> Self {
        Self {
            provider,
            deployment: deployment.into(),
            settings: GenerationSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: GenerationSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn deployment(&self) -> &str {
        &self.deployment
    }

    fn request(&self, prompt: &str, system: Option<&str>, json: bool) -> LlmRequest {
        let builder = if json {
            let system = match system {
                Some(system) if !system.trim().is_empty() => {
                    format!("{}\n\n{}", system, JSON_INSTRUCTION)
                }
                _ => JSON_INSTRUCTION.to_string(),
            };
            LlmRequest::builder().system(system).json_mode()
        } else {
            LlmRequest::builder().system_opt(system)
        };

        builder
            .user(prompt)
            .temperature(self.settings.temperature)
            .max_tokens(self.settings.max_tokens)
            .build()
    }

    fn ensure_not_cancelled(&self, cancel: &CancellationSignal) -> Result<(), DomainError> {
        if cancel.is_cancelled() {
            debug!(deployment = %self.deployment, "Skipping request for a cancelled run");
            return Err(DomainError::Cancelled);
        }
        Ok(())
    }

    async fn complete(&self, request: LlmRequest, mode: &str) -> Result<LlmResponse, DomainError> {
        let start = Instant::now();
        let result = self.provider.chat(&self.deployment, request).await;

        let usage = result.as_ref().ok().and_then(|r| r.usage);
        record_llm_request(LlmRequestMetricParams {
            provider: self.provider.provider_name(),
            model: &self.deployment,
            mode,
            duration: start.elapsed(),
            success: result.is_ok(),
            input_tokens: usage.map(|u| u64::from(u.prompt_tokens)),
            output_tokens: usage.map(|u| u64::from(u.completion_tokens)),
        });

        let response = result?;
        if response.hit_length_limit() {
            debug!(deployment = %self.deployment, "Completion stopped at the token limit");
        }
        Ok(response)
    }
}

#[async_trait]
impl LlmClient for ProviderLlmClient {
    async fn invoke(
        &self,
        prompt: &str,
        system_message: Option<&str>,
        cancel: &CancellationSignal,
    ) -> Result<String, DomainError> {
        self.ensure_not_cancelled(cancel)?;

        let response = self
            .complete(self.request(prompt, system_message, false), "text")
            .await?;

        Ok(response.content().to_string())
    }

    async fn invoke_for_json(
        &self,
        prompt: &str,
        system_message: Option<&str>,
        cancel: &CancellationSignal,
    ) -> Result<String, DomainError> {
        self.ensure_not_cancelled(cancel)?;

        let response = self
            .complete(self.request(prompt, system_message, true), "json")
            .await?;

        let body = strip_code_fence(response.content());
        serde_json::from_str::<serde_json::Value>(body).map_err(|e| {
            DomainError::invalid_response(
                self.provider.provider_name(),
                format!("Model did not return valid JSON: {}", e),
            )
        })?;

        Ok(body.to_string())
    }

    async fn invoke_stream(
        &self,
        prompt: &str,
        system_message: Option<&str>,
        cancel: &CancellationSignal,
    ) -> Result<TextStream, DomainError> {
        self.ensure_not_cancelled(cancel)?;

        let start = Instant::now();
        let result = self
            .provider
            .chat_stream(&self.deployment, self.request(prompt, system_message, false))
            .await;

        record_llm_request(LlmRequestMetricParams {
            provider: self.provider.provider_name(),
            model: &self.deployment,
            mode: "stream",
            duration: start.elapsed(),
            success: result.is_ok(),
            input_tokens: None,
            output_tokens: None,
        });

        let deltas = result?.filter_map(|chunk| async move {
            match chunk {
                Ok(chunk) => chunk.delta.filter(|d| !d.is_empty()).map(Ok),
                Err(e) => Some(Err(e)),
            }
        });

        Ok(Box::pin(deltas))
    }
}

/// Drop a surrounding Markdown code fence (```json ... ```), if any
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };

    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::llm::MockLlmProvider;
    use crate::domain::workflow::cancellation_pair;
    use crate::domain::MessageRole;

    fn client(provider: MockLlmProvider) -> (ProviderLlmClient, Arc<MockLlmProvider>) {
        let provider = Arc::new(provider);
        (ProviderLlmClient::new(provider.clone(), "gpt-4o"), provider)
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("{\"a\":1}"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("  ```\n{}\n```  "), "{}");
    }

    #[tokio::test]
    async fn test_invoke_sends_system_and_prompt() {
        let (client, provider) = client(MockLlmProvider::new("mock").with_content("Answer"));

        let answer = client
            .invoke("Draft", Some("You are a writer"), &CancellationSignal::never())
            .await
            .unwrap();
        assert_eq!(answer, "Answer");

        let request = &provider.requests()[0];
        assert_eq!(request.messages[0].role, MessageRole::System);
        assert_eq!(request.messages[0].content, "You are a writer");
        assert_eq!(request.messages[1].content, "Draft");
        assert!(!request.wants_json());
    }

    #[tokio::test]
    async fn test_invoke_for_json_unwraps_fence() {
        let (client, provider) = client(
            MockLlmProvider::new("mock").with_content("```json\n{\"issues\": []}\n```"),
        );

        let json = client
            .invoke_for_json("text", Some("Check"), &CancellationSignal::never())
            .await
            .unwrap();
        assert_eq!(json, "{\"issues\": []}");

        let request = &provider.requests()[0];
        assert!(request.wants_json());
        assert!(request.messages[0].content.starts_with("Check"));
        assert!(request.messages[0].content.contains("valid JSON"));
    }

    #[tokio::test]
    async fn test_invoke_for_json_rejects_prose() {
        let (client, _) = client(MockLlmProvider::new("mock").with_content("Sure! Here you go"));

        let err = client
            .invoke_for_json("text", None, &CancellationSignal::never())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidResponse { .. }));
    }

    #[tokio::test]
    async fn test_cancelled_signal_skips_provider() {
        let (client, provider) = client(MockLlmProvider::new("mock").with_content("x"));
        let (handle, signal) = cancellation_pair();
        handle.cancel();

        let err = client.invoke("p", None, &signal).await.unwrap_err();
        assert!(matches!(err, DomainError::Cancelled));

        let err = client.invoke_for_json("p", None, &signal).await.unwrap_err();
        assert!(matches!(err, DomainError::Cancelled));
        assert!(provider.requests().is_empty());
    }

    #[tokio::test]
    async fn test_invoke_stream_yields_deltas() {
        let (client, _) = client(MockLlmProvider::new("mock").with_content("one two three"));

        let stream = client
            .invoke_stream("p", None, &CancellationSignal::never())
            .await
            .unwrap();
        let parts: Vec<String> = stream.map(|d| d.unwrap()).collect().await;

        assert_eq!(parts.concat(), "one two three");
        assert_eq!(parts.len(), 3);
    }

    #[tokio::test]
    async fn test_provider_error_propagates() {
        let (client, _) = client(MockLlmProvider::new("mock").with_error("rate limited"));

        let err = client
            .invoke("p", None, &CancellationSignal::never())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("rate limited"));
    }
}
