use async_trait::async_trait;
use bytes::Bytes;
use futures::{future, stream, StreamExt};
use serde::{Deserialize, Serialize};

use super::http_client::HttpClientTrait;
use crate::domain::{
    DomainError, FinishReason, LlmProvider, LlmRequest, LlmResponse, LlmStream, Message,
    StreamChunk, Usage,
};

const PROVIDER: &str = "azure_openai";

/// Azure OpenAI API configuration
#[derive(Debug, Clone)]
pub struct AzureOpenAiConfig {
    pub endpoint: String,
    pub api_key: String,
    pub api_version: String,
}

impl AzureOpenAiConfig {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            api_version: "2024-06-01".to_string(),
        }
    }

    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }
}

/// Azure OpenAI chat-completions provider. The `model` argument of each call
/// is the deployment name.
#[derive(Debug)]
pub struct AzureOpenAiProvider<C: HttpClientTrait> {
    client: C,
    config: AzureOpenAiConfig,
}

impl<C: HttpClientTrait> AzureOpenAiProvider<C> {
    pub fn new(client: C, config: AzureOpenAiConfig) -> Self {
        Self { client, config }
    }

    fn build_url(&self, deployment: &str) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.config.endpoint.trim_end_matches('/'),
            deployment,
            self.config.api_version
        )
    }

    fn build_request(&self, request: &LlmRequest) -> serde_json::Value {
        let messages: Vec<AzureMessage> = request.messages.iter().map(AzureMessage::from).collect();

        let mut body = serde_json::json!({
            "messages": messages,
            "stream": request.stream,
        });

        if let Some(temp) = request.temperature {
            body["temperature"] = serde_json::json!(temp);
        }

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        if request.wants_json() {
            body["response_format"] = serde_json::json!({ "type": "json_object" });
        }

        body
    }

    fn headers(&self) -> Vec<(&str, &str)> {
        vec![
            ("api-key", self.config.api_key.as_str()),
            ("Content-Type", "application/json"),
        ]
    }

    fn parse_response(&self, json: serde_json::Value) -> Result<LlmResponse, DomainError> {
        let response: AzureResponse = serde_json::from_value(json).map_err(|e| {
            DomainError::provider(PROVIDER, format!("Failed to parse response: {}", e))
        })?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| DomainError::provider(PROVIDER, "No choices in response"))?;

        let message = Message::assistant(choice.message.content.unwrap_or_default());
        let mut llm_response = LlmResponse::new(response.id, response.model, message);

        if let Some(reason) = choice.finish_reason {
            llm_response = llm_response.with_finish_reason(FinishReason::parse(&reason));
        }

        if let Some(usage) = response.usage {
            llm_response =
                llm_response.with_usage(Usage::new(usage.prompt_tokens, usage.completion_tokens));
        }

        Ok(llm_response)
    }
}

#[async_trait]
impl<C: HttpClientTrait> LlmProvider for AzureOpenAiProvider<C> {
    async fn chat(&self, model: &str, request: LlmRequest) -> Result<LlmResponse, DomainError> {
        let mut req = request;
        req.stream = false;

        let url = self.build_url(model);
        let body = self.build_request(&req);

        let response = self.client.post_json(&url, self.headers(), &body).await?;

        self.parse_response(response)
    }

    async fn chat_stream(&self, model: &str, request: LlmRequest) -> Result<LlmStream, DomainError> {
        let mut req = request;
        req.stream = true;

        let url = self.build_url(model);
        let body = self.build_request(&req);

        let byte_stream = self
            .client
            .post_json_stream(&url, self.headers(), &body)
            .await?;

        let chunks = byte_stream
            .scan(SseDecoder::default(), |decoder, item: Result<Bytes, DomainError>| {
                let decoded = match item {
                    Ok(bytes) => decoder.push(&bytes),
                    Err(e) => vec![Err(e)],
                };
                future::ready(Some(stream::iter(decoded)))
            })
            .flatten();

        Ok(Box::pin(chunks))
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}

/// Splits a server-sent-event byte stream into chunks. Events may straddle
/// network reads, so incomplete lines are buffered.
#[derive(Debug, Default)]
struct SseDecoder {
    buffer: String,
}

impl SseDecoder {
    fn push(&mut self, bytes: &[u8]) -> Vec<Result<StreamChunk, DomainError>> {
        self.buffer.push_str(&String::from_utf8_lossy(bytes));

        let mut out = Vec::new();
        while let Some(newline) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=newline).collect();
            if let Some(chunk) = parse_sse_line(line.trim_end()) {
                out.push(chunk);
            }
        }
        out
    }
}

fn parse_sse_line(line: &str) -> Option<Result<StreamChunk, DomainError>> {
    let data = line.strip_prefix("data:")?.trim();

    if data == "[DONE]" {
        return Some(Ok(StreamChunk::finished(FinishReason::Stop)));
    }

    let chunk = match serde_json::from_str::<AzureStreamChunk>(data) {
        Ok(chunk) => chunk,
        Err(e) => {
            return Some(Err(DomainError::provider(
                PROVIDER,
                format!("Malformed stream event: {}", e),
            )))
        }
    };

    // Azure sends a leading event with content-filter results and no choices
    let choice = chunk.choices.into_iter().next()?;

    Some(Ok(StreamChunk {
        delta: choice.delta.content,
        finish_reason: choice.finish_reason.as_deref().map(FinishReason::parse),
    }))
}

#[derive(Debug, Serialize)]
struct AzureMessage {
    role: &'static str,
    content: String,
}

impl From<&Message> for AzureMessage {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role.as_str(),
            content: message.content.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AzureResponse {
    id: String,
    model: String,
    choices: Vec<AzureChoice>,
    usage: Option<AzureUsage>,
}

#[derive(Debug, Deserialize)]
struct AzureChoice {
    message: AzureResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AzureResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AzureUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct AzureStreamChunk {
    #[serde(default)]
    choices: Vec<AzureStreamChoice>,
}

#[derive(Debug, Deserialize)]
struct AzureStreamChoice {
    #[serde(default)]
    delta: AzureDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AzureDelta {
    content: Option<String>,
}
