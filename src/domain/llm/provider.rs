use async_trait::async_trait;
use futures::Stream;
use std::fmt::Debug;
use std::pin::Pin;

use super::response::StreamChunk;
use super::{LlmRequest, LlmResponse};
use crate::domain::DomainError;

/// Stream type for LLM responses
pub type LlmStream = Pin<Box<dyn Stream<Item = Result<StreamChunk, DomainError>> + Send>>;

/// Chat-completion backend (Azure OpenAI deployments, ...)
#[async_trait]
pub trait LlmProvider: Send + Sync + Debug {
    /// Send a chat completion request to `model` (a deployment name for Azure)
    async fn chat(&self, model: &str, request: LlmRequest) -> Result<LlmResponse, DomainError>;

    /// Send a streaming chat completion request
    async fn chat_stream(&self, model: &str, request: LlmRequest)
        -> Result<LlmStream, DomainError>;

    fn provider_name(&self) -> &'static str;
}
