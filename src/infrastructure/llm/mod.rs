//! LLM provider implementations

mod azure_openai;
mod client;
mod factory;
mod http_client;

pub use azure_openai::{AzureOpenAiConfig, AzureOpenAiProvider};
pub use client::{GenerationSettings, ProviderLlmClient};
pub use factory::{LlmFactory, LlmProviderConfig};
pub use http_client::{ByteStream, HttpClient, HttpClientTrait};
