use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::client::{GenerationSettings, ProviderLlmClient};
use super::http_client::HttpClient;
use super::{AzureOpenAiConfig, AzureOpenAiProvider};
use crate::domain::workflow::{CancellationSignal, LlmClient};
use crate::domain::{DomainError, LlmProvider};

/// `llm` configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct LlmProviderConfig {
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_deployment")]
    pub deployment: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_deployment() -> String {
    "gpt-4o-mini".to_string()
}

fn default_api_version() -> String {
    "2024-06-01".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_temperature() -> f32 {
    GenerationSettings::default().temperature
}

fn default_max_tokens() -> u32 {
    GenerationSettings::default().max_tokens
}

impl Default for LlmProviderConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            deployment: default_deployment(),
            api_version: default_api_version(),
            timeout_secs: default_timeout_secs(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl LlmProviderConfig {
    fn required(value: &Option<String>, name: &str) -> Result<String, DomainError> {
        value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                DomainError::configuration(format!("llm.{} configuration is required", name))
            })
    }
}

/// Factory for the workflow's LLM client
#[derive(Debug)]
pub struct LlmFactory;

impl LlmFactory {
    /// Build an Azure OpenAI backed client. Fails when the endpoint or key is
    /// missing.
    pub fn create(config: &LlmProviderConfig) -> Result<Arc<dyn LlmClient>, DomainError> {
        let provider = Self::create_provider(config)?;

        let client = ProviderLlmClient::new(provider, config.deployment.clone()).with_settings(
            GenerationSettings {
                temperature: config.temperature,
                max_tokens: config.max_tokens,
            },
        );

        Ok(Arc::new(client))
    }

    pub fn create_provider(config: &LlmProviderConfig) -> Result<Arc<dyn LlmProvider>, DomainError> {
        let endpoint = LlmProviderConfig::required(&config.endpoint, "endpoint")?;
        let api_key = LlmProviderConfig::required(&config.api_key, "api_key")?;

        let http_client = HttpClient::with_timeout(Duration::from_secs(config.timeout_secs))?;
        let azure_config =
            AzureOpenAiConfig::new(endpoint, api_key).with_api_version(&config.api_version);

        Ok(Arc::new(AzureOpenAiProvider::new(http_client, azure_config)))
    }

    /// Stand-in for commands that never reach a model (listing, showing)
    pub fn unconfigured(reason: impl Into<String>) -> Arc<dyn LlmClient> {
        Arc::new(UnconfiguredLlmClient {
            reason: reason.into(),
        })
    }
}

/// Fails every call with the configuration problem that prevented building a
/// real client
#[derive(Debug)]
struct UnconfiguredLlmClient {
    reason: String,
}

#[async_trait]
impl LlmClient for UnconfiguredLlmClient {
    async fn invoke(
        &self,
        _prompt: &str,
        _system_message: Option<&str>,
        _cancel: &CancellationSignal,
    ) -> Result<String, DomainError> {
        Err(DomainError::configuration(self.reason.clone()))
    }

    async fn invoke_for_json(
        &self,
        _prompt: &str,
        _system_message: Option<&str>,
        _cancel: &CancellationSignal,
    ) -> Result<String, DomainError> {
        Err(DomainError::configuration(self.reason.clone()))
    }
}
