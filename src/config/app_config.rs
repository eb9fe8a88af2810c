use serde::Deserialize;

use crate::domain::workflow::DEFAULT_MAX_LENGTH;
use crate::infrastructure::llm::LlmProviderConfig;
use crate::infrastructure::storage::StorageConfig;

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub storage: StorageConfig,
    pub llm: LlmProviderConfig,
    pub workflow: WorkflowConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Character bound for persisted step snapshots
    pub snapshot_max_length: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            snapshot_max_length: DEFAULT_MAX_LENGTH,
        }
    }
}

impl AppConfig {
    /// `config/default`, then `config/local`, then `APP__SECTION__KEY`
    /// environment variables
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
