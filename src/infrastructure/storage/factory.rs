//! Run store selection from configuration

use std::str::FromStr;
use std::sync::Arc;

use serde::Deserialize;
use tracing::info;

use crate::domain::workflow::RunStore;
use crate::domain::DomainError;

use super::in_memory::InMemoryRunStore;
use super::migrations::run_workflow_migrations;
use super::postgres::{PostgresConfig, PostgresRunStore};

/// Supported storage backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    /// In-memory storage (for testing/development)
    #[default]
    #[serde(alias = "inmemory", alias = "in-memory", alias = "in_memory")]
    Memory,
    /// PostgreSQL storage
    #[serde(alias = "postgresql", alias = "pg")]
    Postgres,
}

impl FromStr for StorageType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" | "inmemory" | "in-memory" | "in_memory" => Ok(Self::Memory),
            "postgres" | "postgresql" | "pg" => Ok(Self::Postgres),
            other => Err(DomainError::configuration(format!(
                "Unknown storage type '{}'",
                other
            ))),
        }
    }
}

/// `storage` configuration section
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    #[serde(rename = "type")]
    pub storage_type: StorageType,
    pub postgres: PostgresConfig,
    /// Apply pending migrations when a Postgres store is opened
    pub auto_migrate: bool,
}

impl StorageConfig {
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn postgres_url(url: impl Into<String>) -> Self {
        Self {
            storage_type: StorageType::Postgres,
            postgres: PostgresConfig::new(url),
            auto_migrate: false,
        }
    }
}

/// Factory for run stores
#[derive(Debug)]
pub struct RunStoreFactory;

impl RunStoreFactory {
    pub async fn create(config: &StorageConfig) -> Result<Arc<dyn RunStore>, DomainError> {
        match config.storage_type {
            StorageType::Memory => {
                info!("Using in-memory run store");
                Ok(Arc::new(InMemoryRunStore::new()))
            }
            StorageType::Postgres => {
                let store = Self::create_postgres(config).await?;
                Ok(Arc::new(store))
            }
        }
    }

    pub async fn create_postgres(config: &StorageConfig) -> Result<PostgresRunStore, DomainError> {
        let store = PostgresRunStore::connect(&config.postgres).await?;

        if config.auto_migrate {
            run_workflow_migrations(store.pool()).await?;
        }

        info!("Using PostgreSQL run store");
        Ok(store)
    }
}
