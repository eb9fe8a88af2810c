//! `migrate` command

use anyhow::bail;
use tracing::info;

use crate::config::AppConfig;
use crate::infrastructure::storage::{Migrator, PostgresMigrator, StorageType};

pub async fn run(config: &AppConfig, revert: bool) -> anyhow::Result<()> {
    if config.storage.storage_type != StorageType::Postgres {
        bail!("Migrations need storage.type = postgres");
    }

    let pool = config.storage.postgres.connect().await?;
    let migrator = PostgresMigrator::new(pool);

    if revert {
        migrator.revert().await?;
    } else {
        migrator.run().await?;
    }

    let version = migrator.version().await?;
    info!(version = ?version, "Schema is up to date");
    match version {
        Some(v) => println!("Schema version {}", v),
        None => println!("No migrations applied"),
    }
    Ok(())
}
