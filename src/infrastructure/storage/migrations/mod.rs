//! Database migrations infrastructure

use async_trait::async_trait;
use sqlx::Executor;
use sqlx::postgres::PgPool;

use crate::domain::DomainError;

/// Trait for running database migrations
#[async_trait]
pub trait Migrator: Send + Sync {
    /// Runs all pending migrations
    async fn run(&self) -> Result<(), DomainError>;

    /// Reverts the last migration
    async fn revert(&self) -> Result<(), DomainError>;

    /// Returns the current migration version
    async fn version(&self) -> Result<Option<i64>, DomainError>;
}

/// PostgreSQL migrator tracking applied versions in `_migrations`
#[derive(Debug)]
pub struct PostgresMigrator {
    pool: PgPool,
    migrations: Vec<Migration>,
}

impl PostgresMigrator {
    pub fn new(pool: PgPool) -> Self {
        Self::with_migrations(pool, workflow_migrations())
    }

    pub fn with_migrations(pool: PgPool, migrations: Vec<Migration>) -> Self {
        Self { pool, migrations }
    }

    /// Creates the migrations table if it doesn't exist
    async fn ensure_migrations_table(&self) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version BIGINT PRIMARY KEY,
                description TEXT NOT NULL,
                installed_on TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                success BOOLEAN NOT NULL DEFAULT TRUE
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to create migrations table: {}", e)))?;

        Ok(())
    }

    async fn is_applied(&self, version: i64) -> Result<bool, DomainError> {
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM _migrations WHERE version = $1)")
            .bind(version)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to check migration status: {}", e)))
    }

    /// Runs a single migration inside a transaction
    pub async fn run_migration(&self, migration: &Migration) -> Result<(), DomainError> {
        self.ensure_migrations_table().await?;

        if self.is_applied(migration.version).await? {
            return Ok(());
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DomainError::storage(format!("Failed to begin transaction: {}", e)))?;

        (&mut *tx)
            .execute(sqlx::raw_sql(&migration.up))
            .await
            .map_err(|e| {
                DomainError::storage(format!(
                    "Failed to run migration {}: {}",
                    migration.version, e
                ))
            })?;

        sqlx::query("INSERT INTO _migrations (version, description) VALUES ($1, $2)")
            .bind(migration.version)
            .bind(&migration.description)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                DomainError::storage(format!(
                    "Failed to record migration {}: {}",
                    migration.version, e
                ))
            })?;

        tx.commit()
            .await
            .map_err(|e| DomainError::storage(format!("Failed to commit migration: {}", e)))?;

        tracing::info!(version = migration.version, "Applied migration: {}", migration.description);
        Ok(())
    }

    /// Reverts a single migration
    pub async fn revert_migration(&self, migration: &Migration) -> Result<(), DomainError> {
        self.ensure_migrations_table().await?;

        if !self.is_applied(migration.version).await? {
            return Ok(());
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DomainError::storage(format!("Failed to begin transaction: {}", e)))?;

        (&mut *tx)
            .execute(sqlx::raw_sql(&migration.down))
            .await
            .map_err(|e| {
                DomainError::storage(format!(
                    "Failed to revert migration {}: {}",
                    migration.version, e
                ))
            })?;

        sqlx::query("DELETE FROM _migrations WHERE version = $1")
            .bind(migration.version)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                DomainError::storage(format!(
                    "Failed to remove migration record {}: {}",
                    migration.version, e
                ))
            })?;

        tx.commit()
            .await
            .map_err(|e| DomainError::storage(format!("Failed to commit revert: {}", e)))?;

        tracing::info!(version = migration.version, "Reverted migration: {}", migration.description);
        Ok(())
    }
}

#[async_trait]
impl Migrator for PostgresMigrator {
    async fn run(&self) -> Result<(), DomainError> {
        for migration in &self.migrations {
            self.run_migration(migration).await?;
        }
        Ok(())
    }

    async fn revert(&self) -> Result<(), DomainError> {
        let Some(current) = self.version().await? else {
            return Ok(());
        };

        match self.migrations.iter().find(|m| m.version == current) {
            Some(migration) => self.revert_migration(migration).await,
            None => Err(DomainError::storage(format!(
                "Applied migration {} is unknown to this build",
                current
            ))),
        }
    }

    async fn version(&self) -> Result<Option<i64>, DomainError> {
        self.ensure_migrations_table().await?;

        sqlx::query_scalar("SELECT MAX(version) FROM _migrations WHERE success = TRUE")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to get migration version: {}", e)))
    }
}

/// Represents a database migration
#[derive(Debug, Clone)]
pub struct Migration {
    pub version: i64,
    pub description: String,
    /// SQL to run when applying the migration
    pub up: String,
    /// SQL to run when reverting the migration
    pub down: String,
}

impl Migration {
    pub fn new(
        version: i64,
        description: impl Into<String>,
        up: impl Into<String>,
        down: impl Into<String>,
    ) -> Self {
        Self {
            version,
            description: description.into(),
            up: up.into(),
            down: down.into(),
        }
    }
}

/// Schema for runs and step runs
pub fn workflow_migrations() -> Vec<Migration> {
    vec![
        Migration::new(
            1,
            "Create workflow_runs table",
            r#"
            CREATE TABLE IF NOT EXISTS workflow_runs (
                id UUID PRIMARY KEY,
                parent_run_id UUID REFERENCES workflow_runs(id) ON DELETE SET NULL,
                root_run_id UUID NOT NULL,
                status VARCHAR(16) NOT NULL,
                options JSONB NOT NULL,
                input_text_redacted TEXT NOT NULL,
                final_output_html TEXT,
                error TEXT,
                rerun_from_step VARCHAR(64),
                created_at TIMESTAMPTZ NOT NULL,
                started_at TIMESTAMPTZ,
                completed_at TIMESTAMPTZ,
                total_duration_ms BIGINT
            );
            CREATE INDEX IF NOT EXISTS idx_workflow_runs_created_at ON workflow_runs(created_at DESC);
            CREATE INDEX IF NOT EXISTS idx_workflow_runs_parent ON workflow_runs(parent_run_id);
            CREATE INDEX IF NOT EXISTS idx_workflow_runs_root ON workflow_runs(root_run_id);
            "#,
            r#"
            DROP TABLE IF EXISTS workflow_runs;
            "#,
        ),
        Migration::new(
            2,
            "Create workflow_step_runs table",
            r#"
            CREATE TABLE IF NOT EXISTS workflow_step_runs (
                id UUID PRIMARY KEY,
                run_id UUID NOT NULL REFERENCES workflow_runs(id) ON DELETE CASCADE,
                step_name VARCHAR(64) NOT NULL,
                step_order INTEGER NOT NULL,
                status VARCHAR(16) NOT NULL,
                started_at TIMESTAMPTZ,
                completed_at TIMESTAMPTZ,
                duration_ms BIGINT,
                input_snapshot JSONB,
                output_snapshot JSONB,
                warnings JSONB NOT NULL DEFAULT '[]'::jsonb,
                error TEXT,
                CONSTRAINT uq_workflow_step_runs_run_step UNIQUE (run_id, step_name)
            );
            CREATE INDEX IF NOT EXISTS idx_workflow_step_runs_run ON workflow_step_runs(run_id, step_order);
            "#,
            r#"
            DROP TABLE IF EXISTS workflow_step_runs;
            "#,
        ),
    ]
}

/// Apply every pending workflow migration
pub async fn run_workflow_migrations(pool: &PgPool) -> Result<(), DomainError> {
    PostgresMigrator::new(pool.clone()).run().await
}
