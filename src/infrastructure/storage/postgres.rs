//! PostgreSQL run store with connection pooling

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::Row;

use crate::domain::workflow::{
    RunId, RunRecord, RunStatus, Snapshot, StepRunId, StepRunRecord, StepRunRepository,
    StepStatus, WorkflowOptions, WorkflowRun, WorkflowRunRepository, WorkflowStepRun,
};
use crate::domain::DomainError;

/// PostgreSQL connection configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PostgresConfig {
    /// Database connection URL
    pub url: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Minimum number of connections to maintain
    pub min_connections: u32,
    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,
    /// Idle timeout in seconds
    pub idle_timeout_secs: u64,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/policy_pack".to_string(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout_secs: 30,
            idle_timeout_secs: 600,
        }
    }
}

impl PostgresConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn with_connect_timeout(mut self, secs: u64) -> Self {
        self.connect_timeout_secs = secs;
        self
    }

    /// Open a pool for this configuration
    pub async fn connect(&self) -> Result<PgPool, DomainError> {
        PgPoolOptions::new()
            .max_connections(self.max_connections)
            .min_connections(self.min_connections)
            .acquire_timeout(Duration::from_secs(self.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(self.idle_timeout_secs))
            .connect(&self.url)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to connect to PostgreSQL: {}", e)))
    }
}

/// Runs in `workflow_runs`, step runs in `workflow_step_runs`
#[derive(Debug, Clone)]
pub struct PostgresRunStore {
    pool: PgPool,
}

const RUN_COLUMNS: &str = "id, parent_run_id, root_run_id, status, options, input_text_redacted, \
     final_output_html, error, rerun_from_step, created_at, started_at, completed_at, \
     total_duration_ms";

const STEP_COLUMNS: &str = "id, run_id, step_name, step_order, status, started_at, completed_at, \
     duration_ms, input_snapshot, output_snapshot, warnings, error";

impl PostgresRunStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(config: &PostgresConfig) -> Result<Self, DomainError> {
        Ok(Self::new(config.connect().await?))
    }

    /// Returns a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn row_to_run(row: &PgRow) -> Result<WorkflowRun, DomainError> {
        let status: String = row.get("status");
        let options: Json<WorkflowOptions> = row.get("options");
        let duration: Option<i64> = row.get("total_duration_ms");

        Ok(WorkflowRun::from_record(RunRecord {
            id: RunId::from_uuid(row.get("id")),
            parent_run_id: row
                .get::<Option<uuid::Uuid>, _>("parent_run_id")
                .map(RunId::from_uuid),
            root_run_id: RunId::from_uuid(row.get("root_run_id")),
            status: status
                .parse::<RunStatus>()
                .map_err(|e| DomainError::storage(e.to_string()))?,
            options: options.0,
            input_text_redacted: row.get("input_text_redacted"),
            final_output_html: row.get("final_output_html"),
            error: row.get("error"),
            rerun_from_step: row.get("rerun_from_step"),
            created_at: row.get("created_at"),
            started_at: row.get("started_at"),
            completed_at: row.get("completed_at"),
            total_duration_ms: duration.map(|d| d.max(0) as u64),
        }))
    }

    fn row_to_step(row: &PgRow) -> Result<WorkflowStepRun, DomainError> {
        let status: String = row.get("status");
        let order: i32 = row.get("step_order");
        let duration: Option<i64> = row.get("duration_ms");
        let input: Option<Json<Snapshot>> = row.get("input_snapshot");
        let output: Option<Json<Snapshot>> = row.get("output_snapshot");
        let warnings: Json<Vec<String>> = row.get("warnings");

        Ok(WorkflowStepRun::from_record(StepRunRecord {
            id: StepRunId::from_uuid(row.get("id")),
            run_id: RunId::from_uuid(row.get("run_id")),
            step_name: row.get("step_name"),
            step_order: order.max(0) as u32,
            status: status
                .parse::<StepStatus>()
                .map_err(|e| DomainError::storage(e.to_string()))?,
            started_at: row.get("started_at"),
            completed_at: row.get("completed_at"),
            duration_ms: duration.map(|d| d.max(0) as u64),
            input_snapshot: input.map(|j| j.0),
            output_snapshot: output.map(|j| j.0),
            warnings: warnings.0,
            error: row.get("error"),
        }))
    }

    fn rows_to_runs(rows: &[PgRow]) -> Result<Vec<WorkflowRun>, DomainError> {
        rows.iter().map(Self::row_to_run).collect()
    }
}

fn to_i64(value: Option<u64>) -> Option<i64> {
    value.map(|v| i64::try_from(v).unwrap_or(i64::MAX))
}

#[async_trait]
impl WorkflowRunRepository for PostgresRunStore {
    async fn create(&self, run: WorkflowRun) -> Result<WorkflowRun, DomainError> {
        sqlx::query(
            r#"
            INSERT INTO workflow_runs (id, parent_run_id, root_run_id, status, options,
                input_text_redacted, final_output_html, error, rerun_from_step, created_at,
                started_at, completed_at, total_duration_ms)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(run.id().as_uuid())
        .bind(run.parent_run_id().map(|p| *p.as_uuid()))
        .bind(run.root_run_id().as_uuid())
        .bind(run.status().as_str())
        .bind(Json(run.options()))
        .bind(run.input_text_redacted())
        .bind(run.final_output_html())
        .bind(run.error())
        .bind(run.rerun_from_step())
        .bind(run.created_at())
        .bind(run.started_at())
        .bind(run.completed_at())
        .bind(to_i64(run.total_duration_ms()))
        .execute(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                DomainError::conflict(format!("Run '{}' already exists", run.id()))
            }
            _ => DomainError::storage(format!("Failed to create run: {}", e)),
        })?;

        Ok(run)
    }

    async fn update(&self, run: &WorkflowRun) -> Result<WorkflowRun, DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE workflow_runs
            SET status = $2, final_output_html = $3, error = $4, started_at = $5,
                completed_at = $6, total_duration_ms = $7
            WHERE id = $1 AND status NOT IN ('completed', 'failed', 'canceled')
            "#,
        )
        .bind(run.id().as_uuid())
        .bind(run.status().as_str())
        .bind(run.final_output_html())
        .bind(run.error())
        .bind(run.started_at())
        .bind(run.completed_at())
        .bind(to_i64(run.total_duration_ms()))
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to update run: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(match self.get(&run.id()).await? {
                Some(stored) => DomainError::conflict(format!(
                    "Run '{}' is already {}",
                    run.id(),
                    stored.status()
                )),
                None => DomainError::not_found(format!("Run '{}' not found", run.id())),
            });
        }

        Ok(run.clone())
    }

    async fn get(&self, id: &RunId) -> Result<Option<WorkflowRun>, DomainError> {
        let query = format!("SELECT {} FROM workflow_runs WHERE id = $1", RUN_COLUMNS);

        let row = sqlx::query(&query)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to get run: {}", e)))?;

        row.as_ref().map(Self::row_to_run).transpose()
    }

    async fn delete(&self, id: &RunId) -> Result<bool, DomainError> {
        let result = sqlx::query("DELETE FROM workflow_runs WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to delete run: {}", e)))?;

        Ok(result.rows_affected() > 0)
    }

    async fn list(&self, skip: usize, take: usize) -> Result<Vec<WorkflowRun>, DomainError> {
        let query = format!(
            "SELECT {} FROM workflow_runs ORDER BY created_at DESC OFFSET $1 LIMIT $2",
            RUN_COLUMNS
        );

        let rows = sqlx::query(&query)
            .bind(skip as i64)
            .bind(take as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to list runs: {}", e)))?;

        Self::rows_to_runs(&rows)
    }

    async fn count(&self) -> Result<usize, DomainError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM workflow_runs")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to count runs: {}", e)))?;

        Ok(count.max(0) as usize)
    }

    async fn children(&self, parent: &RunId) -> Result<Vec<WorkflowRun>, DomainError> {
        let query = format!(
            "SELECT {} FROM workflow_runs WHERE parent_run_id = $1 ORDER BY created_at",
            RUN_COLUMNS
        );

        let rows = sqlx::query(&query)
            .bind(parent.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to list child runs: {}", e)))?;

        Self::rows_to_runs(&rows)
    }

    async fn lineage(&self, root: &RunId) -> Result<Vec<WorkflowRun>, DomainError> {
        let query = format!(
            "SELECT {} FROM workflow_runs WHERE root_run_id = $1 ORDER BY created_at",
            RUN_COLUMNS
        );

        let rows = sqlx::query(&query)
            .bind(root.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to load lineage: {}", e)))?;

        Self::rows_to_runs(&rows)
    }
}

#[async_trait]
impl StepRunRepository for PostgresRunStore {
    async fn create_step(&self, step: WorkflowStepRun) -> Result<WorkflowStepRun, DomainError> {
        sqlx::query(
            r#"
            INSERT INTO workflow_step_runs (id, run_id, step_name, step_order, status,
                started_at, completed_at, duration_ms, input_snapshot, output_snapshot,
                warnings, error)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(step.id().as_uuid())
        .bind(step.run_id().as_uuid())
        .bind(step.step_name())
        .bind(step.step_order() as i32)
        .bind(step.status().as_str())
        .bind(step.started_at())
        .bind(step.completed_at())
        .bind(to_i64(step.duration_ms()))
        .bind(step.input_snapshot().map(Json))
        .bind(step.output_snapshot().map(Json))
        .bind(Json(step.warnings()))
        .bind(step.error())
        .execute(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => DomainError::conflict(
                format!(
                    "Step '{}' already exists for run '{}'",
                    step.step_name(),
                    step.run_id()
                ),
            ),
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                DomainError::not_found(format!("Run '{}' not found", step.run_id()))
            }
            _ => DomainError::storage(format!("Failed to create step run: {}", e)),
        })?;

        Ok(step)
    }

    async fn update_step(&self, step: &WorkflowStepRun) -> Result<WorkflowStepRun, DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE workflow_step_runs
            SET status = $2, started_at = $3, completed_at = $4, duration_ms = $5,
                input_snapshot = $6, output_snapshot = $7, warnings = $8, error = $9
            WHERE id = $1
            "#,
        )
        .bind(step.id().as_uuid())
        .bind(step.status().as_str())
        .bind(step.started_at())
        .bind(step.completed_at())
        .bind(to_i64(step.duration_ms()))
        .bind(step.input_snapshot().map(Json))
        .bind(step.output_snapshot().map(Json))
        .bind(Json(step.warnings()))
        .bind(step.error())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to update step run: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::not_found(format!(
                "Step run '{}' not found",
                step.id()
            )));
        }

        Ok(step.clone())
    }

    async fn list_for_run(&self, run_id: &RunId) -> Result<Vec<WorkflowStepRun>, DomainError> {
        let query = format!(
            "SELECT {} FROM workflow_step_runs WHERE run_id = $1 ORDER BY step_order",
            STEP_COLUMNS
        );

        let rows = sqlx::query(&query)
            .bind(run_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to list step runs: {}", e)))?;

        rows.iter().map(Self::row_to_step).collect()
    }

    async fn get_by_name(
        &self,
        run_id: &RunId,
        step_name: &str,
    ) -> Result<Option<WorkflowStepRun>, DomainError> {
        let query = format!(
            "SELECT {} FROM workflow_step_runs WHERE run_id = $1 AND step_name = $2",
            STEP_COLUMNS
        );

        let row = sqlx::query(&query)
            .bind(run_id.as_uuid())
            .bind(step_name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to get step run: {}", e)))?;

        row.as_ref().map(Self::row_to_step).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_postgres_config_default() {
        let config = PostgresConfig::default();

        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 1);
        assert_eq!(config.connect_timeout_secs, 30);
        assert_eq!(config.idle_timeout_secs, 600);
    }

    #[test]
    fn test_postgres_config_builder() {
        let config = PostgresConfig::new("postgres://localhost/test")
            .with_max_connections(20)
            .with_connect_timeout(60);

        assert_eq!(config.url, "postgres://localhost/test");
        assert_eq!(config.max_connections, 20);
        assert_eq!(config.connect_timeout_secs, 60);
    }

    #[test]
    fn test_config_deserializes_partial_section() {
        let config: PostgresConfig =
            serde_json::from_str(r#"{"url": "postgres://db/runs"}"#).unwrap();

        assert_eq!(config.url, "postgres://db/runs");
        assert_eq!(config.max_connections, 10);
    }

    #[test]
    fn test_duration_conversion_saturates() {
        assert_eq!(to_i64(Some(5)), Some(5));
        assert_eq!(to_i64(Some(u64::MAX)), Some(i64::MAX));
        assert_eq!(to_i64(None), None);
    }

    /// Runs the repository contract against a live database when
    /// `TEST_DATABASE_URL` is set
    #[tokio::test]
    async fn test_contract_against_live_database() {
        use crate::domain::workflow::repository::tests as contract;
        use crate::infrastructure::storage::migrations::run_workflow_migrations;

        let Ok(url) = std::env::var("TEST_DATABASE_URL") else {
            return;
        };

        let store = PostgresRunStore::connect(&PostgresConfig::new(url))
            .await
            .unwrap();
        run_workflow_migrations(store.pool()).await.unwrap();

        contract::test_run_crud(&store).await;
        contract::test_update_missing_run(&store).await;
        contract::test_finished_run_is_not_overwritten(&store).await;
        contract::test_step_runs(&store).await;
        contract::test_step_requires_run(&store).await;
    }
}
