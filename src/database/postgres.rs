use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use tracing::{debug, info};
use uuid::Uuid;

use super::{StoreError, StoreResult, TaskStore};
use crate::models::{CorrelationId, ProvisionTask, TaskId, TaskPayload, TaskTransition};

const TASK_COLUMNS: &str = r#"
    task_id, task_type, status, progress, current_step, steps_completed,
    error_message, retry_count, max_retries, tenant_instance_id, initiated_by,
    worker_id, correlation_id, payload, cancellation_requested, lease_expires_at,
    history, version, created_at, updated_at
"#;

#[derive(Debug, FromRow)]
struct ProvisionTaskRow {
    task_id: String,
    task_type: String,
    status: String,
    progress: i16,
    current_step: Option<String>,
    steps_completed: Vec<String>,
    error_message: Option<String>,
    retry_count: i32,
    max_retries: i32,
    tenant_instance_id: Uuid,
    initiated_by: String,
    worker_id: Option<String>,
    correlation_id: String,
    payload: Json<TaskPayload>,
    cancellation_requested: bool,
    lease_expires_at: Option<DateTime<Utc>>,
    history: Json<Vec<TaskTransition>>,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProvisionTaskRow> for ProvisionTask {
    type Error = StoreError;

    fn try_from(row: ProvisionTaskRow) -> Result<Self, Self::Error> {
        let corrupt = |e: String| StoreError::corrupt_row("provision_tasks", e);
        Ok(Self {
            task_id: TaskId::from(row.task_id),
            task_type: row.task_type.parse().map_err(corrupt)?,
            status: row.status.parse().map_err(corrupt)?,
            progress: u8::try_from(row.progress)
                .map_err(|e| StoreError::corrupt_row("provision_tasks", e))?,
            current_step: row.current_step,
            steps_completed: row.steps_completed,
            error_message: row.error_message,
            retry_count: u32::try_from(row.retry_count)
                .map_err(|e| StoreError::corrupt_row("provision_tasks", e))?,
            max_retries: u32::try_from(row.max_retries)
                .map_err(|e| StoreError::corrupt_row("provision_tasks", e))?,
            tenant_instance_id: row.tenant_instance_id,
            initiated_by: row.initiated_by,
            worker_id: row.worker_id,
            correlation_id: CorrelationId::from(row.correlation_id),
            payload: row.payload.0,
            cancellation_requested: row.cancellation_requested,
            lease_expires_at: row.lease_expires_at,
            history: row.history.0,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// PostgreSQL-backed task store over the `provision_tasks` table
#[derive(Debug, Clone)]
pub struct PgTaskStore {
    pool: PgPool,
}

impl PgTaskStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply the embedded migrations in `migrations/`
    pub async fn migrate(&self) -> StoreResult<()> {
        info!("Running provisioning task store migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::unavailable("migrate", e))?;
        Ok(())
    }

    fn i32_of(value: u32, field: &str) -> StoreResult<i32> {
        i32::try_from(value).map_err(|e| StoreError::corrupt_row(field, e))
    }
}

#[async_trait]
impl TaskStore for PgTaskStore {
    async fn insert(&self, task: &ProvisionTask) -> StoreResult<ProvisionTask> {
        let sql = format!(
            r#"
            INSERT INTO provision_tasks ({TASK_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, 1, $18, $19)
            ON CONFLICT (task_id) DO NOTHING
            RETURNING {TASK_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, ProvisionTaskRow>(&sql)
            .bind(task.task_id.as_str())
            .bind(task.task_type.as_str())
            .bind(task.status.as_str())
            .bind(i16::from(task.progress))
            .bind(task.current_step.as_deref())
            .bind(&task.steps_completed)
            .bind(task.error_message.as_deref())
            .bind(Self::i32_of(task.retry_count, "retry_count")?)
            .bind(Self::i32_of(task.max_retries, "max_retries")?)
            .bind(task.tenant_instance_id)
            .bind(&task.initiated_by)
            .bind(task.worker_id.as_deref())
            .bind(task.correlation_id.as_str())
            .bind(Json(&task.payload))
            .bind(task.cancellation_requested)
            .bind(task.lease_expires_at)
            .bind(Json(&task.history))
            .bind(task.created_at)
            .bind(task.updated_at)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::unavailable("insert_task", e))?;

        match row {
            Some(row) => {
                debug!(task_id = %task.task_id, "Inserted provision task");
                ProvisionTask::try_from(row)
            }
            None => Err(StoreError::DuplicateTask {
                task_id: task.task_id.clone(),
            }),
        }
    }

    async fn get(&self, task_id: &TaskId) -> StoreResult<Option<ProvisionTask>> {
        let sql = format!("SELECT {TASK_COLUMNS} FROM provision_tasks WHERE task_id = $1");
        let row = sqlx::query_as::<_, ProvisionTaskRow>(&sql)
            .bind(task_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::unavailable("get_task", e))?;

        row.map(ProvisionTask::try_from).transpose()
    }

    async fn update(&self, task: &ProvisionTask) -> StoreResult<ProvisionTask> {
        let sql = format!(
            r#"
            UPDATE provision_tasks SET
                status = $3,
                progress = $4,
                current_step = $5,
                steps_completed = $6,
                error_message = $7,
                retry_count = $8,
                max_retries = $9,
                worker_id = $10,
                correlation_id = $11,
                cancellation_requested = $12,
                lease_expires_at = $13,
                history = $14,
                updated_at = $15,
                version = version + 1
            WHERE task_id = $1 AND version = $2
            RETURNING {TASK_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, ProvisionTaskRow>(&sql)
            .bind(task.task_id.as_str())
            .bind(task.version)
            .bind(task.status.as_str())
            .bind(i16::from(task.progress))
            .bind(task.current_step.as_deref())
            .bind(&task.steps_completed)
            .bind(task.error_message.as_deref())
            .bind(Self::i32_of(task.retry_count, "retry_count")?)
            .bind(Self::i32_of(task.max_retries, "max_retries")?)
            .bind(task.worker_id.as_deref())
            .bind(task.correlation_id.as_str())
            .bind(task.cancellation_requested)
            .bind(task.lease_expires_at)
            .bind(Json(&task.history))
            .bind(task.updated_at)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::unavailable("update_task", e))?;

        match row {
            Some(row) => ProvisionTask::try_from(row),
            None => {
                // Distinguish a lost race from a missing row
                if self.get(&task.task_id).await?.is_some() {
                    Err(StoreError::VersionConflict {
                        task_id: task.task_id.clone(),
                        expected: task.version,
                    })
                } else {
                    Err(StoreError::NotFound {
                        task_id: task.task_id.clone(),
                    })
                }
            }
        }
    }

    async fn find_expired_leases(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> StoreResult<Vec<ProvisionTask>> {
        let sql = format!(
            r#"
            SELECT {TASK_COLUMNS}
            FROM provision_tasks
            WHERE status = 'processing' AND lease_expires_at <= $1
            ORDER BY lease_expires_at ASC
            LIMIT $2
            "#
        );

        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = sqlx::query_as::<_, ProvisionTaskRow>(&sql)
            .bind(now)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::unavailable("find_expired_leases", e))?;

        rows.into_iter().map(ProvisionTask::try_from).collect()
    }
}
