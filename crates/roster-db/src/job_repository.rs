use chrono::{DateTime, Utc};
use sqlx::{PgPool, Pool, Postgres};
use uuid::Uuid;

use roster_core::error::AppError;
use roster_core::job::{ExtractionJob, JobStatus};
use roster_core::store::JobStore;

/// Rank of a status in the forward-only lifecycle, as SQL.
pub(crate) const STATUS_RANK: &str =
    "CASE status WHEN 'pending' THEN 0 WHEN 'processing' THEN 1 ELSE 2 END";

/// PostgreSQL-backed job store.
///
/// Every mutation is one guarded `UPDATE ... WHERE status NOT IN
/// ('completed', 'failed')`, so concurrent writers are last-writer-wins on
/// counters and a terminal job is never resurrected.
#[derive(Clone)]
pub struct ExtractionJobRepository {
    pool: Pool<Postgres>,
}

impl ExtractionJobRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Explain why a guarded update touched no row.
    async fn rejection(&self, request_id: &str, to: JobStatus) -> AppError {
        match self.get(request_id).await {
            Ok(None) => AppError::NotFound(format!("job {request_id}")),
            Ok(Some(job)) if job.status.is_terminal() || !job.status.can_transition_to(to) => {
                AppError::InvalidTransition {
                    request_id: request_id.to_string(),
                    from: job.status.to_string(),
                    to: to.to_string(),
                }
            }
            Ok(Some(job)) => AppError::ValidationError(format!(
                "progress rejected for job {request_id} with {} files",
                job.num_files
            )),
            Err(e) => e,
        }
    }
}

// -- Internal row type for sqlx deserialization --

#[derive(sqlx::FromRow)]
struct ExtractionJobRow {
    id: Uuid,
    request_id: String,
    status: String,
    num_files: i32,
    files_processed: i32,
    files_failed: i32,
    total_processing_time_ms: Option<i64>,
    average_processing_time_ms: Option<i64>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    error_message: Option<String>,
    metadata: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ExtractionJobRow> for ExtractionJob {
    type Error = AppError;

    fn try_from(row: ExtractionJobRow) -> Result<Self, AppError> {
        Ok(ExtractionJob {
            id: row.id,
            status: parse_status(&row.status)?,
            request_id: row.request_id,
            num_files: row.num_files as u32,
            files_processed: row.files_processed as u32,
            files_failed: row.files_failed as u32,
            total_processing_time_ms: row.total_processing_time_ms.map(|v| v as u64),
            average_processing_time_ms: row.average_processing_time_ms.map(|v| v as u64),
            started_at: row.started_at,
            completed_at: row.completed_at,
            error_message: row.error_message,
            metadata: row.metadata,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Parse a stored status, treating unknown values as corrupt rows.
pub(crate) fn parse_status(raw: &str) -> Result<JobStatus, AppError> {
    raw.parse()
        .map_err(|e| AppError::DatabaseError(format!("corrupt status column: {e}")))
}

/// Convert a counter for an `INTEGER` column without wrapping.
pub(crate) fn to_i32(value: u32, column: &str) -> Result<i32, AppError> {
    i32::try_from(value)
        .map_err(|_| AppError::ValidationError(format!("{column} {value} is out of range")))
}

fn db_error(e: sqlx::Error) -> AppError {
    AppError::DatabaseError(e.to_string())
}

impl JobStore for ExtractionJobRepository {
    async fn create_or_update(
        &self,
        request_id: &str,
        status: JobStatus,
        num_files: u32,
        file_number: Option<u32>,
        metadata: serde_json::Value,
    ) -> Result<ExtractionJob, AppError> {
        let mut metadata = match metadata {
            serde_json::Value::Object(map) => serde_json::Value::Object(map),
            _ => serde_json::json!({}),
        };
        if let (Some(n), Some(meta)) = (file_number, metadata.as_object_mut()) {
            meta.insert("file_number".into(), serde_json::json!(n));
        }

        let created = sqlx::query_as::<_, ExtractionJobRow>(
            r#"
            INSERT INTO extraction_jobs (request_id, status, num_files, metadata, started_at, completed_at)
            VALUES (
                $1, $2, $3, $4,
                CASE WHEN $2 = 'processing' THEN NOW() END,
                CASE WHEN $2 IN ('completed', 'failed') THEN NOW() END
            )
            ON CONFLICT (request_id) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(request_id)
        .bind(status.as_str())
        .bind(to_i32(num_files, "num_files")?)
        .bind(&metadata)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        if let Some(row) = created {
            return ExtractionJob::try_from(row);
        }

        // Existing job: status (and file number) only.
        let updated = sqlx::query_as::<_, ExtractionJobRow>(&format!(
            r#"
            UPDATE extraction_jobs
            SET status = $2,
                started_at = CASE WHEN $2 = 'processing' THEN COALESCE(started_at, NOW()) ELSE started_at END,
                completed_at = CASE WHEN $2 IN ('completed', 'failed') THEN NOW() ELSE completed_at END,
                metadata = CASE WHEN $3::integer IS NULL THEN metadata
                                ELSE metadata || jsonb_build_object('file_number', $3::integer) END,
                updated_at = NOW()
            WHERE request_id = $1
              AND status NOT IN ('completed', 'failed')
              AND {STATUS_RANK} <= CASE $2 WHEN 'pending' THEN 0 WHEN 'processing' THEN 1 ELSE 2 END
            RETURNING *
            "#
        ))
        .bind(request_id)
        .bind(status.as_str())
        .bind(file_number.map(|n| to_i32(n, "file_number")).transpose()?)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        match updated {
            Some(row) => ExtractionJob::try_from(row),
            None => Err(self.rejection(request_id, status).await),
        }
    }

    async fn update_progress(
        &self,
        request_id: &str,
        files_processed: u32,
        files_failed: u32,
    ) -> Result<ExtractionJob, AppError> {
        let row = sqlx::query_as::<_, ExtractionJobRow>(
            r#"
            UPDATE extraction_jobs
            SET files_processed = $2, files_failed = $3, updated_at = NOW()
            WHERE request_id = $1
              AND status NOT IN ('completed', 'failed')
              AND $2::integer + $3::integer <= num_files
            RETURNING *
            "#,
        )
        .bind(request_id)
        .bind(to_i32(files_processed, "files_processed")?)
        .bind(to_i32(files_failed, "files_failed")?)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        match row {
            Some(row) => ExtractionJob::try_from(row),
            None => Err(self.rejection(request_id, JobStatus::Processing).await),
        }
    }

    async fn mark_success(
        &self,
        request_id: &str,
        total_time_ms: u64,
    ) -> Result<ExtractionJob, AppError> {
        let row = sqlx::query_as::<_, ExtractionJobRow>(
            r#"
            UPDATE extraction_jobs
            SET status = 'completed',
                completed_at = NOW(),
                updated_at = NOW(),
                total_processing_time_ms = $2,
                average_processing_time_ms = CASE WHEN num_files > 0 THEN $2 / num_files END
            WHERE request_id = $1 AND status NOT IN ('completed', 'failed')
            RETURNING *
            "#,
        )
        .bind(request_id)
        .bind(total_time_ms as i64)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        match row {
            Some(row) => ExtractionJob::try_from(row),
            None => Err(self.rejection(request_id, JobStatus::Completed).await),
        }
    }

    async fn mark_failed(
        &self,
        request_id: &str,
        error_message: &str,
    ) -> Result<ExtractionJob, AppError> {
        let row = sqlx::query_as::<_, ExtractionJobRow>(
            r#"
            UPDATE extraction_jobs
            SET status = 'failed', completed_at = NOW(), updated_at = NOW(), error_message = $2
            WHERE request_id = $1 AND status NOT IN ('completed', 'failed')
            RETURNING *
            "#,
        )
        .bind(request_id)
        .bind(error_message)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        match row {
            Some(row) => ExtractionJob::try_from(row),
            None => Err(self.rejection(request_id, JobStatus::Failed).await),
        }
    }

    async fn get(&self, request_id: &str) -> Result<Option<ExtractionJob>, AppError> {
        let row = sqlx::query_as::<_, ExtractionJobRow>(
            r#"SELECT * FROM extraction_jobs WHERE request_id = $1"#,
        )
        .bind(request_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        row.map(ExtractionJob::try_from).transpose()
    }

    async fn list(
        &self,
        status: Option<JobStatus>,
        limit: usize,
    ) -> Result<Vec<ExtractionJob>, AppError> {
        let rows = if let Some(status) = status {
            sqlx::query_as::<_, ExtractionJobRow>(
                r#"
                SELECT * FROM extraction_jobs
                WHERE status = $1
                ORDER BY created_at DESC
                LIMIT $2
                "#,
            )
            .bind(status.as_str())
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
        } else {
            sqlx::query_as::<_, ExtractionJobRow>(
                r#"
                SELECT * FROM extraction_jobs
                ORDER BY created_at DESC
                LIMIT $1
                "#,
            )
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
        }
        .map_err(db_error)?;

        rows.into_iter().map(ExtractionJob::try_from).collect()
    }
}
