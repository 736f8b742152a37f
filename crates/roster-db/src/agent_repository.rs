use chrono::{DateTime, Utc};
use roster_core::error::AppError;
use roster_core::job::{AgentRequest, AgentResponse, JobStatus, ProcessingType};
use roster_core::store::AgentStore;
use sqlx::{PgPool, Pool, Postgres};
use uuid::Uuid;

use crate::job_repository::{STATUS_RANK, parse_status};

/// Agent requests and responses in PostgreSQL.
#[derive(Clone)]
pub struct AgentRepository {
    pool: Pool<Postgres>,
}

impl AgentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct AgentRequestRow {
    id: Uuid,
    processing_type: String,
    input_text: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    error_message: Option<String>,
}

impl TryFrom<AgentRequestRow> for AgentRequest {
    type Error = AppError;

    fn try_from(row: AgentRequestRow) -> Result<Self, AppError> {
        Ok(AgentRequest {
            id: row.id,
            processing_type: ProcessingType::parse_lenient(&row.processing_type),
            status: parse_status(&row.status)?,
            input_text: row.input_text,
            created_at: row.created_at,
            updated_at: row.updated_at,
            completed_at: row.completed_at,
            error_message: row.error_message,
        })
    }
}

#[derive(sqlx::FromRow)]
struct AgentResponseRow {
    id: Uuid,
    request_id: Uuid,
    skills: serde_json::Value,
    matches: serde_json::Value,
    summary: String,
    warnings: serde_json::Value,
    processing_time_ms: i64,
    created_at: DateTime<Utc>,
}

impl TryFrom<AgentResponseRow> for AgentResponse {
    type Error = AppError;

    fn try_from(row: AgentResponseRow) -> Result<Self, AppError> {
        Ok(AgentResponse {
            id: row.id,
            request_id: row.request_id,
            skills: serde_json::from_value(row.skills)?,
            matches: serde_json::from_value(row.matches)?,
            summary: row.summary,
            warnings: serde_json::from_value(row.warnings)?,
            processing_time_ms: row.processing_time_ms as u64,
            created_at: row.created_at,
        })
    }
}

impl AgentStore for AgentRepository {
    async fn create_request(&self, request: &AgentRequest) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO agent_requests (id, processing_type, input_text, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(request.id)
        .bind(request.processing_type.as_str())
        .bind(&request.input_text)
        .bind(request.status.as_str())
        .bind(request.created_at)
        .bind(request.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: JobStatus,
        error_message: Option<&str>,
    ) -> Result<AgentRequest, AppError> {
        let row = sqlx::query_as::<_, AgentRequestRow>(&format!(
            r#"
            UPDATE agent_requests
            SET status = $2,
                updated_at = NOW(),
                completed_at = CASE WHEN $2 IN ('completed', 'failed') THEN NOW() ELSE completed_at END,
                error_message = CASE WHEN $2 = 'failed' THEN $3 ELSE error_message END
            WHERE id = $1
              AND status NOT IN ('completed', 'failed')
              AND {STATUS_RANK} <= CASE $2 WHEN 'pending' THEN 0 WHEN 'processing' THEN 1 ELSE 2 END
            RETURNING *
            "#
        ))
        .bind(id)
        .bind(status.as_str())
        .bind(error_message)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        if let Some(row) = row {
            return AgentRequest::try_from(row);
        }
        match self.get_request(id).await? {
            None => Err(AppError::NotFound(format!("agent request {id}"))),
            Some(current) => Err(AppError::InvalidTransition {
                request_id: id.to_string(),
                from: current.status.to_string(),
                to: status.to_string(),
            }),
        }
    }

    async fn save_response(&self, response: &AgentResponse) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO agent_responses
                (id, request_id, skills, matches, summary, warnings, processing_time_ms, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(response.id)
        .bind(response.request_id)
        .bind(serde_json::to_value(&response.skills)?)
        .bind(serde_json::to_value(&response.matches)?)
        .bind(&response.summary)
        .bind(serde_json::to_value(&response.warnings)?)
        .bind(response.processing_time_ms as i64)
        .bind(response.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    async fn get_request(&self, id: Uuid) -> Result<Option<AgentRequest>, AppError> {
        let row = sqlx::query_as::<_, AgentRequestRow>(
            r#"SELECT * FROM agent_requests WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        row.map(AgentRequest::try_from).transpose()
    }

    async fn get_response(&self, request_id: Uuid) -> Result<Option<AgentResponse>, AppError> {
        let row = sqlx::query_as::<_, AgentResponseRow>(
            r#"SELECT * FROM agent_responses WHERE request_id = $1"#,
        )
        .bind(request_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        row.map(AgentResponse::try_from).transpose()
    }
}
