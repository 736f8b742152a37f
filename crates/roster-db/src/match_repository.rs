use chrono::{DateTime, Utc};
use roster_core::error::AppError;
use roster_core::job::{Extraction, NewExtraction};
use roster_core::models::Match;
use roster_core::store::MatchStore;
use sqlx::{PgPool, Pool, Postgres};
use uuid::Uuid;

use crate::job_repository::to_i32;

/// Per-file extraction metadata and match results in PostgreSQL.
#[derive(Clone)]
pub struct MatchRepository {
    pool: Pool<Postgres>,
}

impl MatchRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// -- Internal row types for sqlx deserialization --

#[derive(sqlx::FromRow)]
struct ExtractionRow {
    id: Uuid,
    request_id: String,
    file_number: i32,
    skills: serde_json::Value,
    content_hash: String,
    warnings: serde_json::Value,
    processing_time_ms: i64,
    created_at: DateTime<Utc>,
}

impl TryFrom<ExtractionRow> for Extraction {
    type Error = AppError;

    fn try_from(row: ExtractionRow) -> Result<Self, AppError> {
        Ok(Extraction {
            id: row.id,
            request_id: row.request_id,
            file_number: row.file_number as u32,
            skills: serde_json::from_value(row.skills)?,
            content_hash: row.content_hash,
            warnings: serde_json::from_value(row.warnings)?,
            processing_time_ms: row.processing_time_ms as u64,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct MatchRow {
    employee_id: i64,
    match_score: f64,
    matching_skills: serde_json::Value,
    missing_skills: serde_json::Value,
    notes: String,
}

impl TryFrom<MatchRow> for Match {
    type Error = AppError;

    fn try_from(row: MatchRow) -> Result<Self, AppError> {
        Ok(Match {
            employee_id: row.employee_id,
            match_score: row.match_score,
            matching_skills: serde_json::from_value(row.matching_skills)?,
            missing_skills: serde_json::from_value(row.missing_skills)?,
            notes: row.notes,
        })
    }
}

impl MatchStore for MatchRepository {
    async fn save_extraction(&self, extraction: &NewExtraction) -> Result<Uuid, AppError> {
        let row: (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO extractions (request_id, file_number, skills, content_hash, warnings, processing_time_ms)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(&extraction.request_id)
        .bind(to_i32(extraction.file_number, "file_number")?)
        .bind(serde_json::to_value(&extraction.skills)?)
        .bind(&extraction.content_hash)
        .bind(serde_json::to_value(&extraction.warnings)?)
        .bind(extraction.processing_time_ms as i64)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(row.0)
    }

    async fn list_extractions(&self, request_id: &str) -> Result<Vec<Extraction>, AppError> {
        let rows = sqlx::query_as::<_, ExtractionRow>(
            r#"
            SELECT id, request_id, file_number, skills, content_hash, warnings, processing_time_ms, created_at
            FROM extractions
            WHERE request_id = $1
            ORDER BY file_number ASC, created_at ASC
            "#,
        )
        .bind(request_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        rows.into_iter().map(Extraction::try_from).collect()
    }

    async fn save_matches(&self, request_id: &str, matches: &[Match]) -> Result<(), AppError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        for m in matches {
            sqlx::query(
                r#"
                INSERT INTO matches (request_id, employee_id, match_score, matching_skills, missing_skills, notes)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(request_id)
            .bind(m.employee_id)
            .bind(m.match_score)
            .bind(serde_json::to_value(&m.matching_skills)?)
            .bind(serde_json::to_value(&m.missing_skills)?)
            .bind(&m.notes)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;
        Ok(())
    }

    async fn list_matches(&self, request_id: &str) -> Result<Vec<Match>, AppError> {
        let rows = sqlx::query_as::<_, MatchRow>(
            r#"
            SELECT employee_id, match_score, matching_skills, missing_skills, notes
            FROM matches
            WHERE request_id = $1
            ORDER BY match_score DESC, employee_id ASC
            "#,
        )
        .bind(request_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        rows.into_iter().map(Match::try_from).collect()
    }
}
