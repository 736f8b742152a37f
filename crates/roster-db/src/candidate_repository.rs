use roster_core::error::AppError;
use roster_core::models::{Candidate, Skill};
use roster_core::traits::CandidateRepository;
use sqlx::{PgPool, Pool, Postgres};

/// Read-only view of the employee pool with each employee's catalog skills.
#[derive(Clone)]
pub struct PgCandidateRepository {
    pool: Pool<Postgres>,
}

impl PgCandidateRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct EmployeeRow {
    id: i64,
    name: String,
    department: Option<String>,
    level: Option<String>,
    location: Option<String>,
    current_project: Option<String>,
    skills: serde_json::Value,
}

impl TryFrom<EmployeeRow> for Candidate {
    type Error = AppError;

    fn try_from(row: EmployeeRow) -> Result<Self, AppError> {
        let skills: Vec<Skill> = serde_json::from_value(row.skills)?;
        Ok(Candidate {
            id: row.id,
            name: row.name,
            department: row.department,
            level: row.level,
            location: row.location,
            skills,
            current_project: row.current_project,
        })
    }
}

impl CandidateRepository for PgCandidateRepository {
    async fn get_all(&self) -> Result<Vec<Candidate>, AppError> {
        let rows = sqlx::query_as::<_, EmployeeRow>(
            r#"
            SELECT e.id, e.name, e.department, e.level, e.location, e.current_project,
                   COALESCE(
                       jsonb_agg(
                           jsonb_build_object('id', s.id, 'name', s.name, 'synonyms', s.synonyms)
                           ORDER BY s.name
                       ) FILTER (WHERE s.id IS NOT NULL),
                       '[]'::jsonb
                   ) AS skills
            FROM employees e
            LEFT JOIN employee_skills es ON es.employee_id = e.id
            LEFT JOIN skills s ON s.id = es.skill_id
            GROUP BY e.id
            ORDER BY e.id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        let candidates: Vec<Candidate> = rows
            .into_iter()
            .map(Candidate::try_from)
            .collect::<Result<_, _>>()?;
        tracing::debug!(count = candidates.len(), "Loaded candidate pool");
        Ok(candidates)
    }
}
