use roster_core::error::AppError;
use roster_core::models::{Category, Skill};
use roster_core::traits::SkillRepository;
use sqlx::{PgPool, Pool, Postgres};

/// Skill catalog reads from PostgreSQL.
#[derive(Clone)]
pub struct PgSkillRepository {
    pool: Pool<Postgres>,
}

impl PgSkillRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// -- Internal row types for sqlx deserialization --

#[derive(sqlx::FromRow)]
struct SkillRow {
    id: i64,
    name: String,
    synonyms: Vec<String>,
    categories: serde_json::Value,
}

impl TryFrom<SkillRow> for Skill {
    type Error = AppError;

    fn try_from(row: SkillRow) -> Result<Self, AppError> {
        Ok(Skill {
            id: row.id,
            name: row.name,
            categories: serde_json::from_value(row.categories)?,
            synonyms: row.synonyms,
        })
    }
}

#[derive(sqlx::FromRow)]
struct CategoryRow {
    id: i64,
    name: String,
}

impl SkillRepository for PgSkillRepository {
    async fn get_skills_with_categories(&self) -> Result<Vec<Skill>, AppError> {
        let rows = sqlx::query_as::<_, SkillRow>(
            r#"
            SELECT s.id, s.name, s.synonyms,
                   COALESCE(
                       jsonb_agg(jsonb_build_object('id', c.id, 'name', c.name) ORDER BY c.name)
                           FILTER (WHERE c.id IS NOT NULL),
                       '[]'::jsonb
                   ) AS categories
            FROM skills s
            LEFT JOIN skill_categories sc ON sc.skill_id = s.id
            LEFT JOIN categories c ON c.id = sc.category_id
            GROUP BY s.id
            ORDER BY s.name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        rows.into_iter().map(Skill::try_from).collect()
    }

    async fn get_all_categories(&self) -> Result<Vec<Category>, AppError> {
        let rows = sqlx::query_as::<_, CategoryRow>(
            r#"SELECT id, name FROM categories ORDER BY name"#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|row| Category {
                id: row.id,
                name: row.name,
            })
            .collect())
    }
}
