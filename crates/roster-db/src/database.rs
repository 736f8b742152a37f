use roster_core::AppError;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use crate::agent_repository::AgentRepository;
use crate::candidate_repository::PgCandidateRepository;
use crate::config::DatabaseConfig;
use crate::job_repository::ExtractionJobRepository;
use crate::match_repository::MatchRepository;
use crate::skill_repository::PgSkillRepository;

/// Central database facade: owns the connection pool, runs migrations,
/// and vends repository instances.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Connect to PostgreSQL with the given configuration.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, AppError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect(&config.url)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to connect: {e}")))?;

        tracing::debug!(max_connections = config.max_connections, "Database pool ready");
        Ok(Self { pool })
    }

    /// Create a `Database` from an existing pool (useful for testing).
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run all pending migrations.
    pub async fn migrate(&self) -> Result<(), AppError> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Migration failed: {e}")))?;
        Ok(())
    }

    pub fn skill_repo(&self) -> PgSkillRepository {
        PgSkillRepository::new(self.pool.clone())
    }

    pub fn candidate_repo(&self) -> PgCandidateRepository {
        PgCandidateRepository::new(self.pool.clone())
    }

    pub fn job_repo(&self) -> ExtractionJobRepository {
        ExtractionJobRepository::new(self.pool.clone())
    }

    pub fn match_repo(&self) -> MatchRepository {
        MatchRepository::new(self.pool.clone())
    }

    pub fn agent_repo(&self) -> AgentRepository {
        AgentRepository::new(self.pool.clone())
    }

    /// Check database connectivity.
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;
        Ok(())
    }

    /// Get a reference to the underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
