pub mod agent_repository;
pub mod candidate_repository;
pub mod config;
pub mod database;
pub mod job_repository;
pub mod match_repository;
pub mod skill_repository;

pub use agent_repository::AgentRepository;
pub use candidate_repository::PgCandidateRepository;
pub use config::DatabaseConfig;
pub use database::Database;
pub use job_repository::ExtractionJobRepository;
pub use match_repository::MatchRepository;
pub use skill_repository::PgSkillRepository;
