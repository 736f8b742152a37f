pub mod catalog;
pub mod clock;
pub mod config;
pub mod error;
pub mod inference;
pub mod job;
pub mod matching;
pub mod memory;
pub mod models;
pub mod orchestrator;
pub mod pipeline;
pub mod store;
pub mod text_extractor;
pub mod tracker;
pub mod traits;

#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

pub use catalog::SkillCatalog;
pub use clock::{Clock, SystemClock};
pub use config::PipelineConfig;
pub use error::AppError;
pub use inference::{ExtractOptions, InferenceSkillExtractor};
pub use job::{
    AgentRequest, AgentResponse, Extraction, ExtractionJob, JobStatus, NewExtraction,
    ProcessingType,
};
pub use matching::{MatchEngine, MatchExplanation, MatchPolicy};
pub use memory::{MemoryAgentStore, MemoryJobStore, MemoryMatchStore};
pub use models::{
    Candidate, Category, EntityPrediction, ExtractedSkillSet, Match, Skill, SkillInfo,
    compute_hash, normalize_skill_name,
};
pub use orchestrator::{ExtractionOrchestrator, MethodError, OrchestratedExtraction};
pub use pipeline::{
    PipelineEvent, PipelineOutput, PipelineReporter, PipelineService, PipelineStores,
    TracingPipelineReporter,
};
pub use store::{AgentStore, JobStore, MatchStore};
pub use text_extractor::TextSkillExtractor;
pub use tracker::JobTracker;
pub use traits::{
    CandidateRepository, CategoryProvider, InferenceClient, SkillExtractor, SkillLookup,
    SkillRepository,
};
