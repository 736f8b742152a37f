use std::future::Future;

use crate::error::AppError;
use crate::models::{Candidate, Category, EntityPrediction, ExtractedSkillSet, Skill, SkillInfo};

/// Read-only access to the skill catalog's backing store.
pub trait SkillRepository: Send + Sync + Clone {
    /// Every skill with its category memberships and stored synonyms.
    fn get_skills_with_categories(
        &self,
    ) -> impl Future<Output = Result<Vec<Skill>, AppError>> + Send;

    fn get_all_categories(&self) -> impl Future<Output = Result<Vec<Category>, AppError>> + Send;
}

/// Read-only snapshot of the people available for matching.
pub trait CandidateRepository: Send + Sync + Clone {
    fn get_all(&self) -> impl Future<Output = Result<Vec<Candidate>, AppError>> + Send;
}

/// One text → skills technique.
///
/// Implementations are cloned into their own task by the orchestrator, so
/// they must be cheap to clone and `'static`.
pub trait SkillExtractor: Send + Sync + Clone + 'static {
    /// Short method label used in logs and non-fatal error records.
    fn method(&self) -> &'static str;

    fn extract(
        &self,
        text: &str,
    ) -> impl Future<Output = Result<ExtractedSkillSet, AppError>> + Send;
}

/// Calls a remote token-classification model.
pub trait InferenceClient: Send + Sync + Clone + 'static {
    fn infer(
        &self,
        model: &str,
        text: &str,
    ) -> impl Future<Output = Result<Vec<EntityPrediction>, AppError>> + Send;
}

/// Synchronous lookup of a normalized token in an already-loaded catalog.
pub trait SkillLookup: Send + Sync {
    fn lookup(&self, normalized: &str) -> Option<SkillInfo>;
}

/// Supplies the current runtime set of categories.
pub trait CategoryProvider: Send + Sync {
    fn current_categories(&self) -> Vec<Category>;
}
