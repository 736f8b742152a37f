//! Test utilities: mock implementations of the core traits.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, TimeZone, Utc};

use crate::clock::Clock;
use crate::error::AppError;
use crate::models::{Candidate, Category, EntityPrediction, ExtractedSkillSet, Skill};
use crate::pipeline::{PipelineEvent, PipelineReporter};
use crate::traits::{
    CandidateRepository, CategoryProvider, InferenceClient, SkillExtractor, SkillRepository,
};

// ---------------------------------------------------------------------------
// ManualClock
// ---------------------------------------------------------------------------

/// Clock that only moves when told to.
#[derive(Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    /// Starts at 2024-01-01T00:00:00Z.
    pub fn new() -> Self {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn advance(&self, by: TimeDelta) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

// ---------------------------------------------------------------------------
// MockSkillRepository
// ---------------------------------------------------------------------------

/// Skill store that serves a fixed list and counts loads.
#[derive(Clone)]
pub struct MockSkillRepository {
    skills: Arc<Vec<Skill>>,
    loads: Arc<Mutex<usize>>,
    next_error: Arc<Mutex<Option<AppError>>>,
}

impl MockSkillRepository {
    pub fn new(skills: Vec<Skill>) -> Self {
        Self {
            skills: Arc::new(skills),
            loads: Arc::new(Mutex::new(0)),
            next_error: Arc::new(Mutex::new(None)),
        }
    }

    /// Number of `get_skills_with_categories` calls, failed ones included.
    pub fn load_count(&self) -> usize {
        *self.loads.lock().unwrap()
    }

    /// Make the next skill load fail with `error`.
    pub fn fail_next(&self, error: AppError) {
        *self.next_error.lock().unwrap() = Some(error);
    }
}

impl SkillRepository for MockSkillRepository {
    async fn get_skills_with_categories(&self) -> Result<Vec<Skill>, AppError> {
        *self.loads.lock().unwrap() += 1;
        if let Some(e) = self.next_error.lock().unwrap().take() {
            return Err(e);
        }
        Ok(self.skills.as_ref().clone())
    }

    async fn get_all_categories(&self) -> Result<Vec<Category>, AppError> {
        let mut by_id = BTreeMap::new();
        for category in self.skills.iter().flat_map(|s| s.categories.iter()) {
            by_id.insert(category.id, category.clone());
        }
        Ok(by_id.into_values().collect())
    }
}

/// Python, Node.js and AWS in three categories.
pub fn sample_catalog_skills() -> Vec<Skill> {
    vec![
        Skill::new(1, "Python").with_category(1, "Programming Languages"),
        Skill::new(2, "Node.js").with_category(2, "Frameworks"),
        Skill::new(3, "AWS").with_category(3, "Cloud Platforms"),
    ]
}

// ---------------------------------------------------------------------------
// MockCandidateRepository
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct MockCandidateRepository {
    candidates: Arc<Vec<Candidate>>,
}

impl MockCandidateRepository {
    pub fn new(candidates: Vec<Candidate>) -> Self {
        Self {
            candidates: Arc::new(candidates),
        }
    }
}

impl CandidateRepository for MockCandidateRepository {
    async fn get_all(&self) -> Result<Vec<Candidate>, AppError> {
        Ok(self.candidates.as_ref().clone())
    }
}

/// Candidate with the given skill names and no categories.
pub fn candidate(id: i64, skills: &[&str]) -> Candidate {
    Candidate {
        id,
        name: format!("Candidate {id}"),
        department: None,
        level: None,
        location: None,
        skills: skills
            .iter()
            .enumerate()
            .map(|(i, name)| Skill::new(i as i64 + 1, *name))
            .collect(),
        current_project: None,
    }
}

// ---------------------------------------------------------------------------
// MockCategoryProvider
// ---------------------------------------------------------------------------

pub struct MockCategoryProvider {
    categories: Vec<Category>,
}

impl MockCategoryProvider {
    pub fn new(names: &[&str]) -> Self {
        Self {
            categories: names
                .iter()
                .enumerate()
                .map(|(i, name)| Category {
                    id: i as i64 + 1,
                    name: name.to_string(),
                })
                .collect(),
        }
    }
}

impl CategoryProvider for MockCategoryProvider {
    fn current_categories(&self) -> Vec<Category> {
        self.categories.clone()
    }
}

// ---------------------------------------------------------------------------
// MockInferenceClient
// ---------------------------------------------------------------------------

/// Inference client returning queued responses and recording requested models.
#[derive(Clone)]
pub struct MockInferenceClient {
    /// Each call pops the first element. If empty, returns no predictions.
    responses: Arc<Mutex<Vec<Result<Vec<EntityPrediction>, AppError>>>>,
    models: Arc<Mutex<Vec<String>>>,
}

impl MockInferenceClient {
    pub fn new(responses: Vec<Result<Vec<EntityPrediction>, AppError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            models: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn models_called(&self) -> Vec<String> {
        self.models.lock().unwrap().clone()
    }
}

impl InferenceClient for MockInferenceClient {
    async fn infer(&self, model: &str, _text: &str) -> Result<Vec<EntityPrediction>, AppError> {
        self.models.lock().unwrap().push(model.to_string());
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(Vec::new())
        } else {
            responses.remove(0)
        }
    }
}

pub fn prediction(label: &str, word: &str, score: f64) -> EntityPrediction {
    EntityPrediction {
        entity_group: label.to_string(),
        score,
        word: word.to_string(),
        start: None,
        end: None,
    }
}

// ---------------------------------------------------------------------------
// MockExtractor
// ---------------------------------------------------------------------------

/// Extraction method returning a fixed result after an optional delay.
#[derive(Clone)]
pub struct MockExtractor {
    method: &'static str,
    result: Result<ExtractedSkillSet, String>,
    /// Returned by the first call; later calls get `AppError::Generic`
    /// with the same message.
    first_error: Arc<Mutex<Option<AppError>>>,
    delay: Option<Duration>,
}

impl MockExtractor {
    pub fn new(method: &'static str, skills: ExtractedSkillSet) -> Self {
        Self {
            method,
            result: Ok(skills),
            first_error: Arc::new(Mutex::new(None)),
            delay: None,
        }
    }

    pub fn with_error(method: &'static str, error: AppError) -> Self {
        Self {
            method,
            result: Err(error.to_string()),
            first_error: Arc::new(Mutex::new(Some(error))),
            delay: None,
        }
    }

    /// Sleep (on the tokio clock) before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

impl SkillExtractor for MockExtractor {
    fn method(&self) -> &'static str {
        self.method
    }

    async fn extract(&self, _text: &str) -> Result<ExtractedSkillSet, AppError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.result {
            Ok(skills) => Ok(skills.clone()),
            Err(message) => {
                let first = self.first_error.lock().unwrap().take();
                Err(first.unwrap_or_else(|| AppError::Generic(message.clone())))
            }
        }
    }
}

/// Skill set from `(category, skills)` pairs. Skill lists should be sorted.
pub fn skill_set(categories: &[(&str, &[&str])]) -> ExtractedSkillSet {
    ExtractedSkillSet {
        categories: categories
            .iter()
            .map(|(category, skills)| {
                (
                    category.to_string(),
                    skills.iter().map(|s| s.to_string()).collect(),
                )
            })
            .collect(),
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// MockReporter
// ---------------------------------------------------------------------------

/// Reporter recording event names in snake case.
#[derive(Clone, Default)]
pub struct MockReporter {
    events: Arc<Mutex<Vec<String>>>,
}

impl MockReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl PipelineReporter for MockReporter {
    fn report(&self, event: PipelineEvent<'_>) {
        let name = match event {
            PipelineEvent::ExtractionStarted { .. } => "extraction_started",
            PipelineEvent::MethodFailed { .. } => "method_failed",
            PipelineEvent::ExtractionFinished { .. } => "extraction_finished",
            PipelineEvent::CandidatesRanked { .. } => "candidates_ranked",
            PipelineEvent::JobStarted { .. } => "job_started",
            PipelineEvent::FileCompleted { .. } => "file_completed",
            PipelineEvent::FileFailed { .. } => "file_failed",
            PipelineEvent::JobFinished { .. } => "job_finished",
            PipelineEvent::AgentRequestFinished { .. } => "agent_request_finished",
        };
        self.events.lock().unwrap().push(name.to_string());
    }
}
