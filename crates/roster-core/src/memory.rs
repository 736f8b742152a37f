//! In-process stores used by the CLI when no database is configured, and by
//! pipeline tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::error::AppError;
use crate::job::{AgentRequest, AgentResponse, Extraction, ExtractionJob, JobStatus, NewExtraction};
use crate::models::Match;
use crate::store::{AgentStore, JobStore, MatchStore};

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, AppError> {
    mutex
        .lock()
        .map_err(|_| AppError::Generic("in-memory store lock poisoned".into()))
}

fn missing_job(request_id: &str) -> AppError {
    AppError::NotFound(format!("job {request_id}"))
}

#[derive(Clone)]
pub struct MemoryJobStore {
    jobs: Arc<Mutex<HashMap<String, ExtractionJob>>>,
    clock: Arc<dyn Clock>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            jobs: Arc::new(Mutex::new(HashMap::new())),
            clock,
        }
    }

    fn mutate(
        &self,
        request_id: &str,
        apply: impl FnOnce(&mut ExtractionJob) -> Result<(), AppError>,
    ) -> Result<ExtractionJob, AppError> {
        let mut jobs = lock(&self.jobs)?;
        let job = jobs
            .get_mut(request_id)
            .ok_or_else(|| missing_job(request_id))?;
        // Work on a copy so a rejected update leaves the stored job untouched.
        let mut updated = job.clone();
        apply(&mut updated)?;
        *job = updated.clone();
        Ok(updated)
    }
}

impl Default for MemoryJobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl JobStore for MemoryJobStore {
    async fn create_or_update(
        &self,
        request_id: &str,
        status: JobStatus,
        num_files: u32,
        file_number: Option<u32>,
        metadata: serde_json::Value,
    ) -> Result<ExtractionJob, AppError> {
        let now = self.clock.now();
        let mut jobs = lock(&self.jobs)?;
        match jobs.get_mut(request_id) {
            Some(job) => {
                let mut updated = job.clone();
                updated.transition(status, file_number, now)?;
                *job = updated.clone();
                Ok(updated)
            }
            None => {
                let mut job = ExtractionJob::new(request_id, status, num_files, metadata, now);
                if let (Some(n), Some(meta)) = (file_number, job.metadata.as_object_mut()) {
                    meta.insert("file_number".into(), serde_json::json!(n));
                }
                jobs.insert(request_id.to_string(), job.clone());
                Ok(job)
            }
        }
    }

    async fn update_progress(
        &self,
        request_id: &str,
        files_processed: u32,
        files_failed: u32,
    ) -> Result<ExtractionJob, AppError> {
        let now = self.clock.now();
        self.mutate(request_id, |job| {
            job.apply_progress(files_processed, files_failed, now)
        })
    }

    async fn mark_success(
        &self,
        request_id: &str,
        total_time_ms: u64,
    ) -> Result<ExtractionJob, AppError> {
        let now = self.clock.now();
        self.mutate(request_id, |job| job.complete(total_time_ms, now))
    }

    async fn mark_failed(
        &self,
        request_id: &str,
        error_message: &str,
    ) -> Result<ExtractionJob, AppError> {
        let now = self.clock.now();
        self.mutate(request_id, |job| job.fail(error_message, now))
    }

    async fn get(&self, request_id: &str) -> Result<Option<ExtractionJob>, AppError> {
        Ok(lock(&self.jobs)?.get(request_id).cloned())
    }

    async fn list(
        &self,
        status: Option<JobStatus>,
        limit: usize,
    ) -> Result<Vec<ExtractionJob>, AppError> {
        let mut jobs: Vec<ExtractionJob> = lock(&self.jobs)?
            .values()
            .filter(|job| status.is_none_or(|s| job.status == s))
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs.truncate(limit);
        Ok(jobs)
    }
}

#[derive(Clone, Default)]
pub struct MemoryMatchStore {
    extractions: Arc<Mutex<Vec<Extraction>>>,
    matches: Arc<Mutex<HashMap<String, Vec<Match>>>>,
}

impl MemoryMatchStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MatchStore for MemoryMatchStore {
    async fn save_extraction(&self, extraction: &NewExtraction) -> Result<Uuid, AppError> {
        let id = Uuid::new_v4();
        lock(&self.extractions)?.push(Extraction {
            id,
            request_id: extraction.request_id.clone(),
            file_number: extraction.file_number,
            skills: extraction.skills.clone(),
            content_hash: extraction.content_hash.clone(),
            warnings: extraction.warnings.clone(),
            processing_time_ms: extraction.processing_time_ms,
            created_at: chrono::Utc::now(),
        });
        Ok(id)
    }

    async fn list_extractions(&self, request_id: &str) -> Result<Vec<Extraction>, AppError> {
        let mut found: Vec<Extraction> = lock(&self.extractions)?
            .iter()
            .filter(|e| e.request_id == request_id)
            .cloned()
            .collect();
        found.sort_by_key(|e| e.file_number);
        Ok(found)
    }

    async fn save_matches(&self, request_id: &str, matches: &[Match]) -> Result<(), AppError> {
        lock(&self.matches)?
            .entry(request_id.to_string())
            .or_default()
            .extend_from_slice(matches);
        Ok(())
    }

    async fn list_matches(&self, request_id: &str) -> Result<Vec<Match>, AppError> {
        let mut found = lock(&self.matches)?
            .get(request_id)
            .cloned()
            .unwrap_or_default();
        found.sort_by(|a, b| {
            b.match_score
                .total_cmp(&a.match_score)
                .then_with(|| a.employee_id.cmp(&b.employee_id))
        });
        Ok(found)
    }
}

#[derive(Clone)]
pub struct MemoryAgentStore {
    requests: Arc<Mutex<HashMap<Uuid, AgentRequest>>>,
    responses: Arc<Mutex<HashMap<Uuid, AgentResponse>>>,
    clock: Arc<dyn Clock>,
}

impl MemoryAgentStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            requests: Arc::new(Mutex::new(HashMap::new())),
            responses: Arc::new(Mutex::new(HashMap::new())),
            clock,
        }
    }

    /// Every stored request, oldest first.
    pub fn requests(&self) -> Result<Vec<AgentRequest>, AppError> {
        let mut all: Vec<AgentRequest> = lock(&self.requests)?.values().cloned().collect();
        all.sort_by_key(|r| r.created_at);
        Ok(all)
    }
}

impl Default for MemoryAgentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentStore for MemoryAgentStore {
    async fn create_request(&self, request: &AgentRequest) -> Result<(), AppError> {
        lock(&self.requests)?.insert(request.id, request.clone());
        Ok(())
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: JobStatus,
        error_message: Option<&str>,
    ) -> Result<AgentRequest, AppError> {
        let now = self.clock.now();
        let mut requests = lock(&self.requests)?;
        let request = requests
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("agent request {id}")))?;
        let mut updated = request.clone();
        updated.transition(status, error_message, now)?;
        *request = updated.clone();
        Ok(updated)
    }

    async fn save_response(&self, response: &AgentResponse) -> Result<(), AppError> {
        lock(&self.responses)?.insert(response.request_id, response.clone());
        Ok(())
    }

    async fn get_request(&self, id: Uuid) -> Result<Option<AgentRequest>, AppError> {
        Ok(lock(&self.requests)?.get(&id).cloned())
    }

    async fn get_response(&self, request_id: Uuid) -> Result<Option<AgentResponse>, AppError> {
        Ok(lock(&self.responses)?.get(&request_id).cloned())
    }
}
