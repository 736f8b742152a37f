use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio::task::JoinSet;
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::error::AppError;
use crate::inference::validate_text;
use crate::job::{
    AgentRequest, AgentResponse, ExtractionJob, JobStatus, NewExtraction, ProcessingType,
};
use crate::matching::MatchEngine;
use crate::models::{ExtractedSkillSet, Match, compute_hash};
use crate::orchestrator::{ExtractionOrchestrator, OrchestratedExtraction};
use crate::store::{AgentStore, JobStore, MatchStore};
use crate::tracker::JobTracker;
use crate::traits::{CandidateRepository, CategoryProvider, SkillExtractor};

/// Events emitted by the pipeline for monitoring/logging.
#[derive(Debug, Clone)]
pub enum PipelineEvent<'a> {
    ExtractionStarted {
        processing_type: ProcessingType,
        chars: usize,
    },
    MethodFailed {
        method: &'a str,
        error: &'a str,
    },
    ExtractionFinished {
        skills: usize,
        partial: bool,
        elapsed_ms: u64,
    },
    CandidatesRanked {
        pool: usize,
        returned: usize,
    },
    JobStarted {
        request_id: &'a str,
        num_files: u32,
    },
    FileCompleted {
        request_id: &'a str,
        file_number: u32,
        skills: usize,
    },
    FileFailed {
        request_id: &'a str,
        file_number: u32,
        error: &'a str,
    },
    JobFinished {
        job: &'a ExtractionJob,
    },
    AgentRequestFinished {
        id: Uuid,
        status: JobStatus,
    },
}

/// Trait for receiving pipeline events (decoupled logging).
pub trait PipelineReporter: Send + Sync {
    fn report(&self, event: PipelineEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingPipelineReporter;

impl PipelineReporter for TracingPipelineReporter {
    fn report(&self, event: PipelineEvent<'_>) {
        match event {
            PipelineEvent::ExtractionStarted {
                processing_type,
                chars,
            } => {
                tracing::debug!(%processing_type, chars, "Extraction started");
            }
            PipelineEvent::MethodFailed { method, error } => {
                tracing::warn!(%method, %error, "Extraction method failed");
            }
            PipelineEvent::ExtractionFinished {
                skills,
                partial,
                elapsed_ms,
            } => {
                tracing::info!(skills, partial, elapsed_ms, "Extraction finished");
            }
            PipelineEvent::CandidatesRanked { pool, returned } => {
                tracing::info!(pool, returned, "Candidates ranked");
            }
            PipelineEvent::JobStarted {
                request_id,
                num_files,
            } => {
                tracing::info!(%request_id, num_files, "Tracked extraction started");
            }
            PipelineEvent::FileCompleted {
                request_id,
                file_number,
                skills,
            } => {
                tracing::info!(%request_id, file_number, skills, "File extracted");
            }
            PipelineEvent::FileFailed {
                request_id,
                file_number,
                error,
            } => {
                tracing::warn!(%request_id, file_number, %error, "File extraction failed");
            }
            PipelineEvent::JobFinished { job } => {
                tracing::info!(
                    request_id = %job.request_id,
                    status = %job.status,
                    files_processed = job.files_processed,
                    files_failed = job.files_failed,
                    "Tracked extraction finished"
                );
            }
            PipelineEvent::AgentRequestFinished { id, status } => {
                tracing::info!(%id, %status, "Agent request finished");
            }
        }
    }
}

/// Search terms and category coverage for `search_analysis` requests.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchAnalysis {
    pub terms: Vec<String>,
    /// Known categories with at least one extracted skill.
    pub matched_categories: Vec<String>,
    pub unmatched_categories: Vec<String>,
}

/// Result of [`PipelineService::extract_and_match`].
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutput {
    pub processing_type: ProcessingType,
    pub skills: ExtractedSkillSet,
    pub matches: Vec<Match>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<SearchAnalysis>,
    pub summary: String,
    pub warnings: Vec<String>,
}

/// Persistence used by the pipeline.
#[derive(Clone)]
pub struct PipelineStores<J: JobStore, M: MatchStore, A: AgentStore> {
    pub jobs: J,
    pub matches: M,
    pub agents: A,
}

/// Entry points wiring extraction, matching and job tracking together.
pub struct PipelineService<T, E, P, J, M, A>
where
    T: SkillExtractor,
    E: SkillExtractor,
    P: CandidateRepository,
    J: JobStore,
    M: MatchStore,
    A: AgentStore,
{
    orchestrator: ExtractionOrchestrator<T, E>,
    categories: Arc<dyn CategoryProvider>,
    candidates: P,
    engine: MatchEngine,
    tracker: JobTracker<J>,
    matches: M,
    agents: A,
    config: PipelineConfig,
    reporter: Arc<dyn PipelineReporter>,
}

impl<T, E, P, J, M, A> PipelineService<T, E, P, J, M, A>
where
    T: SkillExtractor,
    E: SkillExtractor,
    P: CandidateRepository,
    J: JobStore,
    M: MatchStore,
    A: AgentStore,
{
    pub fn new(
        orchestrator: ExtractionOrchestrator<T, E>,
        categories: Arc<dyn CategoryProvider>,
        candidates: P,
        stores: PipelineStores<J, M, A>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            orchestrator,
            categories,
            candidates,
            engine: MatchEngine::default(),
            tracker: JobTracker::new(stores.jobs),
            matches: stores.matches,
            agents: stores.agents,
            config,
            reporter: Arc::new(TracingPipelineReporter),
        }
    }

    pub fn with_engine(mut self, engine: MatchEngine) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn PipelineReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn tracker(&self) -> &JobTracker<J> {
        &self.tracker
    }

    pub fn match_store(&self) -> &M {
        &self.matches
    }

    pub fn agent_store(&self) -> &A {
        &self.agents
    }

    /// Extract skills from `text` and shape the result for `processing_type`.
    pub async fn extract_and_match(
        &self,
        text: &str,
        processing_type: ProcessingType,
    ) -> Result<PipelineOutput, AppError> {
        validate_text(text)?;
        self.reporter.report(PipelineEvent::ExtractionStarted {
            processing_type,
            chars: text.chars().count(),
        });

        let started = Instant::now();
        let extraction = self.orchestrator.extract(text).await?;
        let warnings = self.report_extraction(&extraction, started);
        let skills = extraction.skills;

        let mut output = PipelineOutput {
            processing_type,
            summary: describe(&skills),
            skills,
            matches: Vec::new(),
            search: None,
            warnings,
        };

        match processing_type {
            ProcessingType::CandidateMatching => self.rank_candidates(&mut output).await?,
            ProcessingType::SearchAnalysis => {
                output.search = Some(self.search_analysis(&output.skills));
            }
            ProcessingType::CandidateExtraction | ProcessingType::Generic => {}
        }
        Ok(output)
    }

    /// Run one extraction per file concurrently under a tracked job.
    ///
    /// A failing file increments `files_failed` and never aborts its siblings.
    /// The job ends `failed` only when every file failed. A job-state or
    /// persistence error stops the run, marks the job `failed` and is returned.
    pub async fn track_extraction(
        &self,
        request_id: &str,
        files: Vec<String>,
    ) -> Result<ExtractionJob, AppError> {
        let num_files = u32::try_from(files.len())
            .map_err(|_| AppError::ValidationError(format!("too many files: {}", files.len())))?;
        let started = Instant::now();

        self.tracker
            .create_or_update(
                request_id,
                JobStatus::Pending,
                num_files,
                None,
                serde_json::json!({ "source": "track_extraction" }),
            )
            .await?;
        self.tracker
            .create_or_update(
                request_id,
                JobStatus::Processing,
                num_files,
                None,
                serde_json::Value::Null,
            )
            .await?;
        self.reporter.report(PipelineEvent::JobStarted {
            request_id,
            num_files,
        });

        // The job is `processing` from here on; any error must leave it terminal.
        match self.run_files(request_id, files, num_files, started).await {
            Ok(job) => {
                self.reporter.report(PipelineEvent::JobFinished { job: &job });
                Ok(job)
            }
            Err(e) => {
                self.abandon_job(request_id, &e).await;
                Err(e)
            }
        }
    }

    async fn run_files(
        &self,
        request_id: &str,
        files: Vec<String>,
        num_files: u32,
        started: Instant,
    ) -> Result<ExtractionJob, AppError> {
        let mut tasks = JoinSet::new();
        for (index, text) in files.into_iter().enumerate() {
            let orchestrator = self.orchestrator.clone();
            let file_number = index as u32 + 1;
            tasks.spawn(async move {
                let file_started = Instant::now();
                let result = match validate_text(&text) {
                    Ok(()) => orchestrator.extract(&text).await,
                    Err(e) => Err(e),
                };
                FileOutcome {
                    file_number,
                    content_hash: compute_hash(&text),
                    result,
                    elapsed_ms: file_started.elapsed().as_millis() as u64,
                }
            });
        }

        let mut processed = 0u32;
        let mut failed = 0u32;
        let mut last_error = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => match self.persist_file(request_id, outcome).await {
                    Ok(()) => processed += 1,
                    Err(message) => {
                        failed += 1;
                        last_error = Some(message);
                    }
                },
                Err(e) => {
                    failed += 1;
                    last_error = Some(format!("extraction task panicked: {e}"));
                }
            }
            self.tracker.progress(request_id, processed, failed).await?;
        }

        if num_files > 0 && processed == 0 {
            let message = format!(
                "All {num_files} files failed; last error: {}",
                last_error.as_deref().unwrap_or("unknown")
            );
            self.tracker.failed(request_id, &message).await
        } else {
            self.tracker
                .success(request_id, started.elapsed().as_millis() as u64)
                .await
        }
    }

    /// Best-effort move of a job to `failed` after a state or persistence error.
    async fn abandon_job(&self, request_id: &str, error: &AppError) {
        let message = format!("Job aborted: {error}");
        match self.tracker.failed(request_id, &message).await {
            Ok(job) => self.reporter.report(PipelineEvent::JobFinished { job: &job }),
            Err(e) => {
                tracing::error!(%request_id, error = %e, "Could not mark aborted job as failed");
            }
        }
    }

    /// Run [`extract_and_match`](Self::extract_and_match) as a persisted
    /// single-shot agent request.
    ///
    /// Any error after the request reaches `processing` marks it `failed`
    /// with the error message before being returned.
    pub async fn run_agent_request(
        &self,
        processing_type: ProcessingType,
        text: &str,
    ) -> Result<AgentResponse, AppError> {
        let request = AgentRequest::new(processing_type, text);
        self.agents.create_request(&request).await?;
        self.agents
            .update_status(request.id, JobStatus::Processing, None)
            .await?;

        let started = Instant::now();
        let error = match self
            .complete_agent_request(&request, text, processing_type, started)
            .await
        {
            Ok(response) => {
                self.reporter.report(PipelineEvent::AgentRequestFinished {
                    id: request.id,
                    status: JobStatus::Completed,
                });
                return Ok(response);
            }
            Err(e) => e,
        };

        let message = error.to_string();
        if let Err(e) = self
            .agents
            .update_status(request.id, JobStatus::Failed, Some(&message))
            .await
        {
            tracing::error!(id = %request.id, error = %e, "Could not mark agent request as failed");
        }
        self.reporter.report(PipelineEvent::AgentRequestFinished {
            id: request.id,
            status: JobStatus::Failed,
        });
        Err(error)
    }

    async fn complete_agent_request(
        &self,
        request: &AgentRequest,
        text: &str,
        processing_type: ProcessingType,
        started: Instant,
    ) -> Result<AgentResponse, AppError> {
        let output = self.extract_and_match(text, processing_type).await?;
        let response = AgentResponse {
            id: Uuid::new_v4(),
            request_id: request.id,
            skills: output.skills,
            matches: output.matches,
            summary: output.summary,
            warnings: output.warnings,
            processing_time_ms: started.elapsed().as_millis() as u64,
            created_at: chrono::Utc::now(),
        };
        self.agents.save_response(&response).await?;
        if !response.matches.is_empty() {
            self.matches
                .save_matches(&request.id.to_string(), &response.matches)
                .await?;
        }
        self.agents
            .update_status(request.id, JobStatus::Completed, None)
            .await?;
        Ok(response)
    }

    fn report_extraction(
        &self,
        extraction: &OrchestratedExtraction,
        started: Instant,
    ) -> Vec<String> {
        for err in &extraction.method_errors {
            self.reporter.report(PipelineEvent::MethodFailed {
                method: &err.method,
                error: &err.message,
            });
        }
        self.reporter.report(PipelineEvent::ExtractionFinished {
            skills: extraction.skills.total_skills(),
            partial: extraction.is_partial(),
            elapsed_ms: started.elapsed().as_millis() as u64,
        });
        extraction
            .method_errors
            .iter()
            .map(|e| format!("{} extraction failed: {}", e.method, e.message))
            .collect()
    }

    async fn rank_candidates(&self, output: &mut PipelineOutput) -> Result<(), AppError> {
        let required = output.skills.skill_names();
        if required.is_empty() {
            output
                .warnings
                .push("No skills extracted; candidate matching skipped".into());
            return Ok(());
        }

        let pool = self.candidates.get_all().await?;
        output.matches = self.engine.score(
            &required,
            &[],
            &pool,
            self.config.min_match_score,
            self.config.top_n,
        );
        self.reporter.report(PipelineEvent::CandidatesRanked {
            pool: pool.len(),
            returned: output.matches.len(),
        });

        if output.matches.is_empty() {
            output
                .warnings
                .push("No candidate reached the minimum match score".into());
        }
        output.summary = format!(
            "{}; {} of {} candidates matched",
            output.summary,
            output.matches.len(),
            pool.len()
        );
        Ok(())
    }

    fn search_analysis(&self, skills: &ExtractedSkillSet) -> SearchAnalysis {
        let found: Vec<String> = skills
            .categories
            .iter()
            .filter(|(_, names)| !names.is_empty())
            .map(|(category, _)| category.to_lowercase())
            .collect();
        let (matched, unmatched): (Vec<String>, Vec<String>) = self
            .categories
            .current_categories()
            .into_iter()
            .map(|c| c.name)
            .partition(|name| found.contains(&name.to_lowercase()));

        SearchAnalysis {
            terms: skills.skill_names(),
            matched_categories: matched,
            unmatched_categories: unmatched,
        }
    }

    async fn persist_file(&self, request_id: &str, outcome: FileOutcome) -> Result<(), String> {
        let FileOutcome {
            file_number,
            content_hash,
            result,
            elapsed_ms,
        } = outcome;

        let extraction = match result {
            Ok(extraction) => extraction,
            Err(e) => {
                let message = e.to_string();
                self.reporter.report(PipelineEvent::FileFailed {
                    request_id,
                    file_number,
                    error: &message,
                });
                return Err(message);
            }
        };

        let record = NewExtraction {
            request_id: request_id.to_string(),
            file_number,
            content_hash,
            warnings: extraction
                .method_errors
                .iter()
                .map(|e| format!("{} extraction failed: {}", e.method, e.message))
                .collect(),
            processing_time_ms: elapsed_ms,
            skills: extraction.skills,
        };
        if let Err(e) = self.matches.save_extraction(&record).await {
            let message = format!("failed to save extraction: {e}");
            self.reporter.report(PipelineEvent::FileFailed {
                request_id,
                file_number,
                error: &message,
            });
            return Err(message);
        }

        self.reporter.report(PipelineEvent::FileCompleted {
            request_id,
            file_number,
            skills: record.skills.total_skills(),
        });
        Ok(())
    }
}

struct FileOutcome {
    file_number: u32,
    content_hash: String,
    result: Result<OrchestratedExtraction, AppError>,
    elapsed_ms: u64,
}

fn describe(skills: &ExtractedSkillSet) -> String {
    if !skills.summary.is_empty() {
        return skills.summary.clone();
    }
    let categories = skills
        .categories
        .values()
        .filter(|names| !names.is_empty())
        .count();
    format!(
        "Found {} skills across {} categories",
        skills.total_skills(),
        categories
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryAgentStore, MemoryJobStore, MemoryMatchStore};
    use crate::testutil::{
        MockCandidateRepository, MockCategoryProvider, MockExtractor, MockReporter, candidate,
        skill_set,
    };
    use crate::inference::MAX_INFERENCE_TEXT_CHARS;
    use std::time::Duration;

    /// Agent store whose response writes always fail.
    #[derive(Clone, Default)]
    struct RejectingResponseStore {
        inner: MemoryAgentStore,
    }

    impl AgentStore for RejectingResponseStore {
        async fn create_request(&self, request: &AgentRequest) -> Result<(), AppError> {
            self.inner.create_request(request).await
        }

        async fn update_status(
            &self,
            id: Uuid,
            status: JobStatus,
            error_message: Option<&str>,
        ) -> Result<AgentRequest, AppError> {
            self.inner.update_status(id, status, error_message).await
        }

        async fn save_response(&self, _response: &AgentResponse) -> Result<(), AppError> {
            Err(AppError::DatabaseError("disk full".into()))
        }

        async fn get_request(&self, id: Uuid) -> Result<Option<AgentRequest>, AppError> {
            self.inner.get_request(id).await
        }

        async fn get_response(&self, request_id: Uuid) -> Result<Option<AgentResponse>, AppError> {
            self.inner.get_response(request_id).await
        }
    }

    type TestService = PipelineService<
        MockExtractor,
        MockExtractor,
        MockCandidateRepository,
        MemoryJobStore,
        MemoryMatchStore,
        MemoryAgentStore,
    >;

    fn service(text: MockExtractor, inference: MockExtractor) -> (TestService, MockReporter) {
        service_with(text, inference, MemoryAgentStore::new())
    }

    fn service_with<A: AgentStore>(
        text: MockExtractor,
        inference: MockExtractor,
        agents: A,
    ) -> (
        PipelineService<
            MockExtractor,
            MockExtractor,
            MockCandidateRepository,
            MemoryJobStore,
            MemoryMatchStore,
            A,
        >,
        MockReporter,
    ) {
        let reporter = MockReporter::new();
        let pool = vec![
            candidate(1, &["Go"]),
            candidate(2, &["Go", "SQL"]),
            candidate(3, &["Java"]),
        ];
        let service = PipelineService::new(
            ExtractionOrchestrator::new(text, inference).with_timeout(Duration::from_secs(30)),
            Arc::new(MockCategoryProvider::new(&["Languages", "Databases", "Cloud"])),
            MockCandidateRepository::new(pool),
            PipelineStores {
                jobs: MemoryJobStore::new(),
                matches: MemoryMatchStore::new(),
                agents,
            },
            PipelineConfig::default(),
        )
        .with_reporter(Arc::new(reporter.clone()));
        (service, reporter)
    }

    #[tokio::test(start_paused = true)]
    async fn timed_out_method_still_succeeds() {
        let (service, reporter) = service(
            MockExtractor::new("text", skill_set(&[("Languages", &["Go"])])),
            MockExtractor::new("inference", skill_set(&[("Cloud", &["AWS"])]))
                .with_delay(Duration::from_secs(120)),
        );

        let output = service
            .extract_and_match("Senior Go developer", ProcessingType::Generic)
            .await
            .unwrap();

        assert_eq!(output.skills.skill_names(), vec!["Go"]);
        assert_eq!(output.warnings.len(), 1);
        assert!(output.warnings[0].starts_with("inference"));
        assert!(reporter.events().contains(&"method_failed".to_string()));
    }

    #[tokio::test]
    async fn candidate_matching_ranks_pool() {
        let (service, _) = service(
            MockExtractor::new("text", skill_set(&[("Languages", &["Go"]), ("Databases", &["SQL"])])),
            MockExtractor::new("inference", ExtractedSkillSet::default()),
        );

        let output = service
            .extract_and_match("Go and SQL", ProcessingType::CandidateMatching)
            .await
            .unwrap();

        let ids: Vec<i64> = output.matches.iter().map(|m| m.employee_id).collect();
        assert_eq!(ids, vec![2, 1]);
        assert_eq!(output.matches[0].match_score, 100.0);
        assert!(output.summary.ends_with("2 of 3 candidates matched"));
    }

    #[tokio::test]
    async fn search_analysis_reports_category_coverage() {
        let (service, _) = service(
            MockExtractor::new("text", skill_set(&[("Languages", &["Go"])])),
            MockExtractor::new("inference", skill_set(&[("Cloud", &["AWS"])])),
        );

        let output = service
            .extract_and_match("Go on AWS", ProcessingType::SearchAnalysis)
            .await
            .unwrap();

        let search = output.search.unwrap();
        assert_eq!(search.terms, vec!["AWS", "Go"]);
        assert_eq!(search.matched_categories, vec!["Languages", "Cloud"]);
        assert_eq!(search.unmatched_categories, vec!["Databases"]);
        assert!(output.matches.is_empty());
    }

    #[tokio::test]
    async fn empty_text_is_rejected() {
        let (service, _) = service(
            MockExtractor::new("text", ExtractedSkillSet::default()),
            MockExtractor::new("inference", ExtractedSkillSet::default()),
        );

        let err = service
            .extract_and_match("   ", ProcessingType::Generic)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn tracked_job_tolerates_failed_files() {
        let (service, _) = service(
            MockExtractor::new("text", skill_set(&[("Languages", &["Go"])])),
            MockExtractor::new("inference", ExtractedSkillSet::default()),
        );

        let job = service
            .track_extraction(
                "req-7",
                vec!["Go developer".into(), "".into(), "Go and more Go".into()],
            )
            .await
            .unwrap();

        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.num_files, 3);
        assert_eq!(job.files_processed, 2);
        assert_eq!(job.files_failed, 1);
        assert!(job.average_processing_time_ms.is_some());

        let saved = service.match_store().list_extractions("req-7").await.unwrap();
        let numbers: Vec<u32> = saved.iter().map(|e| e.file_number).collect();
        assert_eq!(numbers, vec![1, 3]);
    }

    #[tokio::test]
    async fn tracked_job_fails_when_every_file_fails() {
        let (service, _) = service(
            MockExtractor::with_error("text", AppError::CatalogError("down".into())),
            MockExtractor::with_error("inference", AppError::NetworkError("refused".into())),
        );

        let job = service
            .track_extraction("req-8", vec!["Go".into(), "Rust".into()])
            .await
            .unwrap();

        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.files_failed, 2);
        assert!(job.error_message.unwrap().starts_with("All 2 files failed"));
    }

    #[tokio::test]
    async fn rerunning_a_finished_job_is_rejected() {
        let (service, _) = service(
            MockExtractor::new("text", skill_set(&[("Languages", &["Go"])])),
            MockExtractor::new("inference", ExtractedSkillSet::default()),
        );
        service.track_extraction("req-9", vec!["Go".into()]).await.unwrap();

        let err = service
            .track_extraction("req-9", vec!["Go".into()])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn agent_request_is_persisted() {
        let (service, reporter) = service(
            MockExtractor::new("text", skill_set(&[("Languages", &["Go"])])),
            MockExtractor::new("inference", ExtractedSkillSet::default()),
        );

        let response = service
            .run_agent_request(ProcessingType::CandidateMatching, "Go")
            .await
            .unwrap();

        let request = service
            .agent_store()
            .get_request(response.request_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(request.status, JobStatus::Completed);
        assert!(request.completed_at.is_some());
        let stored = service
            .agent_store()
            .get_response(response.request_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored, response);
        let matches = service
            .match_store()
            .list_matches(&response.request_id.to_string())
            .await
            .unwrap();
        assert_eq!(matches.len(), 2);
        assert!(reporter.events().contains(&"agent_request_finished".to_string()));
    }

    #[tokio::test]
    async fn failed_agent_request_records_error() {
        let (service, _) = service(
            MockExtractor::with_error("text", AppError::CatalogError("down".into())),
            MockExtractor::with_error("inference", AppError::NetworkError("refused".into())),
        );

        let err = service
            .run_agent_request(ProcessingType::Generic, "Go")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ExtractionFailed { .. }));

        let requests = service.agent_store().requests().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].status, JobStatus::Failed);
        assert!(requests[0].completed_at.is_some());
        assert!(
            requests[0]
                .error_message
                .as_deref()
                .unwrap()
                .starts_with("All extraction methods failed")
        );
    }

    #[tokio::test]
    async fn response_write_failure_fails_the_request() {
        let store = RejectingResponseStore::default();
        let (service, reporter) = service_with(
            MockExtractor::new("text", skill_set(&[("Languages", &["Go"])])),
            MockExtractor::new("inference", ExtractedSkillSet::default()),
            store.clone(),
        );

        let err = service
            .run_agent_request(ProcessingType::CandidateExtraction, "Go")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DatabaseError(_)));

        let requests = store.inner.requests().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].status, JobStatus::Failed);
        assert!(requests[0].completed_at.is_some());
        assert!(requests[0].error_message.as_deref().unwrap().contains("disk full"));
        assert!(reporter.events().contains(&"agent_request_finished".to_string()));
    }

    #[tokio::test]
    async fn oversized_text_is_rejected_before_extraction() {
        let (service, reporter) = service(
            MockExtractor::new("text", skill_set(&[("Languages", &["Go"])])),
            MockExtractor::new("inference", ExtractedSkillSet::default()),
        );
        let long = "Go ".repeat(MAX_INFERENCE_TEXT_CHARS / 3 + 1);

        let err = service
            .extract_and_match(&long, ProcessingType::Generic)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::ValidationError(_)));
        assert!(reporter.events().is_empty());
    }

    #[tokio::test]
    async fn oversized_file_counts_as_failed() {
        let (service, _) = service(
            MockExtractor::new("text", skill_set(&[("Languages", &["Go"])])),
            MockExtractor::new("inference", ExtractedSkillSet::default()),
        );
        let long = "x".repeat(MAX_INFERENCE_TEXT_CHARS + 1);

        let job = service
            .track_extraction("req-11", vec!["Go developer".into(), long])
            .await
            .unwrap();

        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.files_processed, 1);
        assert_eq!(job.files_failed, 1);
    }

    #[tokio::test]
    async fn state_error_mid_run_fails_the_job() {
        let (service, _) = service(
            MockExtractor::new("text", skill_set(&[("Languages", &["Go"])])),
            MockExtractor::new("inference", ExtractedSkillSet::default()),
        );
        // An earlier report registered the job with a single file.
        service
            .tracker()
            .create_or_update("req-10", JobStatus::Pending, 1, None, serde_json::Value::Null)
            .await
            .unwrap();

        let err = service
            .track_extraction("req-10", vec!["Go".into(), "Go".into(), "Go".into()])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));

        let job = service.tracker().get("req-10").await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.completed_at.is_some());
        assert!(job.error_message.unwrap().starts_with("Job aborted"));
    }
}
