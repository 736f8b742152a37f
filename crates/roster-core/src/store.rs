use std::future::Future;

use uuid::Uuid;

use crate::error::AppError;
use crate::job::{AgentRequest, AgentResponse, Extraction, ExtractionJob, JobStatus, NewExtraction};
use crate::models::Match;

/// Persistent state of extraction jobs, keyed by `request_id`.
///
/// Implementations must reject backward transitions and any mutation of a
/// terminal job with [`AppError::InvalidTransition`], and must never let
/// `files_processed + files_failed` exceed `num_files`.
pub trait JobStore: Send + Sync + Clone {
    /// Create the job with zero progress, or update only its status (and the
    /// last reported file number) when it already exists.
    fn create_or_update(
        &self,
        request_id: &str,
        status: JobStatus,
        num_files: u32,
        file_number: Option<u32>,
        metadata: serde_json::Value,
    ) -> impl Future<Output = Result<ExtractionJob, AppError>> + Send;

    /// Overwrite the cumulative counters.
    fn update_progress(
        &self,
        request_id: &str,
        files_processed: u32,
        files_failed: u32,
    ) -> impl Future<Output = Result<ExtractionJob, AppError>> + Send;

    fn mark_success(
        &self,
        request_id: &str,
        total_time_ms: u64,
    ) -> impl Future<Output = Result<ExtractionJob, AppError>> + Send;

    fn mark_failed(
        &self,
        request_id: &str,
        error_message: &str,
    ) -> impl Future<Output = Result<ExtractionJob, AppError>> + Send;

    fn get(
        &self,
        request_id: &str,
    ) -> impl Future<Output = Result<Option<ExtractionJob>, AppError>> + Send;

    /// Most recently created first.
    fn list(
        &self,
        status: Option<JobStatus>,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<ExtractionJob>, AppError>> + Send;
}

/// Per-file extraction metadata and match results of a request.
pub trait MatchStore: Send + Sync + Clone {
    fn save_extraction(
        &self,
        extraction: &NewExtraction,
    ) -> impl Future<Output = Result<Uuid, AppError>> + Send;

    fn list_extractions(
        &self,
        request_id: &str,
    ) -> impl Future<Output = Result<Vec<Extraction>, AppError>> + Send;

    fn save_matches(
        &self,
        request_id: &str,
        matches: &[Match],
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Best score first.
    fn list_matches(
        &self,
        request_id: &str,
    ) -> impl Future<Output = Result<Vec<Match>, AppError>> + Send;
}

/// Agent requests and their single response.
pub trait AgentStore: Send + Sync + Clone {
    fn create_request(
        &self,
        request: &AgentRequest,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Same transition rules as [`JobStore`]. `error_message` is stored only
    /// when the request fails.
    fn update_status(
        &self,
        id: Uuid,
        status: JobStatus,
        error_message: Option<&str>,
    ) -> impl Future<Output = Result<AgentRequest, AppError>> + Send;

    fn save_response(
        &self,
        response: &AgentResponse,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    fn get_request(
        &self,
        id: Uuid,
    ) -> impl Future<Output = Result<Option<AgentRequest>, AppError>> + Send;

    fn get_response(
        &self,
        request_id: Uuid,
    ) -> impl Future<Output = Result<Option<AgentResponse>, AppError>> + Send;
}
