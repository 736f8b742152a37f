//! Job lifecycle operations over a [`JobStore`].
//!
//! ```text
//! pending ──► processing ──► completed
//!    │            │
//!    └────────────┴────────► failed
//! ```
//!
//! Progress counters are cumulative: callers always report totals, never
//! increments. A failing file increments `files_failed` and does not abort
//! the job.

use crate::error::AppError;
use crate::job::{ExtractionJob, JobStatus};
use crate::store::JobStore;

#[derive(Clone)]
pub struct JobTracker<S: JobStore> {
    store: S,
}

impl<S: JobStore> JobTracker<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn create_or_update(
        &self,
        request_id: &str,
        status: JobStatus,
        num_files: u32,
        file_number: Option<u32>,
        metadata: serde_json::Value,
    ) -> Result<ExtractionJob, AppError> {
        if request_id.trim().is_empty() {
            return Err(AppError::ValidationError("request id is empty".into()));
        }
        let job = self
            .store
            .create_or_update(request_id, status, num_files, file_number, metadata)
            .await?;
        tracing::info!(
            request_id,
            status = %job.status,
            num_files = job.num_files,
            ?file_number,
            "Job status reported"
        );
        Ok(job)
    }

    pub async fn progress(
        &self,
        request_id: &str,
        files_processed: u32,
        files_failed: u32,
    ) -> Result<ExtractionJob, AppError> {
        let job = self
            .store
            .update_progress(request_id, files_processed, files_failed)
            .await?;
        tracing::debug!(
            request_id,
            files_processed,
            files_failed,
            num_files = job.num_files,
            "Job progress"
        );
        Ok(job)
    }

    pub async fn success(
        &self,
        request_id: &str,
        total_time_ms: u64,
    ) -> Result<ExtractionJob, AppError> {
        let job = self.store.mark_success(request_id, total_time_ms).await?;
        tracing::info!(
            request_id,
            total_time_ms,
            average_time_ms = ?job.average_processing_time_ms,
            files_failed = job.files_failed,
            "Job completed"
        );
        Ok(job)
    }

    pub async fn failed(
        &self,
        request_id: &str,
        error_message: &str,
    ) -> Result<ExtractionJob, AppError> {
        let job = self.store.mark_failed(request_id, error_message).await?;
        tracing::warn!(request_id, error = error_message, "Job failed");
        Ok(job)
    }

    pub async fn get(&self, request_id: &str) -> Result<Option<ExtractionJob>, AppError> {
        self.store.get(request_id).await
    }

    pub async fn list(
        &self,
        status: Option<JobStatus>,
        limit: usize,
    ) -> Result<Vec<ExtractionJob>, AppError> {
        self.store.list(status, limit).await
    }
}
