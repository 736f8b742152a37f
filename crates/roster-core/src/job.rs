use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{ExtractedSkillSet, Match};

/// Lifecycle state shared by extraction jobs and agent requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    fn rank(&self) -> u8 {
        match self {
            JobStatus::Pending => 0,
            JobStatus::Processing => 1,
            JobStatus::Completed | JobStatus::Failed => 2,
        }
    }

    /// Forward-only: pending → processing → completed | failed.
    /// Re-reporting the current non-terminal state is allowed.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        next.rank() >= self.rank()
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(JobStatus::Pending),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            _ => Err(format!("Unknown job status: {}", s)),
        }
    }
}

/// Post-processing shape applied to an extraction result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingType {
    CandidateExtraction,
    SearchAnalysis,
    CandidateMatching,
    #[default]
    Generic,
}

impl ProcessingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingType::CandidateExtraction => "candidate_extraction",
            ProcessingType::SearchAnalysis => "search_analysis",
            ProcessingType::CandidateMatching => "candidate_matching",
            ProcessingType::Generic => "generic",
        }
    }

    /// Unknown discriminators fall back to [`ProcessingType::Generic`].
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "candidate_extraction" => ProcessingType::CandidateExtraction,
            "search_analysis" => ProcessingType::SearchAnalysis,
            "candidate_matching" => ProcessingType::CandidateMatching,
            _ => ProcessingType::Generic,
        }
    }
}

impl fmt::Display for ProcessingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One tracked unit of (possibly multi-file) extraction work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionJob {
    pub id: Uuid,
    pub request_id: String,
    pub status: JobStatus,
    pub num_files: u32,
    pub files_processed: u32,
    pub files_failed: u32,
    pub total_processing_time_ms: Option<u64>,
    pub average_processing_time_ms: Option<u64>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ExtractionJob {
    /// A fresh job with zero progress.
    pub fn new(
        request_id: impl Into<String>,
        status: JobStatus,
        num_files: u32,
        metadata: serde_json::Value,
        now: DateTime<Utc>,
    ) -> Self {
        let mut job = Self {
            id: Uuid::new_v4(),
            request_id: request_id.into(),
            status: JobStatus::Pending,
            num_files,
            files_processed: 0,
            files_failed: 0,
            total_processing_time_ms: None,
            average_processing_time_ms: None,
            started_at: None,
            completed_at: None,
            error_message: None,
            metadata: if metadata.is_null() {
                serde_json::json!({})
            } else {
                metadata
            },
            created_at: now,
            updated_at: now,
        };
        if status == JobStatus::Processing {
            job.started_at = Some(now);
        }
        job.status = status;
        if status.is_terminal() {
            job.completed_at = Some(now);
        }
        job
    }

    fn invalid(&self, to: JobStatus) -> AppError {
        AppError::InvalidTransition {
            request_id: self.request_id.clone(),
            from: self.status.to_string(),
            to: to.to_string(),
        }
    }

    /// Update status only (plus the last reported file number).
    pub fn transition(
        &mut self,
        status: JobStatus,
        file_number: Option<u32>,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        if !self.status.can_transition_to(status) {
            return Err(self.invalid(status));
        }
        if status == JobStatus::Processing && self.started_at.is_none() {
            self.started_at = Some(now);
        }
        if status.is_terminal() {
            self.completed_at = Some(now);
        }
        if let (Some(n), Some(meta)) = (file_number, self.metadata.as_object_mut()) {
            meta.insert("file_number".into(), serde_json::json!(n));
        }
        self.status = status;
        self.updated_at = now;
        Ok(())
    }

    /// Overwrite the cumulative counters.
    pub fn apply_progress(
        &mut self,
        files_processed: u32,
        files_failed: u32,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        if self.status.is_terminal() {
            return Err(self.invalid(self.status));
        }
        check_counters(self.num_files, files_processed, files_failed)?;
        self.files_processed = files_processed;
        self.files_failed = files_failed;
        self.updated_at = now;
        Ok(())
    }

    pub fn complete(&mut self, total_time_ms: u64, now: DateTime<Utc>) -> Result<(), AppError> {
        if self.status.is_terminal() {
            return Err(self.invalid(JobStatus::Completed));
        }
        self.status = JobStatus::Completed;
        self.completed_at = Some(now);
        self.updated_at = now;
        self.total_processing_time_ms = Some(total_time_ms);
        self.average_processing_time_ms = average_time(total_time_ms, self.num_files);
        Ok(())
    }

    pub fn fail(&mut self, error_message: &str, now: DateTime<Utc>) -> Result<(), AppError> {
        if self.status.is_terminal() {
            return Err(self.invalid(JobStatus::Failed));
        }
        self.status = JobStatus::Failed;
        self.completed_at = Some(now);
        self.updated_at = now;
        self.error_message = Some(error_message.to_string());
        Ok(())
    }
}

/// `processed + failed ≤ num_files`.
pub fn check_counters(num_files: u32, processed: u32, failed: u32) -> Result<(), AppError> {
    if processed.saturating_add(failed) > num_files {
        return Err(AppError::ValidationError(format!(
            "progress {processed} processed + {failed} failed exceeds {num_files} files"
        )));
    }
    Ok(())
}

/// Average per file, `None` when there are no files.
pub fn average_time(total_time_ms: u64, num_files: u32) -> Option<u64> {
    (num_files > 0).then(|| total_time_ms / u64::from(num_files))
}

/// A single-shot pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRequest {
    pub id: Uuid,
    pub processing_type: ProcessingType,
    pub input_text: String,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

impl AgentRequest {
    pub fn new(processing_type: ProcessingType, input_text: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            processing_type,
            input_text: input_text.into(),
            status: JobStatus::Pending,
            created_at: now,
            updated_at: now,
            completed_at: None,
            error_message: None,
        }
    }

    pub fn transition(
        &mut self,
        status: JobStatus,
        error_message: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        if !self.status.can_transition_to(status) {
            return Err(AppError::InvalidTransition {
                request_id: self.id.to_string(),
                from: self.status.to_string(),
                to: status.to_string(),
            });
        }
        self.status = status;
        self.updated_at = now;
        if status.is_terminal() {
            self.completed_at = Some(now);
        }
        if status == JobStatus::Failed {
            self.error_message = error_message.map(str::to_string);
        }
        Ok(())
    }
}

/// The one result of an [`AgentRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    pub id: Uuid,
    pub request_id: Uuid,
    pub skills: ExtractedSkillSet,
    pub matches: Vec<Match>,
    pub summary: String,
    pub warnings: Vec<String>,
    pub processing_time_ms: u64,
    pub created_at: DateTime<Utc>,
}

/// Persisted metadata of one successfully extracted file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewExtraction {
    pub request_id: String,
    pub file_number: u32,
    pub skills: ExtractedSkillSet,
    /// SHA-256 of the extracted text.
    pub content_hash: String,
    pub warnings: Vec<String>,
    pub processing_time_ms: u64,
}

/// A stored extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extraction {
    pub id: Uuid,
    pub request_id: String,
    pub file_number: u32,
    pub skills: ExtractedSkillSet,
    pub content_hash: String,
    pub warnings: Vec<String>,
    pub processing_time_ms: u64,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn job(num_files: u32) -> ExtractionJob {
        ExtractionJob::new("req-1", JobStatus::Pending, num_files, serde_json::Value::Null, Utc::now())
    }

    #[test]
    fn test_job_status_roundtrip() {
        for status in [
            JobStatus::Pending,
            JobStatus::Processing,
            JobStatus::Completed,
            JobStatus::Failed,
        ] {
            let parsed: JobStatus = status.as_str().parse().unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn test_transitions_are_forward_only() {
        assert!(JobStatus::Pending.can_transition_to(JobStatus::Processing));
        assert!(JobStatus::Processing.can_transition_to(JobStatus::Processing));
        assert!(JobStatus::Processing.can_transition_to(JobStatus::Failed));
        assert!(!JobStatus::Processing.can_transition_to(JobStatus::Pending));
        assert!(!JobStatus::Completed.can_transition_to(JobStatus::Failed));
        assert!(!JobStatus::Failed.can_transition_to(JobStatus::Failed));
    }

    #[test]
    fn test_processing_type_lenient_parse() {
        assert_eq!(
            ProcessingType::parse_lenient("Candidate_Matching"),
            ProcessingType::CandidateMatching
        );
        assert_eq!(ProcessingType::parse_lenient("whatever"), ProcessingType::Generic);
    }

    #[test]
    fn test_new_job_starts_with_zero_progress() {
        let job = job(3);
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.files_processed + job.files_failed, 0);
        assert!(job.completed_at.is_none());
        assert!(job.metadata.is_object());
    }

    #[test]
    fn test_success_derives_average() {
        let mut job = job(3);
        let now = Utc::now();
        job.transition(JobStatus::Processing, Some(1), now).unwrap();
        job.apply_progress(2, 1, now).unwrap();
        job.complete(900, now).unwrap();

        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.average_processing_time_ms, Some(300));
        assert_eq!(job.files_failed, 1);
        assert_eq!(job.completed_at, Some(now));
        assert_eq!(job.metadata["file_number"], 1);
    }

    #[test]
    fn test_zero_files_has_no_average() {
        let mut job = job(0);
        job.complete(500, Utc::now()).unwrap();
        assert_eq!(job.total_processing_time_ms, Some(500));
        assert_eq!(job.average_processing_time_ms, None);
    }

    #[test]
    fn test_counters_cannot_exceed_num_files() {
        let mut job = job(2);
        let err = job.apply_progress(2, 1, Utc::now()).unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
        assert_eq!(job.files_processed, 0);
    }

    #[test]
    fn test_terminal_job_is_immutable() {
        let mut job = job(1);
        let done_at = Utc::now();
        job.fail("both methods failed", done_at).unwrap();

        let later = done_at + TimeDelta::seconds(5);
        assert!(job.complete(10, later).is_err());
        assert!(job.apply_progress(1, 0, later).is_err());
        assert!(job.transition(JobStatus::Processing, None, later).is_err());
        assert_eq!(job.completed_at, Some(done_at));
        assert_eq!(job.error_message.as_deref(), Some("both methods failed"));
    }
}
