//! Runs the catalog and inference extractors concurrently under a deadline
//! and merges whatever completed.
//!
//! Each method runs in its own task and reports through a single-slot
//! `oneshot` channel. The orchestrator selects over both channels and the
//! deadline at most twice. When it returns, a shared [`CancellationToken`]
//! is cancelled so tasks that are still running stop at their next
//! suspension point; their results are never awaited.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::error::AppError;
use crate::models::ExtractedSkillSet;
use crate::traits::SkillExtractor;

pub const DEFAULT_EXTRACTION_TIMEOUT: Duration = Duration::from_secs(30);

type MethodResult = Result<ExtractedSkillSet, AppError>;

/// A non-fatal failure of one extraction method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MethodError {
    pub method: String,
    pub message: String,
}

/// Merged output of one orchestration.
#[derive(Debug, Clone, Serialize)]
pub struct OrchestratedExtraction {
    pub skills: ExtractedSkillSet,
    /// Methods that produced a result, in completion order.
    pub succeeded: Vec<String>,
    pub method_errors: Vec<MethodError>,
}

impl OrchestratedExtraction {
    pub fn is_partial(&self) -> bool {
        !self.method_errors.is_empty()
    }
}

/// Concurrent two-method extraction with deadline and merge.
#[derive(Clone)]
pub struct ExtractionOrchestrator<T: SkillExtractor, E: SkillExtractor> {
    text_extractor: T,
    inference_extractor: E,
    timeout: Duration,
}

impl<T: SkillExtractor, E: SkillExtractor> ExtractionOrchestrator<T, E> {
    pub fn new(text_extractor: T, inference_extractor: E) -> Self {
        Self {
            text_extractor,
            inference_extractor,
            timeout: DEFAULT_EXTRACTION_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Extract skills from `text` with both methods and merge the results.
    ///
    /// Fails only when neither method produced a result before the deadline.
    pub async fn extract(&self, text: &str) -> Result<OrchestratedExtraction, AppError> {
        let text: Arc<str> = Arc::from(text);
        let cancel = CancellationToken::new();
        let text_method = self.text_extractor.method();
        let inference_method = self.inference_extractor.method();

        let mut text_rx = spawn_method(self.text_extractor.clone(), text.clone(), cancel.clone());
        let mut inference_rx =
            spawn_method(self.inference_extractor.clone(), text.clone(), cancel.clone());

        let deadline = tokio::time::sleep(self.timeout);
        tokio::pin!(deadline);

        let mut text_result: Option<MethodResult> = None;
        let mut inference_result: Option<MethodResult> = None;
        let mut succeeded = Vec::new();

        for _ in 0..2 {
            tokio::select! {
                received = &mut text_rx, if text_result.is_none() => {
                    let result = flatten(text_method, received);
                    if result.is_ok() {
                        succeeded.push(text_method.to_string());
                    }
                    text_result = Some(result);
                }
                received = &mut inference_rx, if inference_result.is_none() => {
                    let result = flatten(inference_method, received);
                    if result.is_ok() {
                        succeeded.push(inference_method.to_string());
                    }
                    inference_result = Some(result);
                }
                () = &mut deadline => {
                    tracing::warn!(timeout_ms = self.timeout.as_millis() as u64, "Extraction deadline elapsed");
                    break;
                }
            }
        }

        // Anything still running is abandoned.
        cancel.cancel();

        let timed_out = || AppError::Timeout(self.timeout.as_millis() as u64);
        let text_result = text_result.unwrap_or_else(|| Err(timed_out()));
        let inference_result = inference_result.unwrap_or_else(|| Err(timed_out()));

        let (skills, method_errors) = merge_results(
            (text_method, text_result),
            (inference_method, inference_result),
        )?;
        for err in &method_errors {
            tracing::warn!(method = %err.method, error = %err.message, "Extraction method failed, continuing with partial result");
        }
        Ok(OrchestratedExtraction {
            skills,
            succeeded,
            method_errors,
        })
    }
}

fn spawn_method<X: SkillExtractor>(
    extractor: X,
    text: Arc<str>,
    cancel: CancellationToken,
) -> oneshot::Receiver<MethodResult> {
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
        let result = tokio::select! {
            result = extractor.extract(&text) => result,
            () = cancel.cancelled() => {
                tracing::debug!(method = extractor.method(), "Extraction task cancelled");
                return;
            }
        };
        // The receiver is gone when the orchestrator already returned.
        let _ = tx.send(result);
    });
    rx
}

fn flatten(
    method: &str,
    received: Result<MethodResult, oneshot::error::RecvError>,
) -> MethodResult {
    received.unwrap_or_else(|_| {
        Err(AppError::Generic(format!(
            "{method} extraction task ended without a result"
        )))
    })
}

type MergeOutcome = Result<(ExtractedSkillSet, Vec<MethodError>), AppError>;

/// Merge policy for two method results.
///
/// Both succeed: union. One succeeds: use it and record the other's error.
/// Neither: [`AppError::ExtractionFailed`].
pub fn merge_results(
    (first_method, first): (&str, MethodResult),
    (second_method, second): (&str, MethodResult),
) -> MergeOutcome {
    let error_of = |method: &str, e: AppError| MethodError {
        method: method.to_string(),
        message: e.to_string(),
    };

    match (first, second) {
        (Ok(a), Ok(b)) => Ok((a.merge(&b), Vec::new())),
        (Ok(a), Err(e)) => Ok((a, vec![error_of(second_method, e)])),
        (Err(e), Ok(b)) => Ok((b, vec![error_of(first_method, e)])),
        (Err(ea), Err(eb)) => Err(AppError::ExtractionFailed {
            errors: vec![
                format!("{first_method}: {ea}"),
                format!("{second_method}: {eb}"),
            ],
        }),
    }
}
