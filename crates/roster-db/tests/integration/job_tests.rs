use roster_core::error::AppError;
use roster_core::job::JobStatus;
use roster_core::store::JobStore;
use roster_db::ExtractionJobRepository;

use crate::integration::common::setup_test_db;

#[tokio::test]
async fn create_or_update_upserts_by_request_id() {
    let (pool, _container) = setup_test_db().await;
    let repo = ExtractionJobRepository::new(pool);

    let created = repo
        .create_or_update("req-1", JobStatus::Pending, 3, None, serde_json::json!({"source": "upload"}))
        .await
        .unwrap();
    assert_eq!(created.status, JobStatus::Pending);
    assert_eq!(created.files_processed + created.files_failed, 0);
    assert!(created.started_at.is_none());

    let updated = repo
        .create_or_update("req-1", JobStatus::Processing, 3, Some(2), serde_json::Value::Null)
        .await
        .unwrap();
    assert_eq!(updated.id, created.id);
    assert_eq!(updated.status, JobStatus::Processing);
    assert!(updated.started_at.is_some());
    assert_eq!(updated.metadata["file_number"], 2);
    assert_eq!(updated.metadata["source"], "upload");
}

#[tokio::test]
async fn progress_then_success_derives_average() {
    let (pool, _container) = setup_test_db().await;
    let repo = ExtractionJobRepository::new(pool);

    repo.create_or_update("req-1", JobStatus::Processing, 3, None, serde_json::Value::Null)
        .await
        .unwrap();
    repo.update_progress("req-1", 2, 1).await.unwrap();
    let job = repo.mark_success("req-1", 900).await.unwrap();

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.total_processing_time_ms, Some(900));
    assert_eq!(job.average_processing_time_ms, Some(300));
    assert_eq!(job.files_failed, 1);
    assert!(job.completed_at.is_some());
}

#[tokio::test]
async fn zero_file_job_has_no_average() {
    let (pool, _container) = setup_test_db().await;
    let repo = ExtractionJobRepository::new(pool);

    repo.create_or_update("req-0", JobStatus::Processing, 0, None, serde_json::Value::Null)
        .await
        .unwrap();
    let job = repo.mark_success("req-0", 50).await.unwrap();

    assert_eq!(job.average_processing_time_ms, None);
}

#[tokio::test]
async fn counters_over_num_files_are_rejected() {
    let (pool, _container) = setup_test_db().await;
    let repo = ExtractionJobRepository::new(pool);

    repo.create_or_update("req-1", JobStatus::Processing, 2, None, serde_json::Value::Null)
        .await
        .unwrap();

    let err = repo.update_progress("req-1", 2, 1).await.unwrap_err();
    assert!(matches!(err, AppError::ValidationError(_)));
    let job = repo.get("req-1").await.unwrap().unwrap();
    assert_eq!((job.files_processed, job.files_failed), (0, 0));
}

#[tokio::test]
async fn terminal_job_is_never_resurrected() {
    let (pool, _container) = setup_test_db().await;
    let repo = ExtractionJobRepository::new(pool);

    repo.create_or_update("req-1", JobStatus::Processing, 1, None, serde_json::Value::Null)
        .await
        .unwrap();
    let failed = repo.mark_failed("req-1", "catalog unavailable").await.unwrap();

    let err = repo.mark_success("req-1", 10).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition { .. }));
    let err = repo
        .create_or_update("req-1", JobStatus::Processing, 1, None, serde_json::Value::Null)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition { .. }));
    assert!(repo.update_progress("req-1", 1, 0).await.is_err());

    let reread = repo.get("req-1").await.unwrap().unwrap();
    assert_eq!(reread.status, JobStatus::Failed);
    assert_eq!(reread.completed_at, failed.completed_at);
    assert_eq!(reread.error_message.as_deref(), Some("catalog unavailable"));
}

#[tokio::test]
async fn backward_transition_is_rejected() {
    let (pool, _container) = setup_test_db().await;
    let repo = ExtractionJobRepository::new(pool);

    repo.create_or_update("req-1", JobStatus::Processing, 1, None, serde_json::Value::Null)
        .await
        .unwrap();
    let err = repo
        .create_or_update("req-1", JobStatus::Pending, 1, None, serde_json::Value::Null)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::InvalidTransition { .. }));
}

#[tokio::test]
async fn unknown_job_is_not_found() {
    let (pool, _container) = setup_test_db().await;
    let repo = ExtractionJobRepository::new(pool);

    let err = repo.mark_failed("missing", "boom").await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    assert!(repo.get("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn list_filters_by_status() {
    let (pool, _container) = setup_test_db().await;
    let repo = ExtractionJobRepository::new(pool);

    for id in ["a", "b", "c"] {
        repo.create_or_update(id, JobStatus::Processing, 1, None, serde_json::Value::Null)
            .await
            .unwrap();
    }
    repo.mark_success("b", 5).await.unwrap();

    let processing = repo.list(Some(JobStatus::Processing), 10).await.unwrap();
    assert_eq!(processing.len(), 2);
    assert!(processing.iter().all(|j| j.status == JobStatus::Processing));
    assert_eq!(repo.list(None, 2).await.unwrap().len(), 2);
}
