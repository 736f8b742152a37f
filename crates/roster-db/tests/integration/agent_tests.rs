use roster_core::error::AppError;
use roster_core::job::{AgentRequest, AgentResponse, JobStatus, ProcessingType};
use roster_core::models::ExtractedSkillSet;
use roster_core::store::AgentStore;
use roster_db::AgentRepository;
use uuid::Uuid;

use crate::integration::common::setup_test_db;

#[tokio::test]
async fn request_lifecycle_and_response() {
    let (pool, _container) = setup_test_db().await;
    let repo = AgentRepository::new(pool);

    let request = AgentRequest::new(ProcessingType::SearchAnalysis, "Go and SQL");
    repo.create_request(&request).await.unwrap();
    repo.update_status(request.id, JobStatus::Processing, None)
        .await
        .unwrap();

    let response = AgentResponse {
        id: Uuid::new_v4(),
        request_id: request.id,
        skills: ExtractedSkillSet::default(),
        matches: vec![],
        summary: "Found 0 skills across 0 categories".into(),
        warnings: vec![],
        processing_time_ms: 42,
        created_at: request.created_at,
    };
    repo.save_response(&response).await.unwrap();
    let done = repo
        .update_status(request.id, JobStatus::Completed, None)
        .await
        .unwrap();

    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(done.processing_type, ProcessingType::SearchAnalysis);
    assert!(done.completed_at.is_some());

    let stored = repo.get_response(request.id).await.unwrap().unwrap();
    assert_eq!(stored.summary, response.summary);
    assert_eq!(stored.processing_time_ms, 42);
}

#[tokio::test]
async fn failed_request_is_terminal() {
    let (pool, _container) = setup_test_db().await;
    let repo = AgentRepository::new(pool);

    let request = AgentRequest::new(ProcessingType::Generic, "Rust");
    repo.create_request(&request).await.unwrap();
    let failed = repo
        .update_status(request.id, JobStatus::Failed, Some("All extraction methods failed"))
        .await
        .unwrap();
    assert_eq!(failed.error_message.as_deref(), Some("All extraction methods failed"));

    let err = repo
        .update_status(request.id, JobStatus::Completed, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition { .. }));
    assert!(repo.get_response(request.id).await.unwrap().is_none());
}

#[tokio::test]
async fn unknown_request_is_not_found() {
    let (pool, _container) = setup_test_db().await;
    let repo = AgentRepository::new(pool);

    let err = repo
        .update_status(Uuid::new_v4(), JobStatus::Processing, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}
