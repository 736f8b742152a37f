use roster_core::job::NewExtraction;
use roster_core::models::{ExtractedSkillSet, Match, compute_hash};
use roster_core::store::MatchStore;
use roster_db::MatchRepository;

use crate::integration::common::setup_test_db;

fn skills() -> ExtractedSkillSet {
    let mut set = ExtractedSkillSet::default();
    set.categories
        .insert("Languages".into(), vec!["Go".into(), "Rust".into()]);
    set.summary = "Found 2 skills across 1 categories".into();
    set.confidence_score = 0.2;
    set
}

#[tokio::test]
async fn extractions_round_trip_in_file_order() {
    let (pool, _container) = setup_test_db().await;
    let repo = MatchRepository::new(pool);

    for file_number in [2, 1] {
        repo.save_extraction(&NewExtraction {
            request_id: "req-1".into(),
            file_number,
            skills: skills(),
            content_hash: compute_hash("Go and Rust"),
            warnings: vec!["inference extraction failed: timeout".into()],
            processing_time_ms: 120,
        })
        .await
        .unwrap();
    }

    let saved = repo.list_extractions("req-1").await.unwrap();
    assert_eq!(saved.len(), 2);
    assert_eq!(saved[0].file_number, 1);
    assert_eq!(saved[0].skills, skills());
    assert_eq!(saved[0].warnings.len(), 1);
    assert!(repo.list_extractions("other").await.unwrap().is_empty());
}

#[tokio::test]
async fn matches_are_listed_best_first() {
    let (pool, _container) = setup_test_db().await;
    let repo = MatchRepository::new(pool);

    let m = |id: i64, score: f64| Match {
        employee_id: id,
        match_score: score,
        matching_skills: vec!["Go".into()],
        missing_skills: vec![],
        notes: "Matched 1/1 required and 0/0 preferred skills".into(),
    };
    repo.save_matches("req-1", &[m(2, 50.0), m(1, 100.0), m(3, 50.0)])
        .await
        .unwrap();

    let matches = repo.list_matches("req-1").await.unwrap();
    let ids: Vec<i64> = matches.iter().map(|m| m.employee_id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
    assert_eq!(matches[0].matching_skills, vec!["Go"]);
}
