use roster_core::catalog::SkillCatalog;
use roster_core::traits::{CandidateRepository, SkillLookup, SkillRepository};
use roster_db::{PgCandidateRepository, PgSkillRepository};

use crate::integration::common::{insert_category, insert_employee, insert_skill, setup_test_db};

#[tokio::test]
async fn skills_load_with_categories_and_synonyms() {
    let (pool, _container) = setup_test_db().await;
    let languages = insert_category(&pool, "Programming Languages").await;
    let cloud = insert_category(&pool, "Cloud Platforms").await;
    insert_skill(&pool, "Python", &["py"], &[languages]).await;
    insert_skill(&pool, "AWS", &[], &[cloud]).await;
    insert_skill(&pool, "Scrum", &[], &[]).await;

    let repo = PgSkillRepository::new(pool);
    let skills = repo.get_skills_with_categories().await.unwrap();

    assert_eq!(skills.len(), 3);
    let python = skills.iter().find(|s| s.name == "Python").unwrap();
    assert_eq!(python.synonyms, vec!["py"]);
    assert_eq!(python.categories[0].name, "Programming Languages");
    let scrum = skills.iter().find(|s| s.name == "Scrum").unwrap();
    assert!(scrum.categories.is_empty());

    let categories = repo.get_all_categories().await.unwrap();
    let names: Vec<&str> = categories.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["Cloud Platforms", "Programming Languages"]);
}

#[tokio::test]
async fn catalog_loads_from_postgres() {
    let (pool, _container) = setup_test_db().await;
    let frameworks = insert_category(&pool, "Frameworks").await;
    insert_skill(&pool, "Node.js", &[], &[frameworks]).await;

    let catalog = SkillCatalog::new(PgSkillRepository::new(pool));
    catalog.load().await.unwrap();

    let node = catalog.lookup("nodejs").unwrap();
    assert_eq!(node.name, "Node.js");
    assert_eq!(node.categories, vec!["Frameworks"]);
}

#[tokio::test]
async fn candidates_carry_their_skills() {
    let (pool, _container) = setup_test_db().await;
    let go = insert_skill(&pool, "Go", &["golang"], &[]).await;
    let sql = insert_skill(&pool, "SQL", &[], &[]).await;
    let alice = insert_employee(&pool, "Alice", &[go, sql]).await;
    let bob = insert_employee(&pool, "Bob", &[]).await;

    let candidates = PgCandidateRepository::new(pool).get_all().await.unwrap();

    assert_eq!(candidates.len(), 2);
    assert_eq!(candidates[0].id, alice);
    let skills: Vec<&str> = candidates[0].skills.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(skills, vec!["Go", "SQL"]);
    assert_eq!(candidates[0].skills[0].synonyms, vec!["golang"]);
    assert_eq!(candidates[1].id, bob);
    assert!(candidates[1].skills.is_empty());
    assert_eq!(candidates[1].department.as_deref(), Some("Engineering"));
}
