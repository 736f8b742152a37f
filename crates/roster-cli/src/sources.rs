use std::path::PathBuf;

use roster_core::AppError;
use roster_core::models::{Candidate, Category, Skill};
use roster_core::traits::{CandidateRepository, SkillRepository};
use serde::de::DeserializeOwned;

/// Skill catalog read from a JSON array of skills.
///
/// Without a path the catalog is empty, leaving inference as the only
/// working extraction method.
#[derive(Clone)]
pub struct JsonSkillRepository {
    path: Option<PathBuf>,
}

impl JsonSkillRepository {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }
}

impl SkillRepository for JsonSkillRepository {
    async fn get_skills_with_categories(&self) -> Result<Vec<Skill>, AppError> {
        read_json_array(self.path.as_ref()).await
    }

    async fn get_all_categories(&self) -> Result<Vec<Category>, AppError> {
        let skills = self.get_skills_with_categories().await?;
        let mut categories: Vec<Category> = skills
            .into_iter()
            .flat_map(|skill| skill.categories)
            .collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        categories.dedup_by(|a, b| a.id == b.id);
        Ok(categories)
    }
}

/// Candidate pool read from a JSON array of candidates.
#[derive(Clone)]
pub struct JsonCandidateRepository {
    path: Option<PathBuf>,
}

impl JsonCandidateRepository {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }
}

impl CandidateRepository for JsonCandidateRepository {
    async fn get_all(&self) -> Result<Vec<Candidate>, AppError> {
        read_json_array(self.path.as_ref()).await
    }
}

async fn read_json_array<T: DeserializeOwned>(path: Option<&PathBuf>) -> Result<Vec<T>, AppError> {
    let Some(path) = path else {
        return Ok(Vec::new());
    };
    let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
        AppError::ConfigError(format!("Failed to read {}: {e}", path.display()))
    })?;
    serde_json::from_str(&raw).map_err(|e| {
        AppError::ConfigError(format!("Invalid JSON in {}: {e}", path.display()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_temp(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "roster-cli-{}-{name}",
            std::process::id()
        ));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[tokio::test]
    async fn missing_path_yields_empty_sources() {
        let skills = JsonSkillRepository::new(None);
        let candidates = JsonCandidateRepository::new(None);

        assert!(skills.get_skills_with_categories().await.unwrap().is_empty());
        assert!(skills.get_all_categories().await.unwrap().is_empty());
        assert!(candidates.get_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn categories_are_deduplicated_across_skills() {
        let path = write_temp(
            "skills.json",
            r#"[
                {"id": 1, "name": "Rust", "categories": [{"id": 1, "name": "Programming"}]},
                {"id": 2, "name": "Go", "categories": [{"id": 1, "name": "Programming"}]},
                {"id": 3, "name": "AWS", "categories": [{"id": 2, "name": "Cloud"}], "synonyms": ["amazon web services"]}
            ]"#,
        );
        let repo = JsonSkillRepository::new(Some(path.clone()));

        let skills = repo.get_skills_with_categories().await.unwrap();
        assert_eq!(skills.len(), 3);
        assert_eq!(skills[2].synonyms, vec!["amazon web services"]);

        let names: Vec<String> = repo
            .get_all_categories()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Cloud", "Programming"]);

        std::fs::remove_file(path).ok();
    }

    #[tokio::test]
    async fn malformed_file_is_a_config_error() {
        let path = write_temp("broken.json", "{ not json");
        let repo = JsonCandidateRepository::new(Some(path.clone()));

        let err = repo.get_all().await.unwrap_err();
        assert!(matches!(err, AppError::ConfigError(_)));

        std::fs::remove_file(path).ok();
    }
}
