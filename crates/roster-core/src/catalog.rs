//! TTL-refreshed, in-memory skill catalog.
//!
//! Maps every normalized synonym of a skill to its [`SkillInfo`]. Lookups take
//! the shared lock; a refresh builds the new map off-lock and swaps it in
//! under the exclusive lock. When the backing store fails, the previous map
//! stays active.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use crate::clock::{Clock, SystemClock};
use crate::error::AppError;
use crate::models::{Category, Skill, SkillInfo, normalize_skill_name};
use crate::traits::{CategoryProvider, SkillLookup, SkillRepository};

/// Default time a loaded catalog is considered fresh.
pub const DEFAULT_CATALOG_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Default)]
struct CatalogState {
    entries: HashMap<String, SkillInfo>,
    categories: Vec<Category>,
    skill_count: usize,
    loaded_at: Option<DateTime<Utc>>,
}

/// In-memory skill catalog backed by a [`SkillRepository`].
pub struct SkillCatalog<R: SkillRepository> {
    repo: R,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    state: RwLock<CatalogState>,
    /// Serializes reloads so concurrent expired lookups trigger one fetch.
    refresh_lock: tokio::sync::Mutex<()>,
}

impl<R: SkillRepository> SkillCatalog<R> {
    pub fn new(repo: R) -> Self {
        Self::with_clock(repo, DEFAULT_CATALOG_TTL, Arc::new(SystemClock))
    }

    pub fn with_ttl(repo: R, ttl: Duration) -> Self {
        Self::with_clock(repo, ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(repo: R, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            repo,
            ttl,
            clock,
            state: RwLock::new(CatalogState::default()),
            refresh_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Load the catalog if it is empty or older than the TTL.
    ///
    /// On a store failure the error is returned but any previously loaded
    /// entries remain available to [`lookup`](SkillLookup::lookup).
    pub async fn load(&self) -> Result<(), AppError> {
        if !self.needs_refresh() {
            return Ok(());
        }
        let _guard = self.refresh_lock.lock().await;
        if !self.needs_refresh() {
            return Ok(());
        }
        self.reload().await
    }

    /// Reload from the store regardless of the TTL.
    pub async fn refresh(&self) -> Result<(), AppError> {
        let _guard = self.refresh_lock.lock().await;
        self.reload().await
    }

    /// Number of skills in the active catalog.
    pub fn len(&self) -> usize {
        self.state.read().map(|s| s.skill_count).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn last_refreshed(&self) -> Option<DateTime<Utc>> {
        self.state.read().ok().and_then(|s| s.loaded_at)
    }

    fn needs_refresh(&self) -> bool {
        let Ok(state) = self.state.read() else {
            return true;
        };
        match state.loaded_at {
            None => true,
            Some(_) if state.entries.is_empty() => true,
            Some(loaded_at) => {
                let ttl = TimeDelta::from_std(self.ttl).unwrap_or(TimeDelta::MAX);
                self.clock.now() - loaded_at >= ttl
            }
        }
    }

    async fn reload(&self) -> Result<(), AppError> {
        let skills = self
            .repo
            .get_skills_with_categories()
            .await
            .map_err(|e| self.load_failed("skills", e))?;
        let categories = self
            .repo
            .get_all_categories()
            .await
            .map_err(|e| self.load_failed("categories", e))?;

        let entries = build_entries(&skills);
        let loaded_at = self.clock.now();

        tracing::info!(
            skills = skills.len(),
            keys = entries.len(),
            categories = categories.len(),
            "Skill catalog loaded"
        );

        let mut state = self
            .state
            .write()
            .map_err(|_| AppError::CatalogError("catalog lock poisoned".into()))?;
        *state = CatalogState {
            entries,
            categories,
            skill_count: skills.len(),
            loaded_at: Some(loaded_at),
        };
        Ok(())
    }

    fn load_failed(&self, what: &str, error: AppError) -> AppError {
        let stale = self.len();
        if stale > 0 {
            tracing::warn!(error = %error, stale_skills = stale, "Catalog refresh failed, serving stale entries");
        } else {
            tracing::error!(error = %error, "Catalog load failed with no cached entries");
        }
        AppError::CatalogError(format!("failed to load {what}: {error}"))
    }
}

impl<R: SkillRepository> SkillLookup for SkillCatalog<R> {
    fn lookup(&self, normalized: &str) -> Option<SkillInfo> {
        self.state.read().ok()?.entries.get(normalized).cloned()
    }
}

impl<R: SkillRepository> CategoryProvider for SkillCatalog<R> {
    fn current_categories(&self) -> Vec<Category> {
        self.state
            .read()
            .map(|s| s.categories.clone())
            .unwrap_or_default()
    }
}

/// Spelling variants a skill is indexed under, before normalization.
pub fn synonyms_for(skill: &Skill) -> Vec<String> {
    let name = skill.name.trim();
    let stripped: String = name
        .chars()
        .filter(|c| !matches!(c, '.' | '-' | '_'))
        .collect();
    let unspaced: String = name.chars().filter(|c| !c.is_whitespace()).collect();

    let mut variants = vec![
        name.to_string(),
        name.to_lowercase(),
        name.to_uppercase(),
        stripped,
        unspaced,
    ];
    variants.extend(skill.synonyms.iter().map(|s| s.trim().to_string()));
    variants.retain(|v| !v.is_empty());
    variants.dedup();
    variants
}

fn build_entries(skills: &[Skill]) -> HashMap<String, SkillInfo> {
    let mut entries: HashMap<String, SkillInfo> = HashMap::new();
    for skill in skills {
        let info = SkillInfo {
            skill_id: skill.id,
            name: skill.name.trim().to_string(),
            categories: skill.categories.iter().map(|c| c.name.clone()).collect(),
        };
        for variant in synonyms_for(skill) {
            let key = normalize_skill_name(&variant);
            if key.is_empty() {
                continue;
            }
            match entries.get(&key) {
                Some(existing) if existing.skill_id != skill.id => {
                    tracing::debug!(%key, kept = %existing.name, dropped = %skill.name, "Duplicate catalog key");
                }
                Some(_) => {}
                None => {
                    entries.insert(key, info.clone());
                }
            }
        }
    }
    entries
}
