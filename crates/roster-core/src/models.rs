use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A flat, store-defined label grouping skills.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
}

/// Reference from a skill to one of its categories.
pub type CategoryRef = Category;

/// A named competency as stored in the skill catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Skill {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub categories: Vec<CategoryRef>,
    #[serde(default)]
    pub synonyms: Vec<String>,
}

impl Skill {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            categories: Vec::new(),
            synonyms: Vec::new(),
        }
    }

    pub fn with_category(mut self, id: i64, name: impl Into<String>) -> Self {
        self.categories.push(Category {
            id,
            name: name.into(),
        });
        self
    }

    pub fn with_synonym(mut self, synonym: impl Into<String>) -> Self {
        self.synonyms.push(synonym.into());
        self
    }
}

/// Catalog entry resolved from a normalized token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillInfo {
    pub skill_id: i64,
    /// Canonical display name from the catalog.
    pub name: String,
    pub categories: Vec<String>,
}

/// Skills mined from one piece of text, grouped by category.
///
/// Produced once by an extractor and never mutated afterwards; [`merge`](Self::merge)
/// returns a new value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedSkillSet {
    pub categories: BTreeMap<String, Vec<String>>,
    pub education_level: Option<String>,
    #[serde(default)]
    pub languages_detected: Vec<String>,
    pub years_of_experience: Option<u32>,
    #[serde(default)]
    pub summary: String,
    pub confidence_score: f64,
}

impl ExtractedSkillSet {
    /// Total number of skill entries across all categories.
    pub fn total_skills(&self) -> usize {
        self.categories.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total_skills() == 0
    }

    /// Distinct skill names across categories, first-seen casing, in category order.
    pub fn skill_names(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut names = Vec::new();
        for skills in self.categories.values() {
            for skill in skills {
                if seen.insert(skill.to_lowercase()) {
                    names.push(skill.clone());
                }
            }
        }
        names
    }

    /// Union of two skill sets.
    ///
    /// Categories are merged case-insensitively keeping the first-seen casing.
    /// The inputs are put in a canonical order first so that
    /// `a.merge(&b) == b.merge(&a)`, and `a.merge(&a) == a` for any deduped `a`.
    pub fn merge(&self, other: &ExtractedSkillSet) -> ExtractedSkillSet {
        let (first, second) = if canonical_key(self) <= canonical_key(other) {
            (self, other)
        } else {
            (other, self)
        };

        let mut categories: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for source in [first, second] {
            for (category, skills) in &source.categories {
                let entry = categories.entry(category.clone()).or_default();
                for skill in skills {
                    if !entry.iter().any(|s| same_label(s, skill)) {
                        entry.push(skill.clone());
                    }
                }
            }
        }
        for skills in categories.values_mut() {
            sort_case_insensitive(skills);
        }

        let mut languages: Vec<String> = Vec::new();
        for lang in first
            .languages_detected
            .iter()
            .chain(second.languages_detected.iter())
        {
            if !languages.iter().any(|l| same_label(l, lang)) {
                languages.push(lang.clone());
            }
        }
        sort_case_insensitive(&mut languages);

        ExtractedSkillSet {
            categories,
            education_level: first
                .education_level
                .clone()
                .or_else(|| second.education_level.clone()),
            languages_detected: languages,
            years_of_experience: first.years_of_experience.or(second.years_of_experience),
            summary: if first.summary.is_empty() {
                second.summary.clone()
            } else {
                first.summary.clone()
            },
            confidence_score: first.confidence_score.max(second.confidence_score),
        }
    }
}

fn canonical_key(set: &ExtractedSkillSet) -> String {
    serde_json::to_string(set).unwrap_or_default()
}

/// Drop case-insensitive duplicates (first-seen casing wins) and sort.
/// Case-insensitive label equality, Unicode-aware like [`dedupe_skills`].
fn same_label(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

pub(crate) fn dedupe_skills(skills: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out: Vec<String> = skills
        .into_iter()
        .filter(|s| seen.insert(s.to_lowercase()))
        .collect();
    sort_case_insensitive(&mut out);
    out
}

fn sort_case_insensitive(values: &mut [String]) {
    values.sort_by(|a, b| {
        a.to_lowercase()
            .cmp(&b.to_lowercase())
            .then_with(|| a.cmp(b))
    });
}

/// A person in the matching pool. Owned by an external system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: i64,
    pub name: String,
    pub department: Option<String>,
    pub level: Option<String>,
    pub location: Option<String>,
    #[serde(default)]
    pub skills: Vec<Skill>,
    pub current_project: Option<String>,
}

/// One candidate's result in a matching run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub employee_id: i64,
    pub match_score: f64,
    pub matching_skills: Vec<String>,
    pub missing_skills: Vec<String>,
    pub notes: String,
}

/// One entity span returned by the remote token-classification model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityPrediction {
    pub entity_group: String,
    pub score: f64,
    pub word: String,
    #[serde(default)]
    pub start: Option<usize>,
    #[serde(default)]
    pub end: Option<usize>,
}

/// Normalize a skill name to its catalog identity.
///
/// Lowercases, trims, and strips `.`, `-` and `_`. Idempotent.
pub fn normalize_skill_name(name: &str) -> String {
    name.trim()
        .chars()
        .filter(|c| !matches!(c, '.' | '-' | '_'))
        .flat_map(char::to_lowercase)
        .collect::<String>()
        .trim()
        .to_string()
}

/// Compute a SHA-256 hash of a string, returned as 64-char hex.
pub fn compute_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}
