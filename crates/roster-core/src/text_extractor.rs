//! Dictionary/pattern-driven skill extraction.
//!
//! Candidate terms come from three sources: capitalised entity-like spans,
//! filtered word tokens (and adjacent pairs), and a regex sweep for dotted
//! identifiers and acronyms. Every candidate is normalized and looked up in
//! the [`SkillCatalog`]; only catalog hits become skills.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, LazyLock};

use regex::Regex;

use crate::catalog::SkillCatalog;
use crate::error::AppError;
use crate::models::{ExtractedSkillSet, dedupe_skills, normalize_skill_name};
use crate::traits::{SkillExtractor, SkillLookup, SkillRepository};

const MIN_TOKEN_LEN: usize = 2;
const MAX_TOKEN_LEN: usize = 50;
const MAX_SPAN_WORDS: usize = 3;
const MAX_YEARS: u32 = 60;

static ENTITY_SPAN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Z][\w.+#-]*(?:[ \t]+[A-Z][\w.+#-]*)*").expect("valid span regex")
});
static TITLE_DOTTED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Z][A-Za-z0-9]*(?:\.[A-Za-z0-9]+)+\b").expect("valid dotted regex")
});
static LOWER_DOTTED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[a-z][a-z0-9]*(?:\.[a-z0-9]+)+\b").expect("valid dotted regex")
});
static ACRONYM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Z]{2,}[0-9]*\b").expect("valid acronym regex"));
static YEARS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,2})\s*\+?\s*(?:years?|yrs?)\b").expect("valid years regex")
});

/// Education levels, highest first, with the patterns that imply them.
static EDUCATION: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    [
        ("PhD", r"(?i)\b(?:ph\.?\s?d|doctorate|doctoral)\b"),
        ("Master", r"(?i)\b(?:master'?s?|m\.?sc|mba|m\.?eng)\b"),
        ("Bachelor", r"(?i)\b(?:bachelor'?s?|b\.?sc|b\.?eng|b\.?a\.|b\.?s\.)"),
        ("Associate", r"(?i)\bassociate'?s?\s+degree\b"),
        ("High School", r"(?i)\bhigh\s+school\b"),
    ]
    .into_iter()
    .map(|(level, pattern)| (level, Regex::new(pattern).expect("valid education regex")))
    .collect()
});

const SPOKEN_LANGUAGES: &[&str] = &[
    "English",
    "Spanish",
    "French",
    "German",
    "Italian",
    "Portuguese",
    "Dutch",
    "Polish",
    "Russian",
    "Ukrainian",
    "Turkish",
    "Arabic",
    "Hebrew",
    "Hindi",
    "Mandarin",
    "Cantonese",
    "Japanese",
    "Korean",
    "Swedish",
    "Norwegian",
    "Danish",
    "Finnish",
    "Greek",
];

/// Catalog-driven extractor. Cheap to clone: the catalog is shared.
#[derive(Clone)]
pub struct TextSkillExtractor<R: SkillRepository> {
    catalog: Arc<SkillCatalog<R>>,
}

impl<R: SkillRepository + 'static> TextSkillExtractor<R> {
    pub fn new(catalog: Arc<SkillCatalog<R>>) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &Arc<SkillCatalog<R>> {
        &self.catalog
    }

    async fn run(&self, text: &str) -> Result<ExtractedSkillSet, AppError> {
        if text.trim().is_empty() {
            return Ok(ExtractedSkillSet::default());
        }

        if let Err(e) = self.catalog.load().await {
            if self.catalog.is_empty() {
                return Err(e);
            }
            tracing::warn!(error = %e, "Extracting against stale skill catalog");
        }

        let mut categories: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut found_ids = HashSet::new();
        let mut seen_keys = HashSet::new();

        for term in candidate_terms(text) {
            let key = normalize_skill_name(&term);
            if key.is_empty() || !seen_keys.insert(key.clone()) {
                continue;
            }
            let Some(info) = self.catalog.lookup(&key) else {
                continue;
            };
            tracing::debug!(%term, skill = %info.name, "Catalog hit");
            found_ids.insert(info.skill_id);
            for category in &info.categories {
                categories
                    .entry(category.clone())
                    .or_default()
                    .push(info.name.clone());
            }
        }

        let categories: BTreeMap<String, Vec<String>> = categories
            .into_iter()
            .map(|(category, skills)| (category, dedupe_skills(skills)))
            .collect();

        let total = found_ids.len();
        let summary = if total == 0 {
            "No catalog skills found".to_string()
        } else {
            format!(
                "Found {} skills across {} categories",
                total,
                categories.len()
            )
        };

        Ok(ExtractedSkillSet {
            categories,
            education_level: detect_education(text),
            languages_detected: detect_languages(text),
            years_of_experience: detect_years(text),
            summary,
            confidence_score: text_confidence(total),
        })
    }
}

impl<R: SkillRepository + 'static> SkillExtractor for TextSkillExtractor<R> {
    fn method(&self) -> &'static str {
        "text"
    }

    async fn extract(&self, text: &str) -> Result<ExtractedSkillSet, AppError> {
        self.run(text).await
    }
}

/// Confidence of a catalog extraction: `min(0.9, 0.1 × skills found)`.
pub fn text_confidence(skills_found: usize) -> f64 {
    (skills_found as f64 / 10.0).min(0.9)
}

/// Every term worth looking up in the catalog, in discovery order.
pub fn candidate_terms(text: &str) -> Vec<String> {
    let mut terms = Vec::new();

    // 1a. Entity-like spans and their sub-spans.
    for span in ENTITY_SPAN.find_iter(text) {
        let words: Vec<&str> = span
            .as_str()
            .split_whitespace()
            .map(|w| w.trim_end_matches(['.', ',']))
            .collect();
        for size in (1..=MAX_SPAN_WORDS.min(words.len())).rev() {
            for window in words.windows(size) {
                terms.push(window.join(" "));
            }
        }
    }

    // 1b. Filtered tokens and adjacent pairs.
    let tokens: Vec<&str> = text
        .split(|c: char| c.is_whitespace() || ",;:()[]{}<>\"'!?/|".contains(c))
        .map(|t| t.trim_end_matches('.'))
        .filter(|t| is_token_candidate(t))
        .collect();
    for pair in tokens.windows(2) {
        terms.push(format!("{} {}", pair[0], pair[1]));
    }
    terms.extend(tokens.iter().map(|t| t.to_string()));

    // 2. Regex sweep.
    for re in [&*TITLE_DOTTED, &*LOWER_DOTTED, &*ACRONYM] {
        terms.extend(re.find_iter(text).map(|m| m.as_str().to_string()));
    }

    terms.retain(|t| is_token_candidate(t));
    terms
}

/// Length 2–50, alphanumerics plus `. - _ + #` and spaces, at least one letter.
fn is_token_candidate(token: &str) -> bool {
    let len = token.chars().count();
    (MIN_TOKEN_LEN..=MAX_TOKEN_LEN).contains(&len)
        && token.chars().any(char::is_alphabetic)
        && token
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '.' | '-' | '_' | ' ' | '+' | '#'))
}

fn detect_education(text: &str) -> Option<String> {
    EDUCATION
        .iter()
        .find(|(_, re)| re.is_match(text))
        .map(|(level, _)| level.to_string())
}

fn detect_years(text: &str) -> Option<u32> {
    YEARS
        .captures_iter(text)
        .filter_map(|c| c.get(1)?.as_str().parse::<u32>().ok())
        .filter(|y| *y <= MAX_YEARS)
        .max()
}

fn detect_languages(text: &str) -> Vec<String> {
    let words: HashSet<String> = text
        .split(|c: char| !c.is_alphabetic())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect();
    SPOKEN_LANGUAGES
        .iter()
        .filter(|lang| words.contains(&lang.to_lowercase()))
        .map(|lang| lang.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Skill;
    use crate::testutil::{MockSkillRepository, sample_catalog_skills};

    fn extractor(skills: Vec<Skill>) -> TextSkillExtractor<MockSkillRepository> {
        let catalog = SkillCatalog::new(MockSkillRepository::new(skills));
        TextSkillExtractor::new(Arc::new(catalog))
    }

    #[tokio::test]
    async fn finds_catalog_skills_across_categories() {
        let ex = extractor(sample_catalog_skills());

        let result = ex
            .extract("Experienced in Python, Node.js and AWS")
            .await
            .unwrap();

        assert_eq!(result.categories.len(), 3);
        assert_eq!(result.categories["Programming Languages"], vec!["Python"]);
        assert_eq!(result.categories["Frameworks"], vec!["Node.js"]);
        assert_eq!(result.categories["Cloud Platforms"], vec!["AWS"]);
        assert_eq!(result.total_skills(), 3);
        assert_eq!(result.confidence_score, 0.3);
    }

    #[tokio::test]
    async fn empty_text_yields_empty_result() {
        let ex = extractor(sample_catalog_skills());

        let result = ex.extract("   ").await.unwrap();

        assert!(result.categories.is_empty());
        assert_eq!(result.confidence_score, 0.0);
    }

    #[tokio::test]
    async fn skill_in_several_categories_is_added_to_each() {
        let ex = extractor(vec![
            Skill::new(1, "SQL")
                .with_category(1, "Databases")
                .with_category(2, "Programming Languages"),
        ]);

        let result = ex.extract("Strong sql and SQL tuning").await.unwrap();

        assert_eq!(result.categories["Databases"], vec!["SQL"]);
        assert_eq!(result.categories["Programming Languages"], vec!["SQL"]);
        assert_eq!(result.confidence_score, 0.1);
    }

    #[tokio::test]
    async fn multi_word_skills_match_in_lowercase_text() {
        let ex = extractor(vec![
            Skill::new(1, "Machine Learning").with_category(1, "Methodologies"),
        ]);

        let result = ex
            .extract("we apply machine learning to forecasting")
            .await
            .unwrap();

        assert_eq!(result.categories["Methodologies"], vec!["Machine Learning"]);
    }

    #[tokio::test]
    async fn confidence_is_capped() {
        let skills: Vec<Skill> = (0..12)
            .map(|i| Skill::new(i, format!("Skill{i}")).with_category(1, "Other"))
            .collect();
        let text = (0..12).map(|i| format!("Skill{i}")).collect::<Vec<_>>().join(" ");
        let ex = extractor(skills);

        let result = ex.extract(&text).await.unwrap();

        assert_eq!(result.total_skills(), 12);
        assert_eq!(result.confidence_score, 0.9);
    }

    #[tokio::test]
    async fn catalog_failure_propagates_when_nothing_cached() {
        let repo = MockSkillRepository::new(sample_catalog_skills());
        repo.fail_next(AppError::DatabaseError("down".into()));
        let ex = TextSkillExtractor::new(Arc::new(SkillCatalog::new(repo)));

        let err = ex.extract("Python").await.unwrap_err();

        assert!(matches!(err, AppError::CatalogError(_)));
    }

    #[tokio::test]
    async fn detects_ambient_profile_signals() {
        let ex = extractor(sample_catalog_skills());

        let result = ex
            .extract("MSc in CS, 3 years of Python and 7+ years overall. Fluent in English and Spanish.")
            .await
            .unwrap();

        assert_eq!(result.education_level.as_deref(), Some("Master"));
        assert_eq!(result.years_of_experience, Some(7));
        assert_eq!(result.languages_detected, vec!["English", "Spanish"]);
    }

    #[test]
    fn regex_sweep_finds_dotted_identifiers_and_acronyms() {
        let terms = candidate_terms("Built with vue.js, ASP.NET and GCP.");
        assert!(terms.contains(&"vue.js".to_string()));
        assert!(terms.contains(&"ASP.NET".to_string()));
        assert!(terms.contains(&"GCP".to_string()));
    }

    #[test]
    fn token_filter_rules() {
        assert!(is_token_candidate("Go"));
        assert!(is_token_candidate("C++"));
        assert!(!is_token_candidate("a"));
        assert!(!is_token_candidate("2024"));
        assert!(!is_token_candidate("foo@bar"));
        assert!(!is_token_candidate(&"x".repeat(51)));
    }
}
