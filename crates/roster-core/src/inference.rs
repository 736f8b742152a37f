//! Remote-model skill extraction behind the same result shape as the
//! catalog extractor.
//!
//! Hits from the token-classification model are filtered by confidence and
//! entity label, deduplicated, ranked and categorized. Whole responses are
//! cached for 30 minutes keyed by the text and options.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use moka::future::Cache;
use serde::Serialize;

use crate::error::AppError;
use crate::models::{
    EntityPrediction, ExtractedSkillSet, compute_hash, dedupe_skills, normalize_skill_name,
};
use crate::traits::{InferenceClient, SkillExtractor, SkillLookup};

pub const MAX_INFERENCE_TEXT_CHARS: usize = 10_000;
pub const DEFAULT_INFERENCE_MODEL: &str = "dslim/bert-base-NER";
pub const DEFAULT_FALLBACK_MODEL: &str = "dbmdz/bert-large-cased-finetuned-conll03-english";
pub const RESPONSE_CACHE_TTL: Duration = Duration::from_secs(30 * 60);
const RESPONSE_CACHE_CAPACITY: u64 = 1_000;
const LATENCY_SMOOTHING: f64 = 0.2;
pub const OTHER_CATEGORY: &str = "Other";

/// Built-in keyword lists used when the catalog does not know a skill.
const KEYWORD_CATEGORIES: &[(&str, &[&str])] = &[
    (
        "Programming Languages",
        &[
            "python", "java", "javascript", "typescript", "go", "golang", "rust", "c", "c++",
            "c#", "ruby", "php", "swift", "kotlin", "scala", "r", "perl", "haskell", "elixir",
            "dart", "sql", "bash", "matlab", "lua", "clojure", "objective-c",
        ],
    ),
    (
        "Frameworks",
        &[
            "react", "angular", "vue", "vue.js", "node.js", "node", "django", "flask",
            "fastapi", "spring", "spring boot", "rails", "ruby on rails", "laravel", "express",
            "next.js", ".net", "asp.net", "tensorflow", "pytorch", "svelte", "symfony", "actix",
            "tokio",
        ],
    ),
    (
        "Databases",
        &[
            "postgresql", "postgres", "mysql", "mongodb", "redis", "sqlite", "oracle",
            "cassandra", "elasticsearch", "dynamodb", "mariadb", "neo4j", "couchdb", "snowflake",
            "bigquery",
        ],
    ),
    (
        "Cloud Platforms",
        &[
            "aws", "amazon web services", "azure", "gcp", "google cloud", "heroku",
            "digitalocean", "cloudflare", "ibm cloud", "oracle cloud", "firebase",
        ],
    ),
    (
        "DevOps Tools",
        &[
            "docker", "kubernetes", "k8s", "terraform", "ansible", "jenkins", "gitlab",
            "github actions", "circleci", "helm", "prometheus", "grafana", "git", "puppet",
            "chef", "argocd",
        ],
    ),
    (
        "Operating Systems",
        &[
            "linux", "ubuntu", "debian", "centos", "windows", "macos", "unix", "android", "ios",
            "freebsd", "red hat",
        ],
    ),
    (
        "Methodologies",
        &[
            "agile", "scrum", "kanban", "devops", "tdd", "bdd", "ci/cd", "cicd", "lean",
            "waterfall", "microservices",
        ],
    ),
    (OTHER_CATEGORY, &[]),
];

/// Entity labels that name people, places or organizations rather than skills.
const REJECTED_LABELS: &[&str] = &["PER", "PERSON", "LOC", "LOCATION", "ORG", "ORGANIZATION"];

/// Per-call options. Unset fields fall back to the adapter's defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractOptions {
    pub model: Option<String>,
    pub confidence_threshold: f64,
    pub max_skills: usize,
    /// When non-empty, only these categories are returned.
    pub categories: Vec<String>,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            model: None,
            confidence_threshold: 0.5,
            max_skills: 50,
            categories: Vec::new(),
        }
    }
}

impl ExtractOptions {
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    pub fn with_max_skills(mut self, max: usize) -> Self {
        self.max_skills = max;
        self
    }

    pub fn with_categories(mut self, categories: Vec<String>) -> Self {
        self.categories = categories;
        self
    }

    fn cache_key(&self, model: &str, text: &str) -> String {
        compute_hash(&format!(
            "{model}\u{1f}{}\u{1f}{}\u{1f}{}\u{1f}{text}",
            self.confidence_threshold,
            self.max_skills,
            self.categories.join(",")
        ))
    }
}

/// A model hit that survived filtering.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredSkill {
    pub name: String,
    pub confidence: f64,
    pub entity_group: String,
    pub categories: Vec<String>,
}

/// Full adapter response, as cached.
#[derive(Debug, Clone, Serialize)]
pub struct InferenceExtraction {
    pub skills: ExtractedSkillSet,
    pub hits: Vec<ScoredSkill>,
    pub model: String,
}

/// Rolling request counters and smoothed latency.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AdapterStats {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub cache_hits: u64,
    pub average_latency_ms: f64,
    latency_samples: u64,
}

impl AdapterStats {
    fn record_latency(&mut self, elapsed: Duration) {
        let ms = elapsed.as_secs_f64() * 1000.0;
        self.average_latency_ms = if self.latency_samples == 0 {
            ms
        } else {
            self.average_latency_ms * (1.0 - LATENCY_SMOOTHING) + ms * LATENCY_SMOOTHING
        };
        self.latency_samples += 1;
    }
}

/// Skill extractor backed by a remote [`InferenceClient`].
#[derive(Clone)]
pub struct InferenceSkillExtractor<C: InferenceClient> {
    client: C,
    default_model: String,
    fallback_model: Option<String>,
    defaults: ExtractOptions,
    catalog: Option<Arc<dyn SkillLookup>>,
    cache: Cache<String, InferenceExtraction>,
    stats: Arc<Mutex<AdapterStats>>,
}

impl<C: InferenceClient> InferenceSkillExtractor<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            default_model: DEFAULT_INFERENCE_MODEL.to_string(),
            fallback_model: Some(DEFAULT_FALLBACK_MODEL.to_string()),
            defaults: ExtractOptions::default(),
            catalog: None,
            cache: Cache::builder()
                .max_capacity(RESPONSE_CACHE_CAPACITY)
                .time_to_live(RESPONSE_CACHE_TTL)
                .build(),
            stats: Arc::new(Mutex::new(AdapterStats::default())),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    /// Model tried once when the primary call fails. `None` disables the retry.
    pub fn with_fallback_model(mut self, model: Option<String>) -> Self {
        self.fallback_model = model;
        self
    }

    /// Options used by [`SkillExtractor::extract`].
    pub fn with_defaults(mut self, options: ExtractOptions) -> Self {
        self.defaults = options;
        self
    }

    /// Catalog whose categories override the keyword heuristics.
    pub fn with_catalog(mut self, catalog: Arc<dyn SkillLookup>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn stats(&self) -> AdapterStats {
        self.stats.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Extract skills with explicit options.
    pub async fn extract_with(
        &self,
        text: &str,
        options: &ExtractOptions,
    ) -> Result<InferenceExtraction, AppError> {
        validate_text(text)?;

        let model = options
            .model
            .clone()
            .unwrap_or_else(|| self.default_model.clone());
        let key = options.cache_key(&model, text);

        self.update_stats(|s| s.total_requests += 1);

        if let Some(hit) = self.cache.get(&key).await {
            tracing::debug!(%model, "Inference cache hit");
            self.update_stats(|s| {
                s.cache_hits += 1;
                s.successful_requests += 1;
            });
            return Ok(hit);
        }

        let started = Instant::now();
        let (predictions, model_used) = match self.call_with_fallback(&model, text).await {
            Ok(ok) => ok,
            Err(e) => {
                self.update_stats(|s| s.failed_requests += 1);
                return Err(e);
            }
        };

        let hits = self.rank_hits(predictions, options);
        let extraction = build_extraction(hits, model_used);

        self.cache.insert(key, extraction.clone()).await;
        self.update_stats(|s| {
            s.successful_requests += 1;
            s.record_latency(started.elapsed());
        });

        tracing::info!(
            model = %extraction.model,
            skills = extraction.hits.len(),
            "Inference extraction complete"
        );
        Ok(extraction)
    }

    /// Transient primary failures get one call to the fallback model.
    async fn call_with_fallback(
        &self,
        model: &str,
        text: &str,
    ) -> Result<(Vec<EntityPrediction>, String), AppError> {
        match self.client.infer(model, text).await {
            Ok(predictions) => Ok((predictions, model.to_string())),
            Err(primary) => {
                if !primary.is_retryable() {
                    return Err(primary);
                }
                let Some(fallback) = self.fallback_model.as_deref().filter(|f| *f != model) else {
                    return Err(primary);
                };
                tracing::warn!(%model, %fallback, error = %primary, "Primary model failed, trying fallback");
                self.client
                    .infer(fallback, text)
                    .await
                    .map(|p| (p, fallback.to_string()))
            }
        }
    }

    fn rank_hits(
        &self,
        predictions: Vec<EntityPrediction>,
        options: &ExtractOptions,
    ) -> Vec<ScoredSkill> {
        let mut best: HashMap<String, ScoredSkill> = HashMap::new();

        for prediction in predictions {
            if prediction.score < options.confidence_threshold
                || !is_skill_label(&prediction.entity_group)
            {
                continue;
            }
            let word = clean_word(&prediction.word);
            let key = normalize_skill_name(&word);
            if key.chars().count() < 2 {
                continue;
            }

            let (name, categories) = match self.catalog.as_ref().and_then(|c| c.lookup(&key)) {
                Some(info) if !info.categories.is_empty() => (info.name, info.categories),
                _ => (word, vec![keyword_category(&key).to_string()]),
            };

            let candidate = ScoredSkill {
                name,
                confidence: prediction.score,
                entity_group: prediction.entity_group,
                categories,
            };
            match best.get(&key) {
                Some(existing) if existing.confidence >= candidate.confidence => {}
                _ => {
                    best.insert(key, candidate);
                }
            }
        }

        let mut hits: Vec<ScoredSkill> = best
            .into_values()
            .filter(|hit| {
                options.categories.is_empty()
                    || hit.categories.iter().any(|c| {
                        options
                            .categories
                            .iter()
                            .any(|wanted| wanted.eq_ignore_ascii_case(c))
                    })
            })
            .collect();
        hits.sort_by(|a, b| {
            b.confidence
                .total_cmp(&a.confidence)
                .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        });
        hits.truncate(options.max_skills);
        hits
    }

    fn update_stats(&self, f: impl FnOnce(&mut AdapterStats)) {
        if let Ok(mut stats) = self.stats.lock() {
            f(&mut stats);
        }
    }
}

impl<C: InferenceClient> SkillExtractor for InferenceSkillExtractor<C> {
    fn method(&self) -> &'static str {
        "inference"
    }

    async fn extract(&self, text: &str) -> Result<ExtractedSkillSet, AppError> {
        self.extract_with(text, &self.defaults)
            .await
            .map(|e| e.skills)
    }
}

pub(crate) fn validate_text(text: &str) -> Result<(), AppError> {
    if text.trim().is_empty() {
        return Err(AppError::ValidationError("text is empty".into()));
    }
    let chars = text.chars().count();
    if chars > MAX_INFERENCE_TEXT_CHARS {
        return Err(AppError::ValidationError(format!(
            "text is {chars} characters, limit is {MAX_INFERENCE_TEXT_CHARS}"
        )));
    }
    Ok(())
}

/// Accepts any label except plain person/location/organization ones.
pub fn is_skill_label(label: &str) -> bool {
    let bare = label
        .strip_prefix("B-")
        .or_else(|| label.strip_prefix("I-"))
        .unwrap_or(label);
    !REJECTED_LABELS
        .iter()
        .any(|rejected| bare.eq_ignore_ascii_case(rejected))
}

/// Category from the built-in keyword lists: exact match first, then any word
/// of a multi-word name; [`OTHER_CATEGORY`] when nothing matches.
pub fn keyword_category(normalized: &str) -> &'static str {
    let lists = || {
        KEYWORD_CATEGORIES
            .iter()
            .flat_map(|(category, keywords)| keywords.iter().map(move |k| (*category, *k)))
    };

    if let Some((category, _)) = lists().find(|(_, k)| normalize_skill_name(k) == normalized) {
        return category;
    }
    for word in normalized.split_whitespace() {
        if let Some((category, _)) = lists().find(|(_, k)| normalize_skill_name(k) == word) {
            return category;
        }
    }
    OTHER_CATEGORY
}

fn clean_word(word: &str) -> String {
    word.trim()
        .trim_start_matches("##")
        .trim_matches(|c: char| matches!(c, ',' | ';' | ':' | '(' | ')' | '"' | '\''))
        .trim()
        .to_string()
}

fn build_extraction(hits: Vec<ScoredSkill>, model: String) -> InferenceExtraction {
    let mut categories: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for hit in &hits {
        for category in &hit.categories {
            categories
                .entry(category.clone())
                .or_default()
                .push(hit.name.clone());
        }
    }
    let categories: BTreeMap<String, Vec<String>> = categories
        .into_iter()
        .map(|(c, skills)| (c, dedupe_skills(skills)))
        .collect();

    let confidence = if hits.is_empty() {
        0.0
    } else {
        hits.iter().map(|h| h.confidence).sum::<f64>() / hits.len() as f64
    };

    InferenceExtraction {
        skills: ExtractedSkillSet {
            categories,
            summary: format!("Model {} found {} skills", model, hits.len()),
            confidence_score: confidence.clamp(0.0, 1.0),
            ..Default::default()
        },
        hits,
        model,
    }
}
