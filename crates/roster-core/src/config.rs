use std::str::FromStr;
use std::time::Duration;

use crate::catalog::DEFAULT_CATALOG_TTL;
use crate::error::AppError;
use crate::inference::{DEFAULT_FALLBACK_MODEL, DEFAULT_INFERENCE_MODEL, ExtractOptions};
use crate::orchestrator::DEFAULT_EXTRACTION_TIMEOUT;

/// Tunables of the extraction and matching pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub catalog_ttl: Duration,
    pub extraction_timeout: Duration,
    pub inference_model: String,
    /// `None` disables the fallback retry.
    pub fallback_model: Option<String>,
    pub confidence_threshold: f64,
    pub max_skills: usize,
    pub min_match_score: f64,
    pub top_n: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            catalog_ttl: DEFAULT_CATALOG_TTL,
            extraction_timeout: DEFAULT_EXTRACTION_TIMEOUT,
            inference_model: DEFAULT_INFERENCE_MODEL.to_string(),
            fallback_model: Some(DEFAULT_FALLBACK_MODEL.to_string()),
            confidence_threshold: 0.5,
            max_skills: 50,
            min_match_score: 1.0,
            top_n: 5,
        }
    }
}

impl PipelineConfig {
    /// Read configuration from environment variables.
    ///
    /// - `ROSTER_CATALOG_TTL_SECS` (defaults to 3600)
    /// - `ROSTER_EXTRACTION_TIMEOUT_SECS` (defaults to 30)
    /// - `ROSTER_INFERENCE_MODEL`
    /// - `ROSTER_FALLBACK_MODEL` (empty string disables the fallback)
    /// - `ROSTER_CONFIDENCE_THRESHOLD` (0.0 to 1.0, defaults to 0.5)
    /// - `ROSTER_MAX_SKILLS` (defaults to 50)
    /// - `ROSTER_MIN_MATCH_SCORE` (defaults to 1.0)
    /// - `ROSTER_TOP_N` (defaults to 5)
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`PipelineConfig::from_env`] with an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let defaults = Self::default();

        let catalog_ttl = parse_var(&lookup, "ROSTER_CATALOG_TTL_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.catalog_ttl);
        let extraction_timeout: Option<u64> = parse_var(&lookup, "ROSTER_EXTRACTION_TIMEOUT_SECS")?;
        if extraction_timeout == Some(0) {
            return Err(AppError::ConfigError(
                "ROSTER_EXTRACTION_TIMEOUT_SECS must be at least 1".into(),
            ));
        }
        let extraction_timeout = extraction_timeout
            .map(Duration::from_secs)
            .unwrap_or(defaults.extraction_timeout);

        let inference_model = lookup("ROSTER_INFERENCE_MODEL")
            .filter(|m| !m.trim().is_empty())
            .unwrap_or(defaults.inference_model);
        let fallback_model = match lookup("ROSTER_FALLBACK_MODEL") {
            None => defaults.fallback_model,
            Some(m) if m.trim().is_empty() => None,
            Some(m) => Some(m),
        };

        let confidence_threshold = parse_var(&lookup, "ROSTER_CONFIDENCE_THRESHOLD")?
            .unwrap_or(defaults.confidence_threshold);
        if !(0.0..=1.0).contains(&confidence_threshold) {
            return Err(AppError::ConfigError(format!(
                "ROSTER_CONFIDENCE_THRESHOLD {confidence_threshold} is outside 0.0..=1.0"
            )));
        }

        let max_skills = parse_var(&lookup, "ROSTER_MAX_SKILLS")?.unwrap_or(defaults.max_skills);
        let min_match_score =
            parse_var(&lookup, "ROSTER_MIN_MATCH_SCORE")?.unwrap_or(defaults.min_match_score);
        let top_n = parse_var(&lookup, "ROSTER_TOP_N")?.unwrap_or(defaults.top_n);

        Ok(Self {
            catalog_ttl,
            extraction_timeout,
            inference_model,
            fallback_model,
            confidence_threshold,
            max_skills,
            min_match_score,
            top_n,
        })
    }

    /// Default per-call options for the inference extractor.
    pub fn extract_options(&self) -> ExtractOptions {
        ExtractOptions::default()
            .with_model(self.inference_model.clone())
            .with_threshold(self.confidence_threshold)
            .with_max_skills(self.max_skills)
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, AppError> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| AppError::ConfigError(format!("Invalid {key} '{raw}'"))),
    }
}
