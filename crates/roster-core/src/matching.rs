//! Bounded, explainable candidate scoring.
//!
//! ```text
//! score = max_score × (w_req × |required ∩ skills| + w_pref × |preferred ∩ skills|)
//!                   / (w_req × |required|          + w_pref × |preferred|)
//! ```
//!
//! Skill comparison uses [`normalize_skill_name`], so `Node.js` matches `nodejs`.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::models::{Candidate, Match, normalize_skill_name};

/// Weights and range of the match score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchPolicy {
    pub required_weight: f64,
    pub preferred_weight: f64,
    pub max_score: f64,
}

impl Default for MatchPolicy {
    fn default() -> Self {
        Self {
            required_weight: 2.0,
            preferred_weight: 1.0,
            max_score: 100.0,
        }
    }
}

/// Matched and missing skills of one candidate against a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchExplanation {
    pub matched: Vec<String>,
    pub missing: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct MatchEngine {
    policy: MatchPolicy,
}

impl MatchEngine {
    pub fn new(policy: MatchPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> MatchPolicy {
        self.policy
    }

    /// Rank `pool` against the requested skills.
    ///
    /// Returns at most `top_n` matches scoring at least `min_score`, best
    /// first, ties broken by candidate id ascending. An empty pool or an empty
    /// `required` list yields an empty result.
    pub fn score(
        &self,
        required: &[String],
        preferred: &[String],
        pool: &[Candidate],
        min_score: f64,
        top_n: usize,
    ) -> Vec<Match> {
        let required = dedupe_requested(required, &HashSet::new());
        if required.is_empty() || pool.is_empty() || top_n == 0 {
            return Vec::new();
        }
        let required_keys: HashSet<String> = required.iter().map(|(k, _)| k.clone()).collect();
        let preferred = dedupe_requested(preferred, &required_keys);

        let total_weight = self.policy.required_weight * required.len() as f64
            + self.policy.preferred_weight * preferred.len() as f64;

        let mut matches: Vec<Match> = pool
            .iter()
            .map(|candidate| self.score_candidate(candidate, &required, &preferred, total_weight))
            .filter(|m| m.match_score >= min_score)
            .collect();

        matches.sort_by(|a, b| {
            b.match_score
                .total_cmp(&a.match_score)
                .then_with(|| a.employee_id.cmp(&b.employee_id))
        });
        matches.truncate(top_n);

        tracing::debug!(
            pool = pool.len(),
            returned = matches.len(),
            min_score,
            "Candidate pool scored"
        );
        matches
    }

    /// Split `requested` into skills the candidate has and the rest.
    pub fn explain(&self, requested: &[String], candidate: &Candidate) -> MatchExplanation {
        let skills = candidate_keys(candidate);
        let (matched, missing): (Vec<_>, Vec<_>) = dedupe_requested(requested, &HashSet::new())
            .into_iter()
            .partition(|(key, _)| skills.contains(key));
        MatchExplanation {
            matched: matched.into_iter().map(|(_, name)| name).collect(),
            missing: missing.into_iter().map(|(_, name)| name).collect(),
        }
    }

    fn score_candidate(
        &self,
        candidate: &Candidate,
        required: &[(String, String)],
        preferred: &[(String, String)],
        total_weight: f64,
    ) -> Match {
        let skills = candidate_keys(candidate);
        let hits = |list: &[(String, String)]| -> Vec<String> {
            list.iter()
                .filter(|(key, _)| skills.contains(key))
                .map(|(_, name)| name.clone())
                .collect()
        };
        let required_hits = hits(required);
        let preferred_hits = hits(preferred);

        let raw = self.policy.required_weight * required_hits.len() as f64
            + self.policy.preferred_weight * preferred_hits.len() as f64;
        let score = if total_weight > 0.0 {
            round2(self.policy.max_score * raw / total_weight)
        } else {
            0.0
        };

        let missing: Vec<String> = required
            .iter()
            .chain(preferred.iter())
            .filter(|(key, _)| !skills.contains(key))
            .map(|(_, name)| name.clone())
            .collect();

        let mut notes = format!(
            "Matched {}/{} required and {}/{} preferred skills",
            required_hits.len(),
            required.len(),
            preferred_hits.len(),
            preferred.len()
        );
        if !missing.is_empty() {
            notes.push_str(&format!("; missing: {}", missing.join(", ")));
        }

        let mut matching_skills = required_hits;
        matching_skills.extend(preferred_hits);

        Match {
            employee_id: candidate.id,
            match_score: score,
            matching_skills,
            missing_skills: missing,
            notes,
        }
    }
}

/// `(normalized key, display name)` pairs, first occurrence wins, skipping `exclude`.
fn dedupe_requested(names: &[String], exclude: &HashSet<String>) -> Vec<(String, String)> {
    let mut seen = HashSet::new();
    names
        .iter()
        .filter_map(|name| {
            let key = normalize_skill_name(name);
            if key.is_empty() || exclude.contains(&key) || !seen.insert(key.clone()) {
                return None;
            }
            Some((key, name.trim().to_string()))
        })
        .collect()
}

fn candidate_keys(candidate: &Candidate) -> HashSet<String> {
    candidate
        .skills
        .iter()
        .flat_map(|s| std::iter::once(&s.name).chain(s.synonyms.iter()))
        .map(|n| normalize_skill_name(n))
        .filter(|k| !k.is_empty())
        .collect()
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
