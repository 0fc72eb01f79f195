//! Match scoring: a pluggable scorer that measures a candidate against a job posting.
//!
//! Default: `SkillOverlapScorer` (pure-Rust, deterministic, explainable).
//!
//! The engine holds an `Arc<dyn MatchScorer>`; any implementation must be a pure function
//! of the two records it is handed, because scores are cached and reused.

use serde::{Deserialize, Serialize};

use crate::models::{Candidate, JobPosting};

/// Strength of a required skill listed verbatim in the candidate's skill set.
pub const EXACT_MATCH_STRENGTH: f32 = 1.0;
/// Strength of a required skill only mentioned in experience or education text.
pub const TEXT_MATCH_STRENGTH: f32 = 0.6;
/// Affinity is scaled into `[0, AFFINITY_CEILING]` before the freshness bonus.
pub const AFFINITY_CEILING: f32 = 95.0;
/// Tie-break bonus for candidates still flagged `is_new`. Small enough that a
/// candidate with no overlap can never approach a strong-match threshold.
pub const FRESHNESS_BONUS: u8 = 5;

// ────────────────────────────────────────────────────────────────────────────
// Output data model
// ────────────────────────────────────────────────────────────────────────────

/// Scored `(job, candidate)` pair plus the skills that explain the score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub job_id: String,
    pub candidate_id: String,
    pub score: u8,
    /// Required skills listed in the candidate's skill set.
    pub matched_skills: Vec<String>,
    /// Required skills only evidenced by free text.
    pub partial_skills: Vec<String>,
    /// Required skills with no evidence at all.
    pub missing_skills: Vec<String>,
}

// ────────────────────────────────────────────────────────────────────────────
// Trait definition
// ────────────────────────────────────────────────────────────────────────────

/// Implement this to swap scoring backends without touching the engine or its callers.
pub trait MatchScorer: Send + Sync {
    fn score(&self, job: &JobPosting, candidate: &Candidate) -> MatchRecord;
}

// ────────────────────────────────────────────────────────────────────────────
// SkillOverlapScorer (default)
// ────────────────────────────────────────────────────────────────────────────

/// Algorithm:
/// 1. For each required skill:
///    - listed in candidate skills → strength 1.0
///    - mentioned as a whole word in experience/education → strength 0.6
///    - otherwise → strength 0.0
/// 2. affinity = Σ strength / |required| × 95, rounded
/// 3. score = min(100, affinity + 5 if `is_new`)
pub struct SkillOverlapScorer;

impl MatchScorer for SkillOverlapScorer {
    fn score(&self, job: &JobPosting, candidate: &Candidate) -> MatchRecord {
        compute_skill_overlap(job, candidate)
    }
}

fn compute_skill_overlap(job: &JobPosting, candidate: &Candidate) -> MatchRecord {
    let mut matched_skills = Vec::new();
    let mut partial_skills = Vec::new();
    let mut missing_skills = Vec::new();

    let evidence = candidate.evidence_text();
    let mut total_strength = 0.0_f32;

    // BTreeSet iteration keeps the explanation lists sorted.
    for skill in &job.required_skills {
        if candidate.skills.contains(skill) {
            total_strength += EXACT_MATCH_STRENGTH;
            matched_skills.push(skill.clone());
        } else if mentions(&evidence, skill) {
            total_strength += TEXT_MATCH_STRENGTH;
            partial_skills.push(skill.clone());
        } else {
            missing_skills.push(skill.clone());
        }
    }

    let affinity = if job.required_skills.is_empty() {
        0
    } else {
        let ratio = total_strength / job.required_skills.len() as f32;
        (ratio * AFFINITY_CEILING).round().clamp(0.0, AFFINITY_CEILING) as u8
    };

    let bonus = if candidate.is_new { FRESHNESS_BONUS } else { 0 };
    let score = affinity.saturating_add(bonus).min(100);

    MatchRecord {
        job_id: job.id.clone(),
        candidate_id: candidate.id.clone(),
        score,
        matched_skills,
        partial_skills,
        missing_skills,
    }
}

/// Whole-word (or whole-phrase) containment: `"java"` does not match `"javascript"`.
fn mentions(text: &str, skill: &str) -> bool {
    if skill.is_empty() {
        return false;
    }
    let is_word = |c: char| c.is_alphanumeric();
    text.match_indices(skill).any(|(start, _)| {
        let before = text[..start].chars().next_back();
        let after = text[start + skill.len()..].chars().next();
        !before.map(is_word).unwrap_or(false) && !after.map(is_word).unwrap_or(false)
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
