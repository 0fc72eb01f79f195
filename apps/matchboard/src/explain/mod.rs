//! On-demand, human-readable match explanations.
//!
//! The score and skill lists always come from the match engine. Only the prose is
//! delegated to a `TextGenerator`, and a slow or failing generator degrades to a fixed
//! fallback string instead of an error.

pub mod llm_client;
mod offline;
pub mod prompts;

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::warn;

use crate::attributes::AttributeStore;
use crate::errors::AppError;
use crate::matching::MatchEngine;

pub use llm_client::{LlmClient, LlmError};
pub use offline::OfflineTextGenerator;

pub const FALLBACK_EXPLANATION: &str =
    "Unable to generate a detailed match analysis at this time.";

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn explain(&self, job_title: &str, candidate_summary: &str) -> Result<String, AppError>;

    /// Short identifier for logs.
    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetailedMatch {
    pub job_id: String,
    pub candidate_id: String,
    pub score: u8,
    pub matched_skills: Vec<String>,
    pub partial_skills: Vec<String>,
    pub missing_skills: Vec<String>,
    pub explanation: String,
    /// False when `explanation` is the fallback text.
    pub available: bool,
}

/// Score, skill breakdown and generated prose for one `(job, candidate)` pair.
///
/// Unknown ids are `NotFound`. Generator errors and timeouts are logged and replaced by
/// `FALLBACK_EXPLANATION`.
pub async fn detailed_match(
    attributes: &AttributeStore,
    engine: &MatchEngine,
    generator: &dyn TextGenerator,
    job_id: &str,
    candidate_id: &str,
    timeout: Duration,
) -> Result<DetailedMatch, AppError> {
    let job = attributes
        .get_job_posting(job_id)
        .ok_or_else(|| AppError::job_not_found(job_id))?;
    let candidate = attributes
        .get_candidate(candidate_id)
        .ok_or_else(|| AppError::candidate_not_found(candidate_id))?;
    let record = engine.record_for(job_id, candidate_id)?;

    let generated =
        tokio::time::timeout(timeout, generator.explain(&job.title, &candidate.summary())).await;
    let (explanation, available) = match generated {
        Ok(Ok(text)) if !text.trim().is_empty() => (text, true),
        Ok(Ok(_)) => {
            warn!("{} returned an empty explanation for {job_id}/{candidate_id}", generator.name());
            (FALLBACK_EXPLANATION.to_string(), false)
        }
        Ok(Err(e)) => {
            warn!("{} failed for {job_id}/{candidate_id}: {e}", generator.name());
            (FALLBACK_EXPLANATION.to_string(), false)
        }
        Err(_) => {
            warn!(
                "{} timed out after {}s for {job_id}/{candidate_id}",
                generator.name(),
                timeout.as_secs()
            );
            (FALLBACK_EXPLANATION.to_string(), false)
        }
    };

    Ok(DetailedMatch {
        job_id: record.job_id,
        candidate_id: record.candidate_id,
        score: record.score,
        matched_skills: record.matched_skills,
        partial_skills: record.partial_skills,
        missing_skills: record.missing_skills,
        explanation,
        available,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::models::{Candidate, JobPosting};

    struct Failing;

    #[async_trait]
    impl TextGenerator for Failing {
        async fn explain(&self, _: &str, _: &str) -> Result<String, AppError> {
            Err(AppError::Transient("quota exceeded".to_string()))
        }

        fn name(&self) -> &'static str {
            "failing"
        }
    }

    struct Stalled;

    #[async_trait]
    impl TextGenerator for Stalled {
        async fn explain(&self, _: &str, _: &str) -> Result<String, AppError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok("too late".to_string())
        }

        fn name(&self) -> &'static str {
            "stalled"
        }
    }

    struct Echo;

    #[async_trait]
    impl TextGenerator for Echo {
        async fn explain(&self, job_title: &str, candidate_summary: &str) -> Result<String, AppError> {
            Ok(format!("{job_title} <- {candidate_summary}"))
        }

        fn name(&self) -> &'static str {
            "echo"
        }
    }

    fn setup() -> (Arc<AttributeStore>, MatchEngine) {
        let attributes = Arc::new(AttributeStore::new());
        attributes.upsert_job_posting(JobPosting::new("J1", "Backend Developer", ["Rust", "SQL"]));
        attributes.upsert_candidate(
            Candidate::new("C1", "Ana Pop", ["Rust"])
                .with_experience("Tuned SQL queries for reporting")
                .with_is_new(false),
        );
        let engine = MatchEngine::new(attributes.clone());
        (attributes, engine)
    }

    #[tokio::test]
    async fn test_generated_text_is_returned_verbatim() {
        let (attributes, engine) = setup();
        let m = detailed_match(&attributes, &engine, &Echo, "J1", "C1", Duration::from_secs(5))
            .await
            .unwrap();

        assert!(m.available);
        assert!(m.explanation.starts_with("Backend Developer <- Ana Pop"));
        // 1.0 + 0.6 of 2 → 76
        assert_eq!(m.score, 76);
        assert_eq!(m.matched_skills, vec!["rust"]);
        assert_eq!(m.partial_skills, vec!["sql"]);
        assert!(m.missing_skills.is_empty());
    }

    #[tokio::test]
    async fn test_generator_failure_falls_back() {
        let (attributes, engine) = setup();
        let m = detailed_match(&attributes, &engine, &Failing, "J1", "C1", Duration::from_secs(5))
            .await
            .unwrap();
        assert!(!m.available);
        assert_eq!(m.explanation, FALLBACK_EXPLANATION);
        assert_eq!(m.score, 76);
    }

    #[tokio::test(start_paused = true)]
    async fn test_generator_timeout_falls_back() {
        let (attributes, engine) = setup();
        let m = detailed_match(&attributes, &engine, &Stalled, "J1", "C1", Duration::from_secs(10))
            .await
            .unwrap();
        assert!(!m.available);
        assert_eq!(m.explanation, FALLBACK_EXPLANATION);
    }

    #[tokio::test]
    async fn test_unknown_ids_are_not_found() {
        let (attributes, engine) = setup();
        let err = detailed_match(&attributes, &engine, &Echo, "J9", "C1", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        let err = detailed_match(&attributes, &engine, &Echo, "J1", "C9", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
