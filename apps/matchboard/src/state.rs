use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::attributes::AttributeStore;
use crate::config::Config;
use crate::errors::AppError;
use crate::events::{spawn_producer, EventProducer, ProducerConfig, ProducerHandle};
use crate::explain::{self, DetailedMatch, LlmClient, OfflineTextGenerator, TextGenerator};
use crate::matching::MatchEngine;
use crate::models::{Candidate, JobPosting};
use crate::notifications::{DocumentStore, FileDocumentStore, InMemoryDocumentStore, NotificationStore};
use crate::seed::DemoDataset;

/// Shared application state: every component, wired once.
///
/// Ingestion goes through `ingest_*` / `remove_*` so the match cache is invalidated
/// alongside the attribute write.
#[derive(Clone)]
pub struct AppState {
    pub attributes: Arc<AttributeStore>,
    pub engine: Arc<MatchEngine>,
    pub notifications: Arc<NotificationStore>,
    pub producer: Arc<EventProducer>,
    /// Explanation text source. LLM-backed when an API key is configured.
    pub generator: Arc<dyn TextGenerator>,
    pub config: Config,
}

impl AppState {
    /// File-backed notification log under `config.data_dir`.
    pub fn from_config(config: Config) -> Result<Self, AppError> {
        let documents: Arc<dyn DocumentStore> =
            Arc::new(FileDocumentStore::new(config.data_dir.clone()));

        let generator: Arc<dyn TextGenerator> = match &config.anthropic_api_key {
            Some(key) => {
                let client = LlmClient::new(key.clone())?;
                info!("LLM client initialized (model: {})", explain::llm_client::MODEL);
                Arc::new(client)
            }
            None => {
                info!("ANTHROPIC_API_KEY not set, using offline explanations");
                Arc::new(OfflineTextGenerator)
            }
        };

        Self::assemble(config, documents, generator)
    }

    /// Fully in-memory state with the offline generator.
    pub fn in_memory(config: Config) -> Result<Self, AppError> {
        Self::assemble(
            config,
            Arc::new(InMemoryDocumentStore::new()),
            Arc::new(OfflineTextGenerator),
        )
    }

    pub fn assemble(
        config: Config,
        documents: Arc<dyn DocumentStore>,
        generator: Arc<dyn TextGenerator>,
    ) -> Result<Self, AppError> {
        let attributes = Arc::new(AttributeStore::new());
        let engine = Arc::new(MatchEngine::new(attributes.clone()));
        let notifications = Arc::new(NotificationStore::open(
            documents,
            config.notification_page_size,
        )?);
        let producer = Arc::new(EventProducer::new(
            attributes.clone(),
            engine.clone(),
            notifications.clone(),
            ProducerConfig {
                strong_match_threshold: config.strong_match_threshold,
                strong_match_policy: config.strong_match_policy,
            },
        ));

        Ok(AppState {
            attributes,
            engine,
            notifications,
            producer,
            generator,
            config,
        })
    }

    pub fn ingest_candidate(&self, candidate: Candidate) -> Candidate {
        let stored = self.attributes.upsert_candidate(candidate);
        self.engine.invalidate_candidate(&stored.id);
        stored
    }

    pub fn ingest_job_posting(&self, job: JobPosting) -> JobPosting {
        let stored = self.attributes.upsert_job_posting(job);
        self.engine.invalidate_job(&stored.id);
        stored
    }

    pub fn remove_candidate(&self, candidate_id: &str) -> Result<Candidate, AppError> {
        let removed = self
            .attributes
            .remove_candidate(candidate_id)
            .ok_or_else(|| AppError::candidate_not_found(candidate_id))?;
        self.engine.invalidate_candidate(candidate_id);
        Ok(removed)
    }

    pub fn remove_job_posting(&self, job_id: &str) -> Result<JobPosting, AppError> {
        let removed = self
            .attributes
            .remove_job_posting(job_id)
            .ok_or_else(|| AppError::job_not_found(job_id))?;
        self.engine.invalidate_job(job_id);
        Ok(removed)
    }

    /// Ingests every record of a dataset. Returns `(jobs, candidates)` counts.
    pub fn load_dataset(&self, dataset: DemoDataset) -> (usize, usize) {
        let jobs = dataset.job_postings.len();
        let candidates = dataset.candidates.len();
        for job in dataset.job_postings {
            self.ingest_job_posting(job);
        }
        for candidate in dataset.candidates {
            self.ingest_candidate(candidate);
        }
        (jobs, candidates)
    }

    pub async fn detailed_match(
        &self,
        job_id: &str,
        candidate_id: &str,
    ) -> Result<DetailedMatch, AppError> {
        explain::detailed_match(
            &self.attributes,
            &self.engine,
            self.generator.as_ref(),
            job_id,
            candidate_id,
            self.config.explain_timeout,
        )
        .await
    }

    /// Starts the periodic producer using `config.poll_interval`.
    pub fn spawn_producer(&self) -> ProducerHandle {
        self.spawn_producer_every(self.config.poll_interval)
    }

    pub fn spawn_producer_every(&self, period: Duration) -> ProducerHandle {
        spawn_producer(self.producer.clone(), period)
    }
}
