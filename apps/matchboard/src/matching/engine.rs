use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::attributes::{AttributeSnapshot, AttributeStore};
use crate::errors::AppError;
use crate::matching::scoring::{MatchRecord, MatchScorer, SkillOverlapScorer};
use crate::models::{Candidate, JobPosting};

/// Attribute state a cached record was computed from. `is_new` is part of it because the
/// freshness bonus depends on it and clearing the flag does not advance `last_updated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CacheStamp {
    job_updated: DateTime<Utc>,
    candidate_updated: DateTime<Utc>,
    candidate_is_new: bool,
}

impl CacheStamp {
    fn of(job: &JobPosting, candidate: &Candidate) -> Self {
        Self {
            job_updated: job.last_updated,
            candidate_updated: candidate.last_updated,
            candidate_is_new: candidate.is_new,
        }
    }
}

struct CacheEntry {
    stamp: CacheStamp,
    record: Arc<MatchRecord>,
}

/// job id → candidate id → cached record
type JobCache = HashMap<String, HashMap<String, CacheEntry>>;

/// Computes, caches and ranks match records.
///
/// `score_for` is safe to call concurrently. Two callers racing on the same stale pair
/// may both recompute; the later write wins and both values are identical.
pub struct MatchEngine {
    attributes: Arc<AttributeStore>,
    scorer: Arc<dyn MatchScorer>,
    cache: RwLock<JobCache>,
    recomputations: AtomicU64,
}

impl MatchEngine {
    pub fn new(attributes: Arc<AttributeStore>) -> Self {
        Self::with_scorer(attributes, Arc::new(SkillOverlapScorer))
    }

    pub fn with_scorer(attributes: Arc<AttributeStore>, scorer: Arc<dyn MatchScorer>) -> Self {
        Self {
            attributes,
            scorer,
            cache: RwLock::new(HashMap::new()),
            recomputations: AtomicU64::new(0),
        }
    }

    /// Score for one pair. Served from cache while neither record has changed.
    pub fn score_for(&self, job_id: &str, candidate_id: &str) -> Result<u8, AppError> {
        self.record_for(job_id, candidate_id).map(|record| record.score)
    }

    /// Full record (score plus explaining skills) for one pair.
    pub fn record_for(&self, job_id: &str, candidate_id: &str) -> Result<MatchRecord, AppError> {
        let snapshot = self.attributes.snapshot();
        let job = snapshot
            .job_posting(job_id)
            .ok_or_else(|| AppError::job_not_found(job_id))?;
        let candidate = snapshot
            .candidate(candidate_id)
            .ok_or_else(|| AppError::candidate_not_found(candidate_id))?;
        let record = self.cached_or_compute(job, candidate).as_ref().clone();
        self.prune_departed(job_id, &self.attributes.snapshot());
        Ok(record)
    }

    /// Ranked `(candidate_id, score)` pairs: score descending, candidate id ascending.
    pub fn top_matches(&self, job_id: &str, limit: usize) -> Result<Vec<(String, u8)>, AppError> {
        let mut ranked = self.scores_for_job(job_id)?;
        if limit == 0 {
            return Ok(Vec::new());
        }
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(limit);
        Ok(ranked)
    }

    /// Every candidate scoring at or above `threshold`, keyed by candidate id.
    pub fn matches_above_threshold(
        &self,
        job_id: &str,
        threshold: u8,
    ) -> Result<BTreeMap<String, u8>, AppError> {
        Ok(self
            .scores_for_job(job_id)?
            .into_iter()
            .filter(|(_, score)| *score >= threshold)
            .collect())
    }

    /// Drops every cached record for the job.
    pub fn invalidate_job(&self, job_id: &str) {
        let removed = self.write_cache().remove(job_id);
        if let Some(entries) = removed {
            debug!("Invalidated {} cached scores for job {job_id}", entries.len());
        }
    }

    /// Drops the candidate's cached record from every job.
    pub fn invalidate_candidate(&self, candidate_id: &str) {
        let mut cache = self.write_cache();
        let removed = cache
            .values_mut()
            .filter_map(|entries| entries.remove(candidate_id))
            .count();
        if removed > 0 {
            debug!("Invalidated {removed} cached scores for candidate {candidate_id}");
        }
    }

    /// Number of scores computed so far (cache misses).
    pub fn recomputations(&self) -> u64 {
        self.recomputations.load(Ordering::Relaxed)
    }

    pub fn cached_entries(&self, job_id: &str) -> usize {
        self.read_cache().get(job_id).map(HashMap::len).unwrap_or(0)
    }

    // ────────────────────────────────────────────────────────────────────────
    // Internals
    // ────────────────────────────────────────────────────────────────────────

    fn read_cache(&self) -> std::sync::RwLockReadGuard<'_, JobCache> {
        self.cache.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_cache(&self) -> std::sync::RwLockWriteGuard<'_, JobCache> {
        self.cache.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn scores_for_job(&self, job_id: &str) -> Result<Vec<(String, u8)>, AppError> {
        let snapshot = self.attributes.snapshot();
        let job = snapshot
            .job_posting(job_id)
            .ok_or_else(|| AppError::job_not_found(job_id))?;

        let scores: Vec<(String, u8)> = snapshot
            .candidates()
            .map(|candidate| {
                let record = self.cached_or_compute(job, candidate);
                (candidate.id.clone(), record.score)
            })
            .collect();

        self.prune_departed(job_id, &snapshot);
        Ok(scores)
    }

    fn cached_or_compute(&self, job: &JobPosting, candidate: &Candidate) -> Arc<MatchRecord> {
        let stamp = CacheStamp::of(job, candidate);

        if let Some(entry) = self
            .read_cache()
            .get(&job.id)
            .and_then(|entries| entries.get(&candidate.id))
        {
            if entry.stamp == stamp {
                return entry.record.clone();
            }
        }

        // Computed outside the lock; scoring is pure so a redundant race is harmless.
        let record = Arc::new(self.scorer.score(job, candidate));
        self.recomputations.fetch_add(1, Ordering::Relaxed);
        debug!(
            "Scored candidate {} for job {}: {}",
            candidate.id, job.id, record.score
        );

        let mut cache = self.write_cache();
        // A removal may have landed while scoring; its invalidation already ran.
        let current = self.attributes.snapshot();
        if current.contains_candidate(&candidate.id) && current.job_posting(&job.id).is_some() {
            cache.entry(job.id.clone()).or_default().insert(
                candidate.id.clone(),
                CacheEntry {
                    stamp,
                    record: record.clone(),
                },
            );
        } else {
            debug!(
                "Not caching score for departed pair {}/{}",
                job.id, candidate.id
            );
        }
        record
    }

    /// Keeps the job's cache limited to candidates present in `snapshot`.
    fn prune_departed(&self, job_id: &str, snapshot: &AttributeSnapshot) {
        let mut cache = self.write_cache();
        if let Some(entries) = cache.get_mut(job_id) {
            let before = entries.len();
            entries.retain(|candidate_id, _| snapshot.contains_candidate(candidate_id));
            let pruned = before - entries.len();
            if pruned > 0 {
                info!("Pruned {pruned} cached scores for departed candidates (job {job_id})");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn fixture() -> (Arc<AttributeStore>, MatchEngine) {
        let store = Arc::new(AttributeStore::new());
        store.upsert_job_posting(JobPosting::new("J1", "Frontend Developer", ["React", "TypeScript"]));
        store.upsert_candidate(Candidate::new("C1", "Ana", ["React", "TypeScript", "CSS"]));
        store.upsert_candidate(Candidate::new("C2", "Bogdan", ["Java"]).with_is_new(false));
        let engine = MatchEngine::new(store.clone());
        (store, engine)
    }

    #[test]
    fn test_matching_candidate_outscores_non_matching() {
        let (_, engine) = fixture();
        let c1 = engine.score_for("J1", "C1").unwrap();
        let c2 = engine.score_for("J1", "C2").unwrap();
        assert!(c1 > c2, "expected {c1} > {c2}");
        assert_eq!(engine.top_matches("J1", 1).unwrap(), vec![("C1".to_string(), c1)]);
    }

    #[test]
    fn test_second_call_is_cache_hit() {
        let (_, engine) = fixture();
        let first = engine.score_for("J1", "C1").unwrap();
        assert_eq!(engine.recomputations(), 1);
        for _ in 0..5 {
            assert_eq!(engine.score_for("J1", "C1").unwrap(), first);
        }
        assert_eq!(engine.recomputations(), 1);
    }

    #[test]
    fn test_candidate_change_recomputes_only_that_candidate() {
        let (store, engine) = fixture();
        engine.score_for("J1", "C1").unwrap();
        let c2_before = engine.score_for("J1", "C2").unwrap();
        assert_eq!(engine.recomputations(), 2);

        let mut c2 = store.get_candidate("C2").unwrap();
        c2.skills.insert("react".to_string());
        c2.last_updated = c2.last_updated + Duration::seconds(1);
        store.upsert_candidate(c2);

        let c2_after = engine.score_for("J1", "C2").unwrap();
        assert_eq!(engine.recomputations(), 3);
        assert!(c2_after > c2_before);

        engine.score_for("J1", "C1").unwrap();
        assert_eq!(engine.recomputations(), 3);
    }

    #[test]
    fn test_clearing_new_flag_refreshes_score() {
        let (store, engine) = fixture();
        assert_eq!(engine.score_for("J1", "C1").unwrap(), 100);
        store.clear_new_flags(&["C1"]);
        assert_eq!(engine.score_for("J1", "C1").unwrap(), 95);
        assert_eq!(engine.recomputations(), 2);
    }

    #[test]
    fn test_unknown_ids_are_not_found() {
        let (_, engine) = fixture();
        assert!(engine.score_for("J404", "C1").unwrap_err().is_not_found());
        assert!(engine.score_for("J1", "C404").unwrap_err().is_not_found());
        assert!(engine.top_matches("J404", 3).unwrap_err().is_not_found());
        assert_eq!(engine.recomputations(), 0);
    }

    #[test]
    fn test_top_matches_limits() {
        let (_, engine) = fixture();
        assert!(engine.top_matches("J1", 0).unwrap().is_empty());
        assert_eq!(engine.top_matches("J1", 50).unwrap().len(), 2);
    }

    #[test]
    fn test_top_matches_ties_break_by_candidate_id() {
        let store = Arc::new(AttributeStore::new());
        store.upsert_job_posting(JobPosting::new("J1", "Backend", ["Java"]));
        for id in ["C9", "C3", "C5", "C1"] {
            store.upsert_candidate(Candidate::new(id, id, ["java"]).with_is_new(false));
        }
        let engine = MatchEngine::new(store);
        let ids: Vec<String> = engine
            .top_matches("J1", 5)
            .unwrap()
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        assert_eq!(ids, vec!["C1", "C3", "C5", "C9"]);
        assert_eq!(engine.top_matches("J1", 5).unwrap(), engine.top_matches("J1", 5).unwrap());
    }

    #[test]
    fn test_matches_above_threshold_is_inclusive() {
        let (_, engine) = fixture();
        let strong = engine.matches_above_threshold("J1", 100).unwrap();
        assert_eq!(strong.len(), 1);
        assert_eq!(strong.get("C1"), Some(&100));
        assert_eq!(engine.matches_above_threshold("J1", 0).unwrap().len(), 2);
    }

    #[test]
    fn test_invalidate_drops_entries() {
        let (_, engine) = fixture();
        engine.top_matches("J1", 5).unwrap();
        assert_eq!(engine.cached_entries("J1"), 2);
        engine.invalidate_candidate("C1");
        assert_eq!(engine.cached_entries("J1"), 1);
        engine.invalidate_job("J1");
        assert_eq!(engine.cached_entries("J1"), 0);
    }

    #[test]
    fn test_removed_candidate_is_pruned_from_cache() {
        let (store, engine) = fixture();
        engine.top_matches("J1", 5).unwrap();
        store.remove_candidate("C2");
        let ranked = engine.top_matches("J1", 5).unwrap();
        assert_eq!(ranked.len(), 1);
        assert_eq!(engine.cached_entries("J1"), 1);
    }

    #[test]
    fn test_single_pair_lookup_prunes_departed_candidates() {
        let (store, engine) = fixture();
        engine.score_for("J1", "C1").unwrap();
        engine.score_for("J1", "C2").unwrap();
        assert_eq!(engine.cached_entries("J1"), 2);

        // Removed behind the engine's back, without invalidation.
        store.remove_candidate("C2");
        assert_eq!(engine.score_for("J1", "C1").unwrap(), 100);
        assert_eq!(engine.cached_entries("J1"), 1);
        assert!(engine.score_for("J1", "C2").unwrap_err().is_not_found());
    }

    /// Removes a candidate from the store while that candidate is being scored.
    struct RemovingScorer {
        store: Arc<AttributeStore>,
        victim: &'static str,
    }

    impl MatchScorer for RemovingScorer {
        fn score(&self, job: &JobPosting, candidate: &Candidate) -> MatchRecord {
            if candidate.id == self.victim {
                self.store.remove_candidate(self.victim);
            }
            SkillOverlapScorer.score(job, candidate)
        }
    }

    #[test]
    fn test_score_for_removed_mid_computation_is_not_cached() {
        let (store, _) = fixture();
        let engine = MatchEngine::with_scorer(
            store.clone(),
            Arc::new(RemovingScorer {
                store: store.clone(),
                victim: "C2",
            }),
        );

        assert_eq!(engine.score_for("J1", "C2").unwrap(), 0);
        assert_eq!(engine.cached_entries("J1"), 0);

        engine.score_for("J1", "C1").unwrap();
        assert_eq!(engine.cached_entries("J1"), 1);
    }

    #[test]
    fn test_record_explains_score() {
        let (_, engine) = fixture();
        let record = engine.record_for("J1", "C1").unwrap();
        assert_eq!(record.matched_skills, vec!["react", "typescript"]);
        assert!(record.missing_skills.is_empty());
    }

    #[test]
    fn test_concurrent_scoring_is_consistent() {
        let (_, engine) = fixture();
        let engine = Arc::new(engine);
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let engine = engine.clone();
                std::thread::spawn(move || {
                    let id = if i % 2 == 0 { "C1" } else { "C2" };
                    engine.score_for("J1", id).unwrap()
                })
            })
            .collect();
        let scores: Vec<u8> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for (i, score) in scores.iter().enumerate() {
            let expected = if i % 2 == 0 { 100 } else { 0 };
            assert_eq!(*score, expected);
        }
        assert_eq!(engine.cached_entries("J1"), 2);
    }
}
