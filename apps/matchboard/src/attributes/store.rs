use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::Duration;
use tracing::debug;

use crate::models::{Candidate, JobPosting};

trait Keyed {
    fn key(&self) -> &str;
}

impl Keyed for Candidate {
    fn key(&self) -> &str {
        &self.id
    }
}

impl Keyed for JobPosting {
    fn key(&self) -> &str {
        &self.id
    }
}

/// Arena of records plus an id → slot index.
#[derive(Debug, Clone)]
struct Arena<T> {
    records: Vec<T>,
    index: HashMap<String, usize>,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<T: Keyed + Clone> Arena<T> {
    fn get(&self, id: &str) -> Option<&T> {
        self.index.get(id).map(|&slot| &self.records[slot])
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut T> {
        match self.index.get(id) {
            Some(&slot) => Some(&mut self.records[slot]),
            None => None,
        }
    }

    fn insert(&mut self, record: T) -> Option<T> {
        match self.index.get(record.key()) {
            Some(&slot) => Some(std::mem::replace(&mut self.records[slot], record)),
            None => {
                self.index.insert(record.key().to_string(), self.records.len());
                self.records.push(record);
                None
            }
        }
    }

    fn remove(&mut self, id: &str) -> Option<T> {
        let slot = self.index.remove(id)?;
        let removed = self.records.swap_remove(slot);
        if let Some(moved) = self.records.get(slot) {
            self.index.insert(moved.key().to_string(), slot);
        }
        Some(removed)
    }

    fn sorted(&self) -> Vec<T> {
        let mut out = self.records.clone();
        out.sort_by(|a, b| a.key().cmp(b.key()));
        out
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}

/// Immutable view of the store at one point in time.
#[derive(Debug, Clone, Default)]
pub struct AttributeSnapshot {
    candidates: Arena<Candidate>,
    jobs: Arena<JobPosting>,
}

impl AttributeSnapshot {
    pub fn candidate(&self, id: &str) -> Option<&Candidate> {
        self.candidates.get(id)
    }

    pub fn job_posting(&self, id: &str) -> Option<&JobPosting> {
        self.jobs.get(id)
    }

    pub fn contains_candidate(&self, id: &str) -> bool {
        self.candidates.index.contains_key(id)
    }

    /// Candidates in arena order (not sorted).
    pub fn candidates(&self) -> impl Iterator<Item = &Candidate> {
        self.candidates.records.iter()
    }

    pub fn job_postings(&self) -> impl Iterator<Item = &JobPosting> {
        self.jobs.records.iter()
    }

    pub fn candidate_count(&self) -> usize {
        self.candidates.len()
    }

    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }
}

/// Owner of the canonical records. Every read hands out copies; only the ingestion
/// path and the event producer (for `is_new`) write.
#[derive(Debug, Default)]
pub struct AttributeStore {
    snapshot: RwLock<Arc<AttributeSnapshot>>,
}

impl AttributeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current snapshot. Cheap: clones an `Arc`.
    pub fn snapshot(&self) -> Arc<AttributeSnapshot> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn write<R>(&self, f: impl FnOnce(&mut AttributeSnapshot) -> R) -> R {
        let mut guard = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
        f(Arc::make_mut(&mut *guard))
    }

    pub fn list_candidates(&self) -> Vec<Candidate> {
        self.snapshot().candidates.sorted()
    }

    pub fn list_job_postings(&self) -> Vec<JobPosting> {
        self.snapshot().jobs.sorted()
    }

    pub fn get_candidate(&self, id: &str) -> Option<Candidate> {
        self.snapshot().candidate(id).cloned()
    }

    pub fn get_job_posting(&self, id: &str) -> Option<JobPosting> {
        self.snapshot().job_posting(id).cloned()
    }

    /// Candidates with `is_new == true`, sorted by id.
    pub fn new_candidates(&self) -> Vec<Candidate> {
        let snapshot = self.snapshot();
        let mut out: Vec<Candidate> = snapshot.candidates().filter(|c| c.is_new).cloned().collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        out
    }

    /// Inserts or replaces a candidate and returns the stored copy.
    ///
    /// Replacing a record with different content always advances `last_updated`, even
    /// when the caller supplied a stale timestamp, so score caches keyed on it go stale.
    pub fn upsert_candidate(&self, mut candidate: Candidate) -> Candidate {
        self.write(|snapshot| {
            if let Some(existing) = snapshot.candidates.get(&candidate.id) {
                if *existing == candidate {
                    return candidate;
                }
                if candidate.last_updated <= existing.last_updated {
                    candidate.last_updated = existing.last_updated + Duration::microseconds(1);
                }
            }
            debug!("Upserting candidate {}", candidate.id);
            snapshot.candidates.insert(candidate.clone());
            candidate
        })
    }

    /// Inserts or replaces a job posting and returns the stored copy. Same timestamp
    /// rule as [`AttributeStore::upsert_candidate`].
    pub fn upsert_job_posting(&self, mut job: JobPosting) -> JobPosting {
        self.write(|snapshot| {
            if let Some(existing) = snapshot.jobs.get(&job.id) {
                if *existing == job {
                    return job;
                }
                if job.last_updated <= existing.last_updated {
                    job.last_updated = existing.last_updated + Duration::microseconds(1);
                }
            }
            debug!("Upserting job posting {}", job.id);
            snapshot.jobs.insert(job.clone());
            job
        })
    }

    pub fn remove_candidate(&self, id: &str) -> Option<Candidate> {
        self.write(|snapshot| snapshot.candidates.remove(id))
    }

    pub fn remove_job_posting(&self, id: &str) -> Option<JobPosting> {
        self.write(|snapshot| snapshot.jobs.remove(id))
    }

    /// Clears `is_new` on the given candidates. `last_updated` is left untouched.
    /// Returns how many flags were actually flipped.
    pub fn clear_new_flags<S: AsRef<str>>(&self, ids: &[S]) -> usize {
        self.write(|snapshot| {
            let mut cleared = 0;
            for id in ids {
                if let Some(candidate) = snapshot.candidates.get_mut(id.as_ref()) {
                    if candidate.is_new {
                        candidate.is_new = false;
                        cleared += 1;
                    }
                }
            }
            cleared
        })
    }
}
