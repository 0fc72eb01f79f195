use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info, warn};

use crate::attributes::AttributeStore;
use crate::matching::MatchEngine;
use crate::models::{Candidate, Notification, NotificationKind, NotificationPayload};
use crate::notifications::NotificationStore;

pub const DEFAULT_STRONG_MATCH_THRESHOLD: u8 = 85;

/// What to do when a `(candidate, job)` pair that already produced a strong-match
/// notification clears the threshold again.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StrongMatchPolicy {
    /// At most one notification per pair for the life of the process.
    #[default]
    Once,
    /// Notify again when the pair's score differs from the last notified score.
    OnScoreChange,
}

#[derive(Debug, Clone)]
pub struct ProducerConfig {
    pub strong_match_threshold: u8,
    pub strong_match_policy: StrongMatchPolicy,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            strong_match_threshold: DEFAULT_STRONG_MATCH_THRESHOLD,
            strong_match_policy: StrongMatchPolicy::Once,
        }
    }
}

/// Outcome of a single polling cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub candidates_arrived: usize,
    pub strong_matches: usize,
    /// Jobs whose threshold scan failed and were skipped this cycle.
    pub skipped_jobs: Vec<String>,
    /// Notifications kept in memory whose durable write failed.
    pub persist_failures: usize,
}

impl CycleReport {
    pub fn emitted(&self) -> usize {
        self.candidates_arrived + self.strong_matches
    }
}

/// Monotonic record of what has already been announced. Never evicted.
#[derive(Debug, Default)]
struct SeenState {
    candidates: HashSet<String>,
    /// (candidate id, job id) → last notified score
    pairs: HashMap<(String, String), u8>,
}

impl SeenState {
    /// Rebuilds the sets from a newest-first log, so a restart does not re-announce.
    fn from_log(log: &[Notification]) -> Self {
        let mut seen = Self::default();
        for notification in log {
            match (&notification.kind, &notification.payload) {
                (NotificationKind::CandidateArrived, NotificationPayload::Candidate { candidate_id }) => {
                    seen.candidates.insert(candidate_id.clone());
                }
                (
                    NotificationKind::StrongMatch,
                    NotificationPayload::Match {
                        candidate_id,
                        job_id,
                        score,
                    },
                ) => {
                    // Newest first, so the first score seen is the last one notified.
                    seen.pairs
                        .entry((candidate_id.clone(), job_id.clone()))
                        .or_insert(*score);
                }
                _ => {}
            }
        }
        seen
    }
}

/// Turns attribute and match state into deduplicated notifications.
///
/// Cycles are serialized on the mutex that owns the seen-sets, so a scheduled tick and
/// a manual trigger can never evaluate the same candidates concurrently.
pub struct EventProducer {
    attributes: Arc<AttributeStore>,
    engine: Arc<MatchEngine>,
    notifications: Arc<NotificationStore>,
    config: ProducerConfig,
    seen: Mutex<SeenState>,
    cycles: AtomicU64,
}

impl EventProducer {
    pub fn new(
        attributes: Arc<AttributeStore>,
        engine: Arc<MatchEngine>,
        notifications: Arc<NotificationStore>,
        config: ProducerConfig,
    ) -> Self {
        let seen = SeenState::from_log(&notifications.all());
        if !seen.candidates.is_empty() || !seen.pairs.is_empty() {
            info!(
                "Restored {} announced candidates and {} announced matches from the log",
                seen.candidates.len(),
                seen.pairs.len()
            );
        }
        Self {
            attributes,
            engine,
            notifications,
            config,
            seen: Mutex::new(seen),
            cycles: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &ProducerConfig {
        &self.config
    }

    /// Completed cycles since construction.
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    /// Runs one polling cycle:
    /// 1. collect `is_new` candidates
    /// 2. announce each unseen candidate once
    /// 3. announce each unseen strong `(candidate, job)` pair among them
    /// 4. clear `is_new` on the processed candidates
    ///
    /// Everything the cycle announces is appended to the log in one write.
    pub fn run_cycle(&self) -> CycleReport {
        let mut seen = self.seen.lock().unwrap_or_else(PoisonError::into_inner);
        let mut report = CycleReport::default();
        let mut outgoing = Vec::new();

        let fresh = self.attributes.new_candidates();

        for candidate in &fresh {
            if seen.candidates.insert(candidate.id.clone()) {
                outgoing.push(Notification::candidate_arrived(candidate));
                report.candidates_arrived += 1;
            }
        }

        if !fresh.is_empty() {
            self.scan_strong_matches(&fresh, &mut seen, &mut outgoing, &mut report);
        }

        self.publish(outgoing, &mut report);

        if !fresh.is_empty() {
            let ids: Vec<&str> = fresh.iter().map(|c| c.id.as_str()).collect();
            let cleared = self.attributes.clear_new_flags(&ids);
            debug!("Cleared is_new on {cleared} candidates");
        }

        let cycle = self.cycles.fetch_add(1, Ordering::Relaxed) + 1;
        if report.emitted() > 0 || !report.skipped_jobs.is_empty() {
            info!(
                "Producer cycle {cycle}: {} new candidates, {} strong matches, {} jobs skipped",
                report.candidates_arrived,
                report.strong_matches,
                report.skipped_jobs.len()
            );
        } else {
            debug!("Producer cycle {cycle}: nothing new");
        }
        report
    }

    fn scan_strong_matches(
        &self,
        fresh: &[Candidate],
        seen: &mut SeenState,
        outgoing: &mut Vec<Notification>,
        report: &mut CycleReport,
    ) {
        let fresh_by_id: HashMap<&str, &Candidate> =
            fresh.iter().map(|c| (c.id.as_str(), c)).collect();
        let threshold = self.config.strong_match_threshold;

        for job in self.attributes.list_job_postings() {
            let matches = match self.engine.matches_above_threshold(&job.id, threshold) {
                Ok(matches) => matches,
                Err(e) => {
                    warn!("Skipping job {} in producer cycle: {e}", job.id);
                    report.skipped_jobs.push(job.id.clone());
                    continue;
                }
            };

            for (candidate_id, score) in matches {
                let Some(candidate) = fresh_by_id.get(candidate_id.as_str()) else {
                    continue;
                };
                let key = (candidate_id, job.id.clone());
                let announce = match (seen.pairs.get(&key), self.config.strong_match_policy) {
                    (None, _) => true,
                    (Some(&last), StrongMatchPolicy::OnScoreChange) => last != score,
                    (Some(_), StrongMatchPolicy::Once) => false,
                };
                if announce {
                    seen.pairs.insert(key, score);
                    outgoing.push(Notification::strong_match(candidate, &job, score));
                    report.strong_matches += 1;
                }
            }
        }
    }

    fn publish(&self, outgoing: Vec<Notification>, report: &mut CycleReport) {
        let count = outgoing.len();
        if let Err(e) = self.notifications.append_batch(outgoing) {
            warn!("{count} notifications kept in memory but not persisted: {e}");
            report.persist_failures += count;
        }
    }
}
