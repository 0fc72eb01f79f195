// MatchEngine: deterministic skill-overlap scoring with a per-job record cache.
// Cache entries are stamped with the attribute state they were computed from and are
// recomputed as soon as either record moves on.

pub mod engine;
pub mod scoring;

pub use engine::MatchEngine;
pub use scoring::{MatchRecord, MatchScorer, SkillOverlapScorer};
