use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::candidate::{Candidate, JobPosting};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    CandidateArrived,
    StrongMatch,
    Info,
    Warning,
    Error,
}

/// Entity references carried by a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationPayload {
    None,
    Candidate {
        candidate_id: String,
    },
    Match {
        candidate_id: String,
        job_id: String,
        score: u8,
    },
}

/// A single feed entry. Once created only `read` changes, and only through the
/// notification store's read-state operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
    pub payload: NotificationPayload,
}

impl Notification {
    fn build(
        kind: NotificationKind,
        title: String,
        message: String,
        payload: NotificationPayload,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            title,
            message,
            timestamp: Utc::now(),
            read: false,
            payload,
        }
    }

    pub fn candidate_arrived(candidate: &Candidate) -> Self {
        Self::build(
            NotificationKind::CandidateArrived,
            "New candidate".to_string(),
            format!("{} has submitted a CV", candidate.name),
            NotificationPayload::Candidate {
                candidate_id: candidate.id.clone(),
            },
        )
    }

    pub fn strong_match(candidate: &Candidate, job: &JobPosting, score: u8) -> Self {
        Self::build(
            NotificationKind::StrongMatch,
            "Strong match".to_string(),
            format!(
                "{} is a {score}% match for {} ({})",
                candidate.name, job.title, job.id
            ),
            NotificationPayload::Match {
                candidate_id: candidate.id.clone(),
                job_id: job.id.clone(),
                score,
            },
        )
    }

    pub fn info(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::build(
            NotificationKind::Info,
            title.into(),
            message.into(),
            NotificationPayload::None,
        )
    }

    pub fn warning(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::build(
            NotificationKind::Warning,
            title.into(),
            message.into(),
            NotificationPayload::None,
        )
    }

    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::build(
            NotificationKind::Error,
            title.into(),
            message.into(),
            NotificationPayload::None,
        )
    }

    pub fn candidate_id(&self) -> Option<&str> {
        match &self.payload {
            NotificationPayload::Candidate { candidate_id }
            | NotificationPayload::Match { candidate_id, .. } => Some(candidate_id),
            NotificationPayload::None => None,
        }
    }
}
