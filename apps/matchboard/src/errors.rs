use thiserror::Error;

use crate::notifications::document_store::StorageError;

/// Crate-level error type.
///
/// `NotFound` is returned for unknown job / candidate / notification ids and is never
/// raised as a panic. `Transient` covers collaborator failures that callers recover from
/// locally by substituting a fallback value.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Transient collaborator failure: {0}")]
    Transient(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn job_not_found(job_id: &str) -> Self {
        AppError::NotFound(format!("job posting '{job_id}'"))
    }

    pub fn candidate_not_found(candidate_id: &str) -> Self {
        AppError::NotFound(format!("candidate '{candidate_id}'"))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::NotFound(_))
    }
}
