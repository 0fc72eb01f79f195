use async_trait::async_trait;

use super::TextGenerator;
use crate::errors::AppError;

/// Deterministic template generator used when no API key is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineTextGenerator;

#[async_trait]
impl TextGenerator for OfflineTextGenerator {
    async fn explain(&self, job_title: &str, candidate_summary: &str) -> Result<String, AppError> {
        let (name, profile) = candidate_summary
            .split_once("; ")
            .unwrap_or((candidate_summary, ""));

        let mut text = format!("{name} was assessed for the {job_title} position.");
        if !profile.is_empty() {
            text.push_str(&format!(" Profile: {profile}."));
        }
        text.push_str(
            " Compare the matched and missing skills against the role's must-haves and \
             confirm depth of experience in a structured interview.",
        );
        Ok(text)
    }

    fn name(&self) -> &'static str {
        "offline-template"
    }
}
