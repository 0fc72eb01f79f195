use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lowercases and trims a skill label so `" React "` and `"react"` compare equal.
pub fn normalize_skill(skill: &str) -> String {
    skill.trim().to_lowercase()
}

fn normalize_skills<I, S>(skills: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    skills
        .into_iter()
        .map(|s| normalize_skill(s.as_ref()))
        .filter(|s| !s.is_empty())
        .collect()
}

/// A structured candidate profile, already parsed from the CV by the ingestion source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: String,
    pub name: String,
    /// Normalized (lowercase, trimmed) skill labels.
    pub skills: BTreeSet<String>,
    pub experience: Option<String>,
    pub experience_years: Option<u32>,
    pub education: Option<String>,
    pub is_new: bool,
    pub last_updated: DateTime<Utc>,
}

impl Candidate {
    /// Creates a freshly-arrived candidate (`is_new = true`) stamped with the current time.
    pub fn new<I, S>(id: impl Into<String>, name: impl Into<String>, skills: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            id: id.into(),
            name: name.into(),
            skills: normalize_skills(skills),
            experience: None,
            experience_years: None,
            education: None,
            is_new: true,
            last_updated: Utc::now(),
        }
    }

    pub fn with_experience(mut self, experience: impl Into<String>) -> Self {
        self.experience = Some(experience.into());
        self
    }

    pub fn with_experience_years(mut self, years: u32) -> Self {
        self.experience_years = Some(years);
        self
    }

    pub fn with_education(mut self, education: impl Into<String>) -> Self {
        self.education = Some(education.into());
        self
    }

    pub fn with_is_new(mut self, is_new: bool) -> Self {
        self.is_new = is_new;
        self
    }

    pub fn with_last_updated(mut self, last_updated: DateTime<Utc>) -> Self {
        self.last_updated = last_updated;
        self
    }

    /// Free text searched for partial skill evidence (experience + education).
    pub fn evidence_text(&self) -> String {
        let mut text = String::new();
        if let Some(experience) = &self.experience {
            text.push_str(&experience.to_lowercase());
        }
        if let Some(education) = &self.education {
            text.push(' ');
            text.push_str(&education.to_lowercase());
        }
        text
    }

    /// One-line profile handed to the text-generation collaborator.
    pub fn summary(&self) -> String {
        let mut parts = vec![self.name.clone()];
        if let Some(years) = self.experience_years {
            parts.push(format!("{years} years of experience"));
        } else if let Some(experience) = &self.experience {
            parts.push(experience.clone());
        }
        if !self.skills.is_empty() {
            let skills: Vec<&str> = self.skills.iter().map(String::as_str).collect();
            parts.push(format!("skills: {}", skills.join(", ")));
        }
        if let Some(education) = &self.education {
            parts.push(format!("education: {education}"));
        }
        parts.join("; ")
    }
}

/// A structured job posting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobPosting {
    pub id: String,
    pub title: String,
    /// Normalized (lowercase, trimmed) skill labels.
    pub required_skills: BTreeSet<String>,
    pub description: Option<String>,
    pub last_updated: DateTime<Utc>,
}

impl JobPosting {
    pub fn new<I, S>(id: impl Into<String>, title: impl Into<String>, required_skills: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            id: id.into(),
            title: title.into(),
            required_skills: normalize_skills(required_skills),
            description: None,
            last_updated: Utc::now(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_last_updated(mut self, last_updated: DateTime<Utc>) -> Self {
        self.last_updated = last_updated;
        self
    }
}
