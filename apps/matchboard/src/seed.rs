//! Demo dataset built from CV and job-description file names.
//!
//! File names follow `cv_<id>_<First>_<Last>.docx` and
//! `job_description_<id>_<Title>.docx`. Document bodies are not read; skills are
//! assigned from a small set of role profiles keyed off the job title.

use chrono::{Duration, Utc};
use tracing::debug;

use crate::errors::AppError;
use crate::models::{Candidate, JobPosting};

/// Candidates with an id at or above this are flagged as new.
pub const NEW_CANDIDATE_MIN_ID: u32 = 496;

pub const CV_FILE_NAMES: &[&str] = &[
    "cv_500_Andrei_Călin_Dumitrescu.docx",
    "cv_499_Mihai_Andrei_Bălan.docx",
    "cv_498_Dorin_Mihailescu.docx",
    "cv_497_Andrei_Munteanu.docx",
    "cv_496_Cristina_Anca_Dobre.docx",
    "cv_495_Andrei_Mihailescu.docx",
    "cv_494_Andrei_Călin_Vasile.docx",
    "cv_493_Adrian_Mihai_Drăgulescu.docx",
    "cv_492_Adrian_Costin_Dobre.docx",
    "cv_491_Adrian_Matei_Lungu.docx",
    "cv_490_Adrian_Dumitru_Andrei.docx",
    "cv_489_Andrei_Mihail_Radu.docx",
    "cv_488_Andrei_Călin_Teodorescu.docx",
    "cv_487_Andrei_Mihail_Constantinescu.docx",
    "cv_486_Andrei_Mihailescu.docx",
    "cv_485_Mihai_Dobreanu.docx",
    "cv_484_Andrei_Mihai_Drăghici.docx",
    "cv_483_Andrei_Vasile_Dumitrescu.docx",
    "cv_482_Elena_Mihăilă_Dumitrescu.docx",
    "cv_481_Andrei_Mihailescu.docx",
    "cv_480_Andrei_Călin_Drăghici.docx",
];

pub const JOB_FILE_NAMES: &[&str] = &[
    "job_description_100_UIUX Designer.docx",
    "job_description_99_Frontend Developer.docx",
    "job_description_98_Backend Developer.docx",
    "job_description_97_Frontend Developer.docx",
    "job_description_96_Full Stack Developer.docx",
    "job_description_95_Project Manager.docx",
];

// ────────────────────────────────────────────────────────────────────────────
// Role profiles
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkillProfile {
    Frontend,
    Backend,
    FullStack,
    UiUx,
    ProjectManager,
}

impl SkillProfile {
    pub const ALL: [SkillProfile; 5] = [
        SkillProfile::Frontend,
        SkillProfile::Backend,
        SkillProfile::FullStack,
        SkillProfile::UiUx,
        SkillProfile::ProjectManager,
    ];

    /// Profile implied by a job title, if any.
    pub fn from_title(title: &str) -> Option<Self> {
        if title.contains("Frontend") {
            Some(SkillProfile::Frontend)
        } else if title.contains("Backend") {
            Some(SkillProfile::Backend)
        } else if title.contains("Full Stack") {
            Some(SkillProfile::FullStack)
        } else if title.contains("UI/UX") || title.contains("UIUX") {
            Some(SkillProfile::UiUx)
        } else if title.contains("Project Manager") {
            Some(SkillProfile::ProjectManager)
        } else {
            None
        }
    }

    pub fn skills(self) -> &'static [&'static str] {
        match self {
            SkillProfile::Frontend => &["React", "JavaScript", "CSS", "HTML", "TypeScript", "UI/UX"],
            SkillProfile::Backend => &["Java", "Spring Boot", "Node.js", "SQL", "NoSQL", "APIs"],
            SkillProfile::FullStack => &["React", "Node.js", "JavaScript", "MongoDB", "Express", "Git"],
            SkillProfile::UiUx => &["Figma", "Adobe XD", "Sketch", "User Research", "Prototyping"],
            SkillProfile::ProjectManager => &[
                "Agile",
                "Scrum",
                "JIRA",
                "Risk Management",
                "Stakeholder Communication",
            ],
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SkillProfile::Frontend => "frontend developer",
            SkillProfile::Backend => "backend developer",
            SkillProfile::FullStack => "full stack developer",
            SkillProfile::UiUx => "product designer",
            SkillProfile::ProjectManager => "project manager",
        }
    }

    fn for_candidate(id: u32) -> Self {
        Self::ALL[id as usize % Self::ALL.len()]
    }
}

// ────────────────────────────────────────────────────────────────────────────
// File-name parsing
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCv {
    pub id: u32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedJobDescription {
    pub id: u32,
    pub title: String,
}

/// `cv_<id>_<Name parts>.docx` → id and space-joined name.
pub fn parse_cv_file_name(file_name: &str) -> Result<ParsedCv, AppError> {
    let invalid = || AppError::Validation(format!("unrecognised CV file name '{file_name}'"));

    let stem = file_name.strip_suffix(".docx").ok_or_else(invalid)?;
    let rest = stem.strip_prefix("cv_").ok_or_else(invalid)?;
    let (id, name) = rest.split_once('_').ok_or_else(invalid)?;
    let id: u32 = id.parse().map_err(|_| invalid())?;

    let name = name
        .split('_')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    if name.is_empty() {
        return Err(invalid());
    }
    Ok(ParsedCv { id, name })
}

/// `job_description_<id>_<Title>.docx` → id and title. `UIUX` is rendered as `UI/UX`.
pub fn parse_job_file_name(file_name: &str) -> Result<ParsedJobDescription, AppError> {
    let invalid =
        || AppError::Validation(format!("unrecognised job description file name '{file_name}'"));

    let stem = file_name.strip_suffix(".docx").ok_or_else(invalid)?;
    let rest = stem.strip_prefix("job_description_").ok_or_else(invalid)?;
    let (id, title) = rest.split_once('_').ok_or_else(invalid)?;
    let id: u32 = id.parse().map_err(|_| invalid())?;

    let title = title.trim().replace("UIUX", "UI/UX");
    if title.is_empty() {
        return Err(invalid());
    }
    Ok(ParsedJobDescription { id, title })
}

// ────────────────────────────────────────────────────────────────────────────
// Dataset
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct DemoDataset {
    pub job_postings: Vec<JobPosting>,
    pub candidates: Vec<Candidate>,
}

/// Builds the demo dataset from the bundled file names.
pub fn demo_dataset() -> Result<DemoDataset, AppError> {
    dataset_from(JOB_FILE_NAMES, CV_FILE_NAMES)
}

pub fn dataset_from(job_files: &[&str], cv_files: &[&str]) -> Result<DemoDataset, AppError> {
    let job_postings = job_files
        .iter()
        .map(|f| parse_job_file_name(f).map(job_posting))
        .collect::<Result<Vec<_>, _>>()?;
    let candidates = cv_files
        .iter()
        .map(|f| parse_cv_file_name(f).map(candidate))
        .collect::<Result<Vec<_>, _>>()?;

    debug!(
        "Demo dataset: {} job postings, {} candidates",
        job_postings.len(),
        candidates.len()
    );
    Ok(DemoDataset {
        job_postings,
        candidates,
    })
}

fn job_posting(parsed: ParsedJobDescription) -> JobPosting {
    let skills = SkillProfile::from_title(&parsed.title)
        .map(SkillProfile::skills)
        .unwrap_or(&[]);
    let description = format!("We are hiring a {} to join our team.", parsed.title);
    JobPosting::new(parsed.id.to_string(), parsed.title, skills.iter().copied())
        .with_description(description)
}

/// Deterministic profile per id: every fifth candidate shares a role, and one skill
/// (rotating with the id) is only mentioned in the experience text.
fn candidate(parsed: ParsedCv) -> Candidate {
    let profile = SkillProfile::for_candidate(parsed.id);
    let all = profile.skills();
    let demoted = (parsed.id as usize / SkillProfile::ALL.len()) % (all.len() + 1);

    let skills: Vec<&str> = all
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != demoted)
        .map(|(_, s)| *s)
        .collect();
    let years = parsed.id % 12 + 1;
    let experience = match all.get(demoted) {
        Some(skill) => format!("{years} years as a {}, some exposure to {skill}", profile.label()),
        None => format!("{years} years as a {}", profile.label()),
    };

    let is_new = parsed.id >= NEW_CANDIDATE_MIN_ID;
    let last_updated = if is_new {
        Utc::now()
    } else {
        Utc::now() - Duration::days(i64::from(parsed.id % 5 + 1))
    };

    Candidate::new(parsed.id.to_string(), parsed.name, skills)
        .with_experience(experience)
        .with_experience_years(years)
        .with_is_new(is_new)
        .with_last_updated(last_updated)
}
