// Prompt fragments for the match explanation call.

/// System prompt for recruiter-facing match assessments. Plain prose, no JSON.
pub const EXPLANATION_SYSTEM: &str = "You are an HR assistant helping a hiring manager \
    review candidates. Write in plain prose, at most three short paragraphs. \
    Do NOT use markdown headings or bullet lists. \
    Only refer to information present in the candidate profile.";

/// Builds the user prompt for a `(job, candidate)` assessment.
pub fn build_explanation_prompt(job_title: &str, candidate_summary: &str) -> String {
    format!(
        "Analyze the match between this candidate and job position.\n\n\
         Candidate: {candidate_summary}\n\
         Job Position: {job_title}\n\n\
         Provide a professional assessment of why this candidate is a good match for the \
         position. Include strengths, potential gaps, and recommendations for the hiring \
         manager."
    )
}
