pub const CALL_SUMMARY_MAX_TOKENS: u32 = 2000;
pub const MANUAL_NOTES_MAX_TOKENS: u32 = 3000;

/// Prompt for a diarized call transcript. Speaker A is assumed to be the
/// doctor and Speaker B the patient.
pub fn call_summary_prompt(transcript: &str, doctor_name: &str, patient_name: &str) -> String {
    format!(
        r#"You are a clinical summarization assistant. Analyze this medical consultation transcript and extract structured clinical notes.

IMPORTANT: This transcript contains a TWO-WAY conversation between a doctor and patient. The transcript includes speaker labels (Speaker A, Speaker B, etc.).
- Speaker A is typically the {doctor_name} (doctor)
- Speaker B is typically the {patient_name} (patient)

Focus on extracting information from BOTH the patient's statements (chief complaint, symptoms, history) AND the doctor's observations and assessments.

Transcript with speaker labels:
{transcript}

Provide a JSON object with the following structure (return ONLY valid JSON, no markdown):
{{
  "chiefComplaint": "Main reason for visit (from patient's statements)",
  "hpi": "History of present illness (from patient's description and doctor's questions)",
  "pastMedicalHistory": "Past medical conditions mentioned by patient",
  "medications": "Current medications mentioned by patient",
  "allergies": "Known allergies mentioned by patient",
  "examObservations": "Physical examination findings mentioned by doctor",
  "assessment": "Clinical assessment and diagnosis from doctor",
  "plan": "Treatment plan, tests ordered, prescriptions, and follow-up instructions from doctor",
  "urgentFlags": ["Any urgent issues that need immediate attention"],
  "followUpQuestions": ["3 short follow-up questions for the patient"]
}}

CRITICAL INSTRUCTIONS:
- Extract information from BOTH patient responses AND doctor questions/observations
- Do NOT hallucinate medications or tests - only include what was actually mentioned
- If something is uncertain, mark it as "uncertain" or "not mentioned"
- Keep all fields brief and factual
- The patient's statements contain their symptoms and history
- The doctor's statements contain observations, assessments, and treatment plans"#
    )
}

/// Prompt for a transcript pasted in by the doctor. Asks for markdown text
/// inside the JSON fields.
pub fn manual_notes_prompt(transcript: &str) -> String {
    format!(
        r#"Analyze this medical consultation transcript and extract structured clinical notes. Return the response in valid JSON format with the following structure:

{{
  "chiefComplaint": "...",
  "hpi": "...",
  "pastMedicalHistory": "...",
  "medications": "...",
  "allergies": "...",
  "examObservations": "...",
  "assessment": "...",
  "plan": "...",
  "urgentFlags": [...],
  "followUpQuestions": [...]
}}

IMPORTANT:
- Use markdown formatting (not HTML) for text fields
- Use **bold** for emphasis, not HTML tags
- Use newlines and markdown lists, not <br> or HTML entities
- Use markdown tables for structured data
- Do NOT use HTML tags like <br>, &nbsp;, etc.

Transcript:
{transcript}

Return ONLY valid JSON, no additional text or markdown code blocks."#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_prompt_names_both_roles() {
        let prompt = call_summary_prompt("Speaker A: Hi", "Grey", "Sam Patel");

        assert!(prompt.contains("Speaker A is typically the Grey (doctor)"));
        assert!(prompt.contains("Speaker B is typically the Sam Patel (patient)"));
        assert!(prompt.contains("Speaker A: Hi"));
        assert!(prompt.contains("\"followUpQuestions\""));
        assert!(prompt.contains("Do NOT hallucinate medications or tests"));
    }

    #[test]
    fn test_manual_prompt_asks_for_markdown() {
        let prompt = manual_notes_prompt("patient has a cough");

        assert!(prompt.contains("Use markdown formatting (not HTML)"));
        assert!(prompt.contains("patient has a cough"));
        assert!(prompt.starts_with("Analyze this medical consultation transcript"));
    }
}
