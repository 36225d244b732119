use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;

use shared_models::call_note::ClinicalNoteFields;

pub const DEGRADED_PREVIEW_CHARS: usize = 500;
pub const MANUAL_PREVIEW_CHARS: usize = 1000;

#[derive(Error, Debug)]
pub enum NoteParseError {
    #[error("{0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Expected a JSON object, got {0}")]
    NotAnObject(&'static str),

    #[error("Fence pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Removes ```` ```json ```` openers anywhere and a closing fence at the end.
pub fn strip_code_fences(raw: &str) -> Result<String, NoteParseError> {
    let opener = Regex::new(r"```json\s*")?;
    let closer = Regex::new(r"```\s*$")?;

    let without_openers = opener.replace_all(raw, "");
    Ok(closer.replace(&without_openers, "").trim().to_string())
}

/// Decodes an LLM reply into note fields. Missing keys default to empty;
/// non-string values are rendered as text rather than rejected.
pub fn parse_clinical_notes(raw: &str) -> Result<ClinicalNoteFields, NoteParseError> {
    let cleaned = strip_code_fences(raw)?;
    let value: Value = serde_json::from_str(&cleaned)?;

    let object = match &value {
        Value::Object(object) => object,
        Value::Array(_) => return Err(NoteParseError::NotAnObject("an array")),
        Value::String(_) => return Err(NoteParseError::NotAnObject("a string")),
        Value::Number(_) => return Err(NoteParseError::NotAnObject("a number")),
        Value::Bool(_) => return Err(NoteParseError::NotAnObject("a boolean")),
        Value::Null => return Err(NoteParseError::NotAnObject("null")),
    };

    Ok(ClinicalNoteFields {
        chief_complaint: text_field(object, "chiefComplaint"),
        hpi: text_field(object, "hpi"),
        past_medical_history: text_field(object, "pastMedicalHistory"),
        medications: text_field(object, "medications"),
        allergies: text_field(object, "allergies"),
        exam_observations: text_field(object, "examObservations"),
        assessment: text_field(object, "assessment"),
        plan: text_field(object, "plan"),
        urgent_flags: list_field(object, "urgentFlags"),
        follow_up_questions: list_field(object, "followUpQuestions"),
    })
}

fn as_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(as_text).collect::<Vec<_>>().join("\n"),
        other => other.to_string(),
    }
}

fn text_field(object: &Map<String, Value>, key: &str) -> String {
    object.get(key).map(as_text).unwrap_or_default()
}

fn list_field(object: &Map<String, Value>, key: &str) -> Vec<String> {
    match object.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .map(as_text)
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.clone()],
        _ => Vec::new(),
    }
}

/// First `max_chars` characters, never splitting a code point.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => text[..byte_index].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_fenced_reply_parses() {
        let raw = "```json\n{\"chiefComplaint\": \"Headache\", \"urgentFlags\": [\"none\"]}\n```";

        let fields = parse_clinical_notes(raw).unwrap();

        assert_eq!(fields.chief_complaint, "Headache");
        assert_eq!(fields.urgent_flags, vec!["none".to_string()]);
        assert_eq!(fields.hpi, "");
        assert!(fields.follow_up_questions.is_empty());
    }

    #[test]
    fn test_values_are_coerced_to_text() {
        let raw = r#"{"medications": ["ibuprofen", "paracetamol"], "assessment": 3, "plan": null, "followUpQuestions": "Any fever?"}"#;

        let fields = parse_clinical_notes(raw).unwrap();

        assert_eq!(fields.medications, "ibuprofen\nparacetamol");
        assert_eq!(fields.assessment, "3");
        assert_eq!(fields.plan, "");
        assert_eq!(fields.follow_up_questions, vec!["Any fever?".to_string()]);
    }

    #[test]
    fn test_prose_reply_is_rejected() {
        let result = parse_clinical_notes("The patient reports a headache.");
        assert_matches!(result, Err(NoteParseError::InvalidJson(_)));

        let result = parse_clinical_notes("[1, 2]");
        assert_matches!(result, Err(NoteParseError::NotAnObject("an array")));
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let text = "é".repeat(600);

        let preview = truncate_chars(&text, DEGRADED_PREVIEW_CHARS);

        assert_eq!(preview.chars().count(), 500);
        assert_eq!(truncate_chars("short", 500), "short");
    }
}
