use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::serde_helpers::null_as_default;

/// The structured clinical fields extracted from a consultation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClinicalNoteFields {
    #[serde(default, deserialize_with = "null_as_default")]
    pub chief_complaint: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub hpi: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub past_medical_history: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub medications: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub allergies: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub exam_observations: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub assessment: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub plan: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub urgent_flags: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub follow_up_questions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallNote {
    pub id: Uuid,
    pub meeting_id: Uuid,
    #[serde(flatten)]
    pub fields: ClinicalNoteFields,
    #[serde(default)]
    pub ai_metadata: Value,
    #[serde(default)]
    pub is_edited: bool,
    pub edited_by: Option<Uuid>,
    pub edited_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl CallNote {
    pub fn is_parsed(&self) -> bool {
        self.ai_metadata
            .get("parsed")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCallNote {
    pub meeting_id: Uuid,
    #[serde(flatten)]
    pub fields: ClinicalNoteFields,
    pub ai_metadata: Value,
}

/// A doctor's manual correction of a generated note.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallNoteEdit {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chief_complaint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hpi: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub past_medical_history: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub medications: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allergies: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exam_observations: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assessment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub urgent_flags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub follow_up_questions: Option<Vec<String>>,
}

impl CallNoteEdit {
    pub fn is_empty(&self) -> bool {
        self.chief_complaint.is_none()
            && self.hpi.is_none()
            && self.past_medical_history.is_none()
            && self.medications.is_none()
            && self.allergies.is_none()
            && self.exam_observations.is_none()
            && self.assessment.is_none()
            && self.plan.is_none()
            && self.urgent_flags.is_none()
            && self.follow_up_questions.is_none()
    }

    pub fn apply_to(&self, fields: &mut ClinicalNoteFields) {
        let text_edits = [
            (&self.chief_complaint, &mut fields.chief_complaint),
            (&self.hpi, &mut fields.hpi),
            (&self.past_medical_history, &mut fields.past_medical_history),
            (&self.medications, &mut fields.medications),
            (&self.allergies, &mut fields.allergies),
            (&self.exam_observations, &mut fields.exam_observations),
            (&self.assessment, &mut fields.assessment),
            (&self.plan, &mut fields.plan),
        ];
        for (edit, target) in text_edits {
            if let Some(value) = edit {
                *target = value.clone();
            }
        }
        if let Some(flags) = &self.urgent_flags {
            fields.urgent_flags = flags.clone();
        }
        if let Some(questions) = &self.follow_up_questions {
            fields.follow_up_questions = questions.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_null_columns_become_defaults() {
        let note: CallNote = serde_json::from_value(json!({
            "id": Uuid::new_v4(),
            "meeting_id": Uuid::new_v4(),
            "chief_complaint": "Headache",
            "hpi": null,
            "urgent_flags": null,
            "ai_metadata": {"parsed": true},
            "is_edited": false,
            "edited_by": null,
            "edited_at": null,
            "created_at": "2025-01-01T10:00:00Z"
        }))
        .unwrap();

        assert_eq!(note.fields.chief_complaint, "Headache");
        assert_eq!(note.fields.hpi, "");
        assert!(note.fields.urgent_flags.is_empty());
        assert!(note.fields.follow_up_questions.is_empty());
        assert!(note.is_parsed());
    }

    #[test]
    fn test_edit_only_touches_given_fields() {
        let mut fields = ClinicalNoteFields {
            chief_complaint: "Cough".to_string(),
            plan: "Rest".to_string(),
            ..Default::default()
        };
        let edit = CallNoteEdit {
            plan: Some("Rest and fluids".to_string()),
            urgent_flags: Some(vec!["Fever above 39C".to_string()]),
            ..Default::default()
        };

        edit.apply_to(&mut fields);

        assert_eq!(fields.chief_complaint, "Cough");
        assert_eq!(fields.plan, "Rest and fluids");
        assert_eq!(fields.urgent_flags, vec!["Fever above 39C".to_string()]);
        assert!(!edit.is_empty());
    }
}
