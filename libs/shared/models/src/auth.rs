use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub exp: Option<u64>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub app_metadata: Option<serde_json::Value>,
    pub user_metadata: Option<serde_json::Value>,
    pub aud: Option<String>,
    pub iat: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub role: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn is_doctor(&self) -> bool {
        self.role.as_deref() == Some("doctor")
    }

    pub fn is_patient(&self) -> bool {
        self.role.as_deref() == Some("patient")
    }

    /// Display name from the token metadata, falling back to the email.
    pub fn display_name(&self) -> String {
        self.metadata
            .as_ref()
            .and_then(|m| m.get("name").or_else(|| m.get("full_name")))
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .or_else(|| self.email.clone())
            .unwrap_or_else(|| "Unknown".to_string())
    }

    pub fn uuid(&self) -> Result<Uuid, AppError> {
        Uuid::parse_str(&self.id)
            .map_err(|_| AppError::Auth("Token subject is not a valid user id".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user(role: &str, metadata: Option<serde_json::Value>) -> User {
        User {
            id: Uuid::new_v4().to_string(),
            email: Some("someone@example.com".to_string()),
            role: Some(role.to_string()),
            metadata,
            created_at: None,
        }
    }

    #[test]
    fn test_roles() {
        assert!(user("doctor", None).is_doctor());
        assert!(user("patient", None).is_patient());
        assert!(!user("patient", None).is_doctor());
    }

    #[test]
    fn test_display_name_prefers_metadata() {
        let named = user("doctor", Some(json!({"name": "Ada Lovelace"})));
        assert_eq!(named.display_name(), "Ada Lovelace");

        let unnamed = user("doctor", None);
        assert_eq!(unnamed.display_name(), "someone@example.com");
    }

    #[test]
    fn test_uuid_rejects_garbage_subject() {
        let mut bad = user("doctor", None);
        bad.id = "not-a-uuid".to_string();
        assert!(bad.uuid().is_err());
    }
}
