use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_models::error::AppError;
use shared_models::profile::DoctorProfile;
use shared_models::qr::QrToken;

#[derive(Debug, Deserialize)]
pub struct LinkRequest {
    pub token: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedQr {
    pub token: String,
    pub link_url: String,
    pub qr_data_url: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QrTokenSummary {
    pub id: Uuid,
    pub token: String,
    pub used: bool,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl From<QrToken> for QrTokenSummary {
    fn from(token: QrToken) -> Self {
        Self {
            id: token.id,
            token: token.token,
            used: token.used,
            expires_at: token.expires_at,
            created_at: token.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkedDoctor {
    pub id: Uuid,
    pub name: String,
    pub specialty: Option<String>,
    pub avatar: Option<String>,
}

impl From<DoctorProfile> for LinkedDoctor {
    fn from(doctor: DoctorProfile) -> Self {
        Self {
            id: doctor.id,
            name: doctor.name,
            specialty: doctor.specialty,
            avatar: doctor.avatar_url,
        }
    }
}

/// What the public landing page learns about a token.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenVerification {
    pub valid: bool,
    pub expired: bool,
    pub used: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doctor: Option<LinkedDoctor>,
}

impl TokenVerification {
    pub fn unknown() -> Self {
        Self {
            valid: false,
            expired: false,
            used: false,
            doctor: None,
        }
    }
}

#[derive(Error, Debug)]
pub enum QrLinkError {
    #[error("Doctor profile not found")]
    DoctorProfileMissing,

    #[error("Patient profile not found")]
    PatientProfileMissing,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Already linked")]
    AlreadyLinked,

    #[error("QR image generation failed: {0}")]
    QrImage(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<anyhow::Error> for QrLinkError {
    fn from(err: anyhow::Error) -> Self {
        QrLinkError::DatabaseError(err.to_string())
    }
}

impl From<QrLinkError> for AppError {
    fn from(err: QrLinkError) -> Self {
        match err {
            QrLinkError::DoctorProfileMissing | QrLinkError::PatientProfileMissing => {
                AppError::Forbidden(err.to_string())
            }
            QrLinkError::InvalidToken | QrLinkError::AlreadyLinked => {
                AppError::BadRequest(err.to_string())
            }
            QrLinkError::QrImage(msg) => AppError::Internal(msg),
            QrLinkError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}
