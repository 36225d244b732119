use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use shared_models::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoAccessToken {
    pub token: String,
    pub identity: String,
    pub room_name: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    pub room: String,
}

/// Claims of a Twilio access token.
#[derive(Debug, Serialize, Deserialize)]
pub struct TwilioClaims {
    pub jti: String,
    pub iss: String,
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    pub grants: TwilioGrants,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TwilioGrants {
    pub identity: String,
    pub video: VideoGrant,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VideoGrant {
    pub room: String,
}

#[derive(Error, Debug)]
pub enum VideoConferencingError {
    #[error("Video conferencing not configured")]
    NotConfigured,

    #[error("Invalid room name: {0}")]
    InvalidRoom(String),

    #[error("Token signing failed: {0}")]
    TokenSigning(String),
}

impl From<VideoConferencingError> for AppError {
    fn from(err: VideoConferencingError) -> Self {
        match err {
            VideoConferencingError::NotConfigured => AppError::ServiceUnavailable(err.to_string()),
            VideoConferencingError::InvalidRoom(_) => AppError::BadRequest(err.to_string()),
            VideoConferencingError::TokenSigning(_) => AppError::Internal(err.to_string()),
        }
    }
}
