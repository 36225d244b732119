use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use tracing::{debug, warn};
use uuid::Uuid;

use shared_config::AppConfig;

use crate::models::{TwilioClaims, TwilioGrants, VideoAccessToken, VideoConferencingError, VideoGrant};

const TOKEN_TTL_SECONDS: i64 = 3600;
const MAX_IDENTITY_LEN: usize = 128;
const SUFFIX_LEN: usize = 8;

pub trait VideoTokenIssuer: Send + Sync {
    fn issue_token(
        &self,
        room: &str,
        identity: &str,
    ) -> Result<VideoAccessToken, VideoConferencingError>;

    fn is_configured(&self) -> bool;
}

pub struct TwilioTokenIssuer {
    account_sid: String,
    api_key: String,
    api_secret: String,
}

impl TwilioTokenIssuer {
    pub fn new(config: &AppConfig) -> Self {
        if !config.is_video_configured() {
            warn!("Twilio credentials missing, video tokens disabled");
        }
        Self {
            account_sid: config.twilio_account_sid.clone(),
            api_key: config.twilio_api_key.clone(),
            api_secret: config.twilio_api_secret.clone(),
        }
    }
}

/// `[A-Za-z0-9_]` only, with a per-call suffix so the same user can join
/// from two devices, capped at 128 characters.
pub fn sanitize_identity(raw: &str) -> String {
    let mut base: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if base.is_empty() {
        base.push_str("participant");
    }
    base.truncate(MAX_IDENTITY_LEN - SUFFIX_LEN - 1);

    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}_{}", base, &suffix[..SUFFIX_LEN])
}

impl VideoTokenIssuer for TwilioTokenIssuer {
    fn issue_token(
        &self,
        room: &str,
        identity: &str,
    ) -> Result<VideoAccessToken, VideoConferencingError> {
        if !self.is_configured() {
            return Err(VideoConferencingError::NotConfigured);
        }
        if room.trim().is_empty() {
            return Err(VideoConferencingError::InvalidRoom(room.to_string()));
        }

        let identity = sanitize_identity(identity);
        let now = Utc::now();
        let expires_at = now + Duration::seconds(TOKEN_TTL_SECONDS);

        let claims = TwilioClaims {
            jti: format!("{}-{}", self.api_key, now.timestamp()),
            iss: self.api_key.clone(),
            sub: self.account_sid.clone(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            grants: TwilioGrants {
                identity: identity.clone(),
                video: VideoGrant {
                    room: room.to_string(),
                },
            },
        };

        let mut header = Header::new(Algorithm::HS256);
        header.cty = Some("twilio-fpa;v=1".to_string());

        let token = encode(
            &header,
            &claims,
            &EncodingKey::from_secret(self.api_secret.as_bytes()),
        )
        .map_err(|e| VideoConferencingError::TokenSigning(e.to_string()))?;

        debug!("Issued video token for {} in room {}", identity, room);

        Ok(VideoAccessToken {
            token,
            identity,
            room_name: room.to_string(),
            expires_at,
        })
    }

    fn is_configured(&self) -> bool {
        !self.account_sid.is_empty() && !self.api_key.is_empty() && !self.api_secret.is_empty()
    }
}
