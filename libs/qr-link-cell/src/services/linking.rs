use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};

use notification_cell::NotificationService;
use shared_database::{ProfileRepository, QrTokenRepository};
use shared_models::auth::User;
use shared_models::notification::{NewNotification, NotificationKind};
use shared_models::qr::{DoctorPatientLink, NewQrToken};

use crate::models::{GeneratedQr, QrLinkError, QrTokenSummary, TokenVerification};
use crate::services::{image, token};

const LINK_SOURCE: &str = "qr";

pub struct QrLinkService {
    tokens: Arc<dyn QrTokenRepository>,
    profiles: Arc<dyn ProfileRepository>,
    notifier: Arc<NotificationService>,
    frontend_url: String,
}

impl QrLinkService {
    pub fn new(
        tokens: Arc<dyn QrTokenRepository>,
        profiles: Arc<dyn ProfileRepository>,
        notifier: Arc<NotificationService>,
        frontend_url: impl Into<String>,
    ) -> Self {
        Self {
            tokens,
            profiles,
            notifier,
            frontend_url: frontend_url.into(),
        }
    }

    pub async fn generate(&self, user: &User) -> Result<GeneratedQr, QrLinkError> {
        let user_id = user.uuid().map_err(|_| QrLinkError::DoctorProfileMissing)?;
        let doctor = self
            .profiles
            .find_doctor_by_user(user_id)
            .await?
            .ok_or(QrLinkError::DoctorProfileMissing)?;

        let stored = self
            .tokens
            .insert_token(NewQrToken {
                token: token::generate_token(),
                doctor_id: doctor.id,
                expires_at: Utc::now() + token::token_ttl(),
            })
            .await?;

        let link_url = token::link_url(&self.frontend_url, &stored.token);
        let qr_data_url = image::qr_data_url(&link_url)?;
        info!("Issued QR token {} for doctor {}", stored.id, doctor.id);

        Ok(GeneratedQr {
            token: stored.token,
            link_url,
            qr_data_url,
            expires_at: stored.expires_at,
        })
    }

    pub async fn list(&self, user: &User) -> Result<Vec<QrTokenSummary>, QrLinkError> {
        let user_id = user.uuid().map_err(|_| QrLinkError::DoctorProfileMissing)?;
        let Some(doctor) = self.profiles.find_doctor_by_user(user_id).await? else {
            return Ok(Vec::new());
        };

        let tokens = self.tokens.list_tokens_for_doctor(doctor.id).await?;
        Ok(tokens.into_iter().map(QrTokenSummary::from).collect())
    }

    pub async fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<TokenVerification, QrLinkError> {
        let Some(stored) = self.tokens.find_token(token).await? else {
            return Ok(TokenVerification::unknown());
        };

        if !stored.is_valid_at(now) {
            return Ok(TokenVerification {
                valid: false,
                expired: stored.is_expired_at(now),
                used: stored.used,
                doctor: None,
            });
        }

        let doctor = self.profiles.find_doctor(stored.doctor_id).await?;
        Ok(TokenVerification {
            valid: true,
            expired: false,
            used: false,
            doctor: doctor.map(Into::into),
        })
    }

    /// Links the calling patient to the token's doctor. Consuming the token and
    /// writing the link happen together, so two patients racing on one token
    /// cannot both succeed and a failed write does not burn the token.
    #[instrument(skip(self, user, token), fields(patient = %user.id))]
    pub async fn link(
        &self,
        user: &User,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<DoctorPatientLink, QrLinkError> {
        let stored = self
            .tokens
            .find_token(token)
            .await?
            .filter(|t| t.is_valid_at(now))
            .ok_or(QrLinkError::InvalidToken)?;

        let user_id = user.uuid().map_err(|_| QrLinkError::PatientProfileMissing)?;
        let patient = self
            .profiles
            .find_patient_by_user(user_id)
            .await?
            .ok_or(QrLinkError::PatientProfileMissing)?;

        if self.tokens.link_exists(stored.doctor_id, patient.id).await? {
            return Err(QrLinkError::AlreadyLinked);
        }
        let link = self
            .tokens
            .link_with_token(stored.id, stored.doctor_id, patient.id, LINK_SOURCE)
            .await?
            .ok_or(QrLinkError::InvalidToken)?;
        info!("Patient {} linked to doctor {}", patient.id, stored.doctor_id);

        match self.profiles.find_doctor(stored.doctor_id).await {
            Ok(Some(doctor)) => {
                let notified = self
                    .notifier
                    .notify(NewNotification::new(
                        doctor.user_id,
                        NotificationKind::General,
                        "New Patient Linked",
                        format!("{} linked with you by scanning your QR code", patient.name),
                        Some("/doctor/patients".to_string()),
                    ))
                    .await;
                if let Err(e) = notified {
                    warn!("Failed to notify doctor {} of new link: {}", doctor.id, e);
                }
            }
            Ok(None) => warn!("Doctor {} vanished before link notification", stored.doctor_id),
            Err(e) => warn!("Doctor lookup for link notification failed: {}", e),
        }

        Ok(link)
    }
}
