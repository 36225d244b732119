use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QrToken {
    pub id: Uuid,
    pub token: String,
    pub doctor_id: Uuid,
    pub used: bool,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl QrToken {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Valid iff unused and not yet expired, both checked against the same `now`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !self.used && !self.is_expired_at(now)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewQrToken {
    pub token: String,
    pub doctor_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorPatientLink {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub source: String,
    pub linked_at: DateTime<Utc>,
}
