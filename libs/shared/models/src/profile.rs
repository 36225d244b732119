use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorProfile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub specialty: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientProfile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
}

/// One side of a meeting: the profile row plus the owning user account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Participant {
    pub profile_id: Uuid,
    pub user_id: Uuid,
    pub name: String,
}

impl From<&DoctorProfile> for Participant {
    fn from(doctor: &DoctorProfile) -> Self {
        Self {
            profile_id: doctor.id,
            user_id: doctor.user_id,
            name: doctor.name.clone(),
        }
    }
}

impl From<&PatientProfile> for Participant {
    fn from(patient: &PatientProfile) -> Self {
        Self {
            profile_id: patient.id,
            user_id: patient.user_id,
            name: patient.name.clone(),
        }
    }
}
