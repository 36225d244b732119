use chrono::{DateTime, Duration, Utc};

use shared_models::meeting::{Meeting, MeetingStatus};

use crate::models::MeetingError;

pub const MISSED_GRACE_MINUTES: i64 = 30;

pub const ALL_STATUSES: [MeetingStatus; 6] = [
    MeetingStatus::Scheduled,
    MeetingStatus::InProgress,
    MeetingStatus::Completed,
    MeetingStatus::Cancelled,
    MeetingStatus::Missed,
    MeetingStatus::TranscriptionFailed,
];

/// Every legal status change. Reschedule is the only way out of a terminal
/// status; a failed transcription may be closed again after a fresh upload.
pub fn can_transition(from: MeetingStatus, to: MeetingStatus) -> bool {
    use MeetingStatus::*;

    match (from, to) {
        (Scheduled, InProgress | Cancelled | Missed) => true,
        (Scheduled | InProgress, Completed | TranscriptionFailed) => true,
        (TranscriptionFailed, Completed | TranscriptionFailed) => true,
        (InProgress, Scheduled) => false,
        (_, Scheduled) => true,
        _ => false,
    }
}

pub fn validate_transition(from: MeetingStatus, to: MeetingStatus) -> Result<(), MeetingError> {
    if can_transition(from, to) {
        Ok(())
    } else {
        Err(MeetingError::InvalidStatusTransition { from, to })
    }
}

/// Statuses a conditional update into `to` may start from.
pub fn sources_for(to: MeetingStatus) -> Vec<MeetingStatus> {
    ALL_STATUSES
        .into_iter()
        .filter(|from| can_transition(*from, to))
        .collect()
}

pub fn missed_cutoff(now: DateTime<Utc>, grace: Duration) -> DateTime<Utc> {
    now - grace
}

pub fn is_stale(meeting: &Meeting, now: DateTime<Utc>, grace: Duration) -> bool {
    meeting.status == MeetingStatus::Scheduled
        && meeting
            .scheduled_at
            .map(|at| at < missed_cutoff(now, grace))
            .unwrap_or(false)
}

/// Human readable lead time when a reminder is due: about an hour out
/// (55 to 65 minutes) or about a day out (23 to 25 whole hours).
pub fn reminder_lead(until_start: Duration) -> Option<String> {
    let minutes = until_start.num_minutes();
    let hours = until_start.num_hours();

    if !((55..=65).contains(&minutes) || (23..=25).contains(&hours)) {
        return None;
    }

    Some(if hours > 1 {
        format!("{} hours", hours)
    } else {
        format!("{} minutes", minutes)
    })
}
