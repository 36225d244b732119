//! # Meeting Cell
//!
//! Video consultation scheduling, the meeting status state machine and the
//! background runner that marks stale meetings `missed` and sends
//! appointment reminders.
//!
//! ## API Endpoints
//!
//! - `POST /meetings` - Schedule a meeting or start an immediate call (doctors)
//! - `GET /meetings` - Caller's meetings, newest first
//! - `GET /meetings/{id}` - Meeting details plus a video access token
//! - `DELETE /meetings/{id}` - Delete (owning doctor)
//! - `POST /meetings/{id}/reschedule` - Move the start time
//! - `POST /meetings/{id}/cancel` - Cancel a scheduled meeting
//! - `POST /meetings/{id}/consent` - Record recording consent
//! - `POST /meetings/{id}/start-recording` - Mark the call in progress
//! - `POST /meetings/{id}/participant-event` - Joined/left notifications

pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::{MeetingError, SweepReport, SweeperConfig};
pub use router::meeting_routes;
pub use services::lifecycle;
pub use services::reminders::AppointmentReminderService;
pub use services::scheduling::MeetingService;
pub use services::sweeper::MissedMeetingSweeper;
