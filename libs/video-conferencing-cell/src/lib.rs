//! # Video Conferencing Cell
//!
//! Issues Twilio Video access tokens. The room name is the meeting id; the
//! meeting cell asks for a token whenever a participant opens a meeting.
//!
//! ## API Endpoints
//!
//! - `GET /video/token?room={room}` - Access token for the authenticated caller
//! - `GET /video/health` - Whether Twilio credentials are configured
//!
//! ## Configuration
//!
//! - `TWILIO_ACCOUNT_SID` - Account the token is issued under (`sub`)
//! - `TWILIO_API_KEY` - API key SID (`iss`)
//! - `TWILIO_API_SECRET` - HS256 signing secret
//!
//! Missing credentials disable token issuance; callers get `NotConfigured`.

pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::{VideoAccessToken, VideoConferencingError};
pub use router::video_conferencing_routes;
pub use services::{TwilioTokenIssuer, VideoTokenIssuer};
