//! # QR Link Cell
//!
//! Doctors hand out single-use QR codes; a patient who scans one within 24
//! hours is linked to that doctor.
//!
//! ## API Endpoints
//!
//! - `POST /qr/generate` - New token, link and PNG data URL (doctors)
//! - `GET /qr/tokens` - The doctor's tokens, newest first
//! - `GET /qr/verify/{token}` - Public validity check for the landing page
//! - `POST /qr/link` - Link the calling patient to the token's doctor

pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::QrLinkError;
pub use router::qr_link_routes;
pub use services::linking::QrLinkService;
