pub mod auth;
pub mod call_note;
pub mod error;
pub mod meeting;
pub mod notification;
pub mod profile;
pub mod qr;

pub(crate) mod serde_helpers;
