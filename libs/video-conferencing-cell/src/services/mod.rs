pub mod twilio;

pub use twilio::{TwilioTokenIssuer, VideoTokenIssuer};
