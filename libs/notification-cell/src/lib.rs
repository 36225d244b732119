pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::{Inbox, NotificationError};
pub use router::notification_routes;
pub use services::notifier::NotificationService;
