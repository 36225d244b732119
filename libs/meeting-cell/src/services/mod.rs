pub mod lifecycle;
pub mod reminders;
pub mod scheduling;
pub mod sweeper;
