pub mod memory;
pub mod repository;
pub mod store;
pub mod supabase;

pub use memory::InMemoryGateway;
pub use repository::{
    CallNoteRepository, MeetingFilter, MeetingRepository, NotificationRepository,
    ProfileRepository, QrTokenRepository,
};
pub use store::SupabaseGateway;
pub use supabase::SupabaseClient;
