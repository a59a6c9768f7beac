//! Repository layer for database operations.

mod category;
mod listing;
mod notification;
mod upsell;
mod user;

pub use category::CategoryRepository;
pub use listing::{ListingFilter, ListingRepository, priority_score_expr};
pub use notification::NotificationRepository;
pub use upsell::UpsellRepository;
pub use user::UserRepository;
