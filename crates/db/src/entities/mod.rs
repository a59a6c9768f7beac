//! Database entities.

pub mod category;
pub mod listing;
pub mod listing_upsell;
pub mod notification;
pub mod user;

pub use category::Entity as Category;
pub use listing::Entity as Listing;
pub use listing_upsell::Entity as ListingUpsell;
pub use notification::Entity as Notification;
pub use user::Entity as User;
