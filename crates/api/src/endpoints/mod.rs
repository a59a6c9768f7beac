//! API endpoints.

mod categories;
mod listings;
mod notifications;
mod posts;
mod upsells;

use axum::Router;

use crate::middleware::AppState;

/// Create the API router.
pub fn router() -> Router<AppState> {
    let admin = Router::new()
        .nest("/categories", categories::router())
        .nest("/posts", posts::router())
        .nest("/upsells", upsells::router())
        .nest("/notifications", notifications::router());

    Router::new()
        .nest("/admin", admin)
        .nest("/listings", listings::router())
}
