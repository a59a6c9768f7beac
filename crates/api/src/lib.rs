//! HTTP API layer for the classifieds backend.
//!
//! - **Endpoints**: admin moderation, upsell and notification endpoints under
//!   `/admin`, customer listing endpoints under `/listings`
//! - **Extractors**: authenticated user and administrator capabilities
//! - **Middleware**: bearer token authentication
//!
//! Built on Axum 0.8 with Tower middleware stack.

pub mod endpoints;
pub mod extractors;
pub mod middleware;
pub mod response;

pub use endpoints::router;
pub use middleware::AppState;
