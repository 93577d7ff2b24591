use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Dashboard Router Module
///
/// Mounted twice, at `/dashboard` (role `user`) and `/member-dashboard`
/// (role `member`). Handlers read the session the guard stored in the request
/// extensions, so this router must never be mounted without the guard layer.
pub fn dashboard_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::dashboard_home))
        .route("/profile", get(handlers::dashboard_profile))
        // GET .../bookings
        // Confirmed bookings, fetched upstream with the caller's bearer token.
        .route("/bookings", get(handlers::my_bookings))
}
