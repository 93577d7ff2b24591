use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Public Router Module
///
/// Pages that render for anonymous visitors. Pages here may still look at the
/// session (`/login` sends signed-in visitors on) but never require one.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for the load balancer.
        .route("/health", get(|| async { "ok" }))
        .route("/", get(handlers::home))
        // GET /login?from=...
        // The route guard sends anonymous visitors here with their intended destination.
        .route("/login", get(handlers::login_page))
        .route("/register", get(handlers::register_page))
        // GET /courts?page=N
        .route("/courts", get(handlers::list_courts))
        // GET /categories?page=N&refetch=1
        // Court types aggregated from the court list, nine per page.
        .route("/categories", get(handlers::list_categories))
        // GET /categories/{type}
        .route("/categories/{type}", get(handlers::category_courts))
        .route("/privacy", get(handlers::privacy))
        .route("/terms", get(handlers::terms))
}
