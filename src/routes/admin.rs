use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, put},
};

/// Admin Router Module
///
/// Mounted at `/admin-dashboard` behind a guard that admits only `admin`.
/// Members and users who reach these paths are redirected to their own
/// landing page with an access-denied notice.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::dashboard_home))
        .route("/profile", get(handlers::dashboard_profile))
        // GET/POST /admin-dashboard/coupons
        // Coupon list and creation. Input is validated before it goes upstream.
        .route(
            "/coupons",
            get(handlers::list_coupons).post(handlers::create_coupon),
        )
        // PUT/DELETE /admin-dashboard/coupons/{id}
        .route(
            "/coupons/{id}",
            put(handlers::update_coupon).delete(handlers::delete_coupon),
        )
}
